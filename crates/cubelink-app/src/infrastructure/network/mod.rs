//! Network infrastructure: the link lifecycle over the transport seam.
//!
//! # Sub-modules
//!
//! - **`connection_manager`** – Owns the role, the link state machine, the
//!   established socket, and the background threads (transient setup thread
//!   per attempt, persistent read thread per connection).  Publishes
//!   [`connection_manager::LinkEvent`]s to subscribed observers through the
//!   control-thread dispatcher.

pub mod connection_manager;
