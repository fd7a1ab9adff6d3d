//! # cubelink-core
//!
//! Shared library for CubeLink containing the wire codec, the domain
//! vocabulary (tokens, roles, link states, peers), and the control-thread
//! dispatcher.
//!
//! This crate is used by the application crate on both sides of a link.
//! It has zero dependencies on OS APIs, UI frameworks, or network sockets.
//!
//! # Architecture overview (for beginners)
//!
//! CubeLink is a two-player game helper: two paired devices share the
//! visibility state of a fixed set of game tokens ("cubes").  One device is
//! the *host* — it can hide a cube locally and push the hide-event to the
//! other device.  The other device is the *client* — it mirrors every
//! received event by activating the matching cube on its own side.
//!
//! This crate (`cubelink-core`) is the shared foundation.  It defines:
//!
//! - **`protocol`** – How bytes travel over the link.  The wire format is
//!   deliberately tiny: one message is the UTF-8 text of one token id, and
//!   one transport read yields one message.
//!
//! - **`domain`** – Pure vocabulary with no OS dependencies: token ids, the
//!   declared catalog, the host/client role, the link state machine, and
//!   peer descriptors.
//!
//! - **`dispatcher`** – The FIFO hand-off used to marshal results produced
//!   on background I/O threads onto the single control thread that owns all
//!   game state.

pub mod dispatcher;
pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `cubelink_core::TokenId` instead of `cubelink_core::domain::token::TokenId`.
pub use dispatcher::Dispatcher;
pub use domain::link::{LinkState, Peer, PeerAddr, Role};
pub use domain::token::{TokenCatalog, TokenId};
pub use protocol::codec::{decode_token, encode_token, ProtocolError};
pub use protocol::service::{MAX_MESSAGE_LEN, SERVICE_NAME, SERVICE_UUID};
