//! Role, link state, and peer descriptors.
//!
//! # Connection lifecycle (for beginners)
//!
//! A device progresses through these states:
//!
//! ```text
//! Disconnected ──► Listening  ──► Connected ──► Disconnected     (host)
//! Disconnected ──► Connecting ──► Connected ──► Disconnected     (client)
//!        any setup state ──► Failed                              (no retry)
//! ```
//!
//! - `Listening`: the host side is blocked in accept, waiting for a peer.
//! - `Connecting`: the client side is blocked in dial.
//! - `Connected`: the byte stream is open and the read loop is running.
//! - `Failed`: the last attempt failed during setup.  Terminal for that
//!   attempt; a fresh `start_server`/`connect_to_device` call resets the
//!   state to `Disconnected` and begins a new attempt.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Which side of the link this device plays for the current attempt.
///
/// The role is set exactly once per connection attempt and stays fixed until
/// a new attempt begins.  Only the host originates gameplay messages; the
/// client mirrors them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// No connection attempt has been made yet.
    Unset,
    /// This device created the game and waits for a peer (server side).
    Host,
    /// This device joined an existing game (dialing side).
    Client,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::Unset => "unset",
            Role::Host => "host",
            Role::Client => "client",
        };
        f.write_str(s)
    }
}

/// Current state of the single managed link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// No link and no attempt in progress.
    Disconnected,
    /// Host side: blocked in listen/accept waiting for a peer.
    Listening,
    /// Client side: blocked in dial.
    Connecting,
    /// Byte stream open; read loop running.
    Connected,
    /// The last setup attempt failed; waiting for an explicit new attempt.
    Failed,
}

impl LinkState {
    /// Returns `true` if a new connection attempt may be started from this
    /// state.  `Failed` is startable because a fresh attempt resets it.
    pub fn can_start_attempt(self) -> bool {
        matches!(self, LinkState::Disconnected | LinkState::Failed)
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LinkState::Disconnected => "disconnected",
            LinkState::Listening => "listening",
            LinkState::Connecting => "connecting",
            LinkState::Connected => "connected",
            LinkState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Opaque transport address of a paired peer.
///
/// The string's meaning belongs to the transport that produced it (a
/// Bluetooth MAC address, a `host:port` pair, …); the rest of the system
/// only carries it around.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerAddr(String);

impl PeerAddr {
    /// Returns the address as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerAddr {
    fn from(addr: &str) -> Self {
        Self(addr.to_string())
    }
}

impl From<String> for PeerAddr {
    fn from(addr: String) -> Self {
        Self(addr)
    }
}

/// A previously-paired peer as returned by peer enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peer {
    /// Human-readable device name shown when picking a peer.
    pub name: String,
    /// Transport address used to dial the peer.
    pub address: PeerAddr,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attempt_startable_only_from_disconnected_or_failed() {
        assert!(LinkState::Disconnected.can_start_attempt());
        assert!(LinkState::Failed.can_start_attempt());
        assert!(!LinkState::Listening.can_start_attempt());
        assert!(!LinkState::Connecting.can_start_attempt());
        assert!(!LinkState::Connected.can_start_attempt());
    }

    #[test]
    fn test_role_display_names() {
        assert_eq!(Role::Host.to_string(), "host");
        assert_eq!(Role::Client.to_string(), "client");
        assert_eq!(Role::Unset.to_string(), "unset");
    }

    #[test]
    fn test_link_state_display_names() {
        assert_eq!(LinkState::Connected.to_string(), "connected");
        assert_eq!(LinkState::Failed.to_string(), "failed");
    }

    #[test]
    fn test_peer_addr_round_trips_through_display() {
        let addr = PeerAddr::from("192.168.1.30:47129");
        assert_eq!(addr.to_string(), "192.168.1.30:47129");
        assert_eq!(addr.as_str(), "192.168.1.30:47129");
    }
}
