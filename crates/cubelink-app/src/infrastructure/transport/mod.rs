//! Transport abstraction standing in for the serial Bluetooth link.
//!
//! All platform-native blocking calls — listen, accept, dial, read, write,
//! close — live behind these traits.  The application above them never
//! touches a socket type directly, which is what makes the connection
//! lifecycle testable without hardware:
//!
//! - [`memory`] – an in-process loopback pair used by the test suites.
//! - [`tcp`] – the desktop stack over `std::net`, the stand-in for the
//!   native RFCOMM binding.
//!
//! A native Bluetooth binding would implement the same three traits and
//! nothing else in the application would change.
//!
//! # The message-boundary contract
//!
//! The wire protocol carries no framing, so the transport must preserve
//! message boundaries: one [`Socket::write_all`] on one side surfaces as
//! one [`Socket::read`] on the other.  The memory transport guarantees
//! this structurally.  TCP does not guarantee it in general — a kernel may
//! coalesce two writes into one read under load — which is the same gap
//! the serial link has; reads are bounded by `MAX_MESSAGE_LEN` so an
//! oversized coalesced read fails decoding loudly instead of corrupting
//! state.

use std::io;
use std::sync::Arc;

use cubelink_core::{Peer, PeerAddr};
use thiserror::Error;

pub mod memory;
pub mod tcp;

/// Error type for transport operations.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The underlying adapter/stack is not usable at all.  Fatal at
    /// construction; the application stays non-functional until restarted
    /// with a working adapter.
    #[error("transport adapter unavailable: {0}")]
    AdapterUnavailable(String),

    /// The listening socket could not be created or the blocking accept
    /// failed.
    #[error("listen failed: {source}")]
    Listen {
        #[source]
        source: io::Error,
    },

    /// The blocking dial to a peer failed.
    #[error("dial to {peer} failed: {source}")]
    Dial {
        peer: PeerAddr,
        #[source]
        source: io::Error,
    },

    /// Accept or dial succeeded but the stream could not be configured.
    #[error("stream setup failed: {source}")]
    StreamSetup {
        #[source]
        source: io::Error,
    },

    /// The transport endpoint has been torn down.
    #[error("transport closed")]
    Closed,
}

/// An established bidirectional byte stream.
///
/// The handle is shared between exactly two users: the persistent read
/// thread (sole reader) and whichever thread calls the send path (sole
/// writer at a time).  [`close`](Socket::close) is idempotent and safe to
/// call while a read is blocked — the blocked read returns an error, which
/// the read loop treats as a termination signal rather than a fault.
pub trait Socket: Send + Sync {
    /// Blocking read of one message into `buf`.
    ///
    /// Returns the number of bytes read.  `Ok(0)` means the peer closed the
    /// stream.  After [`close`](Socket::close), returns an error.
    fn read(&self, buf: &mut [u8]) -> io::Result<usize>;

    /// Blocking write of one complete message.
    fn write_all(&self, data: &[u8]) -> io::Result<()>;

    /// Shuts the stream down.  Safe to call multiple times and concurrently
    /// with a blocked read.
    fn close(&self);
}

/// A listening endpoint produced by [`Transport::listen`].
///
/// Dropping the acceptor stops listening; the protocol pairs exactly one
/// peer, so the acceptor is dropped right after the first successful
/// accept.
pub trait Acceptor: Send {
    /// Blocks until a peer connects and returns the established stream.
    fn accept(&mut self) -> Result<Arc<dyn Socket>, TransportError>;

    /// The address this endpoint listens on, when the transport knows it.
    fn local_address(&self) -> Option<PeerAddr>;
}

/// Factory for listening, dialing, and enumerating paired peers.
pub trait Transport: Send + Sync {
    /// Creates a listening endpoint for the well-known service.
    fn listen(&self) -> Result<Box<dyn Acceptor>, TransportError>;

    /// Blocking dial to a peer previously returned by
    /// [`paired_peers`](Transport::paired_peers).
    fn dial(&self, peer: &Peer) -> Result<Arc<dyn Socket>, TransportError>;

    /// Enumerates previously-paired peers.  No live discovery happens here;
    /// an empty list is a valid result, not an error.
    fn paired_peers(&self) -> Result<Vec<Peer>, TransportError>;
}
