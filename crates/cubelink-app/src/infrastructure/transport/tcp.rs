//! Desktop transport over `std::net`, the stand-in for the native RFCOMM
//! binding.
//!
//! Rendezvous works the same way the serial profile does: both sides agree
//! on a fixed service port (the analogue of the well-known service UUID),
//! the hosting side binds and accepts, the joining side dials a paired
//! peer's `host:port` address.  Paired peers come from the application
//! configuration — there is no live discovery, exactly like the bonded
//! device list on the phone.
//!
//! TCP is a byte stream, so it does not guarantee that one write surfaces
//! as one read; under load two messages may coalesce.  That is the same
//! framing gap the serial link carries, and it is accepted here for the
//! same reason: gameplay messages are tiny, far apart, and one-directional.
//! A coalesced read fails decoding loudly rather than corrupting state.

use std::io::{self, Read, Write};
use std::net::{IpAddr, Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cubelink_core::{Peer, PeerAddr};
use tracing::{debug, info};

use super::{Acceptor, Socket, Transport, TransportError};
use crate::infrastructure::storage::config::NetworkConfig;

/// Transport backed by the desktop TCP stack.
pub struct TcpTransport {
    bind_address: IpAddr,
    service_port: u16,
    peers: Vec<Peer>,
}

impl TcpTransport {
    /// Creates the transport from the network configuration and the
    /// configured paired-peer list.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::AdapterUnavailable`] if the configured bind
    /// address is not parseable — the stack is unusable and the application
    /// stays non-functional until restarted with a valid configuration.
    pub fn new(config: &NetworkConfig, peers: Vec<Peer>) -> Result<Self, TransportError> {
        let bind_address: IpAddr = config.bind_address.parse().map_err(|e| {
            TransportError::AdapterUnavailable(format!(
                "invalid bind address '{}': {e}",
                config.bind_address
            ))
        })?;
        Ok(Self {
            bind_address,
            service_port: config.service_port,
            peers,
        })
    }
}

impl Transport for TcpTransport {
    fn listen(&self) -> Result<Box<dyn Acceptor>, TransportError> {
        let addr = SocketAddr::new(self.bind_address, self.service_port);
        let listener =
            TcpListener::bind(addr).map_err(|source| TransportError::Listen { source })?;
        info!("listening on {}", listener.local_addr().unwrap_or(addr));
        Ok(Box::new(TcpAcceptor { listener }))
    }

    fn dial(&self, peer: &Peer) -> Result<Arc<dyn Socket>, TransportError> {
        debug!("dialing {} at {}", peer.name, peer.address);
        let stream = TcpStream::connect(peer.address.as_str()).map_err(|source| {
            TransportError::Dial {
                peer: peer.address.clone(),
                source,
            }
        })?;
        Ok(Arc::new(TcpSocket::new(stream)?))
    }

    fn paired_peers(&self) -> Result<Vec<Peer>, TransportError> {
        Ok(self.peers.clone())
    }
}

struct TcpAcceptor {
    listener: TcpListener,
}

impl Acceptor for TcpAcceptor {
    fn accept(&mut self) -> Result<Arc<dyn Socket>, TransportError> {
        let (stream, peer_addr) = self
            .listener
            .accept()
            .map_err(|source| TransportError::Listen { source })?;
        info!("peer connected from {peer_addr}");
        Ok(Arc::new(TcpSocket::new(stream)?))
    }

    fn local_address(&self) -> Option<PeerAddr> {
        self.listener
            .local_addr()
            .ok()
            .map(|a| PeerAddr::from(a.to_string()))
    }
}

/// An established TCP stream behind the [`Socket`] contract.
struct TcpSocket {
    stream: TcpStream,
    closed: AtomicBool,
}

impl TcpSocket {
    fn new(stream: TcpStream) -> Result<Self, TransportError> {
        // Gameplay messages are single small packets; never delay them.
        stream
            .set_nodelay(true)
            .map_err(|source| TransportError::StreamSetup { source })?;
        Ok(Self {
            stream,
            closed: AtomicBool::new(false),
        })
    }
}

impl Socket for TcpSocket {
    fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        (&self.stream).read(buf)
    }

    fn write_all(&self, data: &[u8]) -> io::Result<()> {
        (&self.stream).write_all(data)
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            // Shutdown (not just drop) so a read blocked on the other thread
            // returns immediately.
            let _ = self.stream.shutdown(Shutdown::Both);
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
