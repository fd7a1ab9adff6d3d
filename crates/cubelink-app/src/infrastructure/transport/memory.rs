//! In-process loopback transport for deterministic tests without hardware.
//!
//! [`MemoryTransport::pair`] creates two endpoints that can only reach each
//! other: each side sees exactly one paired peer (the other side), one side
//! listens and the other dials, and every established stream is a pair of
//! in-process queues.  Because each write travels as one queued frame, the
//! message-boundary contract of [`Socket`](super::Socket) holds
//! structurally: one `write_all` is one `read`, never coalesced and never
//! split.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};

use cubelink_core::{Peer, PeerAddr};

use super::{Acceptor, Socket, Transport, TransportError};

/// One queued unit on a stream: a complete message, or a close notice.
enum Frame {
    Data(Vec<u8>),
    Closed,
}

/// One end of an in-process stream pair.
struct MemorySocket {
    /// Sender towards the peer.  Taken (dropped) on close.
    tx: Mutex<Option<mpsc::Sender<Frame>>>,
    /// Receiver for frames from the peer.
    rx: Mutex<mpsc::Receiver<Frame>>,
    /// Clone of the sender feeding our own `rx`; close() pushes a sentinel
    /// through it so a read blocked on `rx` wakes up.
    self_tx: Mutex<mpsc::Sender<Frame>>,
    /// Set by our own close().
    closed: AtomicBool,
    /// Set once the peer's close sentinel has been observed.
    peer_closed: AtomicBool,
}

/// Creates a connected pair of in-process sockets.
fn socket_pair() -> (Arc<MemorySocket>, Arc<MemorySocket>) {
    let (a_tx, b_rx) = mpsc::channel();
    let (b_tx, a_rx) = mpsc::channel();
    let a = Arc::new(MemorySocket {
        tx: Mutex::new(Some(a_tx.clone())),
        rx: Mutex::new(a_rx),
        self_tx: Mutex::new(b_tx.clone()),
        closed: AtomicBool::new(false),
        peer_closed: AtomicBool::new(false),
    });
    let b = Arc::new(MemorySocket {
        tx: Mutex::new(Some(b_tx)),
        rx: Mutex::new(b_rx),
        self_tx: Mutex::new(a_tx),
        closed: AtomicBool::new(false),
        peer_closed: AtomicBool::new(false),
    });
    (a, b)
}

fn closed_error() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "socket closed")
}

impl Socket for MemorySocket {
    fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(closed_error());
        }
        if self.peer_closed.load(Ordering::SeqCst) {
            return Ok(0);
        }
        let rx = self.rx.lock().expect("socket mutex poisoned");
        match rx.recv() {
            Ok(Frame::Data(data)) => {
                if data.len() > buf.len() {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        "message larger than receive buffer",
                    ));
                }
                buf[..data.len()].copy_from_slice(&data);
                Ok(data.len())
            }
            Ok(Frame::Closed) => {
                if self.closed.load(Ordering::SeqCst) {
                    // Our own close() sentinel: local teardown.
                    Err(closed_error())
                } else {
                    // The peer closed the stream in an orderly way.
                    self.peer_closed.store(true, Ordering::SeqCst);
                    Ok(0)
                }
            }
            Err(_) => Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "stream endpoint dropped",
            )),
        }
    }

    fn write_all(&self, data: &[u8]) -> io::Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(closed_error());
        }
        let tx = self.tx.lock().expect("socket mutex poisoned");
        match tx.as_ref() {
            Some(tx) => tx
                .send(Frame::Data(data.to_vec()))
                .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "peer endpoint dropped")),
            None => Err(closed_error()),
        }
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        // Tell the peer, then stop being able to send anything further.
        if let Some(tx) = self.tx.lock().expect("socket mutex poisoned").take() {
            let _ = tx.send(Frame::Closed);
        }
        // Wake up our own reader if it is blocked.
        let _ = self
            .self_tx
            .lock()
            .expect("socket mutex poisoned")
            .send(Frame::Closed);
    }
}

/// One endpoint of an in-process loopback link.
pub struct MemoryTransport {
    local_name: String,
    peer: Peer,
    /// Dialing pushes the peer's end of a fresh socket pair here; the other
    /// endpoint's acceptor pops it.
    dial_tx: Mutex<mpsc::Sender<Arc<MemorySocket>>>,
    accept_rx: Arc<Mutex<mpsc::Receiver<Arc<MemorySocket>>>>,
}

impl MemoryTransport {
    /// Creates two endpoints that are paired with each other.
    ///
    /// Either side may listen while the other dials; the names are what
    /// `paired_peers` reports to the opposite side.
    pub fn pair(left_name: &str, right_name: &str) -> (MemoryTransport, MemoryTransport) {
        let (left_dial_tx, right_accept_rx) = mpsc::channel();
        let (right_dial_tx, left_accept_rx) = mpsc::channel();
        let left = MemoryTransport {
            local_name: left_name.to_string(),
            peer: Peer {
                name: right_name.to_string(),
                address: PeerAddr::from(format!("mem://{right_name}")),
            },
            dial_tx: Mutex::new(left_dial_tx),
            accept_rx: Arc::new(Mutex::new(left_accept_rx)),
        };
        let right = MemoryTransport {
            local_name: right_name.to_string(),
            peer: Peer {
                name: left_name.to_string(),
                address: PeerAddr::from(format!("mem://{left_name}")),
            },
            dial_tx: Mutex::new(right_dial_tx),
            accept_rx: Arc::new(Mutex::new(right_accept_rx)),
        };
        (left, right)
    }
}

struct MemoryAcceptor {
    address: PeerAddr,
    rx: Arc<Mutex<mpsc::Receiver<Arc<MemorySocket>>>>,
}

impl Acceptor for MemoryAcceptor {
    fn accept(&mut self) -> Result<Arc<dyn Socket>, TransportError> {
        let socket = self
            .rx
            .lock()
            .expect("acceptor mutex poisoned")
            .recv()
            .map_err(|_| TransportError::Closed)?;
        Ok(socket)
    }

    fn local_address(&self) -> Option<PeerAddr> {
        Some(self.address.clone())
    }
}

impl Transport for MemoryTransport {
    fn listen(&self) -> Result<Box<dyn Acceptor>, TransportError> {
        Ok(Box::new(MemoryAcceptor {
            address: PeerAddr::from(format!("mem://{}", self.local_name)),
            rx: Arc::clone(&self.accept_rx),
        }))
    }

    fn dial(&self, peer: &Peer) -> Result<Arc<dyn Socket>, TransportError> {
        if peer.address != self.peer.address {
            return Err(TransportError::Dial {
                peer: peer.address.clone(),
                source: io::Error::new(io::ErrorKind::NotFound, "no such paired peer"),
            });
        }
        let (ours, theirs) = socket_pair();
        self.dial_tx
            .lock()
            .expect("transport mutex poisoned")
            .send(theirs)
            .map_err(|_| TransportError::Dial {
                peer: peer.address.clone(),
                source: io::Error::new(io::ErrorKind::ConnectionRefused, "peer endpoint gone"),
            })?;
        Ok(ours)
    }

    fn paired_peers(&self) -> Result<Vec<Peer>, TransportError> {
        Ok(vec![self.peer.clone()])
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
