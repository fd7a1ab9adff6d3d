//! ConnectionManager: role negotiation, connection establishment, and the
//! background read loop.
//!
//! One instance manages exactly one link to one peer at a time.  It is
//! constructed explicitly at the composition root and handed to whoever
//! needs it — there is no ambient global lookup.
//!
//! # Threading model (for beginners)
//!
//! Every blocking transport call runs off the control thread:
//!
//! ```text
//! start_server()        ──► "cubelink-accept" thread: listen + accept
//! connect_to_device()   ──► "cubelink-dial"   thread: dial
//!        on success     ──► "cubelink-read"   thread: blocking read loop
//! ```
//!
//! The setup threads are transient (one per attempt); the read thread is
//! persistent (one per established connection).  None of them ever touch
//! game state directly: results are wrapped as [`LinkEvent`]s and enqueued
//! on the [`Dispatcher`], which the control thread drains once per tick.
//! `send` is the one exception to "all I/O off the control thread" — it
//! performs its blocking write on whatever thread calls it, so callers that
//! need non-blocking behaviour must dispatch the call themselves.
//!
//! # Fault policy
//!
//! Background threads catch every fault at their boundary and convert it
//! into a state transition plus a report; no fault crosses a thread
//! boundary as a panic, and no loop ever swallows an error and keeps
//! spinning.  The read path is the single owner of failure-driven teardown
//! of a live connection; a failed `send` is reported but deliberately does
//! not race the read loop to close the socket.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use cubelink_core::{
    decode_token, encode_token, Dispatcher, LinkState, Peer, ProtocolError, Role, TokenId,
    MAX_MESSAGE_LEN,
};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::infrastructure::transport::{Socket, Transport, TransportError};

/// Error type for link operations.
#[derive(Debug, Error)]
pub enum LinkError {
    /// The listening socket could not be set up or the accept failed.
    #[error("listen failed: {0}")]
    Listen(#[source] TransportError),

    /// The dial to `peer` failed.
    #[error("could not connect to {peer}: {source}")]
    Dial {
        peer: String,
        #[source]
        source: TransportError,
    },

    /// The read loop observed a transport fault (or the peer closing).
    #[error("read failed: {0}")]
    Read(#[source] io::Error),

    /// `send` was called without an established connection.  The message is
    /// dropped; nothing else changes.
    #[error("not connected; message dropped")]
    NotConnected,

    /// The blocking write failed.  Reported, but the connection is left to
    /// the read path to tear down.
    #[error("send failed: {0}")]
    Send(#[source] io::Error),

    /// The outgoing message could not be encoded.
    #[error("invalid outgoing message: {0}")]
    Protocol(#[source] ProtocolError),

    /// A new attempt was requested while one is still active.
    #[error("a connection attempt is already active (state: {0})")]
    AttemptInProgress(LinkState),
}

/// Notifications published by the manager, always delivered through the
/// dispatcher on the control thread.
#[derive(Debug, Clone)]
pub enum LinkEvent {
    /// The connection is established and the read loop is running.
    Connected {
        role: Role,
        /// Display name of the dialed peer; `None` on the accepting side.
        peer: Option<String>,
    },
    /// One decoded message arrived from the peer.
    MessageReceived { token: TokenId },
    /// A setup attempt failed; the link is in the `Failed` state.
    AttemptFailed { reason: String },
    /// A live connection went down (read fault or peer closure).
    Disconnected { reason: String },
}

/// Receiver of [`LinkEvent`]s.
///
/// Implementations run on the control thread (the dispatcher guarantees
/// it), so they may freely touch game state.
pub trait LinkObserver: Send + Sync {
    fn on_link_event(&self, event: LinkEvent);
}

/// Mutable link state, guarded by one mutex.
struct LinkCell {
    state: LinkState,
    role: Role,
    socket: Option<Arc<dyn Socket>>,
    /// Stop flag for the current attempt's read loop; replaced per attempt.
    stop: Arc<AtomicBool>,
    /// Attempt counter.  Background threads carry the epoch of the attempt
    /// they belong to; a thread outliving its attempt cannot mutate the
    /// state of a newer one.
    epoch: u64,
}

/// Manages the single link of this device.
pub struct ConnectionManager {
    transport: Arc<dyn Transport>,
    dispatcher: Arc<Dispatcher>,
    observers: Mutex<Vec<Arc<dyn LinkObserver>>>,
    link: Mutex<LinkCell>,
}

impl ConnectionManager {
    /// Creates a manager over `transport`, publishing events through
    /// `dispatcher`.
    pub fn new(transport: Arc<dyn Transport>, dispatcher: Arc<Dispatcher>) -> Arc<Self> {
        Arc::new(Self {
            transport,
            dispatcher,
            observers: Mutex::new(Vec::new()),
            link: Mutex::new(LinkCell {
                state: LinkState::Disconnected,
                role: Role::Unset,
                socket: None,
                stop: Arc::new(AtomicBool::new(false)),
                epoch: 0,
            }),
        })
    }

    /// Registers an observer for [`LinkEvent`]s.
    pub fn subscribe(&self, observer: Arc<dyn LinkObserver>) {
        self.observers
            .lock()
            .expect("observer mutex poisoned")
            .push(observer);
    }

    /// Current link state.
    pub fn state(&self) -> LinkState {
        self.link.lock().expect("link mutex poisoned").state
    }

    /// Role of the current (or last) attempt.
    pub fn role(&self) -> Role {
        self.link.lock().expect("link mutex poisoned").role
    }

    /// `true` while a connection is established.
    pub fn is_connected(&self) -> bool {
        self.state() == LinkState::Connected
    }

    /// Enumerates previously-paired peers.  Synchronous; no live discovery.
    pub fn scan_peers(&self) -> Result<Vec<Peer>, TransportError> {
        let peers = self.transport.paired_peers()?;
        debug!("{} paired peer(s) known", peers.len());
        Ok(peers)
    }

    /// Starts this device as the host: listens for one peer in the
    /// background and completes the connection when it arrives.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::AttemptInProgress`] unless the link is
    /// `Disconnected` (a `Failed` link is reset first).  Setup faults after
    /// this call returns are reported via [`LinkEvent::AttemptFailed`].
    pub fn start_server(self: &Arc<Self>) -> Result<(), LinkError> {
        let epoch = self.begin_attempt(Role::Host, LinkState::Listening)?;
        info!("starting server; waiting for a peer to connect");

        let mgr = Arc::clone(self);
        thread::Builder::new()
            .name("cubelink-accept".to_string())
            .spawn(move || {
                let mut acceptor = match mgr.transport.listen() {
                    Ok(acceptor) => acceptor,
                    Err(e) => return mgr.fail_attempt(epoch, LinkError::Listen(e)),
                };
                if let Some(addr) = acceptor.local_address() {
                    info!("listening on {addr}");
                }
                match acceptor.accept() {
                    Ok(socket) => mgr.attach_socket(epoch, socket, None),
                    Err(e) => mgr.fail_attempt(epoch, LinkError::Listen(e)),
                }
                // The acceptor drops here: this protocol pairs exactly one
                // peer, so the service stops listening after the first
                // accept.
            })
            .expect("failed to spawn accept thread");
        Ok(())
    }

    /// Connects this device as a client to `peer`, drawn from
    /// [`scan_peers`](Self::scan_peers).
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::AttemptInProgress`] unless the link is
    /// `Disconnected` (a `Failed` link is reset first).  Dial faults after
    /// this call returns are reported via [`LinkEvent::AttemptFailed`].
    pub fn connect_to_device(self: &Arc<Self>, peer: &Peer) -> Result<(), LinkError> {
        let epoch = self.begin_attempt(Role::Client, LinkState::Connecting)?;
        info!("connecting to {}", peer.name);

        let mgr = Arc::clone(self);
        let peer = peer.clone();
        thread::Builder::new()
            .name("cubelink-dial".to_string())
            .spawn(move || match mgr.transport.dial(&peer) {
                Ok(socket) => mgr.attach_socket(epoch, socket, Some(peer.name.clone())),
                Err(e) => mgr.fail_attempt(
                    epoch,
                    LinkError::Dial {
                        peer: peer.name.clone(),
                        source: e,
                    },
                ),
            })
            .expect("failed to spawn dial thread");
        Ok(())
    }

    /// Sends one token to the peer, blocking on the calling thread.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::NotConnected`] (and drops the message) when no
    /// connection is established — this never blocks waiting for one.  A
    /// failed write returns [`LinkError::Send`] but leaves the connection
    /// up; only the read path tears down a live connection.
    pub fn send(&self, token: &TokenId) -> Result<(), LinkError> {
        let socket = {
            let cell = self.link.lock().expect("link mutex poisoned");
            if cell.state != LinkState::Connected {
                warn!("no active connection; token '{token}' not sent");
                return Err(LinkError::NotConnected);
            }
            match &cell.socket {
                Some(socket) => Arc::clone(socket),
                None => {
                    warn!("no active connection; token '{token}' not sent");
                    return Err(LinkError::NotConnected);
                }
            }
        };

        let bytes = encode_token(token).map_err(LinkError::Protocol)?;
        socket.write_all(&bytes).map_err(|e| {
            error!("write of token '{token}' failed: {e}");
            LinkError::Send(e)
        })?;
        debug!("sent token '{token}'");
        Ok(())
    }

    /// Tears the link down: flags the read loop to stop, closes the socket
    /// (idempotent), and returns the state to `Disconnected`.
    ///
    /// An in-flight blocking read is not cancelled; the loop observes the
    /// closed socket via the resulting read error and exits quietly.
    pub fn shutdown(&self) {
        let mut cell = self.link.lock().expect("link mutex poisoned");
        cell.stop.store(true, Ordering::SeqCst);
        if let Some(socket) = cell.socket.take() {
            socket.close();
        }
        cell.state = LinkState::Disconnected;
        info!("link shut down");
    }

    // ── Internals ─────────────────────────────────────────────────────────────

    /// Validates that a new attempt may start, claims the role, and moves
    /// into `entry_state`.  Returns the new attempt's epoch.
    fn begin_attempt(&self, role: Role, entry_state: LinkState) -> Result<u64, LinkError> {
        let mut cell = self.link.lock().expect("link mutex poisoned");
        if !cell.state.can_start_attempt() {
            return Err(LinkError::AttemptInProgress(cell.state));
        }
        if cell.state == LinkState::Failed {
            debug!("resetting failed attempt before starting a new one");
            cell.state = LinkState::Disconnected;
        }
        cell.epoch += 1;
        cell.role = role;
        cell.state = entry_state;
        cell.stop = Arc::new(AtomicBool::new(false));
        cell.socket = None;
        Ok(cell.epoch)
    }

    /// Marks the attempt as failed and reports why.
    fn fail_attempt(&self, epoch: u64, error: LinkError) {
        {
            let mut cell = self.link.lock().expect("link mutex poisoned");
            if cell.epoch != epoch {
                debug!("ignoring failure of superseded attempt: {error}");
                return;
            }
            cell.state = LinkState::Failed;
        }
        error!("connection attempt failed: {error}");
        self.publish(LinkEvent::AttemptFailed {
            reason: error.to_string(),
        });
    }

    /// Completes a successful setup: stores the socket, flips to
    /// `Connected`, notifies observers, and starts the read loop.
    fn attach_socket(
        self: &Arc<Self>,
        epoch: u64,
        socket: Arc<dyn Socket>,
        peer_name: Option<String>,
    ) {
        let (role, stop) = {
            let mut cell = self.link.lock().expect("link mutex poisoned");
            if cell.epoch != epoch || cell.stop.load(Ordering::SeqCst) {
                debug!("attempt superseded; closing freshly established socket");
                socket.close();
                return;
            }
            cell.state = LinkState::Connected;
            cell.socket = Some(Arc::clone(&socket));
            (cell.role, Arc::clone(&cell.stop))
        };

        match &peer_name {
            Some(name) => info!("connected to {name} as {role}"),
            None => info!("peer connected; this device is the {role}"),
        }
        self.publish(LinkEvent::Connected {
            role,
            peer: peer_name,
        });

        let mgr = Arc::clone(self);
        thread::Builder::new()
            .name("cubelink-read".to_string())
            .spawn(move || mgr.read_loop(epoch, socket, stop))
            .expect("failed to spawn read thread");
    }

    /// The persistent read loop.  Exits on teardown, peer closure, or a
    /// read fault — never silently.
    fn read_loop(&self, epoch: u64, socket: Arc<dyn Socket>, stop: Arc<AtomicBool>) {
        let mut buf = vec![0u8; MAX_MESSAGE_LEN];
        loop {
            if stop.load(Ordering::SeqCst) {
                debug!("read loop stopping: teardown requested");
                return;
            }
            match socket.read(&mut buf) {
                Ok(0) => {
                    info!("peer closed the connection");
                    self.reader_down(
                        epoch,
                        io::Error::new(io::ErrorKind::UnexpectedEof, "peer closed the connection"),
                    );
                    return;
                }
                Ok(n) => match decode_token(&buf[..n]) {
                    Ok(token) => {
                        debug!("received token '{token}'");
                        self.publish(LinkEvent::MessageReceived { token });
                    }
                    Err(e) => warn!("discarding malformed message ({n} bytes): {e}"),
                },
                Err(_) if stop.load(Ordering::SeqCst) => {
                    debug!("read loop stopping: socket closed during teardown");
                    return;
                }
                Err(e) => {
                    error!("read failed; tearing down the connection: {e}");
                    self.reader_down(epoch, e);
                    return;
                }
            }
        }
    }

    /// Tears down the connection from the read path and reports why.
    fn reader_down(&self, epoch: u64, error: io::Error) {
        {
            let mut cell = self.link.lock().expect("link mutex poisoned");
            if cell.epoch != epoch {
                debug!("stale read loop exit ignored");
                return;
            }
            cell.stop.store(true, Ordering::SeqCst);
            if let Some(socket) = cell.socket.take() {
                socket.close();
            }
            cell.state = LinkState::Disconnected;
        }
        self.publish(LinkEvent::Disconnected {
            reason: LinkError::Read(error).to_string(),
        });
    }

    /// Hands `event` to every observer via the dispatcher, preserving
    /// enqueue order.
    fn publish(&self, event: LinkEvent) {
        let observers = self.observers.lock().expect("observer mutex poisoned").clone();
        for observer in observers {
            let event = event.clone();
            self.dispatcher
                .enqueue(move || observer.on_link_event(event));
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
