//! SyncTokensUseCase: the token registry and the host/client authorization
//! rules for changing it.
//!
//! The registry owns the *active set* — the tokens currently visible on
//! this device — and enforces who may originate a state change:
//!
//! ```text
//! [host taps a cube]
//!   try_send_cube(id, link)
//!     → refuses unless this device is the host
//!     → refuses unless the cube is active here
//!     → refuses unless a connection is established
//!     → deactivates the cube locally, then sends its id to the peer
//!
//! [client receives the id]
//!   read thread → dispatcher → CubeSyncHandler → receive_cube(id)
//!     → activates the matching cube locally
//! ```
//!
//! Every entry point runs on the control thread (UI calls and
//! dispatcher-drained callbacks), so the registry needs no internal
//! locking; callers that share it across the composition root wrap it in a
//! `Mutex`.
//!
//! The use case reaches the connection manager only through the narrow
//! [`GameLink`] trait, so the rules are fully testable against a mock link.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

#[cfg(test)]
use mockall::automock;
use tracing::{debug, info, warn};

use cubelink_core::{Role, TokenCatalog, TokenId};

use crate::infrastructure::network::connection_manager::{
    ConnectionManager, LinkError, LinkEvent, LinkObserver,
};

/// The slice of the connection manager the registry depends on.
#[cfg_attr(test, automock)]
pub trait GameLink: Send + Sync {
    /// Role of the current connection attempt.
    fn role(&self) -> Role;
    /// `true` while a connection is established.
    fn is_connected(&self) -> bool;
    /// Sends one token to the peer.
    fn send_token(&self, token: &TokenId) -> Result<(), LinkError>;
}

impl GameLink for ConnectionManager {
    fn role(&self) -> Role {
        ConnectionManager::role(self)
    }

    fn is_connected(&self) -> bool {
        ConnectionManager::is_connected(self)
    }

    fn send_token(&self, token: &TokenId) -> Result<(), LinkError> {
        self.send(token)
    }
}

/// Result of an activation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivateOutcome {
    /// The token is now active.
    Activated,
    /// The token was already active; nothing changed.
    AlreadyActive,
    /// The token is not in the declared catalog; nothing changed.
    UnknownToken,
}

/// Result of a host-side send request.
#[derive(Debug)]
pub enum TrySendOutcome {
    /// The token was deactivated locally and sent to the peer.
    Sent,
    /// This device is not the host; only the host originates hide-events.
    RoleMismatch,
    /// The token is not active on this device; there is nothing to send.
    NotActive,
    /// No connection is established.
    NotConnected,
    /// The token was deactivated locally but the write failed.  The local
    /// removal stands: re-adding would reopen the duplicate-send window the
    /// remove-before-write order exists to close.
    SendFailed(LinkError),
}

/// The set of active tokens and the rules for changing it.
pub struct TokenRegistry {
    catalog: TokenCatalog,
    active: HashSet<TokenId>,
}

impl TokenRegistry {
    /// Creates a registry over the declared catalog.  All tokens start
    /// inactive.
    pub fn new(catalog: TokenCatalog) -> Self {
        info!("{} token(s) registered; all inactive", catalog.len());
        Self {
            catalog,
            active: HashSet::new(),
        }
    }

    /// Marks a token active.  Idempotent; unknown ids are reported and
    /// ignored.
    pub fn activate_cube(&mut self, id: &TokenId) -> ActivateOutcome {
        if !self.catalog.contains(id) {
            warn!("no token with id '{id}'; activation ignored");
            return ActivateOutcome::UnknownToken;
        }
        if self.active.insert(id.clone()) {
            info!("token '{id}' activated");
            ActivateOutcome::Activated
        } else {
            debug!("token '{id}' is already active");
            ActivateOutcome::AlreadyActive
        }
    }

    /// Host-only: deactivates `id` locally and sends it to the peer.
    ///
    /// All preconditions must hold at once — host role, `id` active, link
    /// connected; a failed precondition is a no-op that reports why.  On
    /// success the local state is updated *before* the network write so a
    /// concurrent duplicate send for the same id cannot occur.
    pub fn try_send_cube(&mut self, id: &TokenId, link: &dyn GameLink) -> TrySendOutcome {
        if link.role() != Role::Host {
            debug!("try_send_cube refused: this device is the {}, not the host", link.role());
            return TrySendOutcome::RoleMismatch;
        }
        if !self.active.contains(id) {
            warn!("token '{id}' is not active; nothing to send");
            return TrySendOutcome::NotActive;
        }
        if !link.is_connected() {
            warn!("no active connection; token '{id}' not sent");
            return TrySendOutcome::NotConnected;
        }

        self.active.remove(id);
        info!("token '{id}' deactivated locally; sending to peer");
        match link.send_token(id) {
            Ok(()) => TrySendOutcome::Sent,
            Err(e) => TrySendOutcome::SendFailed(e),
        }
    }

    /// Handles a token id received from the peer by activating it locally.
    ///
    /// Reached only via a dispatcher-drained callback, never directly from
    /// the read thread.
    pub fn receive_cube(&mut self, id: &TokenId) -> ActivateOutcome {
        debug!("received token '{id}' from peer; activating");
        self.activate_cube(id)
    }

    /// `true` if `id` is currently active on this device.
    pub fn is_active(&self, id: &TokenId) -> bool {
        self.active.contains(id)
    }

    /// Number of currently active tokens.
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Iterates over the active tokens in unspecified order.
    pub fn active_tokens(&self) -> impl Iterator<Item = &TokenId> {
        self.active.iter()
    }

    /// The declared catalog.
    pub fn catalog(&self) -> &TokenCatalog {
        &self.catalog
    }
}

/// Wires link events to the registry: the piece that makes a received
/// hide-event appear as an activated cube.
///
/// Registered as a [`LinkObserver`], so every call arrives through the
/// dispatcher on the control thread.
pub struct CubeSyncHandler {
    registry: Arc<Mutex<TokenRegistry>>,
}

impl CubeSyncHandler {
    pub fn new(registry: Arc<Mutex<TokenRegistry>>) -> Arc<Self> {
        Arc::new(Self { registry })
    }
}

impl LinkObserver for CubeSyncHandler {
    fn on_link_event(&self, event: LinkEvent) {
        match event {
            LinkEvent::MessageReceived { token } => {
                self.registry
                    .lock()
                    .expect("registry mutex poisoned")
                    .receive_cube(&token);
            }
            LinkEvent::Connected { role, peer } => match peer {
                Some(name) => info!("session established with {name}; playing as {role}"),
                None => info!("session established; playing as {role}"),
            },
            // Setup failures and disconnects are already reported by the
            // connection manager; nothing to mirror into game state.
            LinkEvent::AttemptFailed { .. } | LinkEvent::Disconnected { .. } => {}
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> TokenCatalog {
        TokenCatalog::new(["cube_1", "cube_2", "cube_3"].map(TokenId::from))
    }

    fn id(s: &str) -> TokenId {
        TokenId::from(s)
    }

    /// A mock link representing a connected host.
    fn connected_host() -> MockGameLink {
        let mut link = MockGameLink::new();
        link.expect_role().return_const(Role::Host);
        link.expect_is_connected().return_const(true);
        link
    }

    #[test]
    fn test_activate_unknown_token_leaves_active_set_unchanged() {
        // Arrange
        let mut registry = TokenRegistry::new(catalog());

        // Act
        let outcome = registry.activate_cube(&id("cube_99"));

        // Assert
        assert_eq!(outcome, ActivateOutcome::UnknownToken);
        assert_eq!(registry.active_count(), 0);
    }

    #[test]
    fn test_activate_is_idempotent() {
        // Arrange
        let mut registry = TokenRegistry::new(catalog());

        // Act
        let first = registry.activate_cube(&id("cube_1"));
        let second = registry.activate_cube(&id("cube_1"));

        // Assert – same active set as activating once
        assert_eq!(first, ActivateOutcome::Activated);
        assert_eq!(second, ActivateOutcome::AlreadyActive);
        assert_eq!(registry.active_count(), 1);
        assert!(registry.is_active(&id("cube_1")));
    }

    #[test]
    fn test_try_send_refused_for_client_role_without_touching_the_link() {
        // Arrange – a client-side link; send_token must never be called
        let mut link = MockGameLink::new();
        link.expect_role().return_const(Role::Client);
        link.expect_send_token().times(0);

        let mut registry = TokenRegistry::new(catalog());
        registry.activate_cube(&id("cube_1"));

        // Act
        let outcome = registry.try_send_cube(&id("cube_1"), &link);

        // Assert – no-op: the cube stays active
        assert!(matches!(outcome, TrySendOutcome::RoleMismatch));
        assert!(registry.is_active(&id("cube_1")));
    }

    #[test]
    fn test_try_send_refused_when_token_not_active() {
        // Arrange
        let mut link = MockGameLink::new();
        link.expect_role().return_const(Role::Host);
        link.expect_send_token().times(0);

        let mut registry = TokenRegistry::new(catalog());

        // Act – cube_1 was never activated
        let outcome = registry.try_send_cube(&id("cube_1"), &link);

        // Assert
        assert!(matches!(outcome, TrySendOutcome::NotActive));
    }

    #[test]
    fn test_try_send_refused_when_disconnected_and_cube_stays_active() {
        // Arrange
        let mut link = MockGameLink::new();
        link.expect_role().return_const(Role::Host);
        link.expect_is_connected().return_const(false);
        link.expect_send_token().times(0);

        let mut registry = TokenRegistry::new(catalog());
        registry.activate_cube(&id("cube_1"));

        // Act
        let outcome = registry.try_send_cube(&id("cube_1"), &link);

        // Assert – precondition failure has no side effect
        assert!(matches!(outcome, TrySendOutcome::NotConnected));
        assert!(registry.is_active(&id("cube_1")));
    }

    #[test]
    fn test_try_send_deactivates_locally_and_sends_the_id() {
        // Arrange
        let mut link = connected_host();
        link.expect_send_token()
            .withf(|token| token.as_str() == "cube_1")
            .times(1)
            .returning(|_| Ok(()));

        let mut registry = TokenRegistry::new(catalog());
        registry.activate_cube(&id("cube_1"));

        // Act
        let outcome = registry.try_send_cube(&id("cube_1"), &link);

        // Assert
        assert!(matches!(outcome, TrySendOutcome::Sent));
        assert!(!registry.is_active(&id("cube_1")));
    }

    #[test]
    fn test_try_send_write_failure_keeps_the_local_removal() {
        // Arrange – the link accepts the call but the write fails
        let mut link = connected_host();
        link.expect_send_token().times(1).returning(|_| {
            Err(LinkError::Send(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "pipe broke mid-write",
            )))
        });

        let mut registry = TokenRegistry::new(catalog());
        registry.activate_cube(&id("cube_1"));

        // Act
        let outcome = registry.try_send_cube(&id("cube_1"), &link);

        // Assert – removal happened before the write and stands
        assert!(matches!(outcome, TrySendOutcome::SendFailed(_)));
        assert!(!registry.is_active(&id("cube_1")));
    }

    #[test]
    fn test_receive_cube_activates_known_token() {
        let mut registry = TokenRegistry::new(catalog());
        let outcome = registry.receive_cube(&id("cube_2"));
        assert_eq!(outcome, ActivateOutcome::Activated);
        assert!(registry.is_active(&id("cube_2")));
    }

    #[test]
    fn test_receive_cube_ignores_unknown_token() {
        let mut registry = TokenRegistry::new(catalog());
        let outcome = registry.receive_cube(&id("not_a_cube"));
        assert_eq!(outcome, ActivateOutcome::UnknownToken);
        assert_eq!(registry.active_count(), 0);
    }

    #[test]
    fn test_active_set_stays_a_subset_of_the_catalog() {
        // Arrange
        let mut link = connected_host();
        link.expect_send_token().returning(|_| Ok(()));

        let mut registry = TokenRegistry::new(catalog());

        // Act – a mixed sequence of valid and invalid operations
        registry.activate_cube(&id("cube_1"));
        registry.activate_cube(&id("cube_2"));
        registry.activate_cube(&id("bogus"));
        registry.try_send_cube(&id("cube_1"), &link);
        registry.activate_cube(&id("cube_2")); // duplicate
        registry.receive_cube(&id("cube_3"));
        registry.receive_cube(&id("also_bogus"));

        // Assert – invariant: ActiveSet ⊆ catalog, no duplicates
        for token in registry.active_tokens() {
            assert!(
                registry.catalog().contains(token),
                "active token '{token}' must be declared in the catalog"
            );
        }
        assert_eq!(registry.active_count(), 2); // cube_2, cube_3
    }

    #[test]
    fn test_handler_routes_received_message_into_the_registry() {
        // Arrange
        let registry = Arc::new(Mutex::new(TokenRegistry::new(catalog())));
        let handler = CubeSyncHandler::new(Arc::clone(&registry));

        // Act – the event a drained dispatcher callback would deliver
        handler.on_link_event(LinkEvent::MessageReceived {
            token: id("cube_1"),
        });

        // Assert
        assert!(registry.lock().unwrap().is_active(&id("cube_1")));
    }

    #[test]
    fn test_handler_ignores_lifecycle_events() {
        // Arrange
        let registry = Arc::new(Mutex::new(TokenRegistry::new(catalog())));
        let handler = CubeSyncHandler::new(Arc::clone(&registry));

        // Act
        handler.on_link_event(LinkEvent::Connected {
            role: Role::Client,
            peer: Some("host-phone".to_string()),
        });
        handler.on_link_event(LinkEvent::AttemptFailed {
            reason: "dial refused".to_string(),
        });
        handler.on_link_event(LinkEvent::Disconnected {
            reason: "read failed".to_string(),
        });

        // Assert – game state untouched
        assert_eq!(registry.lock().unwrap().active_count(), 0);
    }
}
