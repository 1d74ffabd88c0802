//! Authentication signal.
//!
//! The connection manager never performs authentication itself; it only
//! observes a boolean "is authenticated" signal owned by the session layer.
//! `connect()` is a guarded no-op while the signal is false, and
//! [`RealtimeClient::drive_auth`](crate::RealtimeClient::drive_auth) reacts
//! to transitions: true triggers a connect, false a disconnect.

// ============================================================================
// Imports
// ============================================================================

use tokio::sync::watch;

// ============================================================================
// AuthGate
// ============================================================================

/// Source of the boolean authentication signal.
///
/// Implementations must be cheap to poll; the state machine checks the
/// signal on every connect attempt and on every abnormal close.
pub trait AuthGate: Send + Sync {
    /// Returns the current value of the signal.
    fn is_authenticated(&self) -> bool;

    /// Subscribes to signal transitions.
    fn subscribe(&self) -> watch::Receiver<bool>;
}

// ============================================================================
// AuthHandle
// ============================================================================

/// Watch-backed [`AuthGate`] implementation.
///
/// The session layer holds an `AuthHandle` and flips it on login/logout;
/// clones share the same underlying signal.
///
/// # Example
///
/// ```
/// use city_realtime::auth::{AuthGate, AuthHandle};
///
/// let auth = AuthHandle::new(false);
/// assert!(!auth.is_authenticated());
///
/// auth.set_authenticated(true);
/// assert!(auth.is_authenticated());
/// ```
#[derive(Debug, Clone)]
pub struct AuthHandle {
    /// Shared signal; the receiver side is kept so the channel never closes.
    tx: watch::Sender<bool>,
}

impl Default for AuthHandle {
    fn default() -> Self {
        Self::new(false)
    }
}

impl AuthHandle {
    /// Creates a handle with the given initial signal value.
    #[must_use]
    pub fn new(authenticated: bool) -> Self {
        let (tx, _rx) = watch::channel(authenticated);
        Self { tx }
    }

    /// Updates the signal; observers only wake on actual transitions.
    pub fn set_authenticated(&self, authenticated: bool) {
        self.tx.send_if_modified(|current| {
            let changed = *current != authenticated;
            *current = authenticated;
            changed
        });
    }
}

impl AuthGate for AuthHandle {
    fn is_authenticated(&self) -> bool {
        *self.tx.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

// ============================================================================
// Tests
// ============================================================================
