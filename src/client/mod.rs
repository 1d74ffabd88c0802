//! The connection manager and its supporting pieces.
//!
//! [`RealtimeClient`] is the public face; the submodules are the leaves it
//! is built from, ordered roughly by dependency:
//!
//! | Module | Description |
//! |--------|-------------|
//! | `state` | [`ConnectionState`] lifecycle enum |
//! | `reconnect` | Pure backoff policy and attempt counter |
//! | `listeners` | Ordered listener registry with wildcard dispatch |
//! | `history` | Bounded FIFO of received messages |
//! | `dispatch` | Frame parser feeding history and listeners |
//! | `core` | The state machine owning the live transport |

// ============================================================================
// Submodules
// ============================================================================

/// Connection lifecycle states.
pub mod state;

/// Reconnect backoff policy.
pub mod reconnect;

/// Message listener registry.
pub mod listeners;

/// Bounded message history.
pub mod history;

/// Inbound frame dispatcher.
pub mod dispatch;

/// Connection state machine.
pub mod core;

// ============================================================================
// Re-exports
// ============================================================================

pub use self::core::RealtimeClient;
pub use history::{HistoryBuffer, HistoryEntry};
pub use listeners::{ListenerId, ListenerRegistry, MessageFilter};
pub use reconnect::{ReconnectPolicy, ReconnectState};
pub use state::ConnectionState;
