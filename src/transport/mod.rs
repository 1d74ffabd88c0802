//! Transport layer for the realtime channel.
//!
//! The connection state machine owns at most one live [`Transport`] at a
//! time and obtains new ones from a [`Connector`]. Both are traits so the
//! state machine can be driven by scripted transports in tests; production
//! code uses the tokio-tungstenite implementation in [`websocket`].
//!
//! # Close Codes
//!
//! The normal-closure code ([`NORMAL_CLOSURE`], 1000) signals an intentional
//! disconnect and never triggers the retry policy. Every other code is
//! abnormal; a stream that errors out or ends without a close frame is
//! reported as [`ABNORMAL_CLOSURE`] (1006).
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `websocket` | tokio-tungstenite connector and transport |

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;

use crate::error::Result;

// ============================================================================
// Submodules
// ============================================================================

/// WebSocket connector and transport over tokio-tungstenite.
pub mod websocket;

// ============================================================================
// Re-exports
// ============================================================================

pub use websocket::{WsConnector, WsTransport};

// ============================================================================
// Constants
// ============================================================================

/// Close code for an intentional, clean disconnect.
pub const NORMAL_CLOSURE: u16 = 1000;

/// Close code reported when the stream ends without a close frame.
pub const ABNORMAL_CLOSURE: u16 = 1006;

// ============================================================================
// TransportEvent
// ============================================================================

/// One event delivered by a live transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A complete inbound text frame.
    Text(String),

    /// The peer closed the connection.
    Closed {
        /// Close code from the close frame, or [`ABNORMAL_CLOSURE`] if none.
        code: u16,
        /// Human-readable close reason, possibly empty.
        reason: String,
    },
}

impl TransportEvent {
    /// Returns `true` if this is a close with the normal-closure code.
    #[inline]
    #[must_use]
    pub fn is_normal_close(&self) -> bool {
        matches!(self, Self::Closed { code, .. } if *code == NORMAL_CLOSURE)
    }
}

// ============================================================================
// Transport
// ============================================================================

/// A live full-duplex connection to the game server.
///
/// Frames are delivered by [`Transport::recv`] strictly in arrival order.
/// Returning `None` means the stream has ended without a close frame and
/// must be treated as an abnormal closure.
#[async_trait]
pub trait Transport: Send {
    /// Writes one text frame to the peer.
    async fn send(&mut self, text: String) -> Result<()>;

    /// Receives the next transport event.
    ///
    /// `None` signals the stream ended without a close frame.
    async fn recv(&mut self) -> Option<Result<TransportEvent>>;

    /// Closes the connection with the given close code and reason.
    async fn close(&mut self, code: u16, reason: &str) -> Result<()>;
}

// ============================================================================
// Connector
// ============================================================================

/// Factory for new transports.
///
/// The state machine calls this for the initial connect and for every retry;
/// it never holds more than one resulting transport at a time.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Opens a fresh connection to the server.
    async fn connect(&self) -> Result<Box<dyn Transport>>;
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_close_codes() {
        assert_eq!(NORMAL_CLOSURE, 1000);
        assert_eq!(ABNORMAL_CLOSURE, 1006);
    }

    #[test]
    fn test_is_normal_close() {
        let normal = TransportEvent::Closed {
            code: NORMAL_CLOSURE,
            reason: String::new(),
        };
        let abnormal = TransportEvent::Closed {
            code: ABNORMAL_CLOSURE,
            reason: String::new(),
        };
        let text = TransportEvent::Text("{}".into());

        assert!(normal.is_normal_close());
        assert!(!abnormal.is_normal_close());
        assert!(!text.is_normal_close());
    }
}
