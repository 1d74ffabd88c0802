//! Inbound frame dispatcher.
//!
//! Parses raw text frames into [`ServerMessage`] values and feeds the
//! well-formed ones to the history buffer and the listener registry, in
//! that order. History is stamped before any subscriber callback runs, so a
//! subscriber reading history inside its own callback sees the current
//! message included.
//!
//! Malformed frames (non-JSON, or an invalid/missing `message_type`) are
//! logged and discarded; they never reach history or subscribers.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use tracing::{trace, warn};

use crate::error::{Error, Result};
use crate::protocol::ServerMessage;

use super::history::HistoryBuffer;
use super::listeners::ListenerRegistry;

// ============================================================================
// MessageDispatcher
// ============================================================================

/// Parses inbound frames and fans them out.
pub struct MessageDispatcher {
    /// Shared listener registry.
    listeners: Arc<ListenerRegistry>,
    /// Shared history buffer.
    history: Arc<HistoryBuffer>,
}

impl MessageDispatcher {
    /// Creates a dispatcher over the shared registry and history.
    #[must_use]
    pub fn new(listeners: Arc<ListenerRegistry>, history: Arc<HistoryBuffer>) -> Self {
        Self { listeners, history }
    }

    /// Handles one raw inbound text frame.
    ///
    /// Returns `true` if the frame was well-formed and dispatched.
    pub fn dispatch_frame(&self, frame: &str) -> bool {
        let message = match parse_frame(frame) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, frame, "Discarding malformed frame");
                return false;
            }
        };

        trace!(kind = %message.message_type, room = message.room, "Message received");

        // Record first so callbacks observe the message in history.
        self.history.record(message.clone());
        self.listeners.dispatch(&message);
        true
    }
}

/// Parses one raw frame into a message envelope.
fn parse_frame(frame: &str) -> Result<ServerMessage> {
    serde_json::from_str(frame).map_err(|e| Error::protocol(format!("bad frame: {e}")))
}

// ============================================================================
// Tests
// ============================================================================
