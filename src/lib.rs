//! City realtime client - persistent WebSocket connection manager.
//!
//! This library maintains the single bidirectional message channel between
//! the City game client and its server. It survives unexpected disconnects
//! through bounded exponential-backoff reconnection, fans inbound messages
//! out to dynamically registered subscribers, and bounds memory with a
//! capped message-history buffer.
//!
//! # Architecture
//!
//! - One [`RealtimeClient`] per application, constructed at startup; clones
//!   of the handle share the connection
//! - At most one live transport at a time, owned by the state machine
//! - Inbound frames are JSON text with a typed envelope
//!   (`message_type` + `room`) and an open payload map
//! - Runtime failures surface as observable state
//!   ([`ConnectionState`] + `last_error`), not as exceptions to catch
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use city_realtime::{AuthHandle, MessageType, RealtimeClient, Result, ServerMessage};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let auth = AuthHandle::new(false);
//!     let client = RealtimeClient::new("wss://play.example.com/ws", Arc::new(auth.clone()))?;
//!
//!     // Connect/disconnect follow the session's auth signal.
//!     let _watcher = client.drive_auth();
//!
//!     client.add_message_listener(MessageType::Chat, |msg| {
//!         println!("room {}: {:?}", msg.room, msg.get_str("content"));
//!     });
//!
//!     // Logging in opens the channel.
//!     auth.set_authenticated(true);
//!
//!     client.send_message(&ServerMessage::new(MessageType::Join, 7));
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`auth`] | Authentication signal the state machine observes |
//! | [`client`] | [`RealtimeClient`] state machine and its leaves |
//! | [`config`] | Client configuration and defaults |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`protocol`] | Message envelope and type discriminant |
//! | [`transport`] | Transport seam and the tokio-tungstenite implementation |
//!
//! # Reconnect Behavior
//!
//! An abnormal close (any code other than 1000) while authenticated starts
//! the retry loop: delays of 1000, 2000, 4000, 8000 and 16000 ms, then a
//! terminal error state that only a manual [`RealtimeClient::reconnect`]
//! (or [`RealtimeClient::clear_error`] plus a fresh connect) leaves.
//! Outbound messages sent while not connected are dropped, never queued.

// ============================================================================
// Modules
// ============================================================================

/// Authentication signal.
///
/// The state machine only observes a boolean; session management lives
/// elsewhere.
pub mod auth;

/// Connection manager: state machine, listeners, history, retry policy.
pub mod client;

/// Client configuration.
pub mod config;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Wire protocol message types.
pub mod protocol;

/// Transport layer.
///
/// The [`transport::Connector`]/[`transport::Transport`] seam plus the
/// production WebSocket implementation.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Auth types
pub use auth::{AuthGate, AuthHandle};

// Client types
pub use client::{
    ConnectionState, HistoryEntry, ListenerId, MessageFilter, RealtimeClient, ReconnectPolicy,
};

// Configuration types
pub use config::ClientConfig;

// Error types
pub use error::{Error, Result};

// Protocol types
pub use protocol::{MessageType, ServerMessage};
