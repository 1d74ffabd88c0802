//! Wire protocol for the realtime channel.
//!
//! Inbound and outbound frames are JSON-encoded text with a typed envelope
//! (`message_type` + `room`) and an open payload map.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `message` | [`ServerMessage`] envelope and [`MessageType`] enum |

// ============================================================================
// Submodules
// ============================================================================

/// Server message envelope and type discriminant.
pub mod message;

// ============================================================================
// Re-exports
// ============================================================================

pub use message::{MessageType, ServerMessage};
