//! Connection state.

// ============================================================================
// ConnectionState
// ============================================================================

/// Lifecycle state of the realtime connection.
///
/// Exactly one value holds at any time, owned by the state machine.
///
/// Transitions:
///
/// ```text
/// Disconnected ──connect()──► Connecting ──open──► Connected
///       ▲                          │                   │
///       │                          └───────┬───────────┘
///       │ disconnect() / clear_error()     │ failure / abnormal close
///       │                                  ▼
///       └────────────────────────────── Error ──reconnect()──► Connecting
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No transport; nothing scheduled. Initial state.
    #[default]
    Disconnected,

    /// A connect attempt is in flight.
    Connecting,

    /// Transport is open; messages flow.
    Connected,

    /// Transport failure, or reconnect attempts exhausted.
    ///
    /// Terminal until a manual reconnect, a fresh connect, or
    /// `clear_error()`.
    Error,
}

impl ConnectionState {
    /// Returns `true` if the connection is established.
    #[inline]
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Returns `true` if a connect attempt is in flight.
    #[inline]
    #[must_use]
    pub const fn is_connecting(&self) -> bool {
        matches!(self, Self::Connecting)
    }

    /// Returns `true` if the connection is in the error state.
    #[inline]
    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self, Self::Error)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_disconnected() {
        assert_eq!(ConnectionState::default(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_predicates() {
        assert!(ConnectionState::Connected.is_connected());
        assert!(ConnectionState::Connecting.is_connecting());
        assert!(ConnectionState::Error.is_error());
        assert!(!ConnectionState::Disconnected.is_connected());
    }

    #[test]
    fn test_display() {
        assert_eq!(ConnectionState::Connecting.to_string(), "connecting");
        assert_eq!(ConnectionState::Error.to_string(), "error");
    }
}
