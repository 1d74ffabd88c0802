//! Client configuration.
//!
//! # Example
//!
//! ```
//! use city_realtime::ClientConfig;
//! use std::time::Duration;
//!
//! let config = ClientConfig::new()
//!     .with_max_reconnect_attempts(3)
//!     .with_connect_timeout(Duration::from_secs(10));
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use crate::client::reconnect::ReconnectPolicy;

// ============================================================================
// Constants
// ============================================================================

/// Default number of automatic reconnect attempts.
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// Default delay before the first reconnect attempt, in milliseconds.
pub const DEFAULT_BASE_RECONNECT_DELAY_MS: u64 = 1000;

/// Default upper bound on the reconnect delay, in milliseconds.
pub const DEFAULT_MAX_RECONNECT_DELAY_MS: u64 = 30_000;

/// Default number of retained history entries.
pub const DEFAULT_HISTORY_CAPACITY: usize = 100;

/// Default timeout for one connect attempt.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// ClientConfig
// ============================================================================

/// Configuration for a [`RealtimeClient`](crate::RealtimeClient).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Timeout for a single connect attempt.
    pub connect_timeout: Duration,

    /// Reconnect backoff parameters.
    pub reconnect: ReconnectPolicy,

    /// Maximum number of retained history entries.
    pub history_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl ClientConfig {
    /// Creates a configuration with default settings.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            reconnect: ReconnectPolicy::default(),
            history_capacity: DEFAULT_HISTORY_CAPACITY,
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl ClientConfig {
    /// Sets the connect timeout.
    #[inline]
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the maximum number of automatic reconnect attempts.
    #[inline]
    #[must_use]
    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.reconnect.max_attempts = attempts;
        self
    }

    /// Sets the delay before the first reconnect attempt.
    #[inline]
    #[must_use]
    pub fn with_base_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect.base_delay = delay;
        self
    }

    /// Sets the upper bound on the reconnect delay.
    #[inline]
    #[must_use]
    pub fn with_max_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect.max_delay = delay;
        self
    }

    /// Sets the number of retained history entries.
    #[inline]
    #[must_use]
    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity;
        self
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::new();
        assert_eq!(config.connect_timeout, Duration::from_secs(30));
        assert_eq!(config.reconnect.max_attempts, 5);
        assert_eq!(config.reconnect.base_delay, Duration::from_millis(1000));
        assert_eq!(config.reconnect.max_delay, Duration::from_millis(30_000));
        assert_eq!(config.history_capacity, 100);
    }

    #[test]
    fn test_builder_methods() {
        let config = ClientConfig::new()
            .with_connect_timeout(Duration::from_secs(5))
            .with_max_reconnect_attempts(2)
            .with_base_reconnect_delay(Duration::from_millis(250))
            .with_max_reconnect_delay(Duration::from_secs(4))
            .with_history_capacity(16);

        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.reconnect.max_attempts, 2);
        assert_eq!(config.reconnect.base_delay, Duration::from_millis(250));
        assert_eq!(config.reconnect.max_delay, Duration::from_secs(4));
        assert_eq!(config.history_capacity, 16);
    }
}
