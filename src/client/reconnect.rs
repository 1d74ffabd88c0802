//! Reconnect backoff policy.
//!
//! Pure delay calculation plus the attempt counter the state machine drives.
//! No I/O happens here; scheduling the actual retry timer is the state
//! machine's job.
//!
//! With the default policy the retry delays are 1000, 2000, 4000, 8000 and
//! 16000 milliseconds, after which the policy reports exhaustion.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

// ============================================================================
// ReconnectPolicy
// ============================================================================

/// Exponential backoff parameters.
///
/// `delay_for(n) = min(base_delay * 2^n, max_delay)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Delay before the first retry.
    pub base_delay: Duration,

    /// Upper bound on any retry delay.
    pub max_delay: Duration,

    /// Retries allowed before the policy reports exhaustion.
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(crate::config::DEFAULT_BASE_RECONNECT_DELAY_MS),
            max_delay: Duration::from_millis(crate::config::DEFAULT_MAX_RECONNECT_DELAY_MS),
            max_attempts: crate::config::DEFAULT_MAX_RECONNECT_ATTEMPTS,
        }
    }
}

impl ReconnectPolicy {
    /// Returns the delay before retry number `attempt` (zero-based).
    ///
    /// Saturates at `max_delay`; large attempt indices cannot overflow.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        let delay_ms = (self.base_delay.as_millis() as u64).saturating_mul(factor);
        Duration::from_millis(delay_ms).min(self.max_delay)
    }

    /// Returns `true` once `attempts` has consumed the whole budget.
    #[inline]
    #[must_use]
    pub const fn is_exhausted(&self, attempts: u32) -> bool {
        attempts >= self.max_attempts
    }
}

// ============================================================================
// ReconnectState
// ============================================================================

/// Mutable retry bookkeeping owned by the state machine.
///
/// Invariants: `attempts` never exceeds the policy's `max_attempts`;
/// `current_delay` stays within `[base_delay, max_delay]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectState {
    /// Retries attempted since the last successful connect or reset.
    pub attempts: u32,

    /// Delay used for the most recently scheduled retry.
    pub current_delay: Duration,
}

impl ReconnectState {
    /// Creates a fresh state for the given policy.
    #[inline]
    #[must_use]
    pub fn new(policy: &ReconnectPolicy) -> Self {
        Self {
            attempts: 0,
            current_delay: policy.base_delay,
        }
    }

    /// Resets to zero attempts and the base delay.
    ///
    /// Called on every successful connect and on manual reconnect.
    #[inline]
    pub fn reset(&mut self, policy: &ReconnectPolicy) {
        self.attempts = 0;
        self.current_delay = policy.base_delay;
    }

    /// Consumes one attempt and returns the delay to wait before it.
    ///
    /// Returns `None` when the budget is exhausted; the caller must not
    /// schedule anything further.
    #[must_use]
    pub fn next_attempt(&mut self, policy: &ReconnectPolicy) -> Option<Duration> {
        if policy.is_exhausted(self.attempts) {
            return None;
        }

        let delay = policy.delay_for(self.attempts);
        self.attempts += 1;
        self.current_delay = delay;
        Some(delay)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    #[test]
    fn test_default_policy_constants() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.base_delay, Duration::from_millis(1000));
        assert_eq!(policy.max_delay, Duration::from_millis(30_000));
        assert_eq!(policy.max_attempts, 5);
    }

    #[test]
    fn test_delay_table() {
        let policy = ReconnectPolicy::default();
        let expected_ms = [1000, 2000, 4000, 8000, 16_000];

        for (attempt, ms) in expected_ms.into_iter().enumerate() {
            assert_eq!(
                policy.delay_for(attempt as u32),
                Duration::from_millis(ms),
                "attempt {attempt}"
            );
        }
    }

    #[test]
    fn test_delay_saturates_at_max() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.delay_for(5), Duration::from_millis(30_000));
        assert_eq!(policy.delay_for(63), Duration::from_millis(30_000));
        assert_eq!(policy.delay_for(200), Duration::from_millis(30_000));
    }

    #[test]
    fn test_next_attempt_sequence() {
        let policy = ReconnectPolicy::default();
        let mut state = ReconnectState::new(&policy);

        let mut delays = Vec::new();
        while let Some(delay) = state.next_attempt(&policy) {
            delays.push(delay.as_millis() as u64);
        }

        assert_eq!(delays, vec![1000, 2000, 4000, 8000, 16_000]);
        assert_eq!(state.attempts, 5);
        assert!(policy.is_exhausted(state.attempts));
        assert_eq!(state.next_attempt(&policy), None);
    }

    #[test]
    fn test_reset_restores_base() {
        let policy = ReconnectPolicy::default();
        let mut state = ReconnectState::new(&policy);

        let _ = state.next_attempt(&policy);
        let _ = state.next_attempt(&policy);
        assert_eq!(state.attempts, 2);

        state.reset(&policy);
        assert_eq!(state.attempts, 0);
        assert_eq!(state.current_delay, policy.base_delay);
    }

    proptest! {
        #[test]
        fn prop_delay_is_bounded(attempt in 0u32..1000) {
            let policy = ReconnectPolicy::default();
            let delay = policy.delay_for(attempt);
            prop_assert!(delay >= policy.base_delay || delay == policy.max_delay);
            prop_assert!(delay <= policy.max_delay);
        }

        #[test]
        fn prop_delay_is_monotonic(attempt in 0u32..62) {
            let policy = ReconnectPolicy::default();
            prop_assert!(policy.delay_for(attempt) <= policy.delay_for(attempt + 1));
        }
    }
}
