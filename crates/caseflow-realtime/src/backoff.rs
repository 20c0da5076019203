//! Reconnect backoff policy for the WebSocket transport.

use std::time::Duration;

use caseflow_core::defaults;

/// Exponential backoff with a delay cap and an attempt ceiling.
///
/// Delays double from the base on every consecutive failure and are
/// capped. After the ceiling is reached no further attempt is
/// scheduled; a successful connection resets the counter.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    base_delay_ms: u64,
    max_delay_ms: u64,
    max_attempts: u32,
    attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new(
            defaults::RECONNECT_BASE_DELAY_MS,
            defaults::RECONNECT_MAX_DELAY_MS,
            defaults::MAX_RECONNECT_ATTEMPTS,
        )
    }
}

impl ReconnectPolicy {
    pub fn new(base_delay_ms: u64, max_delay_ms: u64, max_attempts: u32) -> Self {
        Self {
            base_delay_ms,
            max_delay_ms,
            max_attempts,
            attempts: 0,
        }
    }

    /// Consecutive failures recorded since the last success.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Whether the attempt ceiling has been reached.
    pub fn exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }

    /// Record a failure and return the delay before the next attempt,
    /// or `None` when the ceiling is reached.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.exhausted() {
            return None;
        }
        let exp = self.base_delay_ms.saturating_mul(1u64 << self.attempts.min(63));
        let delay = exp.min(self.max_delay_ms);
        self.attempts += 1;
        Some(Duration::from_millis(delay))
    }

    /// Record a successful connection: the failure counter resets.
    pub fn record_success(&mut self) {
        self.attempts = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_sequence_doubles_and_caps() {
        let mut policy = ReconnectPolicy::default();
        let delays: Vec<u64> = std::iter::from_fn(|| policy.next_delay())
            .map(|d| d.as_millis() as u64)
            .collect();

        assert_eq!(delays, vec![1000, 2000, 4000, 8000, 16000]);
    }

    #[test]
    fn test_no_sixth_attempt() {
        let mut policy = ReconnectPolicy::default();
        for _ in 0..5 {
            assert!(policy.next_delay().is_some());
        }
        assert!(policy.exhausted());
        assert!(policy.next_delay().is_none());
        assert!(policy.next_delay().is_none());
    }

    #[test]
    fn test_success_resets_counter() {
        let mut policy = ReconnectPolicy::default();
        policy.next_delay();
        policy.next_delay();
        policy.next_delay();
        assert_eq!(policy.attempts(), 3);

        policy.record_success();
        assert_eq!(policy.attempts(), 0);
        assert_eq!(policy.next_delay(), Some(Duration::from_millis(1000)));
    }

    #[test]
    fn test_cap_applies_with_longer_ceiling() {
        let mut policy = ReconnectPolicy::new(1000, 30_000, 8);
        let delays: Vec<u64> = std::iter::from_fn(|| policy.next_delay())
            .map(|d| d.as_millis() as u64)
            .collect();

        assert_eq!(
            delays,
            vec![1000, 2000, 4000, 8000, 16000, 30000, 30000, 30000]
        );
    }

    #[test]
    fn test_large_attempt_count_does_not_overflow() {
        let mut policy = ReconnectPolicy::new(1000, 30_000, 200);
        let mut last = Duration::ZERO;
        for _ in 0..200 {
            last = policy.next_delay().expect("within ceiling");
        }
        assert_eq!(last, Duration::from_millis(30_000));
    }
}
