//! Retry policy: bounded attempts with exponential backoff and jitter.

use std::time::Duration;

/// Configuration for retrying transient connectivity failures.
///
/// Pure value type; immutable once built and freely shareable across
/// sessions.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts: the first try plus up to `max_attempts - 1` retries.
    pub max_attempts: u32,

    /// Delay before the first retry; doubles for each subsequent one.
    pub base_delay: Duration,

    /// Cap on the exponential delay, applied before jitter.
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Delay before retry `attempt` (0-indexed).
    ///
    /// `min(base * 2^attempt, max)`, jittered by ±25 % so a fleet of
    /// clients recovering from the same outage does not reconnect in
    /// lockstep, and floored at 100 ms.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponential = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempt.min(20)));
        let capped = exponential.min(self.max_delay);

        let factor = 0.75 + fastrand::f64() * 0.5;
        capped.mul_f64(factor).max(Duration::from_millis(100))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_stays_within_jitter_bounds() {
        let policy = RetryPolicy {
            max_attempts: 6,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        };

        for attempt in 0..6 {
            let uncapped = Duration::from_secs(1 << attempt);
            let capped = uncapped.min(policy.max_delay);
            for _ in 0..200 {
                let delay = policy.delay_for(attempt);
                assert!(delay >= capped.mul_f64(0.75), "attempt {attempt}: {delay:?}");
                assert!(delay <= capped.mul_f64(1.25), "attempt {attempt}: {delay:?}");
                assert!(delay > Duration::ZERO);
            }
        }
    }

    #[test]
    fn delay_is_capped_at_max() {
        let policy = RetryPolicy {
            max_attempts: 12,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        };
        // 2^10 seconds would be ~17 minutes without the cap.
        let delay = policy.delay_for(10);
        assert!(delay <= Duration::from_secs(30).mul_f64(1.25));
    }

    #[test]
    fn delay_is_floored_for_tiny_bases() {
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        };
        assert!(policy.delay_for(0) >= Duration::from_millis(100));
    }

    #[test]
    fn huge_attempt_numbers_do_not_overflow() {
        let policy = RetryPolicy::default();
        let delay = policy.delay_for(u32::MAX);
        assert!(delay <= policy.max_delay.mul_f64(1.25));
    }
}
