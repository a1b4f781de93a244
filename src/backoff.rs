//! Exponential backoff policy for reconnection scheduling

use std::time::Duration;

/// Computes the delay before each reconnection attempt.
///
/// The delay grows geometrically with the number of attempts made so far and
/// is capped at `max_interval`:
///
/// ```text
/// delay = min(base_interval * decay_factor^attempts_so_far, max_interval)
/// ```
///
/// `attempts_so_far` is the count *before* the attempt about to be made, so
/// the first retry waits only `base_interval`.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    base_interval: Duration,
    max_interval: Duration,
    decay_factor: f64,
}

impl ReconnectPolicy {
    /// Create a policy. `decay_factor` must be > 1 for the delay to grow.
    pub fn new(base_interval: Duration, max_interval: Duration, decay_factor: f64) -> Self {
        Self {
            base_interval,
            max_interval,
            decay_factor,
        }
    }

    /// Delay before the retry following `attempts_so_far` prior attempts.
    pub fn delay(&self, attempts_so_far: u32) -> Duration {
        let base_ms = self.base_interval.as_millis() as f64;
        let delay_ms = base_ms * self.decay_factor.powi(attempts_so_far as i32);
        let delay_ms = delay_ms.min(self.max_interval.as_millis() as f64);
        Duration::from_millis(delay_ms as u64)
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_interval: Duration::from_secs(1),
            max_interval: Duration::from_secs(30),
            decay_factor: 1.5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_retry_uses_base_interval() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.delay(0), Duration::from_secs(1));
    }

    #[test]
    fn test_delays_are_non_decreasing_and_capped() {
        let policy = ReconnectPolicy::new(Duration::from_secs(1), Duration::from_secs(30), 1.5);

        let mut previous = Duration::ZERO;
        for attempt in 0..20 {
            let delay = policy.delay(attempt);
            assert!(delay >= previous, "delay regressed at attempt {attempt}");
            assert!(delay <= Duration::from_secs(30));
            previous = delay;
        }

        // Far out, the cap dominates
        assert_eq!(policy.delay(50), Duration::from_secs(30));
    }

    #[test]
    fn test_geometric_growth() {
        let policy = ReconnectPolicy::new(Duration::from_millis(100), Duration::from_secs(60), 2.0);
        assert_eq!(policy.delay(0), Duration::from_millis(100));
        assert_eq!(policy.delay(1), Duration::from_millis(200));
        assert_eq!(policy.delay(3), Duration::from_millis(800));
    }
}
