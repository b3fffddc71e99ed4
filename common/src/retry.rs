use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// How often, and how many times, to retry the connectivity probe.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RetryPolicy {
    /// Base pause between two attempts.
    #[serde(with = "crate::config::seconds")]
    pub interval: Duration,

    /// Upper bound of a random extra pause added to `interval`.
    #[serde(with = "crate::config::seconds")]
    pub jitter: Duration,

    /// Give up after this many attempts. Retries forever if absent.
    pub max_attempts: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::unbounded(Duration::from_secs(5))
    }
}

impl RetryPolicy {
    pub fn unbounded(interval: Duration) -> Self {
        Self {
            interval,
            jitter: Duration::ZERO,
            max_attempts: None,
        }
    }

    pub fn bounded(interval: Duration, max_attempts: u32) -> Self {
        Self {
            max_attempts: Some(max_attempts),
            ..Self::unbounded(interval)
        }
    }

    /// Whether another attempt may follow after `attempts` failed ones.
    pub fn allows_retry(&self, attempts: u32) -> bool {
        self.max_attempts.map_or(true, |max| attempts < max)
    }

    /// The pause before the next attempt.
    pub fn delay(&self) -> Duration {
        if self.jitter.is_zero() {
            return self.interval;
        }

        let extra = rand::thread_rng().gen_range(0.0..=self.jitter.as_secs_f64());
        self.interval + Duration::from_secs_f64(extra)
    }
}

#[test]
fn test_unbounded_always_retries() {
    let policy = RetryPolicy::default();

    assert!(policy.allows_retry(1));
    assert!(policy.allows_retry(u32::MAX));
    assert_eq!(policy.delay(), Duration::from_secs(5));
}

#[test]
fn test_bounded_stops_at_max() {
    let policy = RetryPolicy::bounded(Duration::ZERO, 3);

    assert!(policy.allows_retry(1));
    assert!(policy.allows_retry(2));
    assert!(!policy.allows_retry(3));
}

#[test]
fn test_jitter_stays_in_range() {
    let policy = RetryPolicy {
        interval: Duration::from_secs(1),
        jitter: Duration::from_millis(500),
        max_attempts: None,
    };

    for _ in 0..100 {
        let delay = policy.delay();
        assert!(delay >= Duration::from_secs(1));
        assert!(delay <= Duration::from_millis(1500));
    }
}
