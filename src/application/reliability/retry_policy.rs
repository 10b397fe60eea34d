use std::time::Duration;

use rand::Rng;

use crate::domain::value_objects::ingestion_errors::IngestionError;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(1_000);
pub const MAX_JITTER: Duration = Duration::from_millis(1_000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry { delay: Duration },
    GiveUp,
}

/// Exponential backoff with an additive random term.
///
/// Pure: computes decisions and delays, the caller performs the sleep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// `attempt` is the 1-based index of the attempt that just failed.
    pub fn decide(&self, error: &IngestionError, attempt: u32) -> RetryDecision {
        self.decide_with_jitter(error, attempt, sample_jitter())
    }

    pub fn decide_with_jitter(
        &self,
        error: &IngestionError,
        attempt: u32,
        jitter: Duration,
    ) -> RetryDecision {
        if !error.is_retryable() || attempt >= self.max_attempts {
            return RetryDecision::GiveUp;
        }

        RetryDecision::Retry {
            delay: self.backoff_delay(attempt, jitter),
        }
    }

    /// `base * 2^(attempt-1) + jitter`, jitter clamped below one second.
    pub fn backoff_delay(&self, attempt: u32, jitter: Duration) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let multiplier = 2u32.saturating_pow(exponent);
        let jitter = jitter.min(MAX_JITTER.saturating_sub(Duration::from_millis(1)));
        self.base_delay
            .saturating_mul(multiplier)
            .saturating_add(jitter)
    }
}

/// 408 and 429 are retryable; every other 4xx is the caller's fault.
pub fn is_retryable_status(status: u16) -> bool {
    match status {
        408 | 429 => true,
        400..=499 => false,
        _ => true,
    }
}

fn sample_jitter() -> Duration {
    let millis = rand::thread_rng().gen_range(0..MAX_JITTER.as_millis() as u64);
    Duration::from_millis(millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transient() -> IngestionError {
        IngestionError::TransientTransport {
            message: "service unavailable".into(),
            status: Some(503),
        }
    }

    #[test]
    fn classifies_statuses() {
        assert!(is_retryable_status(408));
        assert!(is_retryable_status(429));
        assert!(is_retryable_status(500));
        assert!(is_retryable_status(503));
        assert!(!is_retryable_status(400));
        assert!(!is_retryable_status(403));
        assert!(!is_retryable_status(404));
        assert!(!is_retryable_status(410));
    }

    #[test]
    fn retries_transient_errors_until_max_attempts() {
        let policy = RetryPolicy::new(3, Duration::from_millis(1_000));

        assert!(matches!(
            policy.decide(&transient(), 1),
            RetryDecision::Retry { .. }
        ));
        assert!(matches!(
            policy.decide(&transient(), 2),
            RetryDecision::Retry { .. }
        ));
        assert_eq!(policy.decide(&transient(), 3), RetryDecision::GiveUp);
    }

    #[test]
    fn never_retries_client_content_errors() {
        let policy = RetryPolicy::default();
        let err = IngestionError::ClientContent {
            message: "not found".into(),
            status: Some(404),
        };
        assert_eq!(policy.decide(&err, 1), RetryDecision::GiveUp);
    }

    #[test]
    fn backoff_doubles_per_attempt_plus_jitter() {
        let policy = RetryPolicy::new(5, Duration::from_millis(1_000));

        assert_eq!(
            policy.backoff_delay(1, Duration::ZERO),
            Duration::from_millis(1_000)
        );
        assert_eq!(
            policy.backoff_delay(2, Duration::from_millis(250)),
            Duration::from_millis(2_250)
        );
        assert_eq!(
            policy.backoff_delay(3, Duration::from_millis(999)),
            Duration::from_millis(4_999)
        );
    }

    #[test]
    fn sampled_delay_stays_inside_jitter_window() {
        let policy = RetryPolicy::new(4, Duration::from_millis(500));

        for attempt in 1..4 {
            let floor = Duration::from_millis(500) * 2u32.pow(attempt - 1);
            for _ in 0..200 {
                let RetryDecision::Retry { delay } = policy.decide(&transient(), attempt) else {
                    panic!("attempt {attempt} should be retried");
                };
                assert!(delay >= floor, "delay {delay:?} below {floor:?}");
                assert!(delay < floor + MAX_JITTER, "delay {delay:?} over window");
            }
        }
    }

    #[test]
    fn zero_max_attempts_is_clamped_to_one() {
        let policy = RetryPolicy::new(0, Duration::from_millis(10));
        assert_eq!(policy.max_attempts, 1);
        assert_eq!(policy.decide(&transient(), 1), RetryDecision::GiveUp);
    }
}
