//! Retry decisions.
//!
//! [`RetryPolicy::decide`] is a pure function of the failed attempt. It never
//! sleeps; the clients do the waiting.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::{ClientOptions, ErrorKind, PxshotError};

/// Source of the random part of a backoff delay.
pub trait Jitter: Send + Sync {
    /// Returns a duration in `[0, max]`.
    fn jitter(&self, max: Duration) -> Duration;
}

/// Uniform jitter from the thread-local RNG.
#[derive(Clone, Copy, Debug, Default)]
pub struct RandomJitter;

impl Jitter for RandomJitter {
    fn jitter(&self, max: Duration) -> Duration {
        let max_ms = u64::try_from(max.as_millis()).unwrap_or(u64::MAX);
        if max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::random_range(0..=max_ms))
    }
}

/// Always zero. Makes backoff delays deterministic.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoJitter;

impl Jitter for NoJitter {
    fn jitter(&self, _max: Duration) -> Duration {
        Duration::ZERO
    }
}

/// Outcome of [`RetryPolicy::decide`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RetryDecision {
    /// Send again after waiting this long.
    Retry(Duration),
    /// Surface the error to the caller.
    GiveUp,
}

/// Limits and backoff parameters for one logical call.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub max_total_wait: Duration,
    pub backoff_base: Duration,
    pub backoff_ceiling: Duration,
    pub min_rate_limit_wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&ClientOptions::default())
    }
}

impl From<&ClientOptions> for RetryPolicy {
    fn from(options: &ClientOptions) -> Self {
        Self {
            max_attempts: options.max_attempts.max(1),
            max_total_wait: Duration::from_millis(options.max_total_wait_ms),
            backoff_base: Duration::from_millis(options.backoff_base_ms),
            backoff_ceiling: Duration::from_millis(options.backoff_ceiling_ms),
            min_rate_limit_wait: Duration::from_millis(options.min_rate_limit_wait_ms),
        }
    }
}

impl RetryPolicy {
    /// Decides what to do after attempt number `attempt` (1-based) failed.
    ///
    /// `elapsed` is the time since the first attempt started.
    pub fn decide(
        &self,
        attempt: u32,
        error: &PxshotError,
        elapsed: Duration,
        jitter: &dyn Jitter,
        now: DateTime<Utc>,
    ) -> RetryDecision {
        if attempt >= self.max_attempts.max(1) {
            return RetryDecision::GiveUp;
        }

        let delay = match error.kind() {
            ErrorKind::Authentication
            | ErrorKind::Validation
            | ErrorKind::NotFound
            | ErrorKind::UnexpectedResponse
            | ErrorKind::Cancelled => return RetryDecision::GiveUp,
            ErrorKind::RateLimit => error
                .rate_limit()
                .map(|state| state.retry_delay(now))
                .unwrap_or(Duration::ZERO)
                .max(self.min_rate_limit_wait),
            ErrorKind::Server | ErrorKind::Network | ErrorKind::Timeout => {
                let backoff = self.backoff(attempt);
                backoff.saturating_add(jitter.jitter(backoff).min(backoff))
            }
        };

        if elapsed.saturating_add(delay) > self.max_total_wait {
            RetryDecision::GiveUp
        } else {
            RetryDecision::Retry(delay)
        }
    }

    /// Exponential delay before jitter: `base * 2^(attempt - 1)`, capped.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        self.backoff_base
            .saturating_mul(1u32 << exp)
            .min(self.backoff_ceiling)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::{TimeDelta, TimeZone, Utc};

    use super::{Jitter, NoJitter, RandomJitter, RetryDecision, RetryPolicy};
    use crate::{PxshotError, RateLimitState};

    struct FullJitter;

    impl Jitter for FullJitter {
        fn jitter(&self, max: Duration) -> Duration {
            max * 10
        }
    }

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 4,
            max_total_wait: Duration::from_secs(30),
            backoff_base: Duration::from_millis(500),
            backoff_ceiling: Duration::from_secs(3),
            min_rate_limit_wait: Duration::from_secs(1),
        }
    }

    fn server_error() -> PxshotError {
        PxshotError::Server {
            status: 503,
            message: "unavailable".to_owned(),
            code: None,
        }
    }

    fn rate_limited(state: RateLimitState) -> PxshotError {
        PxshotError::RateLimit {
            message: "slow down".to_owned(),
            code: None,
            rate_limit: state,
        }
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = policy();
        assert_eq!(policy.backoff(1), Duration::from_millis(500));
        assert_eq!(policy.backoff(2), Duration::from_millis(1_000));
        assert_eq!(policy.backoff(3), Duration::from_millis(2_000));
        assert_eq!(policy.backoff(4), Duration::from_secs(3));
        assert_eq!(policy.backoff(40), Duration::from_secs(3));
    }

    #[test]
    fn transient_errors_retry_with_backoff() {
        let now = Utc::now();
        let network = PxshotError::Network {
            message: "connection refused".to_owned(),
        };
        let timeout = PxshotError::Timeout {
            message: "deadline".to_owned(),
        };
        for err in [server_error(), network, timeout] {
            assert_eq!(
                policy().decide(2, &err, Duration::ZERO, &NoJitter, now),
                RetryDecision::Retry(Duration::from_secs(1)),
            );
        }
    }

    #[test]
    fn jitter_is_bounded_by_the_backoff() {
        let decision = policy().decide(1, &server_error(), Duration::ZERO, &FullJitter, Utc::now());
        assert_eq!(decision, RetryDecision::Retry(Duration::from_millis(1_000)));

        for _ in 0..50 {
            match policy().decide(1, &server_error(), Duration::ZERO, &RandomJitter, Utc::now()) {
                RetryDecision::Retry(delay) => {
                    assert!(delay >= Duration::from_millis(500));
                    assert!(delay <= Duration::from_millis(1_000));
                }
                RetryDecision::GiveUp => panic!("expected retry"),
            }
        }
    }

    #[test]
    fn permanent_errors_give_up_immediately() {
        let errors = [
            PxshotError::Authentication {
                status: 401,
                message: "bad key".to_owned(),
                code: None,
            },
            PxshotError::validation("quality not supported"),
            PxshotError::NotFound {
                message: "no such screenshot".to_owned(),
                code: None,
            },
            PxshotError::UnexpectedResponse {
                status: 200,
                message: "not json".to_owned(),
            },
            PxshotError::Cancelled,
        ];
        for err in errors {
            assert_eq!(
                policy().decide(1, &err, Duration::ZERO, &NoJitter, Utc::now()),
                RetryDecision::GiveUp,
                "{err:?}"
            );
        }
    }

    #[test]
    fn gives_up_after_max_attempts() {
        let policy = policy();
        assert!(matches!(
            policy.decide(3, &server_error(), Duration::ZERO, &NoJitter, Utc::now()),
            RetryDecision::Retry(_)
        ));
        assert_eq!(
            policy.decide(4, &server_error(), Duration::ZERO, &NoJitter, Utc::now()),
            RetryDecision::GiveUp
        );
    }

    #[test]
    fn zero_max_attempts_means_a_single_attempt() {
        let policy = RetryPolicy {
            max_attempts: 0,
            ..policy()
        };
        assert_eq!(
            policy.decide(1, &server_error(), Duration::ZERO, &NoJitter, Utc::now()),
            RetryDecision::GiveUp
        );
    }

    #[test]
    fn rate_limit_waits_for_reset() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let err = rate_limited(RateLimitState {
            limit: Some(100),
            remaining: Some(0),
            reset_at: Some(now + TimeDelta::try_seconds(5).unwrap()),
            retry_after: None,
        });
        assert_eq!(
            policy().decide(1, &err, Duration::ZERO, &NoJitter, now),
            RetryDecision::Retry(Duration::from_secs(5))
        );
    }

    #[test]
    fn rate_limit_wait_is_floored() {
        let err = rate_limited(RateLimitState::default());
        assert_eq!(
            policy().decide(1, &err, Duration::ZERO, &NoJitter, Utc::now()),
            RetryDecision::Retry(Duration::from_secs(1))
        );
    }

    #[test]
    fn gives_up_when_wait_exceeds_budget() {
        let err = rate_limited(RateLimitState {
            retry_after: Some(Duration::from_secs(60)),
            ..RateLimitState::default()
        });
        assert_eq!(
            policy().decide(1, &err, Duration::ZERO, &NoJitter, Utc::now()),
            RetryDecision::GiveUp
        );

        assert_eq!(
            policy().decide(1, &server_error(), Duration::from_millis(29_800), &NoJitter, Utc::now()),
            RetryDecision::GiveUp
        );
    }
}
