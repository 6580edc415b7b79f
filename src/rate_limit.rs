use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use reqwest::header::{HeaderMap, RETRY_AFTER};

const LIMIT_HEADER: &str = "x-ratelimit-limit";
const REMAINING_HEADER: &str = "x-ratelimit-remaining";
const RESET_HEADER: &str = "x-ratelimit-reset";

// Reset values at or above this are Unix timestamps, smaller ones are
// seconds until reset.
const EPOCH_RESET_THRESHOLD: i64 = 1_000_000_000;

/// Rate-limit view of a single response.
///
/// Every field is `None` when the response carried no usable header, which
/// is the "unknown" state rather than an exhausted quota.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RateLimitState {
    /// Requests allowed per window (`x-ratelimit-limit`).
    pub limit: Option<u64>,
    /// Requests left in the current window (`x-ratelimit-remaining`).
    pub remaining: Option<u64>,
    /// When the window resets (`x-ratelimit-reset`).
    pub reset_at: Option<DateTime<Utc>>,
    /// Server-requested pause (`Retry-After`).
    pub retry_after: Option<Duration>,
}

impl RateLimitState {
    /// Reads the rate-limit headers of a response. Never fails.
    pub fn from_headers(headers: &HeaderMap, now: DateTime<Utc>) -> Self {
        Self {
            limit: header_str(headers, LIMIT_HEADER).and_then(|v| v.parse().ok()),
            remaining: header_str(headers, REMAINING_HEADER).and_then(|v| v.parse().ok()),
            reset_at: header_str(headers, RESET_HEADER).and_then(|v| parse_reset(v, now)),
            retry_after: header_str(headers, RETRY_AFTER.as_str())
                .and_then(|v| parse_retry_after(v, now)),
        }
    }

    /// True when none of the rate-limit headers were present or parsable.
    pub fn is_unknown(&self) -> bool {
        self == &Self::default()
    }

    /// Wait until the window resets when the quota is exhausted, zero otherwise.
    pub fn recommended_wait(&self, now: DateTime<Utc>) -> Duration {
        match (self.remaining, self.reset_at) {
            (Some(0), Some(reset_at)) => (reset_at - now).to_std().unwrap_or(Duration::ZERO),
            _ => Duration::ZERO,
        }
    }

    /// Longest of [`recommended_wait`](Self::recommended_wait) and `Retry-After`.
    pub fn retry_delay(&self, now: DateTime<Utc>) -> Duration {
        self.recommended_wait(now)
            .max(self.retry_after.unwrap_or(Duration::ZERO))
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
}

fn parse_reset(value: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let seconds = match value.parse::<i64>() {
        Ok(seconds) => seconds,
        Err(_) => {
            let float = value.parse::<f64>().ok().filter(|f| f.is_finite())?;
            float.ceil() as i64
        }
    };
    if seconds < 0 {
        return None;
    }
    if seconds >= EPOCH_RESET_THRESHOLD {
        DateTime::from_timestamp(seconds, 0)
    } else {
        now.checked_add_signed(TimeDelta::try_seconds(seconds)?)
    }
}

fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }
    let date = DateTime::parse_from_rfc2822(value).ok()?;
    Some(
        (date.with_timezone(&Utc) - now)
            .to_std()
            .unwrap_or(Duration::ZERO),
    )
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::{TimeZone, Utc};
    use reqwest::header::{HeaderMap, HeaderValue};

    use super::RateLimitState;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn missing_headers_are_unknown_not_zero() {
        let state = RateLimitState::from_headers(&HeaderMap::new(), Utc::now());
        assert!(state.is_unknown());
        assert_eq!(state.remaining, None);
        assert_eq!(state.recommended_wait(Utc::now()), Duration::ZERO);
    }

    #[test]
    fn parses_limit_remaining_and_epoch_reset() {
        let state = RateLimitState::from_headers(
            &headers(&[
                ("x-ratelimit-limit", "100"),
                ("x-ratelimit-remaining", "99"),
                ("x-ratelimit-reset", "1704067200"),
            ]),
            Utc::now(),
        );
        assert_eq!(state.limit, Some(100));
        assert_eq!(state.remaining, Some(99));
        assert_eq!(
            state.reset_at,
            Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
        );
        assert!(!state.is_unknown());
    }

    #[test]
    fn small_reset_is_relative_to_now() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let state = RateLimitState::from_headers(
            &headers(&[("x-ratelimit-remaining", "0"), ("x-ratelimit-reset", "30")]),
            now,
        );
        assert_eq!(state.recommended_wait(now), Duration::from_secs(30));
    }

    #[test]
    fn garbage_headers_are_ignored() {
        let state = RateLimitState::from_headers(
            &headers(&[
                ("x-ratelimit-limit", "lots"),
                ("x-ratelimit-remaining", "-3"),
                ("x-ratelimit-reset", "soon"),
                ("retry-after", "whenever"),
            ]),
            Utc::now(),
        );
        assert!(state.is_unknown());
    }

    #[test]
    fn recommended_wait_only_applies_when_exhausted() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let reset_at = Some(now + chrono::TimeDelta::try_seconds(10).unwrap());

        let exhausted = RateLimitState {
            remaining: Some(0),
            reset_at,
            ..RateLimitState::default()
        };
        assert_eq!(exhausted.recommended_wait(now), Duration::from_secs(10));

        let available = RateLimitState {
            remaining: Some(5),
            reset_at,
            ..RateLimitState::default()
        };
        assert_eq!(available.recommended_wait(now), Duration::ZERO);

        let past = RateLimitState {
            remaining: Some(0),
            reset_at: Some(now - chrono::TimeDelta::try_seconds(10).unwrap()),
            ..RateLimitState::default()
        };
        assert_eq!(past.recommended_wait(now), Duration::ZERO);
    }

    #[test]
    fn retry_after_accepts_seconds_and_http_date() {
        let now = Utc.with_ymd_and_hms(2015, 10, 21, 7, 27, 0).unwrap();
        let seconds = RateLimitState::from_headers(&headers(&[("retry-after", "60")]), now);
        assert_eq!(seconds.retry_after, Some(Duration::from_secs(60)));
        assert_eq!(seconds.retry_delay(now), Duration::from_secs(60));

        let date = RateLimitState::from_headers(
            &headers(&[("retry-after", "Wed, 21 Oct 2015 07:28:00 GMT")]),
            now,
        );
        assert_eq!(date.retry_after, Some(Duration::from_secs(60)));
    }
}
