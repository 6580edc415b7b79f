use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::{header::HeaderMap, StatusCode};

use crate::{decode::decode_error_detail, RateLimitState};

/// Coarse failure category of a [`PxshotError`].
///
/// Useful when the caller only needs to branch on the kind of failure and
/// not on the attached detail.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ErrorKind {
    Authentication,
    Validation,
    RateLimit,
    NotFound,
    Server,
    Network,
    Timeout,
    UnexpectedResponse,
    Cancelled,
}

/// Error type returned by this crate.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum PxshotError {
    /// API key rejected (401) or quota exhausted (403).
    #[error("authentication failed (http {status}): {message}")]
    Authentication {
        status: u16,
        message: String,
        /// Service-specific error code, when the body carried one.
        code: Option<String>,
    },
    /// Request rejected before sending, or by the service with 400/422.
    #[error("validation error: {message}")]
    Validation {
        /// `None` when the request failed client-side validation.
        status: Option<u16>,
        message: String,
        code: Option<String>,
    },
    /// Service answered 429.
    #[error("rate limited: {message}")]
    RateLimit {
        message: String,
        code: Option<String>,
        /// Rate-limit headers of the rejecting response.
        rate_limit: RateLimitState,
    },
    /// Unknown resource (404).
    #[error("not found: {message}")]
    NotFound {
        message: String,
        code: Option<String>,
    },
    /// Service-side failure (5xx).
    #[error("server error (http {status}): {message}")]
    Server {
        status: u16,
        message: String,
        code: Option<String>,
    },
    /// Transport failed before any HTTP status was received.
    #[error("network error: {message}")]
    Network { message: String },
    /// Client-side request deadline exceeded.
    #[error("request timed out: {message}")]
    Timeout { message: String },
    /// Response status or body does not match the service contract.
    #[error("unexpected response (http {status}): {message}")]
    UnexpectedResponse { status: u16, message: String },
    /// Call cancelled through a [`CancelToken`](crate::CancelToken).
    #[error("request cancelled")]
    Cancelled,
}

impl PxshotError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            status: None,
            message: message.into(),
            code: None,
        }
    }

    pub(crate) fn unexpected(status: StatusCode, message: impl Into<String>) -> Self {
        Self::UnexpectedResponse {
            status: status.as_u16(),
            message: message.into(),
        }
    }

    /// Returns the failure category.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Authentication { .. } => ErrorKind::Authentication,
            Self::Validation { .. } => ErrorKind::Validation,
            Self::RateLimit { .. } => ErrorKind::RateLimit,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Server { .. } => ErrorKind::Server,
            Self::Network { .. } => ErrorKind::Network,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::UnexpectedResponse { .. } => ErrorKind::UnexpectedResponse,
            Self::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// HTTP status of the response that caused the error, if there was one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Authentication { status, .. }
            | Self::Server { status, .. }
            | Self::UnexpectedResponse { status, .. } => Some(*status),
            Self::Validation { status, .. } => *status,
            Self::RateLimit { .. } => Some(StatusCode::TOO_MANY_REQUESTS.as_u16()),
            Self::NotFound { .. } => Some(StatusCode::NOT_FOUND.as_u16()),
            Self::Network { .. } | Self::Timeout { .. } | Self::Cancelled => None,
        }
    }

    /// Service-provided error code.
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Authentication { code, .. }
            | Self::Validation { code, .. }
            | Self::RateLimit { code, .. }
            | Self::NotFound { code, .. }
            | Self::Server { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    /// Rate-limit state attached to a [`PxshotError::RateLimit`].
    pub fn rate_limit(&self) -> Option<&RateLimitState> {
        match self {
            Self::RateLimit { rate_limit, .. } => Some(rate_limit),
            _ => None,
        }
    }

    /// `Retry-After` value of a rate-limited response.
    pub fn retry_after(&self) -> Option<Duration> {
        self.rate_limit().and_then(|state| state.retry_after)
    }

    /// True when the service refused the call because the account quota is used up.
    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, Self::Authentication { status: 403, .. })
    }
}

/// Maps a non-success response to exactly one error kind.
///
/// Checks run in a fixed order so overlapping signals resolve the same way
/// every time: a 429 is a rate-limit error whatever its body says.
pub(crate) fn classify_failure(
    status: StatusCode,
    headers: &HeaderMap,
    body: &[u8],
    now: DateTime<Utc>,
) -> PxshotError {
    let detail = decode_error_detail(status, body);
    let message = detail.message;
    let code = detail.code;

    match status.as_u16() {
        401 | 403 => PxshotError::Authentication {
            status: status.as_u16(),
            message,
            code,
        },
        400 | 422 => PxshotError::Validation {
            status: Some(status.as_u16()),
            message,
            code,
        },
        429 => PxshotError::RateLimit {
            message,
            code,
            rate_limit: RateLimitState::from_headers(headers, now),
        },
        404 => PxshotError::NotFound { message, code },
        500..=599 => PxshotError::Server {
            status: status.as_u16(),
            message,
            code,
        },
        _ => PxshotError::UnexpectedResponse {
            status: status.as_u16(),
            message: format!("unexpected status: {message}"),
        },
    }
}
