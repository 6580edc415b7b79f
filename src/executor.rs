//! Decision core shared by the async and blocking clients.
//!
//! Everything here is synchronous and never waits. A driver builds an
//! [`HttpRequest`], sends it however it likes, hands the outcome to
//! [`RetryLoop::settle`] and follows the returned [`AttemptResult`]. Because
//! both drivers go through the same calls, they make the same decisions for
//! the same sequence of responses.

use std::{
    fmt,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use chrono::Utc;
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE, USER_AGENT},
    Method,
};
use url::Url;

use crate::{
    decode::encode_capture_request,
    error::classify_failure,
    retry::{Jitter, RandomJitter, RetryDecision, RetryPolicy},
    transport::{HttpRequest, HttpResponse},
    CaptureRequest, ClientOptions, ErrorKind, PxshotError, RateLimitState, Result,
};

const SCREENSHOT_PATH: &str = "/v1/screenshot";
const USAGE_PATH: &str = "/v1/usage";
const HEALTH_PATH: &str = "/health";
const USER_AGENT_VALUE: &str = concat!("pxshot-rust/", env!("CARGO_PKG_VERSION"));

/// A retry the client is about to perform.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryEvent {
    /// The attempt that just failed, starting at 1.
    pub attempt: u32,
    pub kind: ErrorKind,
    /// Wait before the next attempt.
    pub delay: Duration,
}

pub(crate) type RetryHook = Arc<dyn Fn(&RetryEvent) + Send + Sync>;

/// Outcome of one HTTP round trip after the retry policy has been consulted.
pub(crate) enum AttemptResult<T> {
    Success(T),
    RetryableFailure {
        #[allow(dead_code)]
        error: PxshotError,
        delay: Duration,
    },
    TerminalFailure(PxshotError),
}

/// Credentials, options and hooks of a client.
#[derive(Clone)]
pub(crate) struct Executor {
    authorization: HeaderValue,
    options: ClientOptions,
    policy: RetryPolicy,
    jitter: Arc<dyn Jitter>,
    retry_hook: Option<RetryHook>,
    last_rate_limit: Arc<Mutex<Option<RateLimitState>>>,
}

impl fmt::Debug for Executor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Executor")
            .field("api_key", &"<redacted>")
            .field("options", &self.options)
            .field("retry_hook", &self.retry_hook.is_some())
            .finish()
    }
}

impl Executor {
    pub(crate) fn new(api_key: &str) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(PxshotError::validation("API key is required"));
        }
        let mut authorization = HeaderValue::from_str(&normalize_bearer_authorization(api_key))
            .map_err(|_| PxshotError::validation("API key contains invalid characters"))?;
        authorization.set_sensitive(true);

        let options = ClientOptions::default();
        Ok(Self {
            authorization,
            policy: RetryPolicy::from(&options),
            options,
            jitter: Arc::new(RandomJitter),
            retry_hook: None,
            last_rate_limit: Arc::new(Mutex::new(None)),
        })
    }

    pub(crate) fn options(&self) -> &ClientOptions {
        &self.options
    }

    pub(crate) fn set_options(&mut self, options: ClientOptions) {
        self.policy = RetryPolicy::from(&options);
        self.options = options;
    }

    pub(crate) fn set_jitter(&mut self, jitter: Arc<dyn Jitter>) {
        self.jitter = jitter;
    }

    pub(crate) fn set_retry_hook(&mut self, hook: RetryHook) {
        self.retry_hook = Some(hook);
    }

    pub(crate) fn last_rate_limit(&self) -> Option<RateLimitState> {
        self.last_rate_limit
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn capture_request(&self, request: &CaptureRequest) -> Result<HttpRequest> {
        let body = encode_capture_request(request)?;
        self.build(Method::POST, SCREENSHOT_PATH, Some(body))
    }

    pub(crate) fn usage_request(&self) -> Result<HttpRequest> {
        self.build(Method::GET, USAGE_PATH, None)
    }

    pub(crate) fn health_request(&self) -> Result<HttpRequest> {
        self.build(Method::GET, HEALTH_PATH, None)
    }

    fn build(&self, method: Method, path: &str, body: Option<Vec<u8>>) -> Result<HttpRequest> {
        let url = endpoint_url(&self.options.base_url, path)?;

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, self.authorization.clone());
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
        if body.is_some() {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }

        Ok(HttpRequest {
            method,
            url,
            headers,
            body,
            timeout: Duration::from_millis(self.options.timeout_ms),
        })
    }

    /// Starts the attempt accounting of one logical call.
    pub(crate) fn start(&self) -> RetryLoop<'_> {
        RetryLoop {
            executor: self,
            attempt: 0,
        }
    }

    /// Turns a received response into the expected model or a classified error.
    pub(crate) fn interpret<T>(
        &self,
        response: HttpResponse,
        decode: impl FnOnce(HttpResponse) -> Result<T>,
    ) -> Result<T> {
        let now = Utc::now();
        let rate_limit = RateLimitState::from_headers(&response.headers, now);
        if !rate_limit.is_unknown() {
            *self
                .last_rate_limit
                .lock()
                .unwrap_or_else(PoisonError::into_inner) = Some(rate_limit);
        }

        if response.status.is_success() {
            decode(response)
        } else {
            Err(classify_failure(
                response.status,
                &response.headers,
                &response.body,
                now,
            ))
        }
    }
}

/// Attempt counter of a single call. Calls never share one.
pub(crate) struct RetryLoop<'a> {
    executor: &'a Executor,
    attempt: u32,
}

impl RetryLoop<'_> {
    pub(crate) fn next_attempt(&mut self) -> u32 {
        self.attempt += 1;
        self.attempt
    }

    /// Consults the retry policy about the outcome of the current attempt.
    pub(crate) fn settle<T>(&self, outcome: Result<T>, elapsed: Duration) -> AttemptResult<T> {
        let error = match outcome {
            Ok(value) => return AttemptResult::Success(value),
            Err(error) => error,
        };

        let decision = self.executor.policy.decide(
            self.attempt,
            &error,
            elapsed,
            self.executor.jitter.as_ref(),
            Utc::now(),
        );
        match decision {
            RetryDecision::Retry(delay) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(
                    attempt = self.attempt,
                    kind = ?error.kind(),
                    delay = ?delay,
                    "retrying pxshot request: {error}"
                );

                if let Some(hook) = &self.executor.retry_hook {
                    hook(&RetryEvent {
                        attempt: self.attempt,
                        kind: error.kind(),
                        delay,
                    });
                }
                AttemptResult::RetryableFailure { error, delay }
            }
            RetryDecision::GiveUp => {
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    attempt = self.attempt,
                    kind = ?error.kind(),
                    "pxshot request failed: {error}"
                );

                AttemptResult::TerminalFailure(error)
            }
        }
    }
}

fn endpoint_url(base_url: &str, path: &str) -> Result<String> {
    let url = format!("{}{path}", base_url.trim().trim_end_matches('/'));
    let parsed = Url::parse(&url)
        .map_err(|err| PxshotError::validation(format!("invalid base url '{base_url}': {err}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(PxshotError::validation(format!(
            "base url must use http or https, got '{base_url}'"
        )));
    }
    Ok(url)
}

fn normalize_bearer_authorization(token: &str) -> String {
    let trimmed = token.trim();
    let prefix = trimmed.get(..7);
    if prefix.is_some_and(|value| value.eq_ignore_ascii_case("bearer ")) {
        trimmed.to_owned()
    } else {
        format!("Bearer {trimmed}")
    }
}
