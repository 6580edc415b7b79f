//! Blocking client.
//!
//! Same behavior as [`crate::PxshotClient`], but every call occupies the
//! calling thread, backoff waits included. Do not use it from inside an
//! async runtime.

use std::{fmt, sync::Arc, thread, time::Instant};

use crate::{
    client::options_from_env,
    decode::{decode_capture, decode_health, decode_usage},
    executor::{AttemptResult, Executor, RetryEvent},
    retry::Jitter,
    transport::{HttpRequest, HttpResponse, Transport},
    CancelToken, Capture, CaptureRequest, ClientOptions, HealthStatus, PxshotError,
    RateLimitState, Result, UsageStats,
};

/// Blocking client for the Pxshot API.
///
/// Safe to share between threads; calls do not influence each other's
/// retry decisions.
#[derive(Clone)]
pub struct PxshotClient<T = reqwest::blocking::Client> {
    transport: T,
    executor: Executor,
}

impl<T> fmt::Debug for PxshotClient<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("blocking::PxshotClient")
            .field("api_key", &"<redacted>")
            .field("options", self.executor.options())
            .finish()
    }
}

impl PxshotClient {
    /// Creates a client for the production API.
    pub fn new(api_key: impl AsRef<str>) -> Result<Self> {
        let executor = Executor::new(api_key.as_ref())?;
        Ok(Self {
            transport: reqwest::blocking::Client::new(),
            executor,
        })
    }

    /// Creates a client from `PXSHOT_API_KEY` and the optional `PXSHOT_BASE_URL`.
    pub fn from_env() -> Result<Self> {
        let (api_key, options) = options_from_env()?;
        Ok(Self::new(api_key)?.with_options(options))
    }
}

impl<T> PxshotClient<T> {
    pub fn with_options(mut self, opts: ClientOptions) -> Self {
        self.executor.set_options(opts);
        self
    }

    pub fn with_jitter(mut self, jitter: impl Jitter + 'static) -> Self {
        self.executor.set_jitter(Arc::new(jitter));
        self
    }

    pub fn with_retry_hook(mut self, hook: impl Fn(&RetryEvent) + Send + Sync + 'static) -> Self {
        self.executor.set_retry_hook(Arc::new(hook));
        self
    }

    pub fn with_transport<U: Transport>(self, transport: U) -> PxshotClient<U> {
        PxshotClient {
            transport,
            executor: self.executor,
        }
    }

    pub fn options(&self) -> &ClientOptions {
        self.executor.options()
    }

    pub fn rate_limit(&self) -> Option<RateLimitState> {
        self.executor.last_rate_limit()
    }
}

impl<T: Transport> PxshotClient<T> {
    pub fn capture(&self, request: &CaptureRequest) -> Result<Capture> {
        self.run_capture(request, None)
    }

    /// Like [`capture`](Self::capture), aborting when `cancel` fires.
    ///
    /// A send already on the wire runs to completion; cancellation is
    /// observed before each send and interrupts backoff waits at once.
    pub fn capture_cancellable(
        &self,
        request: &CaptureRequest,
        cancel: &CancelToken,
    ) -> Result<Capture> {
        self.run_capture(request, Some(cancel))
    }

    pub fn usage(&self) -> Result<UsageStats> {
        let request = self.executor.usage_request()?;
        self.execute(&request, None, decode_usage)
    }

    pub fn usage_cancellable(&self, cancel: &CancelToken) -> Result<UsageStats> {
        let request = self.executor.usage_request()?;
        self.execute(&request, Some(cancel), decode_usage)
    }

    pub fn health(&self) -> Result<HealthStatus> {
        let request = self.executor.health_request()?;
        self.execute(&request, None, decode_health)
    }

    pub fn health_cancellable(&self, cancel: &CancelToken) -> Result<HealthStatus> {
        let request = self.executor.health_request()?;
        self.execute(&request, Some(cancel), decode_health)
    }

    fn run_capture(&self, request: &CaptureRequest, cancel: Option<&CancelToken>) -> Result<Capture> {
        let http_request = self.executor.capture_request(request)?;
        let (format, store) = (request.format(), request.store());
        self.execute(&http_request, cancel, move |response| {
            decode_capture(response, format, store)
        })
    }

    fn execute<R>(
        &self,
        request: &HttpRequest,
        cancel: Option<&CancelToken>,
        decode: impl Fn(HttpResponse) -> Result<R>,
    ) -> Result<R> {
        let started = Instant::now();
        let mut retry = self.executor.start();
        loop {
            if cancel.is_some_and(CancelToken::is_cancelled) {
                return Err(PxshotError::Cancelled);
            }
            retry.next_attempt();

            let outcome = match self.transport.send(request) {
                Ok(response) => self.executor.interpret(response, &decode),
                Err(err) => Err(err.into()),
            };

            match retry.settle(outcome, started.elapsed()) {
                AttemptResult::Success(value) => return Ok(value),
                AttemptResult::TerminalFailure(error) => return Err(error),
                AttemptResult::RetryableFailure { delay, .. } => match cancel {
                    Some(token) => {
                        if token.wait_timeout(delay) {
                            return Err(PxshotError::Cancelled);
                        }
                    }
                    None => thread::sleep(delay),
                },
            }
        }
    }
}
