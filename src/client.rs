use std::{fmt, future::Future, sync::Arc};

use tokio::time::{sleep, Instant};

use crate::{
    decode::{decode_capture, decode_health, decode_usage},
    executor::{AttemptResult, Executor, RetryEvent},
    retry::Jitter,
    transport::{AsyncTransport, HttpRequest, HttpResponse},
    CancelToken, Capture, CaptureRequest, ClientOptions, HealthStatus, PxshotError,
    RateLimitState, Result, UsageStats,
};

pub(crate) const API_KEY_ENV: &str = "PXSHOT_API_KEY";
pub(crate) const BASE_URL_ENV: &str = "PXSHOT_BASE_URL";

/// Async client for the Pxshot API.
///
/// Transient failures (5xx, network errors, timeouts, 429) are retried
/// according to [`ClientOptions`]; the caller only sees the final result.
#[derive(Clone)]
pub struct PxshotClient<T = reqwest::Client> {
    transport: T,
    executor: Executor,
}

impl<T> fmt::Debug for PxshotClient<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PxshotClient")
            .field("api_key", &"<redacted>")
            .field("options", self.executor.options())
            .finish()
    }
}

impl PxshotClient {
    /// Creates a client for the production API.
    ///
    /// Fails with [`PxshotError::Validation`] when the key is empty. The
    /// `Bearer ` prefix is added when missing.
    pub fn new(api_key: impl AsRef<str>) -> Result<Self> {
        let executor = Executor::new(api_key.as_ref())?;
        Ok(Self {
            transport: reqwest::Client::new(),
            executor,
        })
    }

    /// Creates a client from environment variables.
    ///
    /// Reads:
    /// - `PXSHOT_API_KEY`: API key (required)
    /// - `PXSHOT_BASE_URL`: API root override (optional)
    ///
    /// # Example
    ///
    /// ```no_run
    /// use pxshot::PxshotClient;
    ///
    /// let client = PxshotClient::from_env().expect("missing PXSHOT_API_KEY");
    /// ```
    pub fn from_env() -> Result<Self> {
        let (api_key, options) = options_from_env()?;
        Ok(Self::new(api_key)?.with_options(options))
    }
}

impl<T> PxshotClient<T> {
    /// Applies client options such as base URL, timeout and retry behavior.
    pub fn with_options(mut self, opts: ClientOptions) -> Self {
        self.executor.set_options(opts);
        self
    }

    /// Replaces the backoff jitter source.
    pub fn with_jitter(mut self, jitter: impl Jitter + 'static) -> Self {
        self.executor.set_jitter(Arc::new(jitter));
        self
    }

    /// Registers a callback invoked before every retry.
    pub fn with_retry_hook(mut self, hook: impl Fn(&RetryEvent) + Send + Sync + 'static) -> Self {
        self.executor.set_retry_hook(Arc::new(hook));
        self
    }

    /// Sends requests through another transport, keeping options and hooks.
    pub fn with_transport<U: AsyncTransport>(self, transport: U) -> PxshotClient<U> {
        PxshotClient {
            transport,
            executor: self.executor,
        }
    }

    pub fn options(&self) -> &ClientOptions {
        self.executor.options()
    }

    /// Rate-limit headers of the most recent response that carried any.
    pub fn rate_limit(&self) -> Option<RateLimitState> {
        self.executor.last_rate_limit()
    }
}

impl<T: AsyncTransport> PxshotClient<T> {
    /// Takes a screenshot.
    ///
    /// Returns [`Capture::Stored`] when the request has `store` set and
    /// [`Capture::Image`] otherwise.
    pub async fn capture(&self, request: &CaptureRequest) -> Result<Capture> {
        self.run_capture(request, None).await
    }

    /// Like [`capture`](Self::capture), aborting when `cancel` fires.
    pub async fn capture_cancellable(
        &self,
        request: &CaptureRequest,
        cancel: &CancelToken,
    ) -> Result<Capture> {
        self.run_capture(request, Some(cancel)).await
    }

    /// Returns usage statistics for the current billing period.
    pub async fn usage(&self) -> Result<UsageStats> {
        let request = self.executor.usage_request()?;
        self.execute(&request, None, decode_usage).await
    }

    pub async fn usage_cancellable(&self, cancel: &CancelToken) -> Result<UsageStats> {
        let request = self.executor.usage_request()?;
        self.execute(&request, Some(cancel), decode_usage).await
    }

    /// Checks service health.
    pub async fn health(&self) -> Result<HealthStatus> {
        let request = self.executor.health_request()?;
        self.execute(&request, None, decode_health).await
    }

    pub async fn health_cancellable(&self, cancel: &CancelToken) -> Result<HealthStatus> {
        let request = self.executor.health_request()?;
        self.execute(&request, Some(cancel), decode_health).await
    }

    async fn run_capture(
        &self,
        request: &CaptureRequest,
        cancel: Option<&CancelToken>,
    ) -> Result<Capture> {
        let http_request = self.executor.capture_request(request)?;
        let (format, store) = (request.format(), request.store());
        self.execute(&http_request, cancel, move |response| {
            decode_capture(response, format, store)
        })
        .await
    }

    async fn execute<R, F>(
        &self,
        request: &HttpRequest,
        cancel: Option<&CancelToken>,
        decode: F,
    ) -> Result<R>
    where
        F: Fn(HttpResponse) -> Result<R> + Send + Sync,
        R: Send,
    {
        let started = Instant::now();
        let mut retry = self.executor.start();
        loop {
            if cancel.is_some_and(CancelToken::is_cancelled) {
                return Err(PxshotError::Cancelled);
            }
            retry.next_attempt();

            let outcome = match until_cancelled(cancel, self.transport.send(request)).await? {
                Ok(response) => self.executor.interpret(response, &decode),
                Err(err) => Err(err.into()),
            };

            match retry.settle(outcome, started.elapsed()) {
                AttemptResult::Success(value) => return Ok(value),
                AttemptResult::TerminalFailure(error) => return Err(error),
                AttemptResult::RetryableFailure { delay, .. } => {
                    until_cancelled(cancel, sleep(delay)).await?;
                }
            }
        }
    }
}

/// Runs `future` unless `cancel` fires first. The future is dropped on
/// cancellation, which releases whatever it held.
async fn until_cancelled<F: Future>(cancel: Option<&CancelToken>, future: F) -> Result<F::Output> {
    match cancel {
        Some(token) => tokio::select! {
            biased;
            () = token.cancelled() => Err(PxshotError::Cancelled),
            output = future => Ok(output),
        },
        None => Ok(future.await),
    }
}

pub(crate) fn options_from_env() -> Result<(String, ClientOptions)> {
    let api_key = std::env::var(API_KEY_ENV).map_err(|_| {
        PxshotError::validation(format!("missing {API_KEY_ENV} environment variable"))
    })?;
    if api_key.trim().is_empty() {
        return Err(PxshotError::validation(format!(
            "{API_KEY_ENV} is set but empty"
        )));
    }

    let mut options = ClientOptions::default();
    if let Ok(base_url) = std::env::var(BASE_URL_ENV) {
        if !base_url.trim().is_empty() {
            options.base_url = base_url;
        }
    }
    Ok((api_key, options))
}
