/// Production endpoint of the Pxshot API.
pub const DEFAULT_BASE_URL: &str = "https://api.pxshot.com";

/// Configures endpoint, timeout and retry behavior.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ClientOptions {
    /// API root, without a trailing path.
    pub base_url: String,
    /// Per-request timeout in milliseconds.
    pub timeout_ms: u64,
    /// Total attempts per call, including the first one. `0` behaves like `1`.
    pub max_attempts: u32,
    /// Upper bound on time spent in a call, retries and waits included.
    pub max_total_wait_ms: u64,
    /// Base retry backoff in milliseconds (exponential strategy).
    pub backoff_base_ms: u64,
    /// Ceiling applied to the exponential backoff before jitter.
    pub backoff_ceiling_ms: u64,
    /// Smallest wait after a 429, whatever the headers say.
    pub min_rate_limit_wait_ms: u64,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            timeout_ms: 60_000,
            max_attempts: 3,
            max_total_wait_ms: 30_000,
            backoff_base_ms: 500,
            backoff_ceiling_ms: 10_000,
            min_rate_limit_wait_ms: 1_000,
        }
    }
}

impl ClientOptions {
    /// Returns the options with a different API root.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}
