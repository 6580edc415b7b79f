//! `pxshot` is a client for the Pxshot screenshot API.
//!
//! Two clients share one retry engine:
//! - [`PxshotClient`]: async, built on `reqwest` and `tokio`
//! - [`blocking::PxshotClient`]: blocks the calling thread
//!
//! Both expose [`capture`](PxshotClient::capture),
//! [`usage`](PxshotClient::usage) and [`health`](PxshotClient::health).
//! Server errors, network failures, timeouts and rate limiting are retried
//! with exponential backoff (rate limits wait for the window reset); every
//! other failure is returned as a typed [`PxshotError`].
//!
//! ```no_run
//! use pxshot::{Capture, CaptureRequest, ImageFormat, PxshotClient};
//!
//! # async fn run() -> pxshot::Result<()> {
//! let client = PxshotClient::new("px_live_key")?;
//! let request = CaptureRequest::builder("https://example.com")
//!     .format(ImageFormat::Jpeg)
//!     .quality(80)
//!     .full_page(true)
//!     .build()?;
//!
//! if let Capture::Image(image) = client.capture(&request).await? {
//!     std::fs::write("example.jpg", &image.bytes).ok();
//! }
//! # Ok(())
//! # }
//! ```

pub mod blocking;
mod cancel;
mod client;
mod decode;
mod error;
mod executor;
mod options;
mod rate_limit;
mod request;
pub mod retry;
pub mod transport;
mod types;
mod wire;

pub use cancel::CancelToken;
pub use client::PxshotClient;
pub use error::{ErrorKind, PxshotError};
pub use executor::RetryEvent;
pub use options::{ClientOptions, DEFAULT_BASE_URL};
pub use rate_limit::RateLimitState;
pub use request::{CaptureRequest, CaptureRequestBuilder, ImageFormat, Viewport, WaitUntil};
pub use retry::{Jitter, NoJitter, RandomJitter, RetryDecision, RetryPolicy};
pub use types::{Capture, HealthStatus, ImagePayload, StoredScreenshot, UsageStats};

pub type Result<T> = std::result::Result<T, PxshotError>;
