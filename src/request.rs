use std::{fmt, str::FromStr, time::Duration};

use url::Url;

use crate::{PxshotError, Result};

const MAX_VIEWPORT_SIDE: u32 = 10_000;
const MAX_WAIT_FOR_TIMEOUT: Duration = Duration::from_secs(60);
const MAX_DEVICE_SCALE_FACTOR: f64 = 5.0;

/// Output image encoding.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum ImageFormat {
    #[default]
    Png,
    Jpeg,
    Webp,
}

impl ImageFormat {
    /// Wire name of the format.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpeg",
            Self::Webp => "webp",
        }
    }

    /// MIME type of the encoded image.
    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Webp => "image/webp",
        }
    }

    /// Whether the service accepts a `quality` parameter for this format.
    pub fn supports_quality(self) -> bool {
        matches!(self, Self::Jpeg | Self::Webp)
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImageFormat {
    type Err = PxshotError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "png" => Ok(Self::Png),
            "jpeg" | "jpg" => Ok(Self::Jpeg),
            "webp" => Ok(Self::Webp),
            other => Err(PxshotError::validation(format!(
                "unsupported image format '{other}', expected png, jpeg or webp"
            ))),
        }
    }
}

/// Page lifecycle event the renderer waits for before capturing.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum WaitUntil {
    Load,
    DomContentLoaded,
    NetworkIdle,
}

impl WaitUntil {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Load => "load",
            Self::DomContentLoaded => "domcontentloaded",
            Self::NetworkIdle => "networkidle",
        }
    }
}

impl fmt::Display for WaitUntil {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WaitUntil {
    type Err = PxshotError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "load" => Ok(Self::Load),
            "domcontentloaded" => Ok(Self::DomContentLoaded),
            "networkidle" => Ok(Self::NetworkIdle),
            other => Err(PxshotError::validation(format!(
                "unsupported wait_until '{other}', expected load, domcontentloaded or networkidle"
            ))),
        }
    }
}

/// Browser viewport size in CSS pixels.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// A validated screenshot request.
///
/// Built with [`CaptureRequest::builder`]; every field is checked in
/// [`CaptureRequestBuilder::build`], so an existing value is always
/// acceptable to send.
#[derive(Clone, Debug, PartialEq)]
pub struct CaptureRequest {
    url: String,
    format: ImageFormat,
    quality: Option<u8>,
    viewport: Option<Viewport>,
    full_page: bool,
    wait_until: Option<WaitUntil>,
    wait_for_selector: Option<String>,
    wait_for_timeout: Option<Duration>,
    device_scale_factor: Option<f64>,
    store: bool,
}

impl CaptureRequest {
    /// Starts a request for `url` with default options (PNG, inline bytes).
    pub fn builder(url: impl Into<String>) -> CaptureRequestBuilder {
        CaptureRequestBuilder {
            url: url.into(),
            format: ImageFormat::default(),
            quality: None,
            viewport: None,
            full_page: false,
            wait_until: None,
            wait_for_selector: None,
            wait_for_timeout: None,
            device_scale_factor: None,
            store: false,
        }
    }

    /// Shorthand for a default request.
    pub fn new(url: impl Into<String>) -> Result<Self> {
        Self::builder(url).build()
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn quality(&self) -> Option<u8> {
        self.quality
    }

    pub fn viewport(&self) -> Option<Viewport> {
        self.viewport
    }

    pub fn full_page(&self) -> bool {
        self.full_page
    }

    pub fn wait_until(&self) -> Option<WaitUntil> {
        self.wait_until
    }

    pub fn wait_for_selector(&self) -> Option<&str> {
        self.wait_for_selector.as_deref()
    }

    pub fn wait_for_timeout(&self) -> Option<Duration> {
        self.wait_for_timeout
    }

    pub fn device_scale_factor(&self) -> Option<f64> {
        self.device_scale_factor
    }

    /// Whether the screenshot is stored server-side and returned as a URL.
    pub fn store(&self) -> bool {
        self.store
    }
}

/// Builder for [`CaptureRequest`].
#[derive(Clone, Debug)]
pub struct CaptureRequestBuilder {
    url: String,
    format: ImageFormat,
    quality: Option<u32>,
    viewport: Option<Viewport>,
    full_page: bool,
    wait_until: Option<WaitUntil>,
    wait_for_selector: Option<String>,
    wait_for_timeout: Option<Duration>,
    device_scale_factor: Option<f64>,
    store: bool,
}

impl CaptureRequestBuilder {
    pub fn format(mut self, format: ImageFormat) -> Self {
        self.format = format;
        self
    }

    /// Compression quality, 1–100. Only valid for JPEG and WebP.
    pub fn quality(mut self, quality: u32) -> Self {
        self.quality = Some(quality);
        self
    }

    pub fn viewport(mut self, width: u32, height: u32) -> Self {
        self.viewport = Some(Viewport::new(width, height));
        self
    }

    /// Captures the whole scrollable page instead of the viewport.
    pub fn full_page(mut self, full_page: bool) -> Self {
        self.full_page = full_page;
        self
    }

    pub fn wait_until(mut self, wait_until: WaitUntil) -> Self {
        self.wait_until = Some(wait_until);
        self
    }

    /// Waits until a CSS selector matches before capturing.
    pub fn wait_for_selector(mut self, selector: impl Into<String>) -> Self {
        self.wait_for_selector = Some(selector.into());
        self
    }

    /// Extra delay after the page settles, at most 60 seconds.
    pub fn wait_for_timeout(mut self, timeout: Duration) -> Self {
        self.wait_for_timeout = Some(timeout);
        self
    }

    pub fn device_scale_factor(mut self, factor: f64) -> Self {
        self.device_scale_factor = Some(factor);
        self
    }

    /// Stores the screenshot and returns a URL instead of the image bytes.
    pub fn store(mut self, store: bool) -> Self {
        self.store = store;
        self
    }

    /// Validates every field and returns the request.
    pub fn build(self) -> Result<CaptureRequest> {
        let url = validate_target(&self.url)?;

        let quality = match self.quality {
            None => None,
            Some(_) if !self.format.supports_quality() => {
                return Err(PxshotError::validation(format!(
                    "quality is not supported for {} screenshots",
                    self.format
                )));
            }
            Some(quality @ 1..=100) => Some(quality as u8),
            Some(quality) => {
                return Err(PxshotError::validation(format!(
                    "quality must be between 1 and 100, got {quality}"
                )));
            }
        };

        if let Some(viewport) = self.viewport {
            for (side, value) in [("width", viewport.width), ("height", viewport.height)] {
                if value == 0 || value > MAX_VIEWPORT_SIDE {
                    return Err(PxshotError::validation(format!(
                        "viewport {side} must be between 1 and {MAX_VIEWPORT_SIDE}, got {value}"
                    )));
                }
            }
        }

        let wait_for_selector = match self.wait_for_selector {
            Some(selector) if selector.trim().is_empty() => {
                return Err(PxshotError::validation("wait_for_selector must not be empty"));
            }
            other => other,
        };

        if let Some(timeout) = self.wait_for_timeout {
            if timeout.subsec_nanos() % 1_000_000 != 0 {
                return Err(PxshotError::validation(format!(
                    "wait_for_timeout must be a whole number of milliseconds, got {timeout:?}"
                )));
            }
            if timeout.as_millis() == 0 || timeout > MAX_WAIT_FOR_TIMEOUT {
                return Err(PxshotError::validation(format!(
                    "wait_for_timeout must be between 1 ms and {} ms, got {} ms",
                    MAX_WAIT_FOR_TIMEOUT.as_millis(),
                    timeout.as_millis()
                )));
            }
        }

        if let Some(factor) = self.device_scale_factor {
            if !factor.is_finite() || factor <= 0.0 || factor > MAX_DEVICE_SCALE_FACTOR {
                return Err(PxshotError::validation(format!(
                    "device_scale_factor must be in (0, {MAX_DEVICE_SCALE_FACTOR}], got {factor}"
                )));
            }
        }

        Ok(CaptureRequest {
            url,
            format: self.format,
            quality,
            viewport: self.viewport,
            full_page: self.full_page,
            wait_until: self.wait_until,
            wait_for_selector,
            wait_for_timeout: self.wait_for_timeout,
            device_scale_factor: self.device_scale_factor,
            store: self.store,
        })
    }
}

fn validate_target(url: &str) -> Result<String> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return Err(PxshotError::validation("url is required"));
    }
    let parsed = Url::parse(trimmed)
        .map_err(|err| PxshotError::validation(format!("invalid url '{trimmed}': {err}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(PxshotError::validation(format!(
            "url must use http or https, got '{}'",
            parsed.scheme()
        )));
    }
    Ok(trimmed.to_owned())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{CaptureRequest, ImageFormat, WaitUntil};
    use crate::ErrorKind;

    #[test]
    fn defaults_are_png_inline() {
        let request = CaptureRequest::new("https://example.com").unwrap();
        assert_eq!(request.format(), ImageFormat::Png);
        assert_eq!(request.url(), "https://example.com");
        assert!(!request.store());
        assert!(!request.full_page());
        assert_eq!(request.quality(), None);
    }

    #[test]
    fn quality_rejected_for_png() {
        let err = CaptureRequest::builder("https://example.com")
            .quality(80)
            .build()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.to_string().contains("png"));
    }

    #[test]
    fn quality_range_checked_for_lossy_formats() {
        for format in [ImageFormat::Jpeg, ImageFormat::Webp] {
            assert!(CaptureRequest::builder("https://example.com")
                .format(format)
                .quality(100)
                .build()
                .is_ok());
            for quality in [0, 101] {
                assert!(CaptureRequest::builder("https://example.com")
                    .format(format)
                    .quality(quality)
                    .build()
                    .is_err());
            }
        }
    }

    #[test]
    fn target_must_be_http_url() {
        for url in ["", "   ", "not-a-url", "ftp://example.com/file"] {
            let err = CaptureRequest::new(url).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation, "{url}");
        }
    }

    #[test]
    fn numeric_bounds_are_enforced() {
        let base = || CaptureRequest::builder("https://example.com");
        assert!(base().viewport(0, 1080).build().is_err());
        assert!(base().viewport(1920, 20_000).build().is_err());
        assert!(base().wait_for_timeout(Duration::ZERO).build().is_err());
        assert!(base().wait_for_timeout(Duration::from_secs(61)).build().is_err());
        assert!(base().wait_for_timeout(Duration::from_micros(1500)).build().is_err());
        assert!(base().wait_for_timeout(Duration::from_micros(500)).build().is_err());
        assert!(base().device_scale_factor(0.0).build().is_err());
        assert!(base().device_scale_factor(f64::NAN).build().is_err());
        assert!(base().wait_for_selector("  ").build().is_err());
        assert!(base()
            .viewport(1920, 1080)
            .wait_for_timeout(Duration::from_secs(5))
            .device_scale_factor(2.0)
            .wait_for_selector(".content")
            .build()
            .is_ok());
    }

    #[test]
    fn enums_parse_from_wire_names() {
        assert_eq!("JPG".parse::<ImageFormat>().unwrap(), ImageFormat::Jpeg);
        assert_eq!("webp".parse::<ImageFormat>().unwrap(), ImageFormat::Webp);
        assert_eq!(
            "networkidle".parse::<WaitUntil>().unwrap(),
            WaitUntil::NetworkIdle
        );
        assert_eq!(
            "gif".parse::<ImageFormat>().unwrap_err().kind(),
            ErrorKind::Validation
        );
        assert!("idle".parse::<WaitUntil>().is_err());
    }
}
