use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub struct CaptureBody<'a> {
    pub url: &'a str,
    pub format: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    pub full_page: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wait_until: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wait_for_selector: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wait_for_timeout: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_scale_factor: Option<f64>,
    pub store: bool,
}

#[derive(Debug, Deserialize)]
pub struct StoredScreenshotBody {
    pub url: String,
    #[serde(default, alias = "expiresAt")]
    pub expires_at: Option<String>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub size_bytes: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct UsageBody {
    pub period: String,
    pub screenshots_used: u64,
    pub screenshots_limit: u64,
    #[serde(default)]
    pub storage_used_bytes: u64,
}

#[derive(Debug, Deserialize)]
pub struct HealthBody {
    pub status: String,
    #[serde(default)]
    pub version: Option<String>,
}

/// Error payload. The service nests it as `{"error": {"message", "code"}}`;
/// proxies in front of it sometimes answer with a flat shape instead.
#[derive(Debug, Default, Deserialize)]
pub struct ErrorEnvelope {
    #[serde(default)]
    pub error: Option<ErrorField>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub detail: Option<serde_json::Value>,
    #[serde(default)]
    pub code: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ErrorField {
    Structured {
        #[serde(default)]
        message: Option<String>,
        #[serde(default)]
        code: Option<String>,
    },
    Text(String),
}
