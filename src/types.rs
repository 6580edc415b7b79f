use chrono::{DateTime, Utc};

/// Screenshot returned inline.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImagePayload {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// Screenshot kept by the service and reachable at `url`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredScreenshot {
    pub url: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub size_bytes: Option<u64>,
}

/// Result of a capture call. The variant follows the request's `store` flag.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Capture {
    Image(ImagePayload),
    Stored(StoredScreenshot),
}

impl Capture {
    pub fn into_image(self) -> Option<ImagePayload> {
        match self {
            Self::Image(image) => Some(image),
            Self::Stored(_) => None,
        }
    }

    pub fn into_stored(self) -> Option<StoredScreenshot> {
        match self {
            Self::Stored(stored) => Some(stored),
            Self::Image(_) => None,
        }
    }
}

/// Account usage for the current billing period.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UsageStats {
    /// Billing period label, e.g. `2024-01`.
    pub period: String,
    pub screenshots_used: u64,
    pub screenshots_limit: u64,
    pub storage_used_bytes: u64,
}

impl UsageStats {
    pub fn screenshots_remaining(&self) -> u64 {
        self.screenshots_limit.saturating_sub(self.screenshots_used)
    }

    /// Share of the quota used, in percent. `0.0` for an unlimited (zero) quota.
    pub fn usage_percentage(&self) -> f64 {
        if self.screenshots_limit == 0 {
            return 0.0;
        }
        self.screenshots_used as f64 / self.screenshots_limit as f64 * 100.0
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HealthStatus {
    /// `true` when the service reported status `ok`.
    pub ok: bool,
    pub status: String,
    pub version: Option<String>,
}
