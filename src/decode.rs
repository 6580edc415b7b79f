use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::{header::CONTENT_TYPE, StatusCode};
use url::Url;

use crate::{
    transport::HttpResponse,
    wire::{self, CaptureBody, ErrorEnvelope, ErrorField},
    Capture, CaptureRequest, HealthStatus, ImageFormat, ImagePayload, PxshotError, Result,
    StoredScreenshot, UsageStats,
};

const MAX_ERROR_TEXT_CHARS: usize = 512;

pub(crate) fn encode_capture_request(request: &CaptureRequest) -> Result<Vec<u8>> {
    let viewport = request.viewport();
    let body = CaptureBody {
        url: request.url(),
        format: request.format().as_str(),
        quality: request.quality(),
        width: viewport.map(|v| v.width),
        height: viewport.map(|v| v.height),
        full_page: request.full_page(),
        wait_until: request.wait_until().map(|w| w.as_str()),
        wait_for_selector: request.wait_for_selector(),
        wait_for_timeout: request
            .wait_for_timeout()
            .map(|t| u64::try_from(t.as_millis()).unwrap_or(u64::MAX)),
        device_scale_factor: request.device_scale_factor(),
        store: request.store(),
    };
    serde_json::to_vec(&body)
        .map_err(|err| PxshotError::validation(format!("could not encode capture request: {err}")))
}

pub(crate) fn decode_capture(
    response: HttpResponse,
    format: ImageFormat,
    store: bool,
) -> Result<Capture> {
    if store {
        decode_stored(response).map(Capture::Stored)
    } else {
        decode_image(response, format).map(Capture::Image)
    }
}

pub(crate) fn decode_image(response: HttpResponse, format: ImageFormat) -> Result<ImagePayload> {
    let content_type = match response.headers.get(CONTENT_TYPE) {
        None => format.mime_type().to_owned(),
        Some(value) => {
            let value = value.to_str().map_err(|_| {
                PxshotError::unexpected(response.status, "content-type header is not valid text")
            })?;
            let media_type = value
                .split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .to_ascii_lowercase();
            if !media_type.starts_with("image/") && media_type != "application/octet-stream" {
                return Err(PxshotError::unexpected(
                    response.status,
                    format!("expected image content, got '{value}'"),
                ));
            }
            value.to_owned()
        }
    };

    if response.body.is_empty() {
        return Err(PxshotError::unexpected(response.status, "empty image body"));
    }

    Ok(ImagePayload {
        bytes: response.body,
        content_type,
    })
}

pub(crate) fn decode_stored(response: HttpResponse) -> Result<StoredScreenshot> {
    let body: wire::StoredScreenshotBody = parse_json(&response, "stored screenshot")?;
    let url = Url::parse(&body.url).map_err(|err| {
        PxshotError::unexpected(
            response.status,
            format!("invalid stored screenshot url '{}': {err}", body.url),
        )
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(PxshotError::unexpected(
            response.status,
            format!("stored screenshot url has scheme '{}'", url.scheme()),
        ));
    }

    Ok(StoredScreenshot {
        url: body.url,
        expires_at: body.expires_at.as_deref().and_then(parse_expiry),
        width: body.width,
        height: body.height,
        size_bytes: body.size_bytes,
    })
}

/// Expiry timestamps arrive as RFC 3339 or as naive UTC `YYYY-MM-DD HH:MM:SS`.
/// An unreadable expiry is dropped; the URL alone decides success.
fn parse_expiry(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(value) {
        return Some(at.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|naive| naive.and_utc())
}

pub(crate) fn decode_usage(response: HttpResponse) -> Result<UsageStats> {
    let body: wire::UsageBody = parse_json(&response, "usage")?;
    Ok(UsageStats {
        period: body.period,
        screenshots_used: body.screenshots_used,
        screenshots_limit: body.screenshots_limit,
        storage_used_bytes: body.storage_used_bytes,
    })
}

pub(crate) fn decode_health(response: HttpResponse) -> Result<HealthStatus> {
    let body: wire::HealthBody = parse_json(&response, "health")?;
    Ok(HealthStatus {
        ok: body.status.eq_ignore_ascii_case("ok"),
        status: body.status,
        version: body.version,
    })
}

fn parse_json<T: serde::de::DeserializeOwned>(response: &HttpResponse, what: &str) -> Result<T> {
    serde_json::from_slice(&response.body).map_err(|err| {
        PxshotError::unexpected(
            response.status,
            format!(
                "invalid {what} response JSON: {err}; body: {}",
                body_excerpt(&response.body)
            ),
        )
    })
}

pub(crate) struct ErrorDetail {
    pub message: String,
    pub code: Option<String>,
}

/// Extracts message and code from an error response body, falling back to
/// the raw text and finally to the status reason.
pub(crate) fn decode_error_detail(status: StatusCode, body: &[u8]) -> ErrorDetail {
    let envelope = serde_json::from_slice::<ErrorEnvelope>(body).unwrap_or_default();

    let (nested_message, nested_code) = match envelope.error {
        Some(ErrorField::Structured { message, code }) => (message, code),
        Some(ErrorField::Text(text)) => (Some(text), None),
        None => (None, None),
    };
    let detail = envelope.detail.map(|detail| match detail {
        serde_json::Value::String(text) => text,
        other => other.to_string(),
    });

    let message = nested_message
        .or(envelope.message)
        .or(detail)
        .filter(|message| !message.trim().is_empty())
        .unwrap_or_else(|| {
            let text = body_excerpt(body);
            if text.is_empty() {
                status
                    .canonical_reason()
                    .unwrap_or("no error message")
                    .to_owned()
            } else {
                text
            }
        });

    ErrorDetail {
        message,
        code: nested_code.or(envelope.code),
    }
}

fn body_excerpt(body: &[u8]) -> String {
    String::from_utf8_lossy(body)
        .trim()
        .chars()
        .take(MAX_ERROR_TEXT_CHARS)
        .collect()
}
