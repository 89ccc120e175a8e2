//! Shared HTTP client and status mapping for engine calls.

use std::sync::OnceLock;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};

use crate::error::VoxError;

static SHARED_CLIENT: OnceLock<reqwest::Client> = OnceLock::new();

/// Get (or create) the shared reqwest client.
///
/// No client-wide timeout is set; each engine call is bounded by the caller's
/// own timeout.
pub fn shared_client() -> &'static reqwest::Client {
    SHARED_CLIENT.get_or_init(|| {
        reqwest::Client::builder()
            .pool_max_idle_per_host(4)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new())
    })
}

/// Headers for an engine that may require a bearer token.
pub fn engine_headers(api_key: Option<&str>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if let Some(key) = api_key.map(str::trim).filter(|k| !k.is_empty()) {
        if let Ok(val) = HeaderValue::from_str(&format!("Bearer {key}")) {
            headers.insert(AUTHORIZATION, val);
        }
    }
    headers
}

/// Map a non-success engine status to an error.
pub fn status_to_error(status: u16, body: &str) -> VoxError {
    let message = extract_error_message(body).unwrap_or_else(|| body.trim().to_string());
    match status {
        401 | 403 => VoxError::Authentication(message),
        429 => VoxError::RateLimited {
            retry_after_ms: extract_retry_after(body),
        },
        _ => VoxError::api(status, message),
    }
}

/// Pull a human-readable message out of a JSON error body.
///
/// Accepts `{"error": "..."}`, `{"error": {"message": "..."}}` and
/// `{"detail": "..."}`.
pub fn extract_error_message(body: &str) -> Option<String> {
    let parsed: serde_json::Value = serde_json::from_str(body).ok()?;
    let error = parsed.get("error").or_else(|| parsed.get("detail"))?;
    error
        .as_str()
        .or_else(|| error.get("message").and_then(|m| m.as_str()))
        .map(ToString::to_string)
}

fn extract_retry_after(body: &str) -> Option<u64> {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("retry_after")
                .or_else(|| v.get("error").and_then(|e| e.get("retry_after")))
                .and_then(|r| r.as_f64())
                .map(|s| (s * 1000.0) as u64)
        })
}
