//! Mapping of upstream HTTP outcomes onto [`ProviderFailure`] kinds.
//!
//! Shared by every adapter so the router sees the same taxonomy regardless
//! of which provider answered.

use reqwest::header::HeaderMap;
use reqwest::{Response, StatusCode};

use chatroute_types::llm::ProviderFailure;

/// Longest body excerpt carried in a failure message.
const MAX_DETAIL_CHARS: usize = 300;

/// Check whether an error body signals quota or credit exhaustion.
///
/// Gemini answers `RESOURCE_EXHAUSTED`, OpenAI `insufficient_quota`, and some
/// OpenAI-compatible gateways only say so in the message text.
pub fn is_quota_signal(body: &str) -> bool {
    let lower = body.to_lowercase();
    lower.contains("resource_exhausted")
        || lower.contains("insufficient_quota")
        || lower.contains("quota exceeded")
        || lower.contains("exceeded your current quota")
        || lower.contains("credits exhausted")
}

/// Gemini reports a bad key as 400 with reason `API_KEY_INVALID`.
pub fn is_auth_signal(body: &str) -> bool {
    body.contains("API_KEY_INVALID")
}

/// Pull a human-readable message out of a JSON error body.
pub fn extract_error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value.get("error").and_then(|v| {
        // {"error": {"message": "..."}} (OpenAI, Gemini, Anthropic)
        v.get("message")
            .and_then(|m| m.as_str())
            .map(String::from)
            // {"error": "..."}
            .or_else(|| v.as_str().map(String::from))
    })
}

/// Retry hint from the `Retry-After` header, in milliseconds.
///
/// Only the numeric (seconds) form is handled.
pub fn parse_retry_after_header(headers: &HeaderMap) -> Option<u64> {
    let value = headers
        .get("retry-after")
        .or_else(|| headers.get("x-ratelimit-reset-after"))
        .and_then(|v| v.to_str().ok())?;

    value
        .trim()
        .parse::<f64>()
        .ok()
        .map(|secs| (secs * 1000.0).max(0.0) as u64)
}

/// Retry hint from a JSON error body, in milliseconds.
///
/// Understands `retry_after_ms`, `retry_after` (seconds) and Gemini's
/// `RetryInfo` detail (`"retryDelay": "37s"`).
pub fn parse_retry_after_body(body: &str) -> Option<u64> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;

    if let Some(ms) = value.get("retry_after_ms").and_then(|v| v.as_u64()) {
        return Some(ms);
    }
    if let Some(secs) = value.get("retry_after").and_then(|v| v.as_f64()) {
        return Some((secs * 1000.0) as u64);
    }

    value
        .pointer("/error/details")
        .and_then(|d| d.as_array())?
        .iter()
        .filter_map(|detail| detail.get("retryDelay").and_then(|v| v.as_str()))
        .find_map(|delay| {
            delay
                .strip_suffix('s')
                .and_then(|secs| secs.parse::<f64>().ok())
                .map(|secs| (secs * 1000.0) as u64)
        })
}

/// Classify a non-success HTTP response.
pub fn classify_status(status: u16, body: &str, retry_after_ms: Option<u64>) -> ProviderFailure {
    let detail = extract_error_message(body).unwrap_or_else(|| excerpt(body));
    let message = format!("HTTP {status}: {detail}");

    if status == 401 || status == 403 || is_auth_signal(body) {
        return ProviderFailure::auth(message);
    }
    if status == 429 || is_quota_signal(body) {
        return ProviderFailure::quota(message).with_retry_after(retry_after_ms);
    }
    // 529 is Anthropic's "overloaded".
    if status == 408 || status >= 500 {
        return ProviderFailure::transient(message).with_retry_after(retry_after_ms);
    }
    ProviderFailure::malformed(message)
}

/// Classify a failed non-success response, consuming it.
pub async fn failure_from_response(response: Response) -> ProviderFailure {
    let status: StatusCode = response.status();
    let header_ms = parse_retry_after_header(response.headers());
    let body = response.text().await.unwrap_or_default();
    let retry_after_ms = header_ms.or_else(|| parse_retry_after_body(&body));
    classify_status(status.as_u16(), &body, retry_after_ms)
}

/// Classify a transport-level error from reqwest.
///
/// The URL is stripped from the message so query parameters never reach logs.
pub fn failure_from_transport(err: reqwest::Error) -> ProviderFailure {
    let err = err.without_url();
    if err.is_builder() {
        return ProviderFailure::malformed(format!("invalid request: {err}"));
    }
    if err.is_decode() {
        return ProviderFailure::malformed(format!("failed to decode response: {err}"));
    }
    if err.is_timeout() {
        return ProviderFailure::transient(format!("request timed out: {err}"));
    }
    ProviderFailure::transient(format!("HTTP request failed: {err}"))
}

/// Parse a success body into a provider-specific response type.
pub fn decode_body<T: serde::de::DeserializeOwned>(body: &str) -> Result<T, ProviderFailure> {
    serde_json::from_str(body)
        .map_err(|e| ProviderFailure::malformed(format!("failed to parse response: {e}")))
}

fn excerpt(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= MAX_DETAIL_CHARS {
        return trimmed.to_string();
    }
    let cut: String = trimmed.chars().take(MAX_DETAIL_CHARS).collect();
    format!("{cut}...")
}
