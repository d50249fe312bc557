//! HTTP plumbing shared by the LLM-backed oracles.

use std::time::Duration;

use anyhow::{Context, Result};

use adaptest_core::OracleError;

/// Per-request HTTP timeout for judge calls.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 60;

/// Seconds to wait after a 429 without a usable `retry-after` header.
const DEFAULT_RETRY_AFTER_SECS: u64 = 5;

pub(crate) fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .context("failed to build HTTP client")
}

/// Map a transport failure to a transient `Unavailable`.
pub(crate) fn transport_error(e: reqwest::Error, timeout: Duration) -> OracleError {
    if e.is_timeout() {
        OracleError::unavailable(format!("request timed out after {}s", timeout.as_secs()))
    } else {
        OracleError::unavailable(format!("network error: {e}"))
    }
}

/// Map a non-success HTTP response to `OracleError::Unavailable`, keeping the
/// status class as the reason.
pub(crate) async fn status_error(
    response: reqwest::Response,
    extract_message: fn(&str) -> Option<String>,
) -> OracleError {
    let status = response.status().as_u16();
    if status == 429 {
        let retry_after_ms = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .unwrap_or(DEFAULT_RETRY_AFTER_SECS)
            * 1000;
        return OracleError::rate_limited(retry_after_ms);
    }

    let body = response.text().await.unwrap_or_default();
    let message = extract_message(&body).unwrap_or(body);
    match status {
        401 | 403 => {
            OracleError::authentication_failed(format!("authentication failed: {message}"))
        }
        404 => OracleError::not_found(format!("model or endpoint not found: {message}")),
        _ => OracleError::unavailable(format!("API error (HTTP {status}): {message}")),
    }
}
