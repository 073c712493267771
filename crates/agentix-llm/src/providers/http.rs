//! Shared HTTP plumbing for hosted and local backends
//!
//! Every reqwest-based adapter classifies failures the same way, so the
//! mapping from transport and status errors to [`BackendErrorKind`] lives here.

use crate::error::{BackendErrorKind, Error, Result};
use crate::util::sanitize_error_for_user;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

/// Timeout for cheap validation probes
pub(crate) const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Build a client with a hard request deadline
pub(crate) fn build_client(backend: &str, timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| Error::BackendInit {
            backend: backend.to_string(),
            reason: format!("failed to build HTTP client: {e}"),
        })
}

/// Strip a trailing slash so paths can be appended with `format!`
pub(crate) fn trim_base_url(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

/// Classify a transport-level failure
pub(crate) fn map_send_error(backend: &str, err: &reqwest::Error) -> Error {
    let kind = if err.is_timeout() {
        BackendErrorKind::Timeout
    } else if err.is_connect() {
        BackendErrorKind::Unreachable
    } else if err.is_decode() {
        BackendErrorKind::InvalidResponse
    } else {
        BackendErrorKind::Other
    };
    let detail = match kind {
        BackendErrorKind::Timeout => "request timed out".to_string(),
        BackendErrorKind::Unreachable => "could not connect".to_string(),
        _ => sanitize_error_for_user(&err.to_string()),
    };
    Error::backend(backend, kind, detail)
}

/// Classify a non-success status
pub(crate) fn map_status(backend: &str, status: StatusCode, body: &str) -> Error {
    let kind = match status.as_u16() {
        401 | 403 => BackendErrorKind::NotAuthenticated,
        429 => BackendErrorKind::RateLimited,
        408 | 504 => BackendErrorKind::Timeout,
        _ => BackendErrorKind::Other,
    };
    let body = sanitize_error_for_user(body);
    let detail = if body.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("HTTP {}: {}", status.as_u16(), body)
    };
    Error::backend(backend, kind, detail)
}

/// Check the status and decode a JSON body
pub(crate) async fn read_json<T: DeserializeOwned>(backend: &str, response: Response) -> Result<T> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| map_send_error(backend, &e))?;

    if !status.is_success() {
        debug!(backend, status = status.as_u16(), "backend returned error status");
        return Err(map_status(backend, status, &body));
    }

    serde_json::from_str(&body).map_err(|e| {
        Error::backend(
            backend,
            BackendErrorKind::InvalidResponse,
            sanitize_error_for_user(&format!("failed to parse response: {e}")),
        )
    })
}

/// GET `url` and report the status code, or `None` if it could not be reached
pub(crate) async fn probe_status(client: &Client, url: &str) -> Option<u16> {
    match client.get(url).timeout(PROBE_TIMEOUT).send().await {
        Ok(response) => Some(response.status().as_u16()),
        Err(e) => {
            debug!(url, error = %e, "probe failed");
            None
        }
    }
}
