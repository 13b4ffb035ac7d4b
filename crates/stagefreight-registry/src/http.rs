//! Shared response handling: every provider funnels its `reqwest`
//! responses through [`check_status`] so 4xx/5xx bodies become a typed
//! [`RegistryError`] instead of a bare status code, with 403 distinguished
//! for permission diagnostics.

use crate::error::{RegistryError, Result};
use reqwest::{Method, Response};

const BODY_TRUNCATE_LEN: usize = 500;

fn truncate(body: &str) -> String {
    if body.len() <= BODY_TRUNCATE_LEN {
        body.to_string()
    } else {
        format!("{}...", &body[..BODY_TRUNCATE_LEN])
    }
}

/// Returns `response` unchanged on success; on a 4xx/5xx status, consumes
/// the response body and raises a typed error.
pub async fn check_status(method: Method, url: &str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let body_truncated = truncate(&body);

    if status.as_u16() == 403 {
        return Err(RegistryError::Forbidden { method: method.to_string(), url: url.to_string(), body_truncated });
    }

    Err(RegistryError::HttpStatus { status: status.as_u16(), method: method.to_string(), url: url.to_string(), body_truncated })
}

pub fn map_transport_err(url: &str, source: reqwest::Error) -> RegistryError {
    RegistryError::Http { url: url.to_string(), source }
}
