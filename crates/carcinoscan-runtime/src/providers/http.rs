//! Shared HTTP client for outbound calls.

use std::sync::OnceLock;
use std::time::Duration;

use super::ProviderError;

static CLIENT: OnceLock<Result<reqwest::Client, String>> = OnceLock::new();

/// The process-wide client. Per-call timeouts are set on each request.
pub(crate) fn client() -> Result<&'static reqwest::Client, ProviderError> {
    let result = CLIENT.get_or_init(|| {
        reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .user_agent(concat!("carcinoscan/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| e.to_string())
    });

    match result {
        Ok(client) => Ok(client),
        Err(e) => Err(ProviderError::HttpError(format!(
            "failed to build HTTP client: {}",
            e
        ))),
    }
}

/// Map a transport error, distinguishing timeouts.
pub(crate) fn transport_error(err: reqwest::Error, timeout: Duration) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout(timeout)
    } else {
        ProviderError::HttpError(err.to_string())
    }
}

/// Turn non-success statuses into provider errors.
pub(crate) async fn check_status(
    response: reqwest::Response,
) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();

    if status.as_u16() == 429 {
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs);
        return Err(ProviderError::RateLimited { retry_after });
    }

    if status.as_u16() == 401 || status.as_u16() == 403 {
        return Err(ProviderError::AuthError);
    }

    if !status.is_success() {
        let message = response
            .text()
            .await
            .unwrap_or_else(|e| format!("<unreadable body: {}>", e));
        return Err(ProviderError::ApiError {
            status: status.as_u16(),
            message: message.chars().take(500).collect(),
        });
    }

    Ok(response)
}
