use crate::error::ProviderError;
use reqwest::StatusCode;
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

pub(crate) fn build_client(provider: &str, timeout: Duration) -> Result<reqwest::Client, ProviderError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(CONNECT_TIMEOUT.min(timeout))
        .build()
        .map_err(|e| ProviderError::Transport {
            provider: provider.to_string(),
            message: format!("failed to build HTTP client: {}", e),
        })
}

/// Client with [`DEFAULT_TIMEOUT`]. A builder failure is logged and leaves
/// a client without timeouts; callers that need the limit use
/// [`build_client`] and propagate the error.
pub(crate) fn default_client(provider: &str) -> reqwest::Client {
    build_client(provider, DEFAULT_TIMEOUT).unwrap_or_else(|e| {
        warn!(provider, error = %e, "Using an HTTP client without request timeouts");
        reqwest::Client::new()
    })
}

pub(crate) fn transport_error(provider: &str, error: reqwest::Error) -> ProviderError {
    if error.is_timeout() {
        ProviderError::Timeout {
            provider: provider.to_string(),
        }
    } else {
        ProviderError::Transport {
            provider: provider.to_string(),
            message: error.to_string(),
        }
    }
}

/// Turn a non-2xx response into its error class.
pub(crate) async fn error_from_response(
    provider: &str,
    model: &str,
    response: reqwest::Response,
) -> ProviderError {
    let status = response.status();
    let retry_after = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_retry_after);
    let body = response.text().await.unwrap_or_default();
    classify_status(provider, model, status, retry_after, &body)
}

/// Only the delay-seconds form; HTTP dates are ignored.
pub(crate) fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

pub(crate) fn classify_status(
    provider: &str,
    model: &str,
    status: StatusCode,
    retry_after: Option<Duration>,
    body: &str,
) -> ProviderError {
    let provider = provider.to_string();
    let message = error_message(body);
    match status.as_u16() {
        429 => ProviderError::RateLimited {
            provider,
            retry_after,
        },
        408 => ProviderError::Timeout { provider },
        401 | 403 => ProviderError::Authentication { provider, message },
        404 => ProviderError::ModelNotFound {
            provider,
            model: model.to_string(),
        },
        code if status.is_server_error() => ProviderError::ServerError {
            provider,
            status: code,
            message,
        },
        code => ProviderError::BadRequest {
            provider,
            status: code,
            message,
        },
    }
}

/// `error.message` (OpenAI dialect) or top-level `message` (AWS), else the
/// raw body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v["error"]["message"]
                .as_str()
                .or_else(|| v["message"].as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_map_to_error_classes() {
        let classify = |code: u16, retry: Option<Duration>| {
            classify_status(
                "openai",
                "gpt-4o-mini",
                StatusCode::from_u16(code).unwrap(),
                retry,
                r#"{"error":{"message":"nope"}}"#,
            )
        };

        let limited = classify(429, Some(Duration::from_secs(7)));
        assert!(limited.is_transient());
        assert_eq!(limited.retry_after(), Some(Duration::from_secs(7)));
        assert!(matches!(classify(408, None), ProviderError::Timeout { .. }));
        assert!(matches!(
            classify(503, None),
            ProviderError::ServerError { status: 503, .. }
        ));
        assert!(matches!(
            classify(401, None),
            ProviderError::Authentication { ref message, .. } if message == "nope"
        ));
        assert!(matches!(classify(404, None), ProviderError::ModelNotFound { .. }));
        assert!(matches!(
            classify(422, None),
            ProviderError::BadRequest { status: 422, .. }
        ));
        assert!(!classify(400, None).is_transient());
    }

    #[test]
    fn error_message_reads_both_body_shapes() {
        assert_eq!(error_message(r#"{"error":{"message":"bad key"}}"#), "bad key");
        assert_eq!(
            error_message(r#"{"message":"The security token included in the request is invalid."}"#),
            "The security token included in the request is invalid."
        );
        assert_eq!(error_message(" upstream down \n"), "upstream down");
    }

    #[test]
    fn retry_after_seconds() {
        assert_eq!(parse_retry_after(" 12 "), Some(Duration::from_secs(12)));
        assert_eq!(parse_retry_after("Wed, 21 Oct 2025 07:28:00 GMT"), None);
    }

    #[test]
    fn client_builds_with_requested_timeout() {
        assert!(build_client("openai", Duration::from_secs(5)).is_ok());
        assert!(build_client("openai", Duration::from_millis(1)).is_ok());
    }
}
