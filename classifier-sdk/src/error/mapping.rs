//! Error mapping for provider HTTP responses
//!
//! Converts a non-success status and body from either provider into a
//! normalized ClassifierError, keeping the transient kinds apart.

use reqwest::StatusCode;
use serde_json::Value;

use super::{ClassifierError, TransientKind};

/// Markers providers put in a 429 body when the account quota, not the request rate, is the problem
const QUOTA_MARKERS: [&str; 3] = ["resource_exhausted", "insufficient_quota", "quota"];

/// Pull a human-readable message out of an error body.
///
/// Both OpenAI and Gemini wrap errors as `{"error": {"message": ...}}`;
/// Gemini also adds a `status` such as `RESOURCE_EXHAUSTED`.
pub fn extract_error_message(body: &str) -> String {
    if let Ok(json) = serde_json::from_str::<Value>(body) {
        let error = json.get("error").unwrap_or(&json);
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .or_else(|| error.as_str());

        if let Some(message) = message {
            return match error.get("status").and_then(|s| s.as_str()) {
                Some(status) => format!("{} ({})", message, status),
                None => message.to_string(),
            };
        }
    }

    if body.is_empty() {
        "empty response body".to_string()
    } else if body.chars().count() > 200 {
        format!("{}...", body.chars().take(200).collect::<String>())
    } else {
        body.to_string()
    }
}

fn mentions_quota(body: &str) -> bool {
    let lower = body.to_lowercase();
    QUOTA_MARKERS.iter().any(|marker| lower.contains(marker))
}

/// Map an HTTP error response to a ClassifierError
pub fn map_http_error(status: StatusCode, body: &str) -> ClassifierError {
    let message = format!("{}: {}", status, extract_error_message(body));

    match status.as_u16() {
        429 if mentions_quota(body) => {
            ClassifierError::transient(TransientKind::QuotaExceeded, message)
        }
        429 => ClassifierError::transient(TransientKind::TooManyRequests, message),
        500 => ClassifierError::transient(TransientKind::InternalServerError, message),
        502 | 503 => ClassifierError::transient(TransientKind::ServiceUnavailable, message),
        408 | 504 => ClassifierError::transient(TransientKind::Timeout, message),
        400..=499 => ClassifierError::backend(message),
        _ => ClassifierError::unexpected(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_versus_quota() {
        let err = map_http_error(StatusCode::TOO_MANY_REQUESTS, "slow down");
        assert_eq!(err.transient_kind(), Some(TransientKind::TooManyRequests));

        let body = r#"{"error": {"code": 429, "message": "Quota exceeded for metric", "status": "RESOURCE_EXHAUSTED"}}"#;
        let err = map_http_error(StatusCode::TOO_MANY_REQUESTS, body);
        assert_eq!(err.transient_kind(), Some(TransientKind::QuotaExceeded));
        assert!(err.to_string().contains("Quota exceeded for metric"));
    }

    #[test]
    fn test_server_side_statuses_are_transient() {
        assert_eq!(
            map_http_error(StatusCode::INTERNAL_SERVER_ERROR, "").transient_kind(),
            Some(TransientKind::InternalServerError)
        );
        assert_eq!(
            map_http_error(StatusCode::SERVICE_UNAVAILABLE, "").transient_kind(),
            Some(TransientKind::ServiceUnavailable)
        );
        assert_eq!(
            map_http_error(StatusCode::GATEWAY_TIMEOUT, "").transient_kind(),
            Some(TransientKind::Timeout)
        );
    }

    #[test]
    fn test_client_errors_are_permanent() {
        let body = r#"{"error": {"message": "Incorrect API key provided", "type": "invalid_request_error"}}"#;
        let err = map_http_error(StatusCode::UNAUTHORIZED, body);
        assert!(matches!(err, ClassifierError::Backend(_)));
        assert!(err.to_string().contains("Incorrect API key provided"));
    }

    #[test]
    fn test_long_plain_bodies_are_truncated() {
        let body = "x".repeat(500);
        let message = extract_error_message(&body);
        assert_eq!(message.len(), 203);
    }
}
