//! YouTube-specific errors.

use serde::Deserialize;
use thiserror::Error;
use tributary_fetch::FetchError;

/// YouTube Data API error reasons the adapter reacts to.
#[derive(Debug, Error)]
pub enum YouTubeError {
    /// The project's daily quota is spent.
    #[error("YouTube quota exceeded ({0})")]
    QuotaExceeded(String),

    /// Too many requests in a short window.
    #[error("YouTube rate limit exceeded")]
    RateLimited,

    /// The API key was rejected.
    #[error("YouTube API key rejected: {0}")]
    InvalidKey(String),

    /// Any other API error.
    #[error("YouTube API error {status}: {message}")]
    Api {
        /// HTTP status.
        status: u16,
        /// API error message.
        message: String,
    },
}

impl From<YouTubeError> for FetchError {
    fn from(err: YouTubeError) -> Self {
        match err {
            YouTubeError::QuotaExceeded(reason) => FetchError::QuotaExceeded(reason),
            YouTubeError::RateLimited => FetchError::RateLimited { retry_after: None },
            YouTubeError::InvalidKey(msg) => FetchError::AuthenticationFailed(msg),
            YouTubeError::Api { status, message } => FetchError::Status {
                status,
                body: message,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    errors: Vec<ErrorItem>,
}

#[derive(Debug, Deserialize)]
struct ErrorItem {
    #[serde(default)]
    reason: String,
}

/// Re-classifies a generic status error using the API's error `reason`.
pub(crate) fn classify(err: FetchError) -> FetchError {
    let FetchError::Status { status, body } = err else {
        return err;
    };

    let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(&body) else {
        return FetchError::Status { status, body };
    };

    let reason = envelope
        .error
        .errors
        .first()
        .map(|e| e.reason.as_str())
        .unwrap_or_default();

    let classified = match reason {
        "quotaExceeded" | "dailyLimitExceeded" => YouTubeError::QuotaExceeded(reason.to_string()),
        "rateLimitExceeded" | "userRateLimitExceeded" => YouTubeError::RateLimited,
        "keyInvalid" | "keyExpired" | "forbidden" => {
            YouTubeError::InvalidKey(envelope.error.message)
        }
        _ => YouTubeError::Api {
            status,
            message: envelope.error.message,
        },
    };
    classified.into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(status: u16, reason: &str) -> FetchError {
        FetchError::Status {
            status,
            body: format!(
                r#"{{"error":{{"code":{status},"message":"msg","errors":[{{"reason":"{reason}"}}]}}}}"#
            ),
        }
    }

    #[test]
    fn test_quota_exceeded_is_classified() {
        let err = classify(status(403, "quotaExceeded"));
        assert!(matches!(err, FetchError::QuotaExceeded(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_rate_limit_is_retryable() {
        let err = classify(status(403, "rateLimitExceeded"));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_bad_key() {
        let err = classify(status(400, "keyInvalid"));
        assert!(matches!(err, FetchError::AuthenticationFailed(_)));
    }

    #[test]
    fn test_unparseable_body_passes_through() {
        let err = classify(FetchError::Status {
            status: 503,
            body: "<html>".into(),
        });
        assert!(matches!(err, FetchError::Status { status: 503, .. }));
        assert!(classify(FetchError::Timeout(1)).is_retryable());
    }
}
