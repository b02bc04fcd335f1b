//! Fetch error types.

use thiserror::Error;

// ============================================================================
// Main Fetch Error
// ============================================================================

/// Error type for fetch operations.
#[derive(Debug, Error)]
pub enum FetchError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Status {
        /// Response status code.
        status: u16,
        /// Response body (truncated).
        body: String,
    },

    /// Request timed out.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// Rate limited by the provider.
    #[error("Rate limited, retry after {retry_after:?} seconds")]
    RateLimited {
        /// Seconds to wait before retrying.
        retry_after: Option<u64>,
    },

    /// The provider reports the credential's quota is spent.
    #[error("Provider quota exceeded: {0}")]
    QuotaExceeded(String),

    /// Authentication failed.
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Invalid response from the provider.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// A checkpoint cursor could not be decoded.
    #[error("Invalid cursor: {0}")]
    InvalidCursor(String),

    /// A required provider option is missing or malformed.
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Core error.
    #[error("Core error: {0}")]
    Core(#[from] tributary_core::CoreError),

    /// Keychain error.
    #[error("Keychain error: {0}")]
    Keychain(#[from] KeychainError),

    /// Domain not allowed.
    #[error("Domain not allowed: {0}")]
    DomainNotAllowed(String),
}

impl FetchError {
    /// Whether retrying the same request could succeed.
    ///
    /// Connection failures, timeouts, rate limiting and 5xx responses are
    /// transient. Authentication, quota and parse failures are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(e) => {
                e.is_connect()
                    || e.is_timeout()
                    || e.status().is_some_and(|s| s.is_server_error())
            }
            Self::Status { status, .. } => *status >= 500 || *status == 408,
            Self::Timeout(_) | Self::RateLimited { .. } => true,
            _ => false,
        }
    }
}

impl From<HttpError> for FetchError {
    fn from(err: HttpError) -> Self {
        match err {
            HttpError::Request(e) => Self::Http(e),
            HttpError::DomainNotAllowed(d) => Self::DomainNotAllowed(d),
            HttpError::InvalidUrl(u) => Self::InvalidResponse(format!("invalid URL: {u}")),
            HttpError::Timeout => Self::Timeout(0),
        }
    }
}

// ============================================================================
// HTTP Error
// ============================================================================

/// HTTP-specific error type.
#[derive(Debug, Error)]
pub enum HttpError {
    /// Request error.
    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    /// Domain not allowed.
    #[error("Domain not allowed: {0}")]
    DomainNotAllowed(String),

    /// Invalid URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Timeout.
    #[error("Request timed out")]
    Timeout,
}

// ============================================================================
// Keychain Error
// ============================================================================

/// Why a keychain lookup failed.
#[derive(Debug, Error)]
pub enum KeychainError {
    /// The OS refused access to the store.
    #[error("Access denied to keychain")]
    AccessDenied,

    /// No usable keychain in this process.
    #[error("Keychain unavailable: {0}")]
    Unavailable(String),

    /// The platform store failed.
    #[error("Platform error: {0}")]
    Platform(String),

    /// Anything else `keyring` reports.
    #[error("Keychain error: {0}")]
    Other(String),
}

impl From<keyring::Error> for KeychainError {
    fn from(err: keyring::Error) -> Self {
        match err {
            keyring::Error::PlatformFailure(e) => KeychainError::Platform(e.to_string()),
            keyring::Error::NoStorageAccess(_) => KeychainError::AccessDenied,
            _ => KeychainError::Other(err.to_string()),
        }
    }
}

// ============================================================================
// Cache Error
// ============================================================================

/// Error type for cache backend operations.
///
/// These never reach callers of [`crate::cache::ResilientCache`]; they are
/// logged and counted there.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Could not connect to the backend.
    #[error("Cache connection failed: {0}")]
    Connection(String),

    /// A backend command failed.
    #[error("Cache command failed: {0}")]
    Command(String),

    /// A backend call exceeded its deadline.
    #[error("Cache operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The backend is deliberately unavailable.
    #[error("Cache backend unavailable")]
    Unavailable,
}

impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_connection_refusal() || err.is_connection_dropped() || err.is_io_error() {
            Self::Connection(err.to_string())
        } else {
            Self::Command(err.to_string())
        }
    }
}
