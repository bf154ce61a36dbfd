//! Error type definitions
//!
//! Defines the main error types used throughout the automation client.

use thiserror::Error;

/// Main error type for the Suno automation client
#[derive(Error, Debug)]
pub enum Error {
    /// Bad or missing caller-supplied argument. Never retried.
    #[error("Invalid parameter '{0}': {1}")]
    Validation(String, String),

    /// Missing, invalid or expired credential set. Fatal for the current
    /// instance; the caller needs to refresh the account cookie.
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Non-2xx response from the upstream API
    #[error("Upstream API error (status {status}): {body}")]
    UpstreamApi {
        /// HTTP status code returned by the upstream API
        status: u16,
        /// Response body, as text
        body: String,
    },

    /// Upstream 403 indicating a paid-tier requirement
    #[error("Pro feature required: {0}")]
    ProFeature(String),

    /// The coordinate-solving service exhausted its retries or returned an
    /// unusable solution
    #[error("CAPTCHA error: {0}")]
    Captcha(String),

    /// Retryable browser/network fault, classified from the error text
    #[error("Transient browser error: {0}")]
    BrowserTransient(String),

    /// Non-transient browser automation failure
    #[error("Browser error: {0}")]
    Browser(String),

    /// A polling or wait budget was exhausted with no usable result
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network/HTTP client errors
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a validation error naming the offending parameter
    pub fn validation(param: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Validation(param.into(), msg.into())
    }

    /// Create an authentication error
    pub fn authentication(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create an upstream API error from a status code and body
    pub fn upstream(status: u16, body: impl Into<String>) -> Self {
        Self::UpstreamApi {
            status,
            body: body.into(),
        }
    }

    /// Create a pro-feature error
    pub fn pro_feature(msg: impl Into<String>) -> Self {
        Self::ProFeature(msg.into())
    }

    /// Create a CAPTCHA error
    pub fn captcha(msg: impl Into<String>) -> Self {
        Self::Captcha(msg.into())
    }

    /// Create a browser error, classifying it as transient when its text
    /// matches a known transient pattern
    pub fn browser(msg: impl Into<String>) -> Self {
        let msg = msg.into();
        if is_transient_text(&msg) {
            Self::BrowserTransient(msg)
        } else {
            Self::Browser(msg)
        }
    }

    /// Create a timeout error
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether the browser automation flow may retry after this error
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::BrowserTransient(_))
    }
}

/// Substring classification of transient browser/network faults.
///
/// Matching on error text is fragile, so every call site goes through this
/// single function. The patterns mirror the faults seen in practice:
/// network-level failures, navigation timeouts, closed targets and
/// element-wait timeouts.
pub fn is_transient_text(message: &str) -> bool {
    let msg = message.to_lowercase();
    const TRANSIENT_PATTERNS: &[&str] = &[
        "net::err_",
        "socket",
        "timeout",
        "navigation",
        "target closed",
        "browser has been closed",
        "waiting for selector",
        "connection reset",
    ];
    TRANSIENT_PATTERNS.iter().any(|p| msg.contains(p))
}

/// Whether an error from the challenge-solving loop is a benign race loss:
/// the interceptor tore the page down while the loop was mid-interaction.
pub fn is_benign_race_text(message: &str) -> bool {
    let msg = message.to_lowercase();
    msg.contains("been closed") || msg.contains("aborterror") || msg.contains("session closed")
}
