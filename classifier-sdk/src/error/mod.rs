//! Error handling for the classifier
//!
//! Every failure is categorised so the caller can tell a retry-worthy
//! backend hiccup from a malformed answer or a broken configuration, and
//! so each kind lands on its own sentinel in the result table.

use std::fmt;
use thiserror::Error;

use crate::taxonomy::Sentinel;

pub mod mapping;

/// Result type for classifier operations
pub type Result<T> = std::result::Result<T, ClassifierError>;

/// Transient failure kinds reported by a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransientKind {
    /// Provider quota or resource budget exhausted
    QuotaExceeded,
    /// Too many requests in the current window
    TooManyRequests,
    /// Service temporarily unavailable or unreachable
    ServiceUnavailable,
    /// Provider-side internal error
    InternalServerError,
    /// The call did not finish within its timeout
    Timeout,
}

impl fmt::Display for TransientKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransientKind::QuotaExceeded => "quota exceeded",
            TransientKind::TooManyRequests => "too many requests",
            TransientKind::ServiceUnavailable => "service unavailable",
            TransientKind::InternalServerError => "internal server error",
            TransientKind::Timeout => "timeout",
        };
        f.write_str(name)
    }
}

/// Main error type for the classifier
#[derive(Error, Debug)]
pub enum ClassifierError {
    /// Backend failures that may succeed when retried
    #[error("Transient backend error ({kind}): {message}")]
    Transient {
        kind: TransientKind,
        message: String,
    },

    /// Response body could not be decoded as JSON
    #[error("JSON error: {0}")]
    Json(String),

    /// Response did not have the expected structure
    #[error("Format error: {0}")]
    Format(String),

    /// Permanent backend errors (bad request, authentication, ...)
    #[error("Backend error: {0}")]
    Backend(String),

    /// Invalid configuration detected before any work started
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Work was abandoned because the run was cancelled
    #[error("Operation cancelled")]
    Cancelled,

    /// Anything not covered above
    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl ClassifierError {
    /// Create a transient error of the given kind
    pub fn transient(kind: TransientKind, message: impl Into<String>) -> Self {
        ClassifierError::Transient {
            kind,
            message: message.into(),
        }
    }

    /// Create a JSON decoding error
    pub fn json(message: impl Into<String>) -> Self {
        ClassifierError::Json(message.into())
    }

    /// Create a format error
    pub fn format(message: impl Into<String>) -> Self {
        ClassifierError::Format(message.into())
    }

    /// Create a permanent backend error
    pub fn backend(message: impl Into<String>) -> Self {
        ClassifierError::Backend(message.into())
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        ClassifierError::Configuration(message.into())
    }

    /// Create an unexpected error
    pub fn unexpected(message: impl Into<String>) -> Self {
        ClassifierError::Unexpected(message.into())
    }

    /// Check if this is a transient backend failure
    pub fn is_transient(&self) -> bool {
        matches!(self, ClassifierError::Transient { .. })
    }

    /// The transient kind, if any
    pub fn transient_kind(&self) -> Option<TransientKind> {
        match self {
            ClassifierError::Transient { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Sentinel recorded when a single-item classification fails with this error
    pub fn sentinel(&self) -> Sentinel {
        match self {
            ClassifierError::Transient { .. } => Sentinel::Api,
            ClassifierError::Json(_) => Sentinel::Json,
            ClassifierError::Format(_) => Sentinel::Format,
            ClassifierError::Cancelled => Sentinel::NotClassified,
            _ => Sentinel::General,
        }
    }

    /// Sentinel recorded for every row of a chunk whose batch call failed with this error
    pub fn batch_sentinel(&self) -> Sentinel {
        match self {
            ClassifierError::Transient { .. } => Sentinel::Api,
            ClassifierError::Json(_) => Sentinel::Json,
            ClassifierError::Format(_) => Sentinel::Format,
            ClassifierError::Cancelled => Sentinel::NotClassified,
            _ => Sentinel::Batch,
        }
    }
}

/// Convert reqwest errors to ClassifierError
impl From<reqwest::Error> for ClassifierError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ClassifierError::transient(
                TransientKind::Timeout,
                format!("Request timed out: {}", err),
            )
        } else if err.is_connect() {
            ClassifierError::transient(
                TransientKind::ServiceUnavailable,
                format!("Connection error: {}", err),
            )
        } else if err.is_decode() {
            ClassifierError::json(format!("Response decode error: {}", err))
        } else {
            ClassifierError::unexpected(format!("HTTP client error: {}", err))
        }
    }
}

/// Convert serde_json errors to ClassifierError
impl From<serde_json::Error> for ClassifierError {
    fn from(err: serde_json::Error) -> Self {
        ClassifierError::json(err.to_string())
    }
}
