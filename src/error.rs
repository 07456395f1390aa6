//! Sluice error types

use std::time::Duration;

/// Sluice error types
#[derive(Debug, thiserror::Error)]
pub enum SluiceError {
    // Provider/network errors
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("provider call timed out after {0:?}")]
    Timeout(Duration),

    #[error("empty response from model")]
    EmptyResponse,

    // Data errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("template not found: {0}")]
    TemplateNotFound(String),

    // Configuration errors
    /// Gateway has no provider credentials or is switched off.
    #[error("gateway not configured")]
    NotConfigured,

    #[error("configuration error: {0}")]
    Configuration(String),

    // Accounting store errors
    #[error("usage store error: {0}")]
    Store(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse error category, used by the gateway to pick a failure path and
/// as a metrics label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing credentials, disabled gateway, bad config or unknown template.
    Configuration,
    /// Network, timeout, or non-success reply from the LLM provider.
    Provider,
    /// Unparseable or incomplete structured data.
    Validation,
    /// Usage store write/read failure.
    Tracking,
}

impl ErrorKind {
    /// Label value for metrics and structured logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Configuration => "configuration",
            ErrorKind::Provider => "provider",
            ErrorKind::Validation => "validation",
            ErrorKind::Tracking => "tracking",
        }
    }
}

impl SluiceError {
    /// Category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SluiceError::Http(_)
            | SluiceError::Api { .. }
            | SluiceError::Timeout(_)
            | SluiceError::EmptyResponse => ErrorKind::Provider,
            SluiceError::Json(_) => ErrorKind::Validation,
            SluiceError::TemplateNotFound(_)
            | SluiceError::NotConfigured
            | SluiceError::Configuration(_) => ErrorKind::Configuration,
            SluiceError::Store(_) | SluiceError::Io(_) => ErrorKind::Tracking,
        }
    }

    /// Whether retrying the same request could succeed.
    ///
    /// The gateway itself never retries; this is for callers that wrap it
    /// in their own resilience layer.
    pub fn is_transient(&self) -> bool {
        match self {
            SluiceError::Http(_) | SluiceError::Timeout(_) | SluiceError::EmptyResponse => true,
            SluiceError::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Result type alias for Sluice operations
pub type Result<T> = std::result::Result<T, SluiceError>;
