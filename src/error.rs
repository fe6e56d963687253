//! Error types for genpress.
//!
//! Every fallible operation returns `Result<T, Error>`; expected failures
//! (rate limits, unknown providers, remote API errors) are variants, never
//! panics. Each variant carries a stable code that callers can match on.

use serde_json::Value;
use thiserror::Error;

/// Result type alias for genpress operations.
pub type Result<T> = std::result::Result<T, Error>;

/// genpress error types.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Unknown provider: {0}")]
    InvalidProvider(String),

    #[error("Provider '{provider}' does not support {capability} generation")]
    InvalidEndpoint {
        provider: String,
        capability: String,
    },

    #[error("API key is required for provider '{0}'")]
    MissingKey(String),

    #[error("Rate limit exceeded for provider '{provider}'. Retry in {retry_after_secs} seconds")]
    RateLimited {
        provider: String,
        retry_after_secs: u64,
    },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("API request failed ({status}): {message}")]
    Api {
        status: u16,
        message: String,
        raw: Option<Value>,
    },

    #[error("Workflow not found: {0}")]
    WorkflowNotFound(String),

    #[error("Unknown content type: {0}")]
    InvalidContentType(String),

    #[error("Invalid workflow data: {0}")]
    InvalidWorkflowData(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Get the stable error code for this variant.
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidProvider(_) => "INVALID_PROVIDER",
            Error::InvalidEndpoint { .. } => "INVALID_ENDPOINT",
            Error::MissingKey(_) => "MISSING_KEY",
            Error::RateLimited { .. } => "RATE_LIMITED",
            Error::Transport(_) => "TRANSPORT_ERROR",
            Error::Api { .. } => "API_ERROR",
            Error::WorkflowNotFound(_) => "WORKFLOW_NOT_FOUND",
            Error::InvalidContentType(_) => "INVALID_CONTENT_TYPE",
            Error::InvalidWorkflowData(_) => "INVALID_WORKFLOW_DATA",
            Error::Config(_) => "CONFIG_ERROR",
            Error::Database(_) => "DATABASE_ERROR",
            Error::Json(_) => "JSON_ERROR",
            Error::Yaml(_) => "YAML_ERROR",
            Error::Io(_) => "IO_ERROR",
        }
    }

    /// Retry guidance in seconds, when the error is retryable after a delay.
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            Error::RateLimited {
                retry_after_secs, ..
            } => Some(*retry_after_secs),
            _ => None,
        }
    }

    /// HTTP status of the remote failure, when one was received.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Error::Api { status, .. } => Some(*status),
            Error::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Convert to a structured JSON envelope for caller-facing surfaces.
    pub fn to_json(&self) -> Value {
        let mut error = serde_json::json!({
            "code": self.code(),
            "message": self.to_string(),
        });
        if let Some(secs) = self.retry_after_secs() {
            error["retry_after_secs"] = secs.into();
        }
        if let Some(status) = self.http_status() {
            error["http_status"] = status.into();
        }
        serde_json::json!({ "success": false, "error": error })
    }
}
