/// Error taxonomy shared across the backend client, tool layer, and config loader.
use serde_json::Value;
use thiserror::Error;

/// Errors raised by the pooled backend HTTP client.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("backend returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to decode backend response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl ClientError {
    pub fn message(&self) -> String {
        self.to_string()
    }
}

/// Domain-level error surfaced by a tool, mirroring `tools/base.py::ToolError`.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ToolError {
    pub message: String,
    pub code: String,
    pub details: Value,
}

impl ToolError {
    pub fn new(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: code.into(),
            details: Value::Null,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(message, "validation_error")
    }

    pub fn from_client_error(err: &ClientError) -> Self {
        Self::new(
            format!("Backend request failed: {}", err.message()),
            "veris_memory_error",
        )
        .with_details(serde_json::json!({ "original_error": err.message() }))
    }
}

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration file not found: {0}")]
    NotFound(String),

    #[error("failed to parse configuration file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
