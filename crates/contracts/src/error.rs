//! Layered error definitions
//!
//! Categorized by source: config / transport / general

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Transport Errors =====
    /// Request could not be sent or its response could not be read
    #[error("request to '{endpoint}' failed: {message}")]
    Request { endpoint: String, message: String },

    /// Endpoint answered with a status other than 200
    #[error("received non-200 response code {status} from '{endpoint}'")]
    Status { endpoint: String, status: u16 },

    /// Transport kind has no working implementation
    #[error("transport {kind} is not supported")]
    UnsupportedTransport { kind: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create transport request error
    pub fn request(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Request {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Numeric code carried by failure envelopes.
    ///
    /// The HTTP status for non-200 responses, 0 for everything else.
    pub fn code(&self) -> i32 {
        match self {
            Self::Status { status, .. } => i32::from(*status),
            _ => 0,
        }
    }
}
