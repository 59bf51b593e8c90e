//! Dispatcher error types

use contracts::EndpointId;
use thiserror::Error;

/// Dispatcher-specific errors
#[derive(Debug, Error)]
pub enum DispatcherError {
    /// No registered endpoint can take the payload right now
    #[error("all endpoints are blocked due to unavailability")]
    AllEndpointsUnavailable,

    /// The worker stopped before the payload could be queued
    #[error("worker for '{endpoint}' is closed")]
    WorkerClosed { endpoint: EndpointId },

    /// Transport creation error
    #[error("failed to create {kind} transport: {message}")]
    TransportCreation { kind: String, message: String },

    /// Error from a shared contract
    #[error("contract error: {0}")]
    Contract(#[from] contracts::ContractError),
}

impl DispatcherError {
    /// Create a transport creation error
    pub fn transport_creation(kind: impl ToString, message: impl Into<String>) -> Self {
        Self::TransportCreation {
            kind: kind.to_string(),
            message: message.into(),
        }
    }
}
