//! Envelope - the result of processing one payload
//!
//! Produced by workers (or by the dispatcher itself on a callback fault) and
//! consumed exactly once by the installed callback.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::{ContractError, EndpointId};

/// Error half of an envelope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    /// Numeric code (HTTP status where one is known, otherwise 0)
    pub code: i32,
    /// Human-readable description, prefixed `[ERROR]` or `[PANIC]`
    pub message: String,
    /// Set on every surfaced failure; callers distinguish kinds by message
    pub critical: bool,
}

impl Failure {
    /// Failure reported by the transport
    pub fn transport(err: &ContractError) -> Self {
        Self {
            code: err.code(),
            message: format!("[ERROR] {err}"),
            critical: true,
        }
    }

    /// Panic caught at a worker loop boundary
    pub fn panic(message: impl std::fmt::Display) -> Self {
        Self {
            code: 0,
            message: format!("[PANIC] {message}"),
            critical: true,
        }
    }

    /// Panic caught at the callback consumer boundary
    pub fn global_panic(message: impl std::fmt::Display) -> Self {
        Self {
            code: 0,
            message: format!("[PANIC] global error: {message}"),
            critical: true,
        }
    }

    /// True if this failure came from a caught panic
    pub fn is_panic(&self) -> bool {
        self.message.starts_with("[PANIC]")
    }
}

/// Success or failure of one delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Response body returned by the endpoint
    Response(Bytes),
    /// Delivery failed
    Failure(Failure),
}

/// Result envelope handed to the callback
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "EnvelopeWire", try_from = "EnvelopeWire")]
pub struct Envelope {
    /// Originating endpoint (empty for dispatcher-level faults)
    pub endpoint: EndpointId,
    /// What happened
    pub outcome: Outcome,
}

impl Envelope {
    /// Successful delivery
    pub fn success(endpoint: EndpointId, response: Bytes) -> Self {
        Self {
            endpoint,
            outcome: Outcome::Response(response),
        }
    }

    /// Failed delivery
    pub fn failure(endpoint: EndpointId, failure: Failure) -> Self {
        Self {
            endpoint,
            outcome: Outcome::Failure(failure),
        }
    }

    /// Dispatcher-level fault, not tied to any endpoint
    pub fn dispatcher_panic(message: impl std::fmt::Display) -> Self {
        Self::failure(EndpointId::default(), Failure::global_panic(message))
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, Outcome::Response(_))
    }

    pub fn response(&self) -> Option<&Bytes> {
        match &self.outcome {
            Outcome::Response(body) => Some(body),
            Outcome::Failure(_) => None,
        }
    }

    pub fn failure_ref(&self) -> Option<&Failure> {
        match &self.outcome {
            Outcome::Failure(failure) => Some(failure),
            Outcome::Response(_) => None,
        }
    }
}

/// Flat wire shape: exactly one of `response` / `error` is set
#[derive(Serialize, Deserialize)]
struct EnvelopeWire {
    endpoint: EndpointId,
    success: bool,
    response: Option<Bytes>,
    error: Option<Failure>,
}

impl From<Envelope> for EnvelopeWire {
    fn from(envelope: Envelope) -> Self {
        let (success, response, error) = match envelope.outcome {
            Outcome::Response(body) => (true, Some(body), None),
            Outcome::Failure(failure) => (false, None, Some(failure)),
        };
        Self {
            endpoint: envelope.endpoint,
            success,
            response,
            error,
        }
    }
}

impl TryFrom<EnvelopeWire> for Envelope {
    type Error = String;

    fn try_from(wire: EnvelopeWire) -> Result<Self, Self::Error> {
        let outcome = match (wire.success, wire.response, wire.error) {
            (true, Some(body), None) => Outcome::Response(body),
            (false, None, Some(failure)) => Outcome::Failure(failure),
            _ => return Err("envelope must carry exactly one of response/error".to_string()),
        };
        Ok(Self {
            endpoint: wire.endpoint,
            outcome,
        })
    }
}
