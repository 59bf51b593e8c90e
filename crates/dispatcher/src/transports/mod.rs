//! Transport implementations selectable by [`TransportKind`]

mod quic;
mod rest;

pub use quic::QuicTransport;
pub use rest::RestTransport;

use bytes::Bytes;

use contracts::{ContractError, EndpointId, Transport, TransportKind};

use crate::error::DispatcherError;

/// Transport chosen from configuration
#[derive(Debug, Clone)]
pub enum Transports {
    Rest(RestTransport),
    Quic(QuicTransport),
}

impl Transports {
    /// Create the transport for `kind`
    pub fn build(kind: TransportKind) -> Result<Self, DispatcherError> {
        match kind {
            TransportKind::Rest => Ok(Self::Rest(
                RestTransport::new().map_err(|e| DispatcherError::transport_creation(kind, e.to_string()))?,
            )),
            TransportKind::Quic => Ok(Self::Quic(QuicTransport)),
        }
    }

    pub fn kind(&self) -> TransportKind {
        match self {
            Self::Rest(_) => TransportKind::Rest,
            Self::Quic(_) => TransportKind::Quic,
        }
    }
}

impl Transport for Transports {
    async fn send(&self, endpoint: &EndpointId, payload: Bytes) -> Result<Bytes, ContractError> {
        match self {
            Self::Rest(t) => t.send(endpoint, payload).await,
            Self::Quic(t) => t.send(endpoint, payload).await,
        }
    }
}
