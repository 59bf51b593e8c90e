//! QUIC placeholder

use bytes::Bytes;

use contracts::{ContractError, EndpointId, Transport, TransportKind};

/// Reserved transport kind. Every send fails, which counts against the
/// endpoint's breaker like any other delivery error.
#[derive(Debug, Clone, Copy, Default)]
pub struct QuicTransport;

impl Transport for QuicTransport {
    async fn send(&self, _endpoint: &EndpointId, _payload: Bytes) -> Result<Bytes, ContractError> {
        Err(ContractError::UnsupportedTransport {
            kind: TransportKind::Quic.to_string(),
        })
    }
}
