//! Transport trait - the capability that moves bytes to an endpoint
//!
//! The dispatcher never talks to the network itself; each worker hands its
//! payloads to a transport and classifies the outcome.

use bytes::Bytes;

use crate::{ContractError, EndpointId};

/// Delivery capability
///
/// One call is one attempt: implementations must not retry on their own.
/// A call may take as long as it needs; it only ever occupies the calling
/// worker, never the caller of `emit`.
#[trait_variant::make(Transport: Send)]
pub trait LocalTransport {
    /// Deliver `payload` to `endpoint` and return the response body.
    ///
    /// # Errors
    /// Any failure to deliver, including an unsuccessful response status.
    async fn send(&self, endpoint: &EndpointId, payload: Bytes) -> Result<Bytes, ContractError>;
}
