//! # Contracts
//!
//! Shared interface contracts for the relay: the data model that flows between the
//! dispatcher, its transports and the embedding application.
//! All business crates depend on this crate, reverse dependencies are prohibited.
//!
//! ## Delivery model
//! - A payload is an opaque `Bytes` value; nothing here inspects it
//! - Every processed payload yields exactly one [`Envelope`] for the installed callback

mod endpoint_id;
mod envelope;
mod error;
mod options;
mod transport;

pub use endpoint_id::EndpointId;
pub use envelope::*;
pub use error::*;
pub use options::*;
pub use transport::{LocalTransport, Transport};
