//! RestTransport - HTTP POST per payload

use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use tracing::{instrument, trace};

use contracts::{ContractError, EndpointId, Transport};

/// POSTs the payload to the endpoint URL as `application/json`.
///
/// Any status other than 200 is an error. No request timeout is set: a hung
/// endpoint occupies its worker until the call returns.
#[derive(Debug, Clone)]
pub struct RestTransport {
    client: reqwest::Client,
}

impl RestTransport {
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = reqwest::ClientBuilder::new().build()?;
        Ok(Self { client })
    }

    /// Use a preconfigured client
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Transport for RestTransport {
    #[instrument(name = "rest_send", skip(self, payload), fields(endpoint = %endpoint, bytes = payload.len()))]
    async fn send(&self, endpoint: &EndpointId, payload: Bytes) -> Result<Bytes, ContractError> {
        let response = self
            .client
            .post(endpoint.as_str())
            .header(CONTENT_TYPE, "application/json")
            .body(payload)
            .send()
            .await
            .map_err(|e| ContractError::request(endpoint.as_str(), e.to_string()))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(ContractError::Status {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| ContractError::request(endpoint.as_str(), e.to_string()))?;
        trace!(status = status.as_u16(), bytes = body.len(), "Response received");
        Ok(body)
    }
}
