//! Transport doubles for unit tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use bytes::Bytes;
use tokio::sync::{Notify, Semaphore};

use contracts::{ContractError, EndpointId, Transport};

/// Scripted by payload: `fail…` errors, `panic…` panics, anything else is
/// answered with `"{endpoint}:{payload}"`. Endpoints in `failing` always error.
#[derive(Default)]
pub(crate) struct MockTransport {
    failing: Vec<String>,
    calls: Mutex<Vec<(EndpointId, Bytes)>>,
}

impl MockTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn failing(endpoints: &[&str]) -> Self {
        Self {
            failing: endpoints.iter().map(|e| e.to_string()).collect(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn calls(&self) -> Vec<(EndpointId, Bytes)> {
        self.calls.lock().unwrap().clone()
    }
}

impl Transport for MockTransport {
    async fn send(&self, endpoint: &EndpointId, payload: Bytes) -> Result<Bytes, ContractError> {
        self.calls
            .lock()
            .unwrap()
            .push((endpoint.clone(), payload.clone()));

        if payload.starts_with(b"panic") {
            panic!("transport exploded on {endpoint}");
        }
        if payload.starts_with(b"fail") || self.failing.iter().any(|e| e == endpoint.as_str()) {
            return Err(ContractError::Status {
                endpoint: endpoint.to_string(),
                status: 500,
            });
        }

        let mut body = format!("{endpoint}:").into_bytes();
        body.extend_from_slice(&payload);
        Ok(Bytes::from(body))
    }
}

/// Echoes the payload, but each call waits for a permit from [`release`](Self::release)
pub(crate) struct GatedTransport {
    gate: Semaphore,
    started: AtomicUsize,
    started_notify: Notify,
}

impl GatedTransport {
    pub(crate) fn new() -> Self {
        Self {
            gate: Semaphore::new(0),
            started: AtomicUsize::new(0),
            started_notify: Notify::new(),
        }
    }

    pub(crate) fn release(&self, permits: usize) {
        self.gate.add_permits(permits);
    }

    /// Wait until at least one call is in flight
    pub(crate) async fn wait_started(&self) {
        loop {
            let notified = self.started_notify.notified();
            if self.started.load(Ordering::SeqCst) > 0 {
                return;
            }
            notified.await;
        }
    }
}

impl Transport for GatedTransport {
    async fn send(&self, _endpoint: &EndpointId, payload: Bytes) -> Result<Bytes, ContractError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        self.started_notify.notify_waiters();
        let permit = self
            .gate
            .acquire()
            .await
            .map_err(|e| ContractError::Other(e.to_string()))?;
        permit.forget();
        Ok(payload)
    }
}
