//! Router - endpoint selection over a snapshot of the worker sequence
//!
//! Availability is checked without a lock over the whole selection, so it may
//! be stale by the time the payload is queued. A worker blocked in between just
//! receives one extra payload.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, trace};

use contracts::EndpointId;

use crate::error::DispatcherError;
use crate::worker::Worker;

/// Queue `payload` on the next available worker.
///
/// Tries each of the `N` workers at most once, starting at `cursor mod N`.
/// The cursor advances once per attempt, so skipped workers do not shift
/// the rotation onto their neighbour.
///
/// # Errors
/// [`DispatcherError::AllEndpointsUnavailable`] if every worker is blocked or
/// there are none; nothing is queued in that case.
pub async fn round_robin(
    workers: &[Arc<Worker>],
    cursor: &AtomicUsize,
    payload: Bytes,
) -> Result<EndpointId, DispatcherError> {
    let count = workers.len();

    for _ in 0..count {
        let index = cursor.fetch_add(1, Ordering::Relaxed) % count;
        let worker = &workers[index];

        if !worker.is_available() {
            trace!(endpoint = %worker.endpoint(), "Skipping blocked endpoint");
            continue;
        }

        match worker.enqueue(payload.clone()).await {
            Ok(()) => return Ok(worker.endpoint().clone()),
            Err(e) => {
                // Removed concurrently; its slot in this snapshot is stale.
                debug!(endpoint = %worker.endpoint(), error = %e, "Selected worker closed");
            }
        }
    }

    Err(DispatcherError::AllEndpointsUnavailable)
}

/// Queue `payload` on every available worker.
///
/// # Errors
/// [`DispatcherError::AllEndpointsUnavailable`] if no worker took it.
pub async fn broadcast(
    workers: &[Arc<Worker>],
    payload: Bytes,
) -> Result<Vec<EndpointId>, DispatcherError> {
    let mut delivered = Vec::with_capacity(workers.len());

    for worker in workers {
        if !worker.is_available() {
            trace!(endpoint = %worker.endpoint(), "Skipping blocked endpoint");
            continue;
        }
        match worker.enqueue(payload.clone()).await {
            Ok(()) => delivered.push(worker.endpoint().clone()),
            Err(e) => {
                debug!(endpoint = %worker.endpoint(), error = %e, "Broadcast target closed");
            }
        }
    }

    if delivered.is_empty() {
        return Err(DispatcherError::AllEndpointsUnavailable);
    }
    Ok(delivered)
}
