//! Worker - one actor per endpoint
//!
//! A worker owns a bounded queue, a circuit breaker and a supervised
//! processing loop. The loop hands each payload to the transport, feeds the
//! outcome to the breaker and pushes an [`Envelope`] to the shared result
//! channel.

use std::sync::{Arc, Mutex, PoisonError};

use bytes::Bytes;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument, trace, warn};

use contracts::{EndpointId, Envelope, Failure, Transport};

use crate::breaker::{BreakerPolicy, CircuitBreaker};
use crate::error::DispatcherError;
use crate::metrics::WorkerMetrics;
use crate::supervisor::supervise;

/// Handle to a running worker
pub struct Worker {
    endpoint: EndpointId,
    /// Inbound queue
    tx: mpsc::Sender<Bytes>,
    breaker: Arc<CircuitBreaker>,
    metrics: Arc<WorkerMetrics>,
    /// Stop flag observed by the processing loop
    stop_tx: watch::Sender<bool>,
    /// Supervisor task handle
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

/// State shared by every instance of the processing loop
struct WorkerCore<T> {
    endpoint: EndpointId,
    transport: Arc<T>,
    /// Lives outside the loop task so a crash leaves queued payloads intact.
    /// Holding the lock is what makes a loop instance the active consumer.
    queue: tokio::sync::Mutex<mpsc::Receiver<Bytes>>,
    stop_rx: watch::Receiver<bool>,
    results: mpsc::Sender<Envelope>,
    breaker: Arc<CircuitBreaker>,
    metrics: Arc<WorkerMetrics>,
}

impl Worker {
    /// Create a worker for `endpoint` and spawn its supervised loop.
    ///
    /// Must be called within a Tokio runtime.
    pub fn spawn<T>(
        endpoint: EndpointId,
        transport: Arc<T>,
        results: mpsc::Sender<Envelope>,
        policy: BreakerPolicy,
        queue_capacity: usize,
    ) -> Self
    where
        T: Transport + Sync + 'static,
    {
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let (stop_tx, stop_rx) = watch::channel(false);
        let breaker = Arc::new(CircuitBreaker::new(policy));
        let metrics = Arc::new(WorkerMetrics::new());

        let core = Arc::new(WorkerCore {
            endpoint: endpoint.clone(),
            transport,
            queue: tokio::sync::Mutex::new(rx),
            stop_rx,
            results,
            breaker: Arc::clone(&breaker),
            metrics: Arc::clone(&metrics),
        });

        let supervisor = tokio::spawn(supervise_worker(core));
        debug!(endpoint = %endpoint, "Worker started");

        Self {
            endpoint,
            tx,
            breaker,
            metrics,
            stop_tx,
            supervisor: Mutex::new(Some(supervisor)),
        }
    }

    pub fn endpoint(&self) -> &EndpointId {
        &self.endpoint
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn metrics(&self) -> &Arc<WorkerMetrics> {
        &self.metrics
    }

    /// Whether the router may pick this worker now
    pub fn is_available(&self) -> bool {
        self.breaker.is_available()
    }

    /// Queue a payload, waiting for space if the queue is full.
    ///
    /// # Errors
    /// [`DispatcherError::WorkerClosed`] once the worker has stopped.
    pub async fn enqueue(&self, payload: Bytes) -> Result<(), DispatcherError> {
        self.tx
            .send(payload)
            .await
            .map_err(|_| DispatcherError::WorkerClosed {
                endpoint: self.endpoint.clone(),
            })?;
        self.metrics
            .set_queue_len(self.tx.max_capacity() - self.tx.capacity());
        Ok(())
    }

    /// Signal the loop to stop. Queued payloads are abandoned; an in-flight
    /// delivery finishes first.
    pub fn close(&self) {
        self.stop_tx.send_replace(true);
        debug!(endpoint = %self.endpoint, "Worker close requested");
    }

    pub fn is_closed(&self) -> bool {
        *self.stop_tx.borrow()
    }

    /// Wait for the supervisor to finish. Returns at once if already joined.
    #[instrument(name = "worker_join", skip(self), fields(endpoint = %self.endpoint))]
    pub async fn join(&self) {
        let handle = self
            .supervisor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!(endpoint = %self.endpoint, error = ?e, "Worker supervisor failed");
            }
        }
    }

    /// Close and wait for the loop to exit
    pub async fn shutdown(&self) {
        self.close();
        self.join().await;
        debug!(endpoint = %self.endpoint, "Worker shutdown complete");
    }

    /// A worker with no loop; the caller reads the queue directly.
    #[cfg(test)]
    pub(crate) fn detached(endpoint: &str, capacity: usize) -> (Self, mpsc::Receiver<Bytes>) {
        let (tx, rx) = mpsc::channel(capacity);
        let (stop_tx, _) = watch::channel(false);
        let policy = BreakerPolicy {
            limit: 5,
            window: std::time::Duration::from_secs(3),
            timeout: std::time::Duration::from_secs(5),
        };
        let worker = Self {
            endpoint: endpoint.into(),
            tx,
            breaker: Arc::new(CircuitBreaker::new(policy)),
            metrics: Arc::new(WorkerMetrics::new()),
            stop_tx,
            supervisor: Mutex::new(None),
        };
        (worker, rx)
    }
}

async fn supervise_worker<T>(core: Arc<WorkerCore<T>>)
where
    T: Transport + Sync + 'static,
{
    let name = format!("worker[{}]", core.endpoint);
    supervise(
        &name,
        || process_loop(Arc::clone(&core)),
        |message| {
            let core = Arc::clone(&core);
            async move {
                core.metrics.inc_panic_count();
                // The in-flight payload is lost; queued ones are still there.
                core.emit(Envelope::failure(
                    core.endpoint.clone(),
                    Failure::panic(message),
                ))
                .await;
            }
        },
    )
    .await;
}

/// One instance of the processing loop
async fn process_loop<T>(core: Arc<WorkerCore<T>>)
where
    T: Transport + Sync + 'static,
{
    let mut queue = core.queue.lock().await;
    let mut stop = core.stop_rx.clone();

    if *stop.borrow_and_update() {
        queue.close();
        return;
    }

    loop {
        tokio::select! {
            biased;

            changed = stop.changed() => {
                // A dropped handle counts as a stop request.
                if changed.is_err() || *stop.borrow() {
                    queue.close();
                    debug!(endpoint = %core.endpoint, abandoned = queue.len(), "Worker loop stopped");
                    return;
                }
            }
            message = queue.recv() => {
                let Some(payload) = message else {
                    return;
                };
                core.metrics.set_queue_len(queue.len());
                core.process(payload).await;
            }
        }
    }
}

impl<T> WorkerCore<T>
where
    T: Transport + Sync + 'static,
{
    async fn process(&self, payload: Bytes) {
        trace!(endpoint = %self.endpoint, bytes = payload.len(), "Delivering");

        match self.transport.send(&self.endpoint, payload).await {
            Ok(response) => {
                self.breaker.reset();
                self.metrics.inc_delivered_count();
                self.emit(Envelope::success(self.endpoint.clone(), response))
                    .await;
            }
            Err(e) => {
                let verdict = self.breaker.record_failure();
                self.metrics.inc_failure_count();
                if verdict.tripped {
                    self.metrics.inc_trip_count();
                    warn!(
                        endpoint = %self.endpoint,
                        timeout_ms = self.breaker.policy().timeout.as_millis() as u64,
                        "Endpoint blocked after repeated failures"
                    );
                }
                debug!(
                    endpoint = %self.endpoint,
                    error = %e,
                    blocked = verdict.blocked,
                    "Delivery failed"
                );
                self.emit(Envelope::failure(
                    self.endpoint.clone(),
                    Failure::transport(&e),
                ))
                .await;
            }
        }
    }

    async fn emit(&self, envelope: Envelope) {
        if self.results.send(envelope).await.is_err() {
            debug!(endpoint = %self.endpoint, "Result channel closed, envelope dropped");
        }
    }
}
