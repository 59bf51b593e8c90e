//! Dispatcher - endpoint set, routing and the single result consumer
//!
//! Workers push envelopes into one shared result channel. A supervised
//! consumer loop reads it and calls the installed callback, so callbacks
//! never run concurrently with each other.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::AtomicUsize;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use bytes::Bytes;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, trace};

use contracts::{DeliveryMode, EndpointId, Envelope, RelayOptions, RetryMode, Transport};

use crate::breaker::BreakerPolicy;
use crate::error::DispatcherError;
use crate::metrics::MetricsSnapshot;
use crate::router;
use crate::supervisor::supervise;
use crate::transports::Transports;
use crate::worker::Worker;

/// Consumer of result envelopes
pub type Callback = Arc<dyn Fn(Envelope) + Send + Sync>;

/// Dispatcher configuration
#[derive(Debug, Clone, PartialEq)]
pub struct DispatcherConfig {
    pub delivery_mode: DeliveryMode,
    /// Carried for callers that re-emit on failure; routing always advances
    pub retry_mode: RetryMode,
    pub policy: BreakerPolicy,
    /// Per-worker inbound queue capacity
    pub queue_capacity: usize,
    /// Shared result channel capacity
    pub result_capacity: usize,
}

impl DispatcherConfig {
    pub fn from_options(options: &RelayOptions) -> Self {
        let options = options.clone().with_defaults();
        Self {
            delivery_mode: options.delivery_mode,
            retry_mode: options.retry_mode,
            policy: BreakerPolicy::from_options(&options),
            queue_capacity: options.queue_capacity,
            result_capacity: options.result_capacity,
        }
    }
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self::from_options(&RelayOptions::default())
    }
}

/// Live worker sequence. Replaced wholesale on every structural change so
/// routing can work on a snapshot without holding the lock.
#[derive(Default)]
struct Roster {
    workers: Arc<Vec<Arc<Worker>>>,
    shut_down: bool,
}

impl Roster {
    fn position(&self, endpoint: &str) -> Option<usize> {
        self.workers.iter().position(|w| w.endpoint() == endpoint)
    }
}

/// State shared with the consumer loop
struct ConsumerCore {
    /// Only the active loop instance holds the lock
    results: tokio::sync::Mutex<mpsc::Receiver<Envelope>>,
    callback: RwLock<Option<Callback>>,
    stop_rx: watch::Receiver<bool>,
}

/// Routes payloads to per-endpoint workers and fans their results into one
/// callback.
pub struct Dispatcher<T> {
    config: DispatcherConfig,
    transport: Arc<T>,
    roster: RwLock<Roster>,
    cursor: AtomicUsize,
    results_tx: mpsc::Sender<Envelope>,
    consumer: Arc<ConsumerCore>,
    stop_tx: watch::Sender<bool>,
    consumer_handle: Mutex<Option<JoinHandle<()>>>,
}

impl<T> Dispatcher<T>
where
    T: Transport + Sync + 'static,
{
    /// Create a dispatcher with no endpoints and start its consumer loop.
    ///
    /// Must be called within a Tokio runtime.
    pub fn new(config: DispatcherConfig, transport: T) -> Self {
        let (results_tx, results_rx) = mpsc::channel(config.result_capacity.max(1));
        let (stop_tx, stop_rx) = watch::channel(false);

        let consumer = Arc::new(ConsumerCore {
            results: tokio::sync::Mutex::new(results_rx),
            callback: RwLock::new(None),
            stop_rx,
        });
        let consumer_handle = tokio::spawn(supervise_consumer(Arc::clone(&consumer)));

        Self {
            config,
            transport: Arc::new(transport),
            roster: RwLock::new(Roster::default()),
            cursor: AtomicUsize::new(0),
            results_tx,
            consumer,
            stop_tx,
            consumer_handle: Mutex::new(Some(consumer_handle)),
        }
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Register `endpoint`. Returns `false` if it already has a worker or the
    /// dispatcher has been shut down.
    #[instrument(name = "dispatcher_add_endpoint", skip(self))]
    pub fn add_endpoint(&self, endpoint: &str) -> bool {
        let mut roster = self.roster_mut();
        if roster.shut_down || roster.position(endpoint).is_some() {
            return false;
        }

        let mut workers = Vec::with_capacity(roster.workers.len() + 1);
        workers.extend(roster.workers.iter().cloned());
        workers.push(Arc::new(self.spawn_worker(endpoint.into())));
        roster.workers = Arc::new(workers);

        info!(endpoints = roster.workers.len(), "Endpoint added");
        true
    }

    /// Close and unregister `endpoint`. Payloads still queued for it are
    /// discarded. Returns `false` if it was not registered.
    #[instrument(name = "dispatcher_remove_endpoint", skip(self))]
    pub fn remove_endpoint(&self, endpoint: &str) -> bool {
        let mut roster = self.roster_mut();
        let Some(index) = roster.position(endpoint) else {
            return false;
        };

        let mut workers: Vec<_> = roster.workers.iter().cloned().collect();
        let removed = workers.remove(index);
        removed.close();
        roster.workers = Arc::new(workers);

        info!(endpoints = roster.workers.len(), "Endpoint removed");
        true
    }

    /// Reconcile the live set with `endpoints`.
    ///
    /// Workers for absent endpoints are closed; retained workers keep their
    /// order and state; new endpoints are appended in the order given.
    #[instrument(name = "dispatcher_sync_endpoints", skip(self, endpoints))]
    pub fn sync_endpoints<I, S>(&self, endpoints: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let wanted: Vec<EndpointId> = endpoints
            .into_iter()
            .map(|e| EndpointId::from(e.as_ref()))
            .collect();

        let mut roster = self.roster_mut();
        if roster.shut_down {
            return;
        }

        let mut workers = Vec::with_capacity(wanted.len());
        let mut removed = 0usize;
        for worker in roster.workers.iter() {
            if wanted.contains(worker.endpoint()) {
                workers.push(Arc::clone(worker));
            } else {
                worker.close();
                removed += 1;
            }
        }

        let mut added = 0usize;
        for endpoint in wanted {
            if workers.iter().any(|w| *w.endpoint() == endpoint) {
                continue;
            }
            workers.push(Arc::new(self.spawn_worker(endpoint)));
            added += 1;
        }

        if added == 0 && removed == 0 {
            trace!("Endpoint set unchanged");
            return;
        }
        roster.workers = Arc::new(workers);
        info!(added, removed, endpoints = roster.workers.len(), "Endpoints synced");
    }

    /// Install the result consumer, replacing any previous one for
    /// envelopes delivered from now on.
    pub fn set_callback<F>(&self, callback: F)
    where
        F: Fn(Envelope) + Send + Sync + 'static,
    {
        *self
            .consumer
            .callback
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(callback));
        debug!("Callback installed");
    }

    /// Queue `payload` according to the delivery mode.
    ///
    /// Returns once the payload is queued, which may wait for queue space.
    /// Results arrive through the callback.
    ///
    /// # Errors
    /// [`DispatcherError::AllEndpointsUnavailable`] when no endpoint can take
    /// the payload. Nothing is queued in that case.
    pub async fn emit(&self, payload: impl Into<Bytes>) -> Result<Vec<EndpointId>, DispatcherError> {
        let payload = payload.into();
        let workers = self.snapshot();

        match self.config.delivery_mode {
            DeliveryMode::RoundRobin => router::round_robin(&workers, &self.cursor, payload)
                .await
                .map(|endpoint| vec![endpoint]),
            DeliveryMode::Broadcast => router::broadcast(&workers, payload).await,
        }
    }

    /// Registered endpoints in routing order
    pub fn endpoints(&self) -> Vec<EndpointId> {
        self.snapshot()
            .iter()
            .map(|w| w.endpoint().clone())
            .collect()
    }

    /// Counter snapshot for every registered endpoint
    pub fn metrics(&self) -> Vec<(EndpointId, MetricsSnapshot)> {
        self.snapshot()
            .iter()
            .map(|w| (w.endpoint().clone(), w.metrics().snapshot()))
            .collect()
    }

    /// Whether `endpoint` is registered and not blocked
    pub fn is_available(&self, endpoint: &str) -> bool {
        self.snapshot()
            .iter()
            .any(|w| w.endpoint() == endpoint && w.is_available())
    }

    /// Stop every worker, then the consumer.
    ///
    /// In-flight deliveries finish; payloads still queued are discarded.
    /// Envelopes already in the result channel are handed to the callback
    /// before the consumer exits. Later `add_endpoint`/`sync_endpoints`
    /// calls are ignored and `emit` fails.
    #[instrument(name = "dispatcher_shutdown", skip(self))]
    pub async fn shutdown(&self) {
        let workers = {
            let mut roster = self.roster_mut();
            roster.shut_down = true;
            std::mem::take(&mut roster.workers)
        };

        for worker in workers.iter() {
            worker.close();
        }
        for worker in workers.iter() {
            worker.join().await;
        }

        self.stop_tx.send_replace(true);
        let handle = self
            .consumer_handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!(error = ?e, "Consumer supervisor failed");
            }
        }

        info!(workers = workers.len(), "Dispatcher shutdown complete");
    }

    fn spawn_worker(&self, endpoint: EndpointId) -> Worker {
        Worker::spawn(
            endpoint,
            Arc::clone(&self.transport),
            self.results_tx.clone(),
            self.config.policy,
            self.config.queue_capacity,
        )
    }

    fn snapshot(&self) -> Arc<Vec<Arc<Worker>>> {
        Arc::clone(
            &self
                .roster
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .workers,
        )
    }

    fn roster_mut(&self) -> std::sync::RwLockWriteGuard<'_, Roster> {
        self.roster.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> Drop for Dispatcher<T> {
    fn drop(&mut self) {
        let roster = self.roster.get_mut().unwrap_or_else(PoisonError::into_inner);
        for worker in roster.workers.iter() {
            worker.close();
        }
        self.stop_tx.send_replace(true);
    }
}

impl ConsumerCore {
    fn callback(&self) -> Option<Callback> {
        self.callback
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn deliver(&self, envelope: Envelope) {
        match self.callback() {
            Some(callback) => callback(envelope),
            None => trace!(endpoint = %envelope.endpoint, "No callback installed, envelope dropped"),
        }
    }
}

async fn supervise_consumer(core: Arc<ConsumerCore>) {
    supervise(
        "consumer",
        || consume_loop(Arc::clone(&core)),
        |message| {
            // The channel's only reader just crashed, so report directly.
            if let Some(callback) = core.callback() {
                let envelope = Envelope::dispatcher_panic(&message);
                if catch_unwind(AssertUnwindSafe(|| callback(envelope))).is_err() {
                    error!(panic = %message, "Callback panicked while handling its own fault");
                }
            }
            async {}
        },
    )
    .await;
}

async fn consume_loop(core: Arc<ConsumerCore>) {
    let mut results = core.results.lock().await;
    let mut stop = core.stop_rx.clone();

    loop {
        if *stop.borrow_and_update() {
            let mut drained = 0usize;
            while let Ok(envelope) = results.try_recv() {
                core.deliver(envelope);
                drained += 1;
            }
            debug!(drained, "Consumer loop stopped");
            return;
        }

        tokio::select! {
            biased;

            changed = stop.changed() => {
                if changed.is_err() {
                    return;
                }
            }
            envelope = results.recv() => {
                let Some(envelope) = envelope else {
                    return;
                };
                core.deliver(envelope);
            }
        }
    }
}

/// Build a dispatcher for `options`: defaults applied, transport created,
/// endpoints registered.
///
/// # Errors
/// Fails if the configured transport cannot be created.
#[instrument(
    name = "dispatcher_create",
    skip(options),
    fields(transport = %options.transport, endpoints = options.endpoints.len())
)]
pub fn create_dispatcher(options: &RelayOptions) -> Result<Dispatcher<Transports>, DispatcherError> {
    let options = options.clone().with_defaults();
    let transport = Transports::build(options.transport)?;
    let dispatcher = Dispatcher::new(DispatcherConfig::from_options(&options), transport);
    dispatcher.sync_endpoints(&options.endpoints);
    Ok(dispatcher)
}
