//! Relay orchestrator - wires the dispatcher to a payload source.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use bytes::Bytes;
use contracts::{Envelope, Outcome, RelayOptions};
use dispatcher::{Dispatcher, Transports};
use observability::{
    record_blocked_endpoints, record_emit, record_endpoint_count, record_envelope,
    record_queue_depth, DeliveryMetricsAggregator,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

use super::RelayStats;
use crate::error::CliError;

/// Time allowed for in-flight deliveries once emission ends
const DRAIN_GRACE: Duration = Duration::from_secs(5);

/// Where payloads come from
#[derive(Debug, Clone)]
pub enum PayloadSource {
    /// `1`, `2`, `3`, ... one per interval
    Counter { interval: Duration },
    /// One payload per non-empty stdin line
    Stdin,
}

/// Relay configuration
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Validated dispatcher options
    pub options: RelayOptions,

    pub source: PayloadSource,

    /// Maximum number of payloads to emit (None = unlimited)
    pub max_payloads: Option<u64>,

    /// Run timeout (None = no timeout)
    pub timeout: Option<Duration>,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,
}

type SharedAggregator = Arc<Mutex<DeliveryMetricsAggregator>>;

/// Main relay orchestrator
pub struct Relay {
    config: RelayConfig,
}

impl Relay {
    pub fn new(config: RelayConfig) -> Self {
        Self { config }
    }

    /// Emit until the source is exhausted, the limit or timeout is reached,
    /// or `shutdown` resolves; then shut the dispatcher down.
    pub async fn run(self, shutdown: impl Future<Output = ()>) -> Result<RelayStats> {
        let start_time = Instant::now();

        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        let dispatcher = dispatcher::create_dispatcher(&self.config.options)
            .map_err(CliError::from)
            .context("Failed to create dispatcher")?;
        let endpoints = dispatcher.endpoints();
        record_endpoint_count(endpoints.len());
        info!(
            endpoints = endpoints.len(),
            mode = ?dispatcher.config().delivery_mode,
            "Dispatcher started"
        );

        let aggregator: SharedAggregator = Arc::default();
        install_callback(&dispatcher, Arc::clone(&aggregator));

        let emission = async {
            match self.config.timeout {
                Some(timeout) => match tokio::time::timeout(timeout, self.emit_all(&dispatcher, &aggregator)).await {
                    Ok(result) => result,
                    Err(_) => {
                        warn!(timeout_secs = timeout.as_secs(), "Relay timed out");
                        Ok(())
                    }
                },
                None => self.emit_all(&dispatcher, &aggregator).await,
            }
        };

        let interrupted = tokio::select! {
            result = emission => {
                result?;
                false
            }
            _ = shutdown => {
                warn!("Received shutdown signal, stopping relay...");
                true
            }
        };

        if !interrupted {
            wait_for_results(&aggregator).await;
        }

        let endpoint_metrics = dispatcher.metrics();

        info!("Shutting down dispatcher...");
        if tokio::time::timeout(DRAIN_GRACE, dispatcher.shutdown())
            .await
            .is_err()
        {
            warn!(
                error = %CliError::shutdown("dispatcher did not stop within the grace period"),
                "Shutdown incomplete"
            );
        }

        let delivery = lock(&aggregator).summary();
        let stats = RelayStats {
            duration: start_time.elapsed(),
            endpoint_metrics,
            delivery,
        };

        info!(
            emitted = stats.delivery.emitted,
            envelopes = stats.delivery.total_envelopes,
            duration_secs = stats.duration.as_secs_f64(),
            "Relay shutdown complete"
        );

        Ok(stats)
    }

    async fn emit_all(
        &self,
        dispatcher: &Dispatcher<Transports>,
        aggregator: &SharedAggregator,
    ) -> Result<()> {
        let mut attempted: u64 = 0;

        match &self.config.source {
            PayloadSource::Counter { interval } => {
                let mut ticker = tokio::time::interval(*interval);
                while !self.limit_reached(attempted) {
                    ticker.tick().await;
                    attempted += 1;
                    emit_one(dispatcher, aggregator, Bytes::from(attempted.to_string())).await;
                }
            }
            PayloadSource::Stdin => {
                let mut lines = BufReader::new(tokio::io::stdin()).lines();
                while !self.limit_reached(attempted) {
                    let Some(line) = lines.next_line().await.context("Failed to read stdin")? else {
                        info!("Stdin closed");
                        break;
                    };
                    if line.trim().is_empty() {
                        continue;
                    }
                    attempted += 1;
                    emit_one(dispatcher, aggregator, Bytes::from(line)).await;
                }
            }
        }

        info!(attempted, "Emission finished");
        Ok(())
    }

    fn limit_reached(&self, attempted: u64) -> bool {
        self.config.max_payloads.is_some_and(|max| attempted >= max)
    }
}

fn install_callback(dispatcher: &Dispatcher<Transports>, aggregator: SharedAggregator) {
    dispatcher.set_callback(move |envelope: Envelope| {
        record_envelope(&envelope);
        log_envelope(&envelope);
        lock(&aggregator).update(&envelope);
    });
}

fn log_envelope(envelope: &Envelope) {
    match &envelope.outcome {
        Outcome::Response(body) => info!(
            endpoint = %envelope.endpoint,
            response = %String::from_utf8_lossy(body),
            "Delivered"
        ),
        Outcome::Failure(failure) => warn!(
            endpoint = %envelope.endpoint,
            code = failure.code,
            error = %failure.message,
            "Delivery failed"
        ),
    }
}

async fn emit_one(dispatcher: &Dispatcher<Transports>, aggregator: &SharedAggregator, payload: Bytes) {
    match dispatcher.emit(payload).await {
        Ok(targets) => {
            debug!(targets = ?targets, "Payload queued");
            record_emit(true, targets.len());
            let mut aggregator = lock(aggregator);
            aggregator.record_emit(true);
            aggregator.expect_envelopes(targets.len());
        }
        Err(e) => {
            warn!(error = %e, "Payload rejected");
            record_emit(false, 0);
            lock(aggregator).record_emit(false);
        }
    }

    let snapshot = dispatcher.metrics();
    let blocked = snapshot
        .iter()
        .filter(|(endpoint, _)| !dispatcher.is_available(endpoint))
        .count();
    record_blocked_endpoints(blocked);
    for (endpoint, metrics) in &snapshot {
        record_queue_depth(endpoint, metrics.queue_len);
    }
}

/// Wait until every queued payload has produced an envelope, or the grace
/// period runs out.
async fn wait_for_results(aggregator: &SharedAggregator) {
    let drained = tokio::time::timeout(DRAIN_GRACE, async {
        loop {
            if lock(aggregator).pending() == 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await;

    if drained.is_err() {
        warn!(
            pending = lock(aggregator).pending(),
            "Gave up waiting for outstanding results"
        );
    }
}

fn lock(aggregator: &SharedAggregator) -> std::sync::MutexGuard<'_, DeliveryMetricsAggregator> {
    aggregator.lock().unwrap_or_else(PoisonError::into_inner)
}
