//! Relay run statistics.

use std::time::Duration;

use contracts::EndpointId;
use dispatcher::MetricsSnapshot;
use observability::DeliverySummary;

/// Statistics from a relay run
#[derive(Debug, Clone, Default)]
pub struct RelayStats {
    /// Total duration of the run
    pub duration: Duration,

    /// Worker counters captured just before shutdown
    pub endpoint_metrics: Vec<(EndpointId, MetricsSnapshot)>,

    /// What the callback saw
    pub delivery: DeliverySummary,
}

impl RelayStats {
    /// Accepted payloads per second
    pub fn throughput(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.delivery.emitted as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                      Relay Statistics                        ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("📊 Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Throughput: {:.2} payloads/s", self.throughput());
        println!("   └─ Endpoints: {}", self.endpoint_metrics.len());

        println!("\n{}", self.delivery);

        if !self.endpoint_metrics.is_empty() {
            println!("🔧 Workers");
            for (i, (endpoint, m)) in self.endpoint_metrics.iter().enumerate() {
                let prefix = if i == self.endpoint_metrics.len() - 1 {
                    "└─"
                } else {
                    "├─"
                };
                println!(
                    "   {} {}: delivered={} failed={} panics={} trips={} queued={}",
                    prefix,
                    endpoint,
                    m.delivered_count,
                    m.failure_count,
                    m.panic_count,
                    m.trip_count,
                    m.queue_len
                );
            }
        }

        println!();
    }
}
