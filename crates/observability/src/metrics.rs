//! 投递指标收集模块
//!
//! 面向 Prometheus 的记录函数，以及用于运行汇总的内存聚合器。
//! 两者的输入都是 envelope 和 emit 结果。

use std::collections::HashMap;

use contracts::{EndpointId, Envelope, Outcome};
use metrics::{counter, gauge, histogram};

/// 记录回调收到的一个 envelope
///
/// # Example
///
/// ```ignore
/// use observability::metrics::record_envelope;
///
/// dispatcher.set_callback(|envelope| {
///     record_envelope(&envelope);
///     // ...
/// });
/// ```
pub fn record_envelope(envelope: &Envelope) {
    let endpoint = envelope.endpoint.to_string();
    match &envelope.outcome {
        Outcome::Response(body) => {
            counter!("relay_envelopes_total", "endpoint" => endpoint, "status" => "success")
                .increment(1);
            histogram!("relay_response_bytes").record(body.len() as f64);
        }
        Outcome::Failure(failure) => {
            let status = if failure.is_panic() { "panic" } else { "failure" };
            counter!(
                "relay_envelopes_total",
                "endpoint" => endpoint,
                "status" => status
            )
            .increment(1);
            if failure.code != 0 {
                counter!("relay_failure_codes_total", "code" => failure.code.to_string())
                    .increment(1);
            }
        }
    }
}

/// 记录一次 `emit` 调用的结果
pub fn record_emit(accepted: bool, targets: usize) {
    let status = if accepted { "accepted" } else { "rejected" };
    counter!("relay_emits_total", "status" => status).increment(1);
    if accepted {
        histogram!("relay_emit_targets").record(targets as f64);
    }
}

/// 记录当前 endpoint 数量
pub fn record_endpoint_count(count: usize) {
    gauge!("relay_endpoints").set(count as f64);
}

/// 记录当前被熔断的 endpoint 数量
pub fn record_blocked_endpoints(count: usize) {
    gauge!("relay_endpoints_blocked").set(count as f64);
}

/// 记录 worker 队列深度
pub fn record_queue_depth(endpoint: &str, depth: usize) {
    gauge!("relay_queue_depth", "endpoint" => endpoint.to_string()).set(depth as f64);
}

/// 单个 endpoint 的 envelope 计数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EndpointCounts {
    pub successes: u64,
    pub failures: u64,
    pub panics: u64,
}

impl EndpointCounts {
    pub fn total(&self) -> u64 {
        self.successes + self.failures + self.panics
    }
}

/// 投递指标聚合器
///
/// 在内存中聚合，用于运行结束时的汇总。
#[derive(Debug, Clone, Default)]
pub struct DeliveryMetricsAggregator {
    /// 被 `emit` 接受的负载数
    pub emitted: u64,

    /// 因无可用 endpoint 被拒绝的 `emit` 调用数
    pub rejected: u64,

    /// 已接受负载应返回的 envelope 数（每个目标 endpoint 一个）
    pub expected_envelopes: u64,

    /// 已收到的 envelope 数
    pub total_envelopes: u64,

    /// 分发器自身报告的故障（endpoint 为空）
    pub dispatcher_faults: u64,

    /// 响应体大小（字节）
    pub response_size: RunningStats,

    /// 按 endpoint 统计的计数
    pub per_endpoint: HashMap<EndpointId, EndpointCounts>,
}

impl DeliveryMetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_emit(&mut self, accepted: bool) {
        if accepted {
            self.emitted += 1;
        } else {
            self.rejected += 1;
        }
    }

    /// 登记一个已接受负载之后将返回 `targets` 个 envelope
    pub fn expect_envelopes(&mut self, targets: usize) {
        self.expected_envelopes += targets as u64;
    }

    /// 尚未返回的 envelope 数
    pub fn pending(&self) -> u64 {
        let received: u64 = self.per_endpoint.values().map(EndpointCounts::total).sum();
        self.expected_envelopes.saturating_sub(received)
    }

    pub fn update(&mut self, envelope: &Envelope) {
        self.total_envelopes += 1;

        if envelope.endpoint.is_empty() {
            self.dispatcher_faults += 1;
            return;
        }

        let counts = self
            .per_endpoint
            .entry(envelope.endpoint.clone())
            .or_default();
        match &envelope.outcome {
            Outcome::Response(body) => {
                counts.successes += 1;
                self.response_size.push(body.len() as f64);
            }
            Outcome::Failure(failure) if failure.is_panic() => counts.panics += 1,
            Outcome::Failure(_) => counts.failures += 1,
        }
    }

    /// 某个 endpoint 的计数（未产生 envelope 时为 None）
    pub fn endpoint(&self, endpoint: &str) -> Option<&EndpointCounts> {
        self.per_endpoint.get(endpoint)
    }

    pub fn summary(&self) -> DeliverySummary {
        let successes: u64 = self.per_endpoint.values().map(|c| c.successes).sum();
        let mut endpoints: Vec<_> = self
            .per_endpoint
            .iter()
            .map(|(endpoint, counts)| (endpoint.clone(), *counts))
            .collect();
        endpoints.sort_by(|a, b| a.0.as_str().cmp(b.0.as_str()));

        DeliverySummary {
            emitted: self.emitted,
            rejected: self.rejected,
            total_envelopes: self.total_envelopes,
            dispatcher_faults: self.dispatcher_faults,
            success_rate: if self.total_envelopes > 0 {
                successes as f64 / self.total_envelopes as f64 * 100.0
            } else {
                0.0
            },
            response_bytes: StatsSummary::from(&self.response_size),
            endpoints,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// [`DeliveryMetricsAggregator`] 的快照
#[derive(Debug, Clone, Default)]
pub struct DeliverySummary {
    pub emitted: u64,
    pub rejected: u64,
    pub total_envelopes: u64,
    pub dispatcher_faults: u64,
    pub success_rate: f64,
    pub response_bytes: StatsSummary,
    /// 按 endpoint 排序
    pub endpoints: Vec<(EndpointId, EndpointCounts)>,
}

impl std::fmt::Display for DeliverySummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Delivery Summary ===")?;
        writeln!(f, "Emitted: {} (rejected: {})", self.emitted, self.rejected)?;
        writeln!(
            f,
            "Envelopes: {} ({:.2}% success)",
            self.total_envelopes, self.success_rate
        )?;
        if self.dispatcher_faults > 0 {
            writeln!(f, "Dispatcher faults: {}", self.dispatcher_faults)?;
        }
        writeln!(f, "Response size (bytes): {}", self.response_bytes)?;

        if !self.endpoints.is_empty() {
            writeln!(f, "Per endpoint:")?;
            for (endpoint, counts) in &self.endpoints {
                writeln!(
                    f,
                    "  {}: ok={} failed={} panicked={}",
                    endpoint, counts.successes, counts.failures, counts.panics
                )?;
            }
        }

        Ok(())
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.1}, max={:.1}, mean={:.1}, std={:.1} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计（Welford 算法）
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 样本方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}
