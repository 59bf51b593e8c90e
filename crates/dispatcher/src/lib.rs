//! # Dispatcher
//!
//! 负载分发模块。
//!
//! 负责：
//! - 将每个负载路由到可用 endpoint（或广播到全部）
//! - 通过滑动窗口熔断器暂时隔离失败的 endpoint
//! - 崩溃的循环自动重启，不丢失已排队的负载

pub mod breaker;
pub mod dispatcher;
pub mod error;
pub mod metrics;
pub mod router;
mod supervisor;
pub mod transports;
pub mod worker;

#[cfg(test)]
mod testing;

pub use breaker::{BreakerPolicy, CircuitBreaker, FailureVerdict};
pub use contracts::{EndpointId, Envelope, Failure, Outcome, Transport};
pub use dispatcher::{create_dispatcher, Callback, Dispatcher, DispatcherConfig};
pub use error::DispatcherError;
pub use metrics::{MetricsSnapshot, WorkerMetrics};
pub use transports::{QuicTransport, RestTransport, Transports};
pub use worker::Worker;
