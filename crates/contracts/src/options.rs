//! RelayOptions - configuration surface of the dispatcher
//!
//! Produced by the config loader (or built in code) and consumed by
//! `dispatcher::create_dispatcher`. Zero values mean "unset" and are replaced
//! by [`RelayOptions::with_defaults`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Default number of failures tolerated inside the window
pub const DEFAULT_RETRY_LIMIT: usize = 5;
/// Default block duration of a tripped endpoint
pub const DEFAULT_RETRY_TIMEOUT: Duration = Duration::from_secs(5);
/// Default failure-counting window
pub const DEFAULT_RETRY_WINDOW: Duration = Duration::from_secs(3);
/// Default capacity of each worker's inbound queue
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;
/// Default capacity of the shared result channel
pub const DEFAULT_RESULT_CAPACITY: usize = 100;

/// Wire transport used to reach endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    /// HTTP POST of the payload
    #[default]
    #[serde(alias = "REST")]
    Rest,
    /// Reserved; not implemented
    #[serde(alias = "QUIC")]
    Quic,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rest => f.write_str("REST"),
            Self::Quic => f.write_str("QUIC"),
        }
    }
}

/// How many endpoints receive each payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMode {
    /// Exactly one endpoint, chosen in turn
    #[default]
    RoundRobin,
    /// Every available endpoint
    Broadcast,
}

/// Where a caller-driven retry should land
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryMode {
    /// Retry on the endpoint that failed
    Repeat,
    /// Retry on the next available endpoint
    #[default]
    Next,
}

/// Dispatcher configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayOptions {
    /// Transport kind
    #[serde(default)]
    pub transport: TransportKind,

    /// Delivery mode
    #[serde(default)]
    pub delivery_mode: DeliveryMode,

    /// Retry mode
    #[serde(default)]
    pub retry_mode: RetryMode,

    /// Initial endpoint set; may be changed at runtime
    #[serde(default)]
    pub endpoints: Vec<String>,

    /// Failures tolerated inside `retry_window` before the endpoint is blocked
    #[serde(default = "default_retry_limit")]
    pub retry_limit: usize,

    /// How long a tripped endpoint is excluded from selection
    #[serde(rename = "retry_timeout_ms", with = "millis", default = "default_retry_timeout")]
    pub retry_timeout: Duration,

    /// Period over which failures are counted
    #[serde(rename = "retry_window_ms", with = "millis", default = "default_retry_window")]
    pub retry_window: Duration,

    /// Capacity of each worker queue
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Capacity of the shared result channel
    #[serde(default = "default_result_capacity")]
    pub result_capacity: usize,
}

fn default_retry_limit() -> usize {
    DEFAULT_RETRY_LIMIT
}

fn default_retry_timeout() -> Duration {
    DEFAULT_RETRY_TIMEOUT
}

fn default_retry_window() -> Duration {
    DEFAULT_RETRY_WINDOW
}

fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

fn default_result_capacity() -> usize {
    DEFAULT_RESULT_CAPACITY
}

impl Default for RelayOptions {
    fn default() -> Self {
        Self {
            transport: TransportKind::default(),
            delivery_mode: DeliveryMode::default(),
            retry_mode: RetryMode::default(),
            endpoints: Vec::new(),
            retry_limit: DEFAULT_RETRY_LIMIT,
            retry_timeout: DEFAULT_RETRY_TIMEOUT,
            retry_window: DEFAULT_RETRY_WINDOW,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            result_capacity: DEFAULT_RESULT_CAPACITY,
        }
    }
}

impl RelayOptions {
    /// Options with the given endpoints and every other field defaulted
    pub fn with_endpoints<I, S>(endpoints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            endpoints: endpoints.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Replace zero-valued numeric and duration fields with their defaults
    pub fn with_defaults(mut self) -> Self {
        if self.retry_limit == 0 {
            self.retry_limit = DEFAULT_RETRY_LIMIT;
        }
        if self.retry_timeout.is_zero() {
            self.retry_timeout = DEFAULT_RETRY_TIMEOUT;
        }
        if self.retry_window.is_zero() {
            self.retry_window = DEFAULT_RETRY_WINDOW;
        }
        if self.queue_capacity == 0 {
            self.queue_capacity = DEFAULT_QUEUE_CAPACITY;
        }
        if self.result_capacity == 0 {
            self.result_capacity = DEFAULT_RESULT_CAPACITY;
        }
        self
    }
}

/// Durations as integer milliseconds
mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let ms = u64::try_from(value.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(ms)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
