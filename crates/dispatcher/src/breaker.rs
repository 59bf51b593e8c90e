//! CircuitBreaker - sliding-window failure detector for one endpoint
//!
//! Failures are timestamped; only those inside `window` count. When more than
//! `limit` failures fall inside the window the endpoint is blocked for
//! `timeout`. One success clears both the history and the block.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

/// Breaker parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerPolicy {
    /// Failures tolerated inside the window
    pub limit: usize,
    /// Failure-counting window
    pub window: Duration,
    /// Block duration once tripped
    pub timeout: Duration,
}

impl BreakerPolicy {
    pub fn from_options(options: &contracts::RelayOptions) -> Self {
        Self {
            limit: options.retry_limit,
            window: options.retry_window,
            timeout: options.retry_timeout,
        }
    }
}

#[derive(Debug)]
struct BreakerState {
    failures: VecDeque<Instant>,
    /// `None` means never blocked
    blocked_until: Option<Instant>,
}

/// Outcome of recording a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureVerdict {
    /// Endpoint is inside a blocked period
    pub blocked: bool,
    /// This failure started the blocked period
    pub tripped: bool,
}

/// Per-endpoint breaker, safe to share between the router and the worker loop
#[derive(Debug)]
pub struct CircuitBreaker {
    policy: BreakerPolicy,
    state: Mutex<BreakerState>,
}

impl CircuitBreaker {
    pub fn new(policy: BreakerPolicy) -> Self {
        Self {
            policy,
            state: Mutex::new(BreakerState {
                // Sized by recorded failures, never by `limit`.
                failures: VecDeque::new(),
                blocked_until: None,
            }),
        }
    }

    pub fn policy(&self) -> &BreakerPolicy {
        &self.policy
    }

    /// Record a failure now
    pub fn record_failure(&self) -> FailureVerdict {
        self.record_failure_at(Instant::now())
    }

    /// Record a failure observed at `now`
    pub fn record_failure_at(&self, now: Instant) -> FailureVerdict {
        let mut state = self.lock();

        // Trim before append keeps the history bounded by the window.
        if let Some(window_start) = now.checked_sub(self.policy.window) {
            while state.failures.front().is_some_and(|ts| *ts <= window_start) {
                state.failures.pop_front();
            }
        }
        state.failures.push_back(now);

        if state.failures.len() > self.policy.limit {
            let already_blocked = state.blocked_until.is_some_and(|until| now <= until);
            if !already_blocked {
                state.blocked_until = Some(now + self.policy.timeout);
            }
            return FailureVerdict {
                blocked: true,
                tripped: !already_blocked,
            };
        }

        FailureVerdict {
            blocked: state.blocked_until.is_some_and(|until| now < until),
            tripped: false,
        }
    }

    /// Clear history and any block
    pub fn reset(&self) {
        let mut state = self.lock();
        state.failures.clear();
        state.blocked_until = None;
    }

    /// Whether the endpoint may be selected now
    pub fn is_available(&self) -> bool {
        self.is_available_at(Instant::now())
    }

    /// Available iff `now` is strictly after the blocked-until deadline
    pub fn is_available_at(&self, now: Instant) -> bool {
        self.lock().blocked_until.is_none_or(|until| now > until)
    }

    pub fn blocked_until(&self) -> Option<Instant> {
        self.lock().blocked_until
    }

    /// Failures currently held in the window
    pub fn failure_count(&self) -> usize {
        self.lock().failures.len()
    }

    #[cfg(test)]
    pub(crate) fn set_blocked_until(&self, until: Option<Instant>) {
        self.lock().blocked_until = until;
    }

    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(limit: usize) -> BreakerPolicy {
        BreakerPolicy {
            limit,
            window: Duration::from_secs(3),
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_fresh_breaker_is_available() {
        let breaker = CircuitBreaker::new(policy(2));
        assert!(breaker.is_available());
        assert_eq!(breaker.blocked_until(), None);
    }

    #[test]
    fn test_trips_after_limit_plus_one_failures() {
        let breaker = CircuitBreaker::new(policy(2));
        let t0 = Instant::now();

        assert!(!breaker.record_failure_at(t0).blocked);
        assert!(!breaker.record_failure_at(t0 + Duration::from_millis(10)).blocked);
        assert!(breaker.is_available_at(t0 + Duration::from_millis(15)));

        let verdict = breaker.record_failure_at(t0 + Duration::from_millis(20));
        assert!(verdict.blocked);
        assert!(verdict.tripped);
        assert_eq!(
            breaker.blocked_until(),
            Some(t0 + Duration::from_millis(20) + Duration::from_secs(5))
        );
        assert!(!breaker.is_available_at(t0 + Duration::from_secs(1)));
    }

    #[test]
    fn test_unblocks_after_timeout_without_further_action() {
        let breaker = CircuitBreaker::new(policy(2));
        let t0 = Instant::now();
        for i in 0..3 {
            breaker.record_failure_at(t0 + Duration::from_millis(i));
        }
        let until = breaker.blocked_until().unwrap();

        // Strictly after: the deadline itself is still blocked.
        assert!(!breaker.is_available_at(until));
        assert!(breaker.is_available_at(until + Duration::from_millis(1)));
    }

    #[test]
    fn test_failures_spaced_beyond_window_never_accumulate() {
        let breaker = CircuitBreaker::new(policy(2));
        let t0 = Instant::now();
        for i in 0..10u32 {
            let verdict = breaker.record_failure_at(t0 + Duration::from_secs(4) * i);
            assert!(!verdict.blocked, "failure {i} should not block");
            assert_eq!(breaker.failure_count(), 1);
        }
        assert!(breaker.is_available_at(t0 + Duration::from_secs(40)));
    }

    #[test]
    fn test_failure_exactly_at_window_edge_is_dropped() {
        let breaker = CircuitBreaker::new(policy(1));
        let t0 = Instant::now();
        breaker.record_failure_at(t0);
        let verdict = breaker.record_failure_at(t0 + Duration::from_secs(3));
        assert!(!verdict.blocked);
        assert_eq!(breaker.failure_count(), 1);
    }

    #[test]
    fn test_success_clears_history_and_block() {
        let breaker = CircuitBreaker::new(policy(2));
        let t0 = Instant::now();
        for i in 0..3 {
            breaker.record_failure_at(t0 + Duration::from_millis(i));
        }
        assert!(!breaker.is_available_at(t0 + Duration::from_millis(10)));

        breaker.reset();
        assert!(breaker.is_available_at(t0 + Duration::from_millis(10)));
        assert_eq!(breaker.failure_count(), 0);

        // History really is gone: two more failures stay under the limit.
        breaker.record_failure_at(t0 + Duration::from_millis(20));
        assert!(!breaker.record_failure_at(t0 + Duration::from_millis(30)).blocked);
    }

    #[test]
    fn test_unbounded_limit_never_trips() {
        let breaker = CircuitBreaker::new(policy(usize::MAX));
        let t0 = Instant::now();
        for i in 0..100 {
            assert!(!breaker.record_failure_at(t0 + Duration::from_millis(i)).blocked);
        }
        assert_eq!(breaker.failure_count(), 100);
        assert!(breaker.is_available_at(t0 + Duration::from_millis(200)));
    }

    #[test]
    fn test_block_not_extended_while_blocked() {
        let breaker = CircuitBreaker::new(policy(1));
        let t0 = Instant::now();
        breaker.record_failure_at(t0);
        let first = breaker.record_failure_at(t0 + Duration::from_millis(1));
        assert!(first.tripped);
        let until = breaker.blocked_until();

        let again = breaker.record_failure_at(t0 + Duration::from_millis(500));
        assert!(again.blocked);
        assert!(!again.tripped);
        assert_eq!(breaker.blocked_until(), until);
    }

    #[test]
    fn test_retrips_after_block_expires() {
        let breaker = CircuitBreaker::new(BreakerPolicy {
            limit: 1,
            window: Duration::from_secs(10),
            timeout: Duration::from_secs(1),
        });
        let t0 = Instant::now();
        breaker.record_failure_at(t0);
        breaker.record_failure_at(t0 + Duration::from_millis(1));
        let later = t0 + Duration::from_secs(2);
        assert!(breaker.is_available_at(later));

        let verdict = breaker.record_failure_at(later);
        assert!(verdict.tripped);
        assert_eq!(breaker.blocked_until(), Some(later + Duration::from_secs(1)));
    }
}
