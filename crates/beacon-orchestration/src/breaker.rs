//! Circuit breaker for the current backend

use beacon_core::config::CircuitBreakerConfig;
use metrics::counter;
use serde::Serialize;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl BreakerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BreakerState::Closed => "closed",
            BreakerState::Open => "open",
            BreakerState::HalfOpen => "half-open",
        }
    }
}

#[derive(Debug)]
struct BreakerInner {
    state: BreakerState,
    failure_count: u32,
    last_failure: Option<Instant>,
    next_attempt: Option<Instant>,
}

/// Three-state failure detector gating calls to the current backend.
///
/// One breaker is shared across whichever backend is current; switching
/// backends resets it to closed. Every gate check and state update is a
/// single atomic step under the inner lock, with no await inside.
pub struct CircuitBreaker {
    failure_threshold: u32,
    reset_timeout: Duration,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(config: &CircuitBreakerConfig) -> Self {
        Self {
            failure_threshold: config.failure_threshold,
            reset_timeout: Duration::from_millis(config.reset_timeout_ms),
            inner: Mutex::new(BreakerInner {
                state: BreakerState::Closed,
                failure_count: 0,
                last_failure: None,
                next_attempt: None,
            }),
        }
    }

    /// Gate check. While open, returns false until the cool-down elapses, at
    /// which point the breaker moves to half-open and admits exactly one
    /// probe per cool-down window.
    pub fn should_attempt(&self) -> bool {
        let mut inner = self.inner.lock().unwrap();
        match inner.state {
            BreakerState::Closed => true,
            BreakerState::HalfOpen => false,
            BreakerState::Open => {
                let due = inner
                    .next_attempt
                    .map(|at| Instant::now() >= at)
                    .unwrap_or(true);
                if due {
                    inner.state = BreakerState::HalfOpen;
                    info!("Circuit breaker half-open; admitting one probe");
                    counter!("beacon.breaker.transitions", "to" => "half-open").increment(1);
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.failure_count = 0;
        inner.next_attempt = None;
        if inner.state != BreakerState::Closed {
            inner.state = BreakerState::Closed;
            info!("Circuit breaker closed");
            counter!("beacon.breaker.transitions", "to" => "closed").increment(1);
        }
    }

    pub fn record_failure(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.failure_count += 1;
        inner.last_failure = Some(Instant::now());

        let state = inner.state;
        match state {
            BreakerState::HalfOpen => self.trip_open(&mut inner),
            BreakerState::Closed if inner.failure_count >= self.failure_threshold => {
                self.trip_open(&mut inner)
            }
            _ => debug!(failures = inner.failure_count, "Backend failure recorded"),
        }
    }

    /// Reset to closed. Used when the orchestrator switches backends.
    pub fn reset(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.state = BreakerState::Closed;
        inner.failure_count = 0;
        inner.last_failure = None;
        inner.next_attempt = None;
        debug!("Circuit breaker reset");
    }

    pub fn state(&self) -> BreakerState {
        self.inner.lock().unwrap().state
    }

    pub fn failure_count(&self) -> u32 {
        self.inner.lock().unwrap().failure_count
    }

    fn trip_open(&self, inner: &mut BreakerInner) {
        inner.state = BreakerState::Open;
        inner.next_attempt = Some(Instant::now() + self.reset_timeout);
        info!(
            failures = inner.failure_count,
            cooldown_ms = self.reset_timeout.as_millis() as u64,
            "Circuit breaker opened"
        );
        counter!("beacon.breaker.transitions", "to" => "open").increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(threshold: u32, reset_timeout_ms: u64) -> CircuitBreaker {
        CircuitBreaker::new(&CircuitBreakerConfig {
            failure_threshold: threshold,
            reset_timeout_ms,
        })
    }

    #[tokio::test(start_paused = true)]
    async fn closed_gate_always_allows() {
        let breaker = breaker(3, 1_000);
        assert_eq!(breaker.state(), BreakerState::Closed);
        assert!(breaker.should_attempt());
        assert!(breaker.should_attempt());
    }

    #[tokio::test(start_paused = true)]
    async fn opens_after_failure_threshold() {
        let breaker = breaker(3, 1_000);

        breaker.record_failure();
        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Closed);

        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Open);
        assert!(!breaker.should_attempt());
    }

    #[tokio::test(start_paused = true)]
    async fn admits_single_probe_after_cooldown() {
        let breaker = breaker(1, 1_000);
        breaker.record_failure();
        assert!(!breaker.should_attempt());

        tokio::time::advance(Duration::from_millis(1_000)).await;

        assert!(breaker.should_attempt());
        assert_eq!(breaker.state(), BreakerState::HalfOpen);
        // Only one probe per cool-down window.
        assert!(!breaker.should_attempt());
    }

    #[tokio::test(start_paused = true)]
    async fn probe_success_closes_and_resets_count() {
        let breaker = breaker(1, 1_000);
        breaker.record_failure();
        tokio::time::advance(Duration::from_millis(1_000)).await;
        assert!(breaker.should_attempt());

        breaker.record_success();
        assert_eq!(breaker.state(), BreakerState::Closed);
        assert_eq!(breaker.failure_count(), 0);
        assert!(breaker.should_attempt());
    }

    #[tokio::test(start_paused = true)]
    async fn probe_failure_reopens_with_fresh_cooldown() {
        let breaker = breaker(1, 1_000);
        breaker.record_failure();
        tokio::time::advance(Duration::from_millis(1_000)).await;
        assert!(breaker.should_attempt());

        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Open);

        // Cool-down restarted; half the window is not enough.
        tokio::time::advance(Duration::from_millis(500)).await;
        assert!(!breaker.should_attempt());

        tokio::time::advance(Duration::from_millis(500)).await;
        assert!(breaker.should_attempt());
    }

    #[tokio::test(start_paused = true)]
    async fn reset_returns_to_closed() {
        let breaker = breaker(1, 1_000);
        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Open);

        breaker.reset();
        assert_eq!(breaker.state(), BreakerState::Closed);
        assert_eq!(breaker.failure_count(), 0);
        assert!(breaker.should_attempt());
    }
}
