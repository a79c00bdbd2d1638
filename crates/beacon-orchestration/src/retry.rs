//! Delayed re-delivery of failed events

use beacon_core::config::RetryConfig;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

pub type RetryFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Arms and tracks retry timers so they can be cancelled deterministically on
/// shutdown, instead of firing into a torn-down backend.
pub struct RetryScheduler {
    policy: RetryConfig,
    timers: Arc<Mutex<HashMap<Uuid, JoinHandle<()>>>>,
    token: CancellationToken,
}

impl RetryScheduler {
    pub fn new(policy: RetryConfig) -> Self {
        Self {
            policy,
            timers: Arc::new(Mutex::new(HashMap::new())),
            token: CancellationToken::new(),
        }
    }

    pub fn policy(&self) -> &RetryConfig {
        &self.policy
    }

    /// Token cancelled when the scheduler shuts down. Background work that
    /// must stop with the orchestrator selects on this.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Exponential backoff delay for the given attempt number (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let delay_ms =
            self.policy.initial_delay_ms as f64 * self.policy.backoff_multiplier.powi(exponent as i32);
        Duration::from_millis(delay_ms as u64)
    }

    /// Arm a timer that runs `deliver` after `delay`, unless the scheduler is
    /// shut down first.
    pub fn arm(&self, delay: Duration, deliver: RetryFuture) -> Uuid {
        let timer_id = Uuid::new_v4();
        let timers = Arc::clone(&self.timers);
        let token = self.token.clone();

        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {
                    debug!(%timer_id, "Retry timer cancelled");
                }
                _ = tokio::time::sleep(delay) => {
                    deliver.await;
                }
            }
            timers.lock().unwrap().remove(&timer_id);
        });

        self.timers.lock().unwrap().insert(timer_id, handle);
        timer_id
    }

    pub fn active_timers(&self) -> usize {
        self.timers.lock().unwrap().len()
    }

    /// Cancel every armed timer. Idempotent.
    pub fn shutdown(&self) {
        self.token.cancel();
        let handles: Vec<JoinHandle<()>> = {
            let mut timers = self.timers.lock().unwrap();
            timers.drain().map(|(_, handle)| handle).collect()
        };
        for handle in handles {
            handle.abort();
        }
        debug!("Retry scheduler shut down");
    }
}
