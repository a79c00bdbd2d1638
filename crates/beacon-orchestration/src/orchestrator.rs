//! Telemetry orchestrator: routing, fallback switching, queue and retry

use crate::breaker::{BreakerState, CircuitBreaker};
use crate::queue::EventQueue;
use crate::retry::RetryScheduler;
use crate::sampler::Sampler;
use beacon_backend::BackendRegistry;
use beacon_core::backend::TelemetryBackend;
use beacon_core::config::TelemetryConfig;
use beacon_core::error::{BackendResult, BeaconError, Result};
use beacon_core::event::{
    AttrMap, LogEvent, MetricEvent, SpanId, TelemetryEvent, TelemetryPayload, TraceSpan,
};
use beacon_core::sanitize::Sanitizer;
use metrics::counter;
use serde::Serialize;
use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

/// Which of the two configured backends currently receives events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActiveBackend {
    Primary,
    Fallback,
}

impl ActiveBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActiveBackend::Primary => "primary",
            ActiveBackend::Fallback => "fallback",
        }
    }
}

/// Read-only view of orchestrator health, computed on demand.
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub healthy: bool,
    pub current_backend: ActiveBackend,
    pub queue_depth: usize,
    pub circuit_state: BreakerState,
}

/// The orchestration core.
///
/// Owns a primary and a fallback backend, decides which is current, and
/// drives the circuit breaker, queue, and retry scheduler on every call.
/// Cheap to clone; clones share all state. Constructed once per process and
/// passed by handle to the facade services — there is no ambient singleton.
#[derive(Clone)]
pub struct TelemetryOrchestrator {
    pub(crate) config: Arc<TelemetryConfig>,
    pub(crate) primary: Arc<dyn TelemetryBackend>,
    pub(crate) fallback: Arc<dyn TelemetryBackend>,
    pub(crate) active: Arc<RwLock<ActiveBackend>>,
    pub(crate) breaker: Arc<CircuitBreaker>,
    pub(crate) queue: Arc<Mutex<EventQueue>>,
    pub(crate) scheduler: Arc<RetryScheduler>,
    pub(crate) sampler: Arc<Sampler>,
    pub(crate) sanitizer: Arc<Sanitizer>,
    pub(crate) placeholder_spans: Arc<Mutex<HashSet<SpanId>>>,
    pub(crate) initialized: Arc<AtomicBool>,
    pub(crate) flush_task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl TelemetryOrchestrator {
    /// Validate the configuration, resolve the backend pair from the
    /// registry, and initialize the primary backend — falling back to the
    /// secondary if the primary rejects.
    ///
    /// Fails with [`BeaconError::Config`] on invalid configuration and with
    /// [`BeaconError::BothBackendsFailed`] when neither backend initializes;
    /// initialization is not retried automatically.
    #[instrument(skip(config, registry), fields(service = %config.service.name))]
    pub async fn initialize(config: TelemetryConfig, registry: &BackendRegistry) -> Result<Self> {
        config.validate()?;
        let sanitizer = Sanitizer::new(&config.privacy)?;
        let (primary, fallback) = registry.resolve_pair(&config)?;

        let orchestrator = Self {
            breaker: Arc::new(CircuitBreaker::new(&config.circuit_breaker)),
            queue: Arc::new(Mutex::new(EventQueue::new(config.batching.max_queue_size))),
            scheduler: Arc::new(RetryScheduler::new(config.retry.clone())),
            sampler: Arc::new(Sampler::new(&config.sampling)),
            sanitizer: Arc::new(sanitizer),
            active: Arc::new(RwLock::new(ActiveBackend::Primary)),
            placeholder_spans: Arc::new(Mutex::new(HashSet::new())),
            initialized: Arc::new(AtomicBool::new(false)),
            flush_task: Arc::new(Mutex::new(None)),
            primary,
            fallback,
            config: Arc::new(config),
        };

        let primary_endpoint = orchestrator.config.backend.primary.clone();
        match orchestrator.primary.initialize(primary_endpoint).await {
            Ok(()) => {
                info!(backend = orchestrator.primary.name(), "Primary backend initialized");
            }
            Err(primary_err) => {
                warn!(
                    error = %primary_err,
                    "Primary backend failed to initialize; trying fallback"
                );
                let fallback_endpoint = orchestrator.config.backend.fallback.clone();
                match orchestrator.fallback.initialize(fallback_endpoint).await {
                    Ok(()) => {
                        *orchestrator.active.write().unwrap() = ActiveBackend::Fallback;
                        counter!("beacon.backend.switched").increment(1);
                        info!(
                            backend = orchestrator.fallback.name(),
                            "Fallback backend initialized and current"
                        );
                    }
                    Err(fallback_err) => {
                        error!(
                            primary = %primary_err,
                            fallback = %fallback_err,
                            "Both backends failed to initialize"
                        );
                        return Err(BeaconError::BothBackendsFailed {
                            primary: primary_err.to_string(),
                            fallback: fallback_err.to_string(),
                        });
                    }
                }
            }
        }

        orchestrator.initialized.store(true, Ordering::SeqCst);
        orchestrator.spawn_flush_loop();
        Ok(orchestrator)
    }

    /// Record a metric. Never fails for delivery problems: blocked or failed
    /// events are queued and retried silently.
    #[instrument(skip(self, metric), fields(name = %metric.name))]
    pub async fn record_metric(&self, mut metric: MetricEvent) {
        if !self.initialized.load(Ordering::SeqCst) {
            debug!("Orchestrator not initialized; dropping metric");
            return;
        }
        if !self.sampler.should_sample(&metric.name) {
            counter!("beacon.events.dropped", "reason" => "sampled_out").increment(1);
            return;
        }
        self.sanitizer.sanitize_metric(&mut metric);
        counter!("beacon.events.recorded", "kind" => "metric").increment(1);
        self.process_event(TelemetryEvent::new(TelemetryPayload::Metric(metric)))
            .await;
    }

    /// Record a log event. Logs are not sampled: a warn or error that fires
    /// rarely is exactly the one worth keeping.
    #[instrument(skip(self, log), fields(level = log.level.as_str()))]
    pub async fn record_log(&self, mut log: LogEvent) {
        if !self.initialized.load(Ordering::SeqCst) {
            debug!("Orchestrator not initialized; dropping log");
            return;
        }
        self.sanitizer.sanitize_log(&mut log);
        counter!("beacon.events.recorded", "kind" => "log").increment(1);
        self.process_event(TelemetryEvent::new(TelemetryPayload::Log(log)))
            .await;
    }

    /// Start a span on the current backend and return its id.
    ///
    /// When delivery is blocked or fails, a synthetic placeholder id is
    /// returned immediately so the caller is never blocked; finishing a
    /// placeholder id is a guaranteed no-op.
    #[instrument(skip(self, span), fields(operation = %span.operation))]
    pub async fn start_trace(&self, mut span: TraceSpan) -> SpanId {
        if !self.initialized.load(Ordering::SeqCst) {
            return self.placeholder_span_id();
        }
        if !self.sampler.should_sample(&span.operation) {
            counter!("beacon.events.dropped", "reason" => "sampled_out").increment(1);
            return self.placeholder_span_id();
        }
        self.sanitizer.sanitize_span(&mut span);

        if !self.breaker.should_attempt() {
            self.enqueue(TelemetryEvent::new(TelemetryPayload::TraceStart(span)));
            return self.placeholder_span_id();
        }

        let backend = self.current_backend();
        match backend.start_trace(span.clone()).await {
            Ok(span_id) => {
                self.breaker.record_success();
                counter!("beacon.events.recorded", "kind" => "trace").increment(1);
                span_id
            }
            Err(err) => {
                self.breaker.record_failure();
                warn!(backend = backend.name(), error = %err, "Starting span failed");

                if self.active() == ActiveBackend::Primary && self.switch_to_fallback().await {
                    let resent = self.fallback.start_trace(span).await;
                    self.process_queued_events().await;
                    match resent {
                        Ok(span_id) => {
                            self.breaker.record_success();
                            return span_id;
                        }
                        Err(resend_err) => {
                            self.breaker.record_failure();
                            warn!(error = %resend_err, "Span resend on fallback failed");
                        }
                    }
                }
                self.placeholder_span_id()
            }
        }
    }

    /// Finalize a span. Best effort: delivery failure is swallowed with a
    /// warning, and a placeholder id is a no-op.
    #[instrument(skip(self, attributes))]
    pub async fn end_trace(&self, span_id: SpanId, attributes: AttrMap) {
        if self.placeholder_spans.lock().unwrap().remove(&span_id) {
            debug!(%span_id, "Finishing placeholder span; nothing to deliver");
            return;
        }
        if !self.initialized.load(Ordering::SeqCst) {
            return;
        }

        let backend = self.current_backend();
        if let Err(err) = backend.end_trace(span_id, attributes).await {
            warn!(backend = backend.name(), error = %err, %span_id, "Finishing span failed");
        }
    }

    /// Drain the queue, then flush the current backend.
    #[instrument(skip(self))]
    pub async fn flush(&self) {
        self.process_queued_events().await;
        self.current_backend().flush().await;
    }

    /// Cancel retry timers, flush, and shut the current backend down.
    /// Idempotent.
    #[instrument(skip(self))]
    pub async fn shutdown(&self) {
        if !self.initialized.swap(false, Ordering::SeqCst) {
            debug!("Orchestrator already shut down");
            return;
        }
        info!("Shutting down telemetry orchestrator");

        self.scheduler.shutdown();
        if let Some(handle) = self.flush_task.lock().unwrap().take() {
            handle.abort();
        }

        self.process_queued_events().await;
        let backend = self.current_backend();
        backend.flush().await;
        backend.shutdown().await;
    }

    /// Health snapshot. Pure read, no side effects.
    pub fn health_status(&self) -> HealthStatus {
        let initialized = self.initialized.load(Ordering::SeqCst);
        let backend = self.current_backend();
        let circuit_state = self.breaker.state();
        HealthStatus {
            healthy: initialized && backend.is_healthy() && circuit_state != BreakerState::Open,
            current_backend: self.active(),
            queue_depth: self.queue.lock().unwrap().len(),
            circuit_state,
        }
    }

    pub fn config(&self) -> &TelemetryConfig {
        &self.config
    }

    /// Deliver one event, consulting the breaker gate first and falling back
    /// to queue/switch/retry on failure.
    async fn process_event(&self, event: TelemetryEvent) {
        if let TelemetryPayload::TraceStart(span) = &event.payload {
            // The caller already holds a placeholder id for this span; late
            // delivery would create an orphan span on the backend.
            warn!(operation = %span.operation, "Dropping queued trace start");
            counter!("beacon.events.dropped", "reason" => "trace_replay").increment(1);
            return;
        }

        if !self.breaker.should_attempt() {
            self.enqueue(event);
            return;
        }

        let backend = self.current_backend();
        match self.deliver(backend.as_ref(), &event).await {
            Ok(()) => self.breaker.record_success(),
            Err(err) => {
                self.breaker.record_failure();
                warn!(
                    backend = backend.name(),
                    kind = event.kind(),
                    error = %err,
                    "Delivery failed"
                );

                if self.active() == ActiveBackend::Primary && self.switch_to_fallback().await {
                    match self.deliver(self.fallback.as_ref(), &event).await {
                        Ok(()) => self.breaker.record_success(),
                        Err(resend_err) => {
                            self.breaker.record_failure();
                            warn!(error = %resend_err, "Resend on fallback failed");
                            self.schedule_retry(event);
                        }
                    }
                    self.process_queued_events().await;
                } else {
                    self.schedule_retry(event);
                }
            }
        }
    }

    /// Drain the queue in FIFO order against the current backend. Events
    /// that fail here re-enter the retry path instead of being re-queued in
    /// place, so one failing event cannot block newer ones forever.
    pub async fn process_queued_events(&self) {
        let drained = { self.queue.lock().unwrap().drain() };
        if drained.is_empty() {
            return;
        }
        info!(count = drained.len(), "Replaying queued events");

        for event in drained {
            if let TelemetryPayload::TraceStart(span) = &event.payload {
                warn!(operation = %span.operation, "Dropping queued trace start");
                counter!("beacon.events.dropped", "reason" => "trace_replay").increment(1);
                continue;
            }

            let backend = self.current_backend();
            match self.deliver(backend.as_ref(), &event).await {
                Ok(()) => self.breaker.record_success(),
                Err(err) => {
                    self.breaker.record_failure();
                    warn!(
                        backend = backend.name(),
                        error = %err,
                        "Queued event replay failed; rescheduling"
                    );
                    self.schedule_retry(event);
                }
            }
        }
    }

    async fn deliver(
        &self,
        backend: &dyn TelemetryBackend,
        event: &TelemetryEvent,
    ) -> BackendResult<()> {
        match &event.payload {
            TelemetryPayload::Metric(metric) => backend.record_metric(metric.clone()).await,
            TelemetryPayload::Log(log) => backend.record_log(log.clone()).await,
            // Trace starts are dropped before delivery is attempted.
            TelemetryPayload::TraceStart(_) => Ok(()),
        }
    }

    /// Initialize the fallback and make it current. Returns false (leaving
    /// the primary current) if the fallback cannot initialize.
    async fn switch_to_fallback(&self) -> bool {
        info!(backend = self.fallback.name(), "Attempting switch to fallback backend");
        let endpoint = self.config.backend.fallback.clone();
        match self.fallback.initialize(endpoint).await {
            Ok(()) => {
                *self.active.write().unwrap() = ActiveBackend::Fallback;
                self.breaker.reset();
                counter!("beacon.backend.switched").increment(1);
                info!(backend = self.fallback.name(), "Fallback backend is now current");
                true
            }
            Err(err) => {
                warn!(error = %err, "Fallback failed to initialize; staying on primary");
                false
            }
        }
    }

    fn enqueue(&self, event: TelemetryEvent) {
        debug!(kind = event.kind(), "Delivery blocked; queueing event");
        counter!("beacon.events.queued", "kind" => event.kind()).increment(1);
        self.queue.lock().unwrap().push(event);
    }

    /// Bump the attempt counter and arm a backoff timer, or drop the event
    /// once its retry budget is spent.
    fn schedule_retry(&self, mut event: TelemetryEvent) {
        event.attempts += 1;
        if event.attempts > self.config.retry.max_attempts {
            warn!(
                kind = event.kind(),
                attempts = event.attempts,
                "Retry budget exhausted; dropping event"
            );
            counter!("beacon.events.dropped", "reason" => "retry_exhausted").increment(1);
            return;
        }

        let delay = self.scheduler.delay_for(event.attempts);
        debug!(
            kind = event.kind(),
            attempt = event.attempts,
            delay_ms = delay.as_millis() as u64,
            "Scheduling retry"
        );
        counter!("beacon.events.retried", "kind" => event.kind()).increment(1);
        self.scheduler
            .arm(delay, redeliver(self.clone(), event));
    }

    fn spawn_flush_loop(&self) {
        let interval_ms = self.config.batching.flush_interval_ms;
        if interval_ms == 0 {
            return;
        }

        let this = self.clone();
        let token = self.scheduler.cancellation_token();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_millis(interval_ms));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => this.flush().await,
                }
            }
        });
        *self.flush_task.lock().unwrap() = Some(handle);
    }

    fn placeholder_span_id(&self) -> SpanId {
        let span_id = SpanId::new();
        self.placeholder_spans.lock().unwrap().insert(span_id);
        counter!("beacon.spans.placeholder").increment(1);
        span_id
    }

    pub(crate) fn active(&self) -> ActiveBackend {
        *self.active.read().unwrap()
    }

    pub(crate) fn current_backend(&self) -> Arc<dyn TelemetryBackend> {
        match self.active() {
            ActiveBackend::Primary => Arc::clone(&self.primary),
            ActiveBackend::Fallback => Arc::clone(&self.fallback),
        }
    }
}

/// Boxed re-delivery future, kept out of `process_event` so the async state
/// machine never names its own type.
fn redeliver(
    orchestrator: TelemetryOrchestrator,
    event: TelemetryEvent,
) -> Pin<Box<dyn Future<Output = ()> + Send>> {
    Box::pin(async move {
        orchestrator.process_event(event).await;
    })
}
