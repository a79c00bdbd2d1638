//! Discard-everything backend

use async_trait::async_trait;
use beacon_core::backend::TelemetryBackend;
use beacon_core::config::BackendEndpoint;
use beacon_core::error::BackendResult;
use beacon_core::event::{AttrMap, LogEvent, MetricEvent, SpanId, TraceSpan};
use std::sync::atomic::{AtomicBool, Ordering};

/// Backend that accepts and discards everything. The default fallback when
/// losing telemetry is preferable to buffering it indefinitely.
#[derive(Default)]
pub struct NoopBackend {
    initialized: AtomicBool,
}

impl NoopBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TelemetryBackend for NoopBackend {
    fn name(&self) -> &'static str {
        "noop"
    }

    async fn initialize(&self, _endpoint: BackendEndpoint) -> BackendResult<()> {
        self.initialized.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn record_metric(&self, _metric: MetricEvent) -> BackendResult<()> {
        Ok(())
    }

    async fn record_log(&self, _log: LogEvent) -> BackendResult<()> {
        Ok(())
    }

    async fn start_trace(&self, _span: TraceSpan) -> BackendResult<SpanId> {
        Ok(SpanId::new())
    }

    async fn end_trace(&self, _span_id: SpanId, _attributes: AttrMap) -> BackendResult<()> {
        Ok(())
    }

    async fn flush(&self) {}

    async fn shutdown(&self) {
        self.initialized.store(false, Ordering::SeqCst);
    }

    fn is_healthy(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }
}
