//! In-process capture backend
//!
//! Stores everything it receives in memory. Useful as a working default when
//! no collector is configured, and as the delivery target in integration
//! tests.

use async_trait::async_trait;
use beacon_core::backend::TelemetryBackend;
use beacon_core::config::BackendEndpoint;
use beacon_core::error::{BackendError, BackendResult};
use beacon_core::event::{AttrMap, LogEvent, MetricEvent, SpanId, TraceSpan};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tracing::debug;

#[derive(Default)]
pub struct MemoryBackend {
    initialized: AtomicBool,
    metrics: Mutex<Vec<MetricEvent>>,
    logs: Mutex<Vec<LogEvent>>,
    open_spans: Mutex<HashMap<SpanId, TraceSpan>>,
    finished_spans: Mutex<Vec<TraceSpan>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recorded_metrics(&self) -> Vec<MetricEvent> {
        self.metrics.lock().unwrap().clone()
    }

    pub fn recorded_logs(&self) -> Vec<LogEvent> {
        self.logs.lock().unwrap().clone()
    }

    pub fn finished_spans(&self) -> Vec<TraceSpan> {
        self.finished_spans.lock().unwrap().clone()
    }

    pub fn open_span_count(&self) -> usize {
        self.open_spans.lock().unwrap().len()
    }

    fn ensure_initialized(&self) -> BackendResult<()> {
        if self.initialized.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(BackendError::send("memory backend is not initialized"))
        }
    }
}

#[async_trait]
impl TelemetryBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn initialize(&self, _endpoint: BackendEndpoint) -> BackendResult<()> {
        self.initialized.store(true, Ordering::SeqCst);
        debug!("Memory backend initialized");
        Ok(())
    }

    async fn record_metric(&self, metric: MetricEvent) -> BackendResult<()> {
        self.ensure_initialized()?;
        self.metrics.lock().unwrap().push(metric);
        Ok(())
    }

    async fn record_log(&self, log: LogEvent) -> BackendResult<()> {
        self.ensure_initialized()?;
        self.logs.lock().unwrap().push(log);
        Ok(())
    }

    async fn start_trace(&self, mut span: TraceSpan) -> BackendResult<SpanId> {
        self.ensure_initialized()?;
        let span_id = SpanId::new();
        span.span_id = Some(span_id);
        self.open_spans.lock().unwrap().insert(span_id, span);
        Ok(span_id)
    }

    async fn end_trace(&self, span_id: SpanId, attributes: AttrMap) -> BackendResult<()> {
        self.ensure_initialized()?;

        // Unknown span ids are tolerated silently.
        let span = self.open_spans.lock().unwrap().remove(&span_id);
        if let Some(mut span) = span {
            span.end_time = Some(chrono::Utc::now());
            span.attributes.extend(attributes);
            self.finished_spans.lock().unwrap().push(span);
        }
        Ok(())
    }

    async fn flush(&self) {
        // Nothing is buffered beyond the capture vectors.
    }

    async fn shutdown(&self) {
        self.initialized.store(false, Ordering::SeqCst);
        self.open_spans.lock().unwrap().clear();
        debug!("Memory backend shut down");
    }

    fn is_healthy(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_core::config::BackendEndpoint;
    use beacon_core::event::LogLevel;

    fn endpoint() -> BackendEndpoint {
        BackendEndpoint {
            backend: "memory".to_string(),
            endpoint: None,
            api_key: None,
            timeout_seconds: 30,
        }
    }

    #[tokio::test]
    async fn records_after_initialization() {
        let backend = MemoryBackend::new();
        backend.initialize(endpoint()).await.unwrap();

        backend
            .record_metric(MetricEvent::new("requests", 1.0))
            .await
            .unwrap();
        backend
            .record_log(LogEvent::new(LogLevel::Info, "hello"))
            .await
            .unwrap();

        assert_eq!(backend.recorded_metrics().len(), 1);
        assert_eq!(backend.recorded_logs().len(), 1);
        assert!(backend.is_healthy());
    }

    #[tokio::test]
    async fn rejects_sends_before_initialization() {
        let backend = MemoryBackend::new();
        let result = backend.record_metric(MetricEvent::new("requests", 1.0)).await;

        assert!(matches!(result, Err(BackendError::Send { .. })));
        assert!(!backend.is_healthy());
    }

    #[tokio::test]
    async fn span_lifecycle_moves_span_to_finished() {
        let backend = MemoryBackend::new();
        backend.initialize(endpoint()).await.unwrap();

        let span_id = backend
            .start_trace(TraceSpan::new("db.query"))
            .await
            .unwrap();
        assert_eq!(backend.open_span_count(), 1);

        backend.end_trace(span_id, AttrMap::new()).await.unwrap();
        assert_eq!(backend.open_span_count(), 0);
        assert_eq!(backend.finished_spans().len(), 1);
        assert!(backend.finished_spans()[0].end_time.is_some());
    }

    #[tokio::test]
    async fn unknown_span_id_is_tolerated() {
        let backend = MemoryBackend::new();
        backend.initialize(endpoint()).await.unwrap();

        let result = backend.end_trace(SpanId::new(), AttrMap::new()).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn shutdown_is_idempotent() {
        let backend = MemoryBackend::new();
        backend.initialize(endpoint()).await.unwrap();

        backend.shutdown().await;
        backend.shutdown().await;
        assert!(!backend.is_healthy());
    }
}
