//! Facade services over the orchestrator
//!
//! Convenience wrappers that shape raw instrumentation data into the
//! orchestrator's event types. They add no failure handling of their own —
//! every delivery decision belongs to the orchestrator.

use crate::orchestrator::TelemetryOrchestrator;
use beacon_core::event::{AttrMap, AttrValue, LogEvent, LogLevel, MetricEvent, SpanId, SpanStatus, TraceSpan};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::warn;
use uuid::Uuid;

/// Shapes counters, gauges, and timings into metric events.
#[derive(Clone)]
pub struct MetricsService {
    orchestrator: TelemetryOrchestrator,
}

impl MetricsService {
    pub fn new(orchestrator: TelemetryOrchestrator) -> Self {
        Self { orchestrator }
    }

    pub async fn counter(&self, name: &str, value: f64, attributes: AttrMap) {
        let metric = MetricEvent::new(name, value)
            .with_unit("count")
            .with_attributes(attributes);
        self.orchestrator.record_metric(metric).await;
    }

    pub async fn increment(&self, name: &str) {
        self.counter(name, 1.0, AttrMap::new()).await;
    }

    pub async fn gauge(&self, name: &str, value: f64, attributes: AttrMap) {
        let metric = MetricEvent::new(name, value).with_attributes(attributes);
        self.orchestrator.record_metric(metric).await;
    }

    pub async fn timing(&self, name: &str, duration: Duration, attributes: AttrMap) {
        let metric = MetricEvent::new(name, duration.as_secs_f64() * 1000.0)
            .with_unit("ms")
            .with_attributes(attributes);
        self.orchestrator.record_metric(metric).await;
    }
}

/// Starts and finishes spans, tracking open spans by id until they finish.
#[derive(Clone)]
pub struct TracerService {
    orchestrator: TelemetryOrchestrator,
    open_spans: Arc<Mutex<HashMap<SpanId, TraceSpan>>>,
}

impl TracerService {
    pub fn new(orchestrator: TelemetryOrchestrator) -> Self {
        Self {
            orchestrator,
            open_spans: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Start a root span and return its id.
    pub async fn start_span(&self, operation: &str, attributes: AttrMap) -> SpanId {
        let span = TraceSpan::new(operation).with_attributes(attributes);
        self.begin(span).await
    }

    /// Start a span under `parent`, inheriting its trace id. An unknown
    /// parent falls back to a root span.
    pub async fn start_child_span(
        &self,
        operation: &str,
        parent: SpanId,
        attributes: AttrMap,
    ) -> SpanId {
        let parent_trace = {
            self.open_spans
                .lock()
                .unwrap()
                .get(&parent)
                .map(|span| span.trace_id)
        };

        let mut span = TraceSpan::new(operation).with_attributes(attributes);
        match parent_trace {
            Some(trace_id) => span = span.child_of(trace_id, parent),
            None => warn!(%parent, "Unknown parent span; starting root span"),
        }
        self.begin(span).await
    }

    /// Attach an attribute to an open span.
    pub fn add_attribute(&self, span_id: SpanId, key: &str, value: impl Into<AttrValue>) {
        let mut open_spans = self.open_spans.lock().unwrap();
        match open_spans.get_mut(&span_id) {
            Some(span) => {
                span.attributes.insert(key.to_string(), value.into());
            }
            None => warn!(%span_id, "Attribute on unknown span ignored"),
        }
    }

    /// Finish an open span. An unknown id is a no-op warning, never an
    /// error.
    pub async fn finish_span(&self, span_id: SpanId, status: SpanStatus, attributes: AttrMap) {
        let removed = { self.open_spans.lock().unwrap().remove(&span_id) };
        let Some(mut span) = removed else {
            warn!(%span_id, "Finishing unknown span is a no-op");
            return;
        };

        let end_time = Utc::now();
        span.end_time = Some(end_time);
        span.status = status;
        span.attributes.extend(attributes);

        let mut attributes = span.attributes;
        attributes.insert("status".to_string(), AttrValue::from(status.as_str()));
        attributes.insert(
            "duration_ms".to_string(),
            AttrValue::Int((end_time - span.start_time).num_milliseconds()),
        );

        self.orchestrator.end_trace(span_id, attributes).await;
    }

    pub fn open_span_count(&self) -> usize {
        self.open_spans.lock().unwrap().len()
    }

    pub fn has_open_span(&self, span_id: SpanId) -> bool {
        self.open_spans.lock().unwrap().contains_key(&span_id)
    }

    async fn begin(&self, span: TraceSpan) -> SpanId {
        let span_id = self.orchestrator.start_trace(span.clone()).await;
        let mut span = span;
        span.span_id = Some(span_id);
        self.open_spans.lock().unwrap().insert(span_id, span);
        span_id
    }
}

/// Shapes structured log records into log events.
#[derive(Clone)]
pub struct LoggerService {
    orchestrator: TelemetryOrchestrator,
}

impl LoggerService {
    pub fn new(orchestrator: TelemetryOrchestrator) -> Self {
        Self { orchestrator }
    }

    pub async fn log(&self, level: LogLevel, message: &str, attributes: AttrMap) {
        let log = LogEvent::new(level, message).with_attributes(attributes);
        self.orchestrator.record_log(log).await;
    }

    /// Log with trace/span correlation ids attached.
    pub async fn log_correlated(
        &self,
        level: LogLevel,
        message: &str,
        attributes: AttrMap,
        trace_id: Uuid,
        span_id: SpanId,
    ) {
        let log = LogEvent::new(level, message)
            .with_attributes(attributes)
            .with_correlation(trace_id, span_id);
        self.orchestrator.record_log(log).await;
    }

    pub async fn debug(&self, message: &str, attributes: AttrMap) {
        self.log(LogLevel::Debug, message, attributes).await;
    }

    pub async fn info(&self, message: &str, attributes: AttrMap) {
        self.log(LogLevel::Info, message, attributes).await;
    }

    pub async fn warn(&self, message: &str, attributes: AttrMap) {
        self.log(LogLevel::Warn, message, attributes).await;
    }

    pub async fn error(&self, message: &str, attributes: AttrMap) {
        self.log(LogLevel::Error, message, attributes).await;
    }
}
