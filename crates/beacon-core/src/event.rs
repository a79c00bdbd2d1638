use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Scalar attribute value attached to telemetry events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

pub type AttrMap = HashMap<String, AttrValue>;

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::String(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        AttrValue::String(value)
    }
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        AttrValue::Int(value)
    }
}

impl From<f64> for AttrValue {
    fn from(value: f64) -> Self {
        AttrValue::Float(value)
    }
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        AttrValue::Bool(value)
    }
}

/// Identifier for a trace span, assigned by the active backend (or minted as
/// a placeholder by the orchestrator when delivery is blocked).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpanId(Uuid);

impl SpanId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SpanId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SpanId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpanStatus {
    Ok,
    Error,
    Timeout,
}

impl SpanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpanStatus::Ok => "ok",
            SpanStatus::Error => "error",
            SpanStatus::Timeout => "timeout",
        }
    }
}

/// A single measurement, not retained after delivery or queue eviction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricEvent {
    pub name: String,
    pub value: f64,
    pub unit: Option<String>,
    pub attributes: AttrMap,
    pub timestamp: DateTime<Utc>,
}

impl MetricEvent {
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value,
            unit: None,
            attributes: AttrMap::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn with_attributes(mut self, attributes: AttrMap) -> Self {
        self.attributes.extend(attributes);
        self
    }
}

/// A structured log record with optional trace correlation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEvent {
    pub level: LogLevel,
    pub message: String,
    pub attributes: AttrMap,
    pub timestamp: DateTime<Utc>,
    pub trace_id: Option<Uuid>,
    pub span_id: Option<SpanId>,
}

impl LogEvent {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            attributes: AttrMap::new(),
            timestamp: Utc::now(),
            trace_id: None,
            span_id: None,
        }
    }

    pub fn with_attributes(mut self, attributes: AttrMap) -> Self {
        self.attributes.extend(attributes);
        self
    }

    pub fn with_correlation(mut self, trace_id: Uuid, span_id: SpanId) -> Self {
        self.trace_id = Some(trace_id);
        self.span_id = Some(span_id);
        self
    }
}

/// A single traced operation. The span id is assigned by the backend when the
/// span is started; until then it is `None`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceSpan {
    pub operation: String,
    pub span_id: Option<SpanId>,
    pub parent_span_id: Option<SpanId>,
    pub trace_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub attributes: AttrMap,
    pub status: SpanStatus,
}

impl TraceSpan {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            span_id: None,
            parent_span_id: None,
            trace_id: Uuid::new_v4(),
            start_time: Utc::now(),
            end_time: None,
            attributes: AttrMap::new(),
            status: SpanStatus::Ok,
        }
    }

    pub fn child_of(mut self, trace_id: Uuid, parent: SpanId) -> Self {
        self.trace_id = trace_id;
        self.parent_span_id = Some(parent);
        self
    }

    pub fn with_attributes(mut self, attributes: AttrMap) -> Self {
        self.attributes.extend(attributes);
        self
    }
}

/// Payload variants carried by a queued telemetry event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TelemetryPayload {
    Metric(MetricEvent),
    TraceStart(TraceSpan),
    Log(LogEvent),
}

impl TelemetryPayload {
    pub fn kind(&self) -> &'static str {
        match self {
            TelemetryPayload::Metric(_) => "metric",
            TelemetryPayload::TraceStart(_) => "trace",
            TelemetryPayload::Log(_) => "log",
        }
    }
}

/// Envelope stored in the event queue: a payload plus the retry bookkeeping
/// that travels with it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryEvent {
    pub payload: TelemetryPayload,
    pub attempts: u32,
    pub timestamp: DateTime<Utc>,
}

impl TelemetryEvent {
    pub fn new(payload: TelemetryPayload) -> Self {
        Self {
            payload,
            attempts: 0,
            timestamp: Utc::now(),
        }
    }

    pub fn kind(&self) -> &'static str {
        self.payload.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_builder_sets_fields() {
        let metric = MetricEvent::new("http.requests", 1.0)
            .with_unit("count")
            .with_attribute("route", "/api/users")
            .with_attribute("status", 200i64);

        assert_eq!(metric.name, "http.requests");
        assert_eq!(metric.unit.as_deref(), Some("count"));
        assert_eq!(
            metric.attributes.get("route"),
            Some(&AttrValue::String("/api/users".to_string()))
        );
        assert_eq!(metric.attributes.get("status"), Some(&AttrValue::Int(200)));
    }

    #[test]
    fn child_span_inherits_trace() {
        let parent = TraceSpan::new("parent");
        let parent_id = SpanId::new();
        let child = TraceSpan::new("child").child_of(parent.trace_id, parent_id);

        assert_eq!(child.trace_id, parent.trace_id);
        assert_eq!(child.parent_span_id, Some(parent_id));
    }

    #[test]
    fn envelope_starts_with_zero_attempts() {
        let event = TelemetryEvent::new(TelemetryPayload::Log(LogEvent::new(
            LogLevel::Info,
            "started",
        )));
        assert_eq!(event.attempts, 0);
        assert_eq!(event.kind(), "log");
    }

    #[test]
    fn payload_serializes_with_tag() {
        let event = TelemetryEvent::new(TelemetryPayload::Metric(MetricEvent::new("cpu", 0.5)));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["payload"]["type"], "metric");
        assert_eq!(json["attempts"], 0);
    }
}
