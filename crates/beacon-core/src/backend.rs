//! Backend capability contract

use crate::config::BackendEndpoint;
use crate::error::BackendResult;
use crate::event::{AttrMap, LogEvent, MetricEvent, SpanId, TraceSpan};
use async_trait::async_trait;

/// The capability contract every telemetry backend adapter satisfies.
///
/// The orchestrator never depends on backend-specific types: a concrete
/// adapter (an OTLP exporter, a vendor SDK, an in-memory capture sink)
/// implements exactly this surface and is selected through the backend
/// registry.
#[async_trait]
pub trait TelemetryBackend: Send + Sync {
    /// Stable identifier used in log output.
    fn name(&self) -> &'static str;

    /// Establish the connection or SDK setup for this backend.
    ///
    /// Fails with [`BackendError::Init`](crate::error::BackendError::Init)
    /// when required backend-specific fields are missing or the endpoint is
    /// malformed.
    async fn initialize(&self, endpoint: BackendEndpoint) -> BackendResult<()>;

    /// Fire-and-forget metric delivery.
    async fn record_metric(&self, metric: MetricEvent) -> BackendResult<()>;

    /// Fire-and-forget log delivery.
    async fn record_log(&self, log: LogEvent) -> BackendResult<()>;

    /// Start a span and return the backend-assigned identifier.
    async fn start_trace(&self, span: TraceSpan) -> BackendResult<SpanId>;

    /// Finalize a previously started span. An unknown span id is tolerated
    /// silently.
    async fn end_trace(&self, span_id: SpanId, attributes: AttrMap) -> BackendResult<()>;

    /// Best-effort drain of backend-internal buffering. Never fails; adapters
    /// log a warning on internal failure.
    async fn flush(&self);

    /// Release resources. Idempotent.
    async fn shutdown(&self);

    /// True only if initialized and no unrecovered failure has been observed.
    fn is_healthy(&self) -> bool;
}
