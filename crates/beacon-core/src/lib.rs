//! # Beacon Core
//!
//! Domain types and leaf logic for the Beacon telemetry orchestration core:
//!
//! - **Events**: metric, trace span, and log event types plus the queueable
//!   envelope that wraps them
//! - **Backend contract**: the capability trait every telemetry backend
//!   adapter implements
//! - **Configuration**: validated, immutable orchestration settings
//! - **Sanitization**: redaction of sensitive data before events leave the
//!   process

pub mod backend;
pub mod config;
pub mod error;
pub mod event;
pub mod sanitize;

pub use backend::TelemetryBackend;
pub use config::TelemetryConfig;
pub use error::{BackendError, BackendResult, BeaconError, Result};
pub use event::{
    AttrMap, AttrValue, LogEvent, LogLevel, MetricEvent, SpanId, SpanStatus, TelemetryEvent,
    TelemetryPayload, TraceSpan,
};
pub use sanitize::Sanitizer;
