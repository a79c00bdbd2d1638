//! # Beacon Orchestration
//!
//! The telemetry orchestrator and its state machines. Instrumentation calls
//! enter here, are sanitized and sampled, pass the circuit-breaker gate, and
//! are delivered to the current backend — or queued and retried with backoff
//! when delivery is not possible. Recording never fails the caller for
//! delivery problems; only configuration errors and total backend failure
//! are fatal.
//!
//! ## Quick Start
//!
//! ```no_run
//! use beacon_backend::BackendRegistry;
//! use beacon_core::TelemetryConfig;
//! use beacon_orchestration::{MetricsService, TelemetryOrchestrator};
//!
//! #[tokio::main]
//! async fn main() -> beacon_core::Result<()> {
//!     let config = TelemetryConfig::new("checkout", "1.4.2");
//!     let registry = BackendRegistry::with_defaults();
//!     let orchestrator = TelemetryOrchestrator::initialize(config, &registry).await?;
//!
//!     let metrics = MetricsService::new(orchestrator.clone());
//!     metrics.increment("orders.placed").await;
//!
//!     orchestrator.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod breaker;
pub mod orchestrator;
pub mod queue;
pub mod retry;
pub mod sampler;
pub mod services;


pub use breaker::{BreakerState, CircuitBreaker};
pub use orchestrator::{ActiveBackend, HealthStatus, TelemetryOrchestrator};
pub use queue::EventQueue;
pub use retry::RetryScheduler;
pub use sampler::Sampler;
pub use services::{LoggerService, MetricsService, TracerService};
