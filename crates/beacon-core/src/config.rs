//! Orchestrator configuration and validation

use crate::error::{BeaconError, Result};
use crate::sanitize::RedactionPatterns;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Main orchestrator configuration.
///
/// Built once, validated at orchestrator construction, and never mutated
/// afterwards. Invalid configuration fails fast.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Service identity attached to every outgoing event
    pub service: ServiceConfig,

    /// Backend selection and connection parameters
    pub backend: BackendConfig,

    /// Sampling rate and per-operation overrides
    pub sampling: SamplingConfig,

    /// Queueing and flush limits
    pub batching: BatchingConfig,

    /// Circuit breaker thresholds
    pub circuit_breaker: CircuitBreakerConfig,

    /// Retry and backoff policy
    pub retry: RetryConfig,

    /// Privacy and redaction settings
    pub privacy: PrivacyConfig,
}

/// Identity of the instrumented service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub version: String,
    pub environment: String,
}

/// Backend selection mode and per-backend connection parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// `"auto"` uses the configured primary/fallback pair as-is; any other
    /// value names a registered backend to force as primary.
    #[serde(default = "default_mode")]
    pub mode: String,

    pub primary: BackendEndpoint,
    pub fallback: BackendEndpoint,
}

fn default_mode() -> String {
    "auto".to_string()
}

/// Connection parameters for a single backend adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendEndpoint {
    /// Registry identifier of the backend adapter, e.g. `"memory"`
    pub backend: String,

    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplingConfig {
    /// Base sampling rate in `[0.0, 1.0]`
    pub rate: f64,

    /// Per-operation overrides; the first rule whose `operation` is a prefix
    /// of the event name wins
    pub rules: Vec<SamplingRule>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplingRule {
    pub operation: String,
    pub rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchingConfig {
    /// Maximum number of undelivered events held in memory
    pub max_queue_size: usize,

    /// Interval between background flushes of the queue (milliseconds)
    pub flush_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before the breaker opens
    pub failure_threshold: u32,

    /// Cool-down before a single probe is allowed (milliseconds)
    pub reset_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Delivery attempts before an event is dropped
    pub max_attempts: u32,

    /// Delay before the first retry (milliseconds)
    pub initial_delay_ms: u64,

    /// Multiplier applied to the delay on each subsequent attempt
    pub backoff_multiplier: f64,
}

/// Privacy and redaction configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrivacyConfig {
    /// Enable redaction of sensitive data before events leave the process
    pub sanitize_enabled: bool,

    /// Regex patterns replaced with a redaction marker, applied in order
    pub redaction_patterns: Vec<String>,

    /// Attribute keys whose values are always redacted wholesale
    pub redacted_fields: Vec<String>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service: ServiceConfig {
                name: String::new(),
                version: String::new(),
                environment: "production".to_string(),
            },
            backend: BackendConfig {
                mode: "auto".to_string(),
                primary: BackendEndpoint {
                    backend: "memory".to_string(),
                    endpoint: None,
                    api_key: None,
                    timeout_seconds: 30,
                },
                fallback: BackendEndpoint {
                    backend: "noop".to_string(),
                    endpoint: None,
                    api_key: None,
                    timeout_seconds: 30,
                },
            },
            sampling: SamplingConfig {
                rate: 1.0,
                rules: Vec::new(),
            },
            batching: BatchingConfig {
                max_queue_size: 100,
                flush_interval_ms: 5_000,
            },
            circuit_breaker: CircuitBreakerConfig {
                failure_threshold: 5,
                reset_timeout_ms: 30_000,
            },
            retry: RetryConfig {
                max_attempts: 3,
                initial_delay_ms: 1_000,
                backoff_multiplier: 2.0,
            },
            privacy: PrivacyConfig {
                sanitize_enabled: true,
                redaction_patterns: RedactionPatterns::all_default_patterns(),
                redacted_fields: vec![
                    "password".to_string(),
                    "api_key".to_string(),
                    "secret".to_string(),
                    "token".to_string(),
                    "authorization".to_string(),
                ],
            },
        }
    }
}

impl TelemetryConfig {
    /// Default configuration for the given service identity.
    pub fn new(service_name: impl Into<String>, service_version: impl Into<String>) -> Self {
        let mut config = Self::default();
        config.service.name = service_name.into();
        config.service.version = service_version.into();
        config
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist.
    pub async fn load(config_path: Option<&Path>) -> Result<Self> {
        let config_file = match config_path {
            Some(path) => path.to_path_buf(),
            None => Self::default_config_path()?,
        };

        if config_file.exists() {
            info!("Loading config from: {}", config_file.display());
            let content = tokio::fs::read_to_string(&config_file).await?;
            let config: TelemetryConfig =
                toml::from_str(&content).map_err(|e| BeaconError::Config {
                    message: format!("Failed to parse config: {}", e),
                })?;
            Ok(config)
        } else {
            info!("No config file found, using defaults");
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file.
    pub async fn save(&self, config_path: Option<&Path>) -> Result<()> {
        let config_file = match config_path {
            Some(path) => path.to_path_buf(),
            None => Self::default_config_path()?,
        };

        if let Some(parent) = config_file.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let content = toml::to_string_pretty(self).map_err(|e| BeaconError::Config {
            message: format!("Failed to serialize config: {}", e),
        })?;

        tokio::fs::write(&config_file, content).await?;
        Ok(())
    }

    fn default_config_path() -> Result<PathBuf> {
        let project_dirs =
            ProjectDirs::from("io", "beacon", "beacon").ok_or_else(|| BeaconError::Config {
                message: "Could not determine config directory".to_string(),
            })?;

        Ok(project_dirs.config_dir().join("beacon.toml"))
    }

    /// Validate the configuration, failing fast on anything that would make
    /// the orchestrator misbehave at runtime.
    pub fn validate(&self) -> Result<()> {
        if self.service.name.trim().is_empty() {
            return Err(BeaconError::Config {
                message: "service.name is required".to_string(),
            });
        }

        if self.service.version.trim().is_empty() {
            return Err(BeaconError::Config {
                message: "service.version is required".to_string(),
            });
        }

        if !(0.0..=1.0).contains(&self.sampling.rate) {
            return Err(BeaconError::Config {
                message: format!(
                    "sampling.rate must be within [0.0, 1.0], got {}",
                    self.sampling.rate
                ),
            });
        }

        for rule in &self.sampling.rules {
            if !(0.0..=1.0).contains(&rule.rate) {
                return Err(BeaconError::Config {
                    message: format!(
                        "sampling rule '{}' rate must be within [0.0, 1.0], got {}",
                        rule.operation, rule.rate
                    ),
                });
            }
        }

        if self.batching.max_queue_size == 0 {
            return Err(BeaconError::Config {
                message: "batching.max_queue_size must be greater than 0".to_string(),
            });
        }

        if self.circuit_breaker.failure_threshold == 0 {
            return Err(BeaconError::Config {
                message: "circuit_breaker.failure_threshold must be greater than 0".to_string(),
            });
        }

        if self.circuit_breaker.reset_timeout_ms == 0 {
            return Err(BeaconError::Config {
                message: "circuit_breaker.reset_timeout_ms must be greater than 0".to_string(),
            });
        }

        if self.retry.max_attempts == 0 {
            return Err(BeaconError::Config {
                message: "retry.max_attempts must be greater than 0".to_string(),
            });
        }

        if self.retry.backoff_multiplier < 1.0 {
            return Err(BeaconError::Config {
                message: "retry.backoff_multiplier must be at least 1.0".to_string(),
            });
        }

        for endpoint in [&self.backend.primary, &self.backend.fallback] {
            if let Some(url) = &endpoint.endpoint {
                if !url.starts_with("http://") && !url.starts_with("https://") {
                    return Err(BeaconError::Config {
                        message: format!(
                            "backend '{}' endpoint must start with http:// or https://",
                            endpoint.backend
                        ),
                    });
                }
            }
        }

        for pattern in &self.privacy.redaction_patterns {
            regex::Regex::new(pattern).map_err(|e| BeaconError::Config {
                message: format!("Invalid redaction pattern '{}': {}", pattern, e),
            })?;
        }

        Ok(())
    }
}
