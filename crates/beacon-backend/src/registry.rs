use crate::memory::MemoryBackend;
use crate::noop::NoopBackend;
use beacon_core::backend::TelemetryBackend;
use beacon_core::config::TelemetryConfig;
use beacon_core::error::{BeaconError, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

pub type BackendFactory = Arc<dyn Fn() -> Arc<dyn TelemetryBackend> + Send + Sync>;

/// Registry mapping a backend identifier to a factory producing adapters
/// implementing the capability contract.
///
/// New backends are added by registering a factory; the orchestrator itself
/// never matches on backend names.
pub struct BackendRegistry {
    factories: HashMap<String, BackendFactory>,
}

impl BackendRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry pre-populated with the built-in `memory` and `noop` backends.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("memory", || {
            let backend: Arc<dyn TelemetryBackend> = Arc::new(MemoryBackend::new());
            backend
        });
        registry.register("noop", || {
            let backend: Arc<dyn TelemetryBackend> = Arc::new(NoopBackend::new());
            backend
        });
        registry
    }

    pub fn register<F>(&mut self, id: impl Into<String>, factory: F)
    where
        F: Fn() -> Arc<dyn TelemetryBackend> + Send + Sync + 'static,
    {
        self.factories.insert(id.into(), Arc::new(factory));
    }

    pub fn contains(&self, id: &str) -> bool {
        self.factories.contains_key(id)
    }

    pub fn backend_ids(&self) -> Vec<&str> {
        self.factories.keys().map(|k| k.as_str()).collect()
    }

    /// Instantiate the backend registered under `id`.
    pub fn create(&self, id: &str) -> Result<Arc<dyn TelemetryBackend>> {
        let factory = self
            .factories
            .get(id)
            .ok_or_else(|| BeaconError::UnknownBackend { id: id.to_string() })?;
        Ok(factory())
    }

    /// Resolve the configured primary/fallback pair.
    ///
    /// In `auto` mode the configured pair is used as-is; a named mode forces
    /// that backend as primary.
    pub fn resolve_pair(
        &self,
        config: &TelemetryConfig,
    ) -> Result<(Arc<dyn TelemetryBackend>, Arc<dyn TelemetryBackend>)> {
        let primary_id = if config.backend.mode == "auto" {
            config.backend.primary.backend.as_str()
        } else {
            config.backend.mode.as_str()
        };
        let fallback_id = config.backend.fallback.backend.as_str();

        info!(primary = primary_id, fallback = fallback_id, "Resolving backend pair");

        let primary = self.create(primary_id)?;
        let fallback = self.create(fallback_id)?;
        Ok((primary, fallback))
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_backend_id_is_an_error() {
        let registry = BackendRegistry::with_defaults();
        let result = registry.create("faro");

        assert!(matches!(
            result,
            Err(BeaconError::UnknownBackend { .. })
        ));
    }

    #[test]
    fn registered_backend_is_created() {
        let registry = BackendRegistry::with_defaults();
        let backend = registry.create("memory").unwrap();
        assert_eq!(backend.name(), "memory");
    }

    #[test]
    fn custom_backend_can_be_registered() {
        let mut registry = BackendRegistry::new();
        registry.register("capture", || Arc::new(MemoryBackend::new()));

        assert!(registry.contains("capture"));
        assert!(!registry.contains("memory"));
    }

    #[test]
    fn auto_mode_uses_configured_pair() {
        let registry = BackendRegistry::with_defaults();
        let config = TelemetryConfig::new("checkout", "1.0.0");

        let (primary, fallback) = registry.resolve_pair(&config).unwrap();
        assert_eq!(primary.name(), "memory");
        assert_eq!(fallback.name(), "noop");
    }

    #[test]
    fn named_mode_overrides_primary() {
        let registry = BackendRegistry::with_defaults();
        let mut config = TelemetryConfig::new("checkout", "1.0.0");
        config.backend.mode = "noop".to_string();

        let (primary, _) = registry.resolve_pair(&config).unwrap();
        assert_eq!(primary.name(), "noop");
    }
}
