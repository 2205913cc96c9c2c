//! Application state for the SOS API.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::backend::{self, InMemoryStore, SosBackend};
use crate::config::SosConfig;
use crate::metrics::MetricsCollector;
use crate::operation_table::OperationTable;
use crate::pipeline::{Dispatcher, Pipeline};
use crate::registry::CodecRegistry;

/// Shared application state.
pub struct AppState {
    /// Request pipeline used by the service and REST endpoints.
    pub pipeline: Arc<Pipeline>,

    /// Operation handlers and their enabled flags.
    pub operations: Arc<OperationTable>,

    pub backend: Arc<SosBackend>,

    pub store: Arc<InMemoryStore>,

    pub metrics: Arc<MetricsCollector>,

    /// SOS configuration (hot-reloadable).
    pub config: RwLock<SosConfig>,

    /// File the configuration was loaded from, if any.
    pub config_path: Option<PathBuf>,
}

impl AppState {
    /// Wire registries, backend and pipeline from a configuration.
    pub fn from_config(config: SosConfig, config_path: Option<PathBuf>) -> Result<Self> {
        let settings = config
            .pipeline_settings()
            .context("Invalid pipeline settings")?;

        let operations = Arc::new(OperationTable::new());
        operations.replace_disabled(config.disabled_keys()?);

        let codecs = Arc::new(CodecRegistry::with_defaults(
            settings.rest.clone(),
            settings.phrases.clone(),
        ));
        let dispatcher = Arc::new(Dispatcher::new(
            Arc::clone(&operations),
            settings.phrases.clone(),
        ));

        let store = Arc::new(InMemoryStore::new());
        let sos_backend = Arc::new(SosBackend::new(
            Arc::clone(&store),
            Arc::downgrade(&operations),
            config.service_info(),
        ));
        backend::register(&operations, &dispatcher, Arc::clone(&sos_backend));

        let metrics = Arc::new(MetricsCollector::new());
        let pipeline = Arc::new(Pipeline::new(
            codecs,
            dispatcher,
            Arc::clone(&metrics),
            settings,
        ));

        tracing::info!(
            operations = operations.entries().len(),
            url_pattern = %config.rest.url_pattern,
            "SOS state initialized"
        );

        Ok(Self {
            pipeline,
            operations,
            backend: sos_backend,
            store,
            metrics,
            config: RwLock::new(config),
            config_path,
        })
    }

    /// Load the configuration file and build the state.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let config = SosConfig::load(&path)?;
        Self::from_config(config, Some(path))
    }

    /// Reload configuration from disk.
    ///
    /// The disabled set, fault phrases, default formats and service metadata
    /// are replaced. The REST URL pattern is bound to the router and only
    /// changes on restart.
    pub async fn reload_config(&self) -> Result<()> {
        let path = self
            .config_path
            .as_ref()
            .context("No configuration file to reload")?;
        let new_config = SosConfig::load(path)?;
        self.apply_config(new_config).await
    }

    pub async fn apply_config(&self, new_config: SosConfig) -> Result<()> {
        let settings = new_config.pipeline_settings()?;
        let disabled = new_config.disabled_keys()?;

        let mut config = self.config.write().await;
        if config.rest.url_pattern != new_config.rest.url_pattern {
            tracing::warn!(
                current = %config.rest.url_pattern,
                configured = %new_config.rest.url_pattern,
                "REST URL pattern changes take effect on restart"
            );
        }

        self.operations.replace_disabled(disabled);
        self.pipeline.apply_settings(settings);
        self.backend.set_info(new_config.service_info());
        *config = new_config;
        tracing::info!("SOS configuration reloaded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sos_common::{Operation, OperationKey};

    #[tokio::test]
    async fn test_apply_config_resyncs_disabled_set() {
        let state = AppState::from_config(SosConfig::default(), None).unwrap();
        let key = OperationKey::sos("2.0.0", Operation::DeleteSensor);
        assert!(state.operations.is_enabled(&key));

        let mut config = SosConfig::default();
        config.operations.disabled.push("SOS/2.0.0/DeleteSensor".to_string());
        state.apply_config(config).await.unwrap();
        assert!(!state.operations.is_enabled(&key));

        state.apply_config(SosConfig::default()).await.unwrap();
        assert!(state.operations.is_enabled(&key));
    }

    #[tokio::test]
    async fn test_reload_without_file_fails() {
        let state = AppState::from_config(SosConfig::default(), None).unwrap();
        assert!(state.reload_config().await.is_err());
    }
}
