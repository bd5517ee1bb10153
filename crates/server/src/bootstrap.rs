//! Process assembly: load config, load the catalog, wire the outbound
//! clients into responders, and hand back a ready pipeline.
//!
//! The catalog is the only startup-fatal data dependency. Outbound
//! services are not probed here; their failures belong to request time.

use std::sync::Arc;

use brewline_agent::{standard_pipeline, AgentPipeline};
use brewline_core::catalog::{CatalogError, CatalogStore};
use brewline_core::config::{AppConfig, ConfigError, LoadOptions};
use thiserror::Error;
use tracing::info;

use crate::routes::AppState;

pub struct Application {
    pub config: AppConfig,
    pub catalog: Arc<CatalogStore>,
    pub pipeline: Arc<AgentPipeline>,
}

impl Application {
    pub fn state(&self) -> AppState {
        AppState { pipeline: self.pipeline.clone() }
    }
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("catalog load failed: {0}")]
    Catalog(#[from] CatalogError),
    #[error("outbound client construction failed: {0}")]
    Client(#[source] anyhow::Error),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "system.bootstrap.start", "starting application bootstrap");

    let catalog = Arc::new(CatalogStore::load(&config.catalog)?);
    info!(
        event_name = "system.bootstrap.catalog_loaded",
        rule_count = catalog.rule_count(),
        popularity_count = catalog.popularity_count(),
        "recommendation catalog loaded"
    );

    let pipeline =
        Arc::new(standard_pipeline(&config, catalog.clone()).map_err(BootstrapError::Client)?);

    info!(event_name = "system.bootstrap.ready", "application bootstrap complete");

    Ok(Application { config, catalog, pipeline })
}
