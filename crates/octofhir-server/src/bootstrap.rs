//! Startup wiring: configuration, tracing, profiles, storage and the
//! terminology client.

use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use octofhir_db_memory::create_storage;
use octofhir_elements::{HttpTerminologyClient, TerminologyValidator};

use crate::config::{AppConfig, loader};
use crate::constraints::ProfileConstraint;
use crate::lifecycle::ResourceManager;
use crate::observability::init_tracing_with_level;
use crate::pipeline::Pipeline;
use crate::registry::ProfileRegistry;

/// Loads configuration from `config_path` (or `octofhir.toml`) plus
/// `OCTOFHIR__*` overrides, initialises tracing and builds the manager.
pub fn init(config_path: Option<&str>) -> anyhow::Result<ResourceManager> {
    let config = loader::load_config(config_path).map_err(anyhow::Error::msg)?;
    init_tracing_with_level(&config.logging.level);
    build_manager(&config)
}

/// Builds a resource manager from an already validated configuration.
pub fn build_manager(config: &AppConfig) -> anyhow::Result<ResourceManager> {
    let mut registry = ProfileRegistry::builtin().context("registering resource profiles")?;
    for path in &config.profiles.structure_definitions {
        let constraint = ProfileConstraint::from_file(path)?;
        registry
            .apply(&constraint)
            .with_context(|| format!("applying profile {}", path.display()))?;
        info!(profile = %path.display(), resource_type = %constraint.resource_type, "profile applied");
    }
    let registry = Arc::new(registry);

    let storage = create_storage(&config.storage);
    registry
        .register_mappings(storage.as_ref())
        .context("registering entity mappings")?;

    let terminology = terminology_client(config)?;
    let pipeline = Pipeline::new(registry.clone(), config.validation.clone(), terminology);

    info!(
        backend = storage.backend_name(),
        resource_types = registry.resource_types().count(),
        terminology = config.terminology.enabled,
        "resource manager ready"
    );
    Ok(ResourceManager::new(storage, registry, pipeline))
}

fn terminology_client(config: &AppConfig) -> anyhow::Result<Option<Arc<dyn TerminologyValidator>>> {
    if !config.terminology.enabled {
        info!("terminology checks disabled");
        return Ok(None);
    }
    let client = HttpTerminologyClient::new(&config.terminology.base_url, config.terminology_timeout())
        .with_context(|| format!("creating terminology client for {}", config.terminology.base_url))?;
    info!(base_url = %config.terminology.base_url, "terminology client configured");
    Ok(Some(Arc::new(client)))
}
