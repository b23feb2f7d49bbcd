use std::sync::Arc;

use serde::Deserialize;

use crate::InMemoryStorage;
use octofhir_storage::DynStorage;

/// Supported storage backend types.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// In-memory tables behind a tokio RwLock, mappings in papaya::HashMap
    #[default]
    Memory,
}

/// Storage-specific configuration options.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StorageOptions {
    /// Initial capacity of the live resource index.
    pub preallocate_items: Option<usize>,
}

/// Factory configuration to construct a storage instance.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub options: StorageOptions,
}

/// Create a storage instance based on the provided configuration.
pub fn create_storage(config: &StorageConfig) -> DynStorage {
    match config.backend {
        StorageBackend::Memory => Arc::new(InMemoryStorage::with_options(config.options.clone())),
    }
}
