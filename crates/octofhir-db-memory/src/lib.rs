//! In-memory versioned storage backend for OctoFHIR server.
//!
//! This crate provides an in-memory implementation of the `VersionedStorage`
//! trait from `octofhir-storage`. Mappings are kept in a papaya lock-free
//! HashMap; tables and their history shadows sit behind a single tokio
//! `RwLock` so every commit is atomic.
//!
//! # Example
//!
//! ```ignore
//! use octofhir_db_memory::InMemoryStorage;
//! use octofhir_core::now_utc;
//! use octofhir_storage::{Columns, EntityMapping, VersionedStorage};
//!
//! let storage = InMemoryStorage::new();
//! storage.register_mapping(EntityMapping::domain_resource("Patient", ["gender"]))?;
//!
//! storage.insert("Patient", "p1", Columns::new(), now_utc()).await?;
//! let mut session = storage.begin("Patient", "p1").await?;
//! session.set("gender", serde_json::json!("female"));
//! let outcome = storage.commit(session).await?;
//! assert_eq!(outcome.record().version, 2);
//! ```

pub mod factory;
pub mod storage;

pub use factory::{StorageBackend, StorageConfig, StorageOptions, create_storage};
pub use octofhir_storage::{DynStorage, StorageError, VersionedStorage};
pub use storage::InMemoryStorage;
