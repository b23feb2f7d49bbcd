//! # octofhir-storage
//!
//! Versioned storage layer for the OctoFHIR server.
//!
//! This crate defines the traits and types that storage backends implement.
//! It does not contain any implementations - those are provided by separate crates.
//!
//! ## Overview
//!
//! The main trait is [`VersionedStorage`]. Resources are stored across a
//! chain of tables described by an [`EntityMapping`]; changes go through a
//! [`Session`] and are committed as exactly one new version, with the prior
//! state copied into per-table history first.

mod error;
pub mod mapping;
mod session;
mod traits;
mod types;

// Re-export everything from submodules
pub use error::{ErrorCategory, StorageError};
pub use mapping::{ColumnDef, DELETED_AT, EntityMapping, IS_DELETED, TableDef};
pub use session::{Session, same_value};
pub use traits::VersionedStorage;
pub use types::{
    ChangeType, ColumnFilter, Columns, CommitOutcome, EntityRecord, HistoryRow, HistorySnapshot,
    LoadOptions,
};

/// Type alias for a storage result.
pub type StorageResult<T> = Result<T, StorageError>;

/// Type alias for a shared storage trait object.
pub type DynStorage = std::sync::Arc<dyn VersionedStorage>;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use octofhir_storage::prelude::*;
/// ```
pub mod prelude {
    pub use crate::error::{ErrorCategory, StorageError};
    pub use crate::mapping::{EntityMapping, TableDef};
    pub use crate::session::Session;
    pub use crate::traits::VersionedStorage;
    pub use crate::types::{
        ChangeType, ColumnFilter, Columns, CommitOutcome, EntityRecord, HistoryRow,
        HistorySnapshot, LoadOptions,
    };
    pub use crate::{DynStorage, StorageResult};
}
