//! Storage traits for the versioned storage layer.

use std::sync::Arc;

use async_trait::async_trait;
use octofhir_core::FhirDateTime;

use crate::error::StorageError;
use crate::mapping::EntityMapping;
use crate::session::Session;
use crate::types::{
    ColumnFilter, Columns, CommitOutcome, EntityRecord, HistoryRow, HistorySnapshot, LoadOptions,
};

/// A storage that versions every change to a resource.
///
/// Every committed change bumps the resource version by exactly one and
/// copies the prior state of every table in the chain into its history
/// table first. Implementations must be thread-safe (`Send + Sync`).
///
/// # Example
///
/// ```ignore
/// use octofhir_storage::{LoadOptions, VersionedStorage};
///
/// async fn deactivate(storage: &dyn VersionedStorage, id: &str) -> Result<(), StorageError> {
///     let mut session = storage.begin("Patient", id).await?;
///     session.set("active", serde_json::json!(false));
///     storage.commit(session).await?;
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait VersionedStorage: Send + Sync {
    /// Registers the table chain of a resource type. Re-registering
    /// replaces the previous mapping.
    fn register_mapping(&self, mapping: EntityMapping) -> Result<(), StorageError>;

    /// Returns the mapping registered for `resource_type`.
    fn mapping(&self, resource_type: &str) -> Option<Arc<EntityMapping>>;

    /// Writes the live rows of a new resource at version 1, created and
    /// updated at `at`. No history is written.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::AlreadyExists` if the type and id have live rows
    /// or history.
    /// Returns `StorageError::UnknownColumn` for columns outside the mapping.
    async fn insert(
        &self,
        resource_type: &str,
        id: &str,
        columns: Columns,
        at: FhirDateTime,
    ) -> Result<EntityRecord, StorageError>;

    /// Loads the live rows of a resource, soft-deleted ones included.
    ///
    /// Returns `None` if there is no live row.
    async fn load(
        &self,
        resource_type: &str,
        id: &str,
        options: LoadOptions,
    ) -> Result<Option<EntityRecord>, StorageError>;

    /// Loads the resource and opens a session on it.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if there is no live row.
    async fn begin(&self, resource_type: &str, id: &str) -> Result<Session, StorageError> {
        self.load(resource_type, id, LoadOptions::default())
            .await?
            .map(Session::new)
            .ok_or_else(|| StorageError::not_found(resource_type, id))
    }

    /// Applies the net changes of `session` as one new version, stamped with
    /// [`Session::changed_at`] when set.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::StaleVersion` if another writer committed after
    /// the session was opened; nothing is written in that case.
    /// Returns `StorageError::Gone` if the live rows were removed but history
    /// remains.
    async fn commit(&self, session: Session) -> Result<CommitOutcome, StorageError>;

    /// Removes the live rows from every table. History is kept and no
    /// snapshot of the final state is taken.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Gone` if only history remains and
    /// `StorageError::NotFound` if nothing was ever stored.
    async fn hard_delete(&self, resource_type: &str, id: &str) -> Result<(), StorageError>;

    /// Prior states of a resource, oldest first.
    async fn history(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<HistorySnapshot>, StorageError>;

    /// Raw rows of one history table for one resource, oldest first.
    async fn table_history(
        &self,
        resource_type: &str,
        table: &str,
        id: &str,
    ) -> Result<Vec<HistoryRow>, StorageError>;

    /// Live, non-deleted resources matching every filter.
    async fn find(
        &self,
        resource_type: &str,
        filters: &[ColumnFilter],
    ) -> Result<Vec<EntityRecord>, StorageError>;

    /// Returns the name of this storage backend for logging/debugging.
    fn backend_name(&self) -> &'static str;
}
