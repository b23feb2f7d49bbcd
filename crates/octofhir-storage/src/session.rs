//! Unit of work over one loaded resource.

use octofhir_core::FhirDateTime;
use serde_json::Value;

use crate::types::{Columns, EntityRecord};

/// Pending column writes against the version a writer observed.
///
/// Writes are only recorded here; the storage applies them on commit. A
/// column written back to its loaded value is not a change.
#[derive(Debug, Clone)]
pub struct Session {
    loaded: EntityRecord,
    observed_version: u64,
    pending: Columns,
    changed_at: Option<FhirDateTime>,
}

impl Session {
    pub fn new(loaded: EntityRecord) -> Self {
        let observed_version = loaded.version;
        Self {
            loaded,
            observed_version,
            pending: Columns::new(),
            changed_at: None,
        }
    }

    pub fn resource_type(&self) -> &str {
        &self.loaded.resource_type
    }

    pub fn id(&self) -> &str {
        &self.loaded.id
    }

    pub fn loaded(&self) -> &EntityRecord {
        &self.loaded
    }

    pub fn observed_version(&self) -> u64 {
        self.observed_version
    }

    /// Timestamp the commit records as the change time. Without one the
    /// storage uses its own clock.
    pub fn changed_at(&self) -> Option<FhirDateTime> {
        self.changed_at
    }

    pub fn set_changed_at(&mut self, at: FhirDateTime) {
        self.changed_at = Some(at);
    }

    /// Records a write. A later write to the same column replaces it.
    pub fn set(&mut self, column: impl Into<String>, value: Value) {
        self.pending.insert(column.into(), value);
    }

    pub fn clear(&mut self, column: impl Into<String>) {
        self.set(column, Value::Null);
    }

    /// Current value as seen through this session.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.pending
            .get(column)
            .or_else(|| self.loaded.columns.get(column))
            .filter(|v| !v.is_null())
    }

    pub fn pending(&self) -> &Columns {
        &self.pending
    }

    /// Writes that differ from the loaded state. Writes to unloaded columns
    /// always count; the storage settles them against the stored row.
    pub fn net_changes(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.pending.iter().filter_map(|(column, value)| {
            let changed = !self.loaded.is_loaded(column)
                || !same_value(self.loaded.columns.get(column), value);
            changed.then_some((column.as_str(), value))
        })
    }

    pub fn has_net_changes(&self) -> bool {
        self.net_changes().next().is_some()
    }
}

/// Absent and `null` are the same value.
pub fn same_value(stored: Option<&Value>, new: &Value) -> bool {
    match stored {
        Some(v) => v == new,
        None => new.is_null(),
    }
}
