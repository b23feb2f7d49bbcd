//! Storage types for the versioned storage layer.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use octofhir_core::FhirDateTime;

use crate::mapping::{DELETED_AT, IS_DELETED};

/// Column name → value, in mapping order.
pub type Columns = IndexMap<String, Value>;

/// The live state of one resource, joined across its table chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub resource_type: String,
    pub id: String,
    /// Engine-owned version counter, starting at 1.
    pub version: u64,
    pub columns: Columns,
    /// Deferred columns that were not loaded.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unloaded: Vec<String>,
    pub created_at: FhirDateTime,
    pub updated_at: FhirDateTime,
}

impl EntityRecord {
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns.get(column).filter(|v| !v.is_null())
    }

    pub fn is_loaded(&self, column: &str) -> bool {
        !self.unloaded.iter().any(|c| c == column)
    }

    pub fn is_deleted(&self) -> bool {
        is_deleted(&self.columns)
    }

    pub fn deleted_at(&self) -> Option<&str> {
        self.columns.get(DELETED_AT).and_then(Value::as_str)
    }
}

pub(crate) fn is_deleted(columns: &Columns) -> bool {
    columns.get(IS_DELETED).and_then(Value::as_bool).unwrap_or(false)
}

/// What superseded the state recorded in a history row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Update,
    Delete,
}

/// One row of a `<table>_history` shadow table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRow {
    pub table: String,
    /// Shared tables hold rows of several types; this tells them apart.
    pub resource_type: String,
    pub id: String,
    /// Version of the state this row preserves.
    pub resource_version: u64,
    /// When that state was superseded.
    pub resource_changed: FhirDateTime,
    pub change: ChangeType,
    /// Every column of the table, deferred ones included.
    pub row: Columns,
}

/// A prior state of a resource, merged across its table chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistorySnapshot {
    pub resource_type: String,
    pub id: String,
    pub version: u64,
    pub changed: FhirDateTime,
    pub change: ChangeType,
    pub columns: Columns,
}

impl HistorySnapshot {
    pub fn is_deleted(&self) -> bool {
        is_deleted(&self.columns)
    }

    /// Merges per-table rows of one version, base table first.
    pub fn merge(resource_type: &str, rows: &[&HistoryRow]) -> Option<Self> {
        let first = rows.first()?;
        let mut columns = Columns::new();
        for row in rows {
            columns.extend(row.row.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        Some(Self {
            resource_type: resource_type.to_string(),
            id: first.id.clone(),
            version: first.resource_version,
            changed: first.resource_changed,
            change: first.change,
            columns,
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadOptions {
    /// Also load deferred columns.
    pub include_deferred: bool,
}

impl LoadOptions {
    pub fn full() -> Self {
        Self {
            include_deferred: true,
        }
    }
}

/// Result of committing a session.
#[derive(Debug, Clone, PartialEq)]
pub enum CommitOutcome {
    /// A new version was written.
    Committed(EntityRecord),
    /// Every pending write matched the stored value; nothing was written.
    Unchanged(EntityRecord),
}

impl CommitOutcome {
    pub fn record(&self) -> &EntityRecord {
        match self {
            Self::Committed(r) | Self::Unchanged(r) => r,
        }
    }

    pub fn into_record(self) -> EntityRecord {
        match self {
            Self::Committed(r) | Self::Unchanged(r) => r,
        }
    }

    pub fn is_committed(&self) -> bool {
        matches!(self, Self::Committed(_))
    }
}

/// Equality filter on a column, used for conditional operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnFilter {
    pub column: String,
    pub value: String,
}

impl ColumnFilter {
    pub fn new(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
        }
    }

    /// `_id`/`id` match the resource id; anything else matches when some
    /// scalar inside the column equals the value (strings case-insensitively).
    pub fn matches(&self, record: &EntityRecord) -> bool {
        match self.column.as_str() {
            "_id" | "id" => record.id == self.value,
            column => record
                .columns
                .get(column)
                .is_some_and(|v| contains_scalar(v, &self.value)),
        }
    }
}

fn contains_scalar(value: &Value, needle: &str) -> bool {
    match value {
        Value::String(s) => s.eq_ignore_ascii_case(needle),
        Value::Number(n) => n.to_string() == needle,
        Value::Bool(b) => b.to_string() == needle,
        Value::Array(items) => items.iter().any(|v| contains_scalar(v, needle)),
        Value::Object(map) => map.values().any(|v| contains_scalar(v, needle)),
        Value::Null => false,
    }
}
