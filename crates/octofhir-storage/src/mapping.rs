//! Entity mappings: which tables hold a resource type and in which columns.
//!
//! A resource type maps to a chain of tables, base first
//! (`resource` → `domainresource` → `<type>`), joined on the resource id.
//! Every table has a shadow `<table>_history` table with the same columns.

use serde::{Deserialize, Serialize};

/// Name of the soft-delete flag column in the base table.
pub const IS_DELETED: &str = "is_deleted";
/// Name of the soft-delete timestamp column in the base table.
pub const DELETED_AT: &str = "deleted_at";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    /// Not loaded unless asked for.
    pub deferred: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDef {
    pub name: String,
    pub columns: Vec<ColumnDef>,
}

impl TableDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
        }
    }

    #[must_use]
    pub fn column(mut self, name: impl Into<String>) -> Self {
        self.columns.push(ColumnDef {
            name: name.into(),
            deferred: false,
        });
        self
    }

    #[must_use]
    pub fn deferred(mut self, name: impl Into<String>) -> Self {
        self.columns.push(ColumnDef {
            name: name.into(),
            deferred: true,
        });
        self
    }

    #[must_use]
    pub fn columns<I, S>(self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        names.into_iter().fold(self, |table, name| table.column(name))
    }

    pub fn history_name(&self) -> String {
        format!("{}_history", self.name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityMapping {
    pub resource_type: String,
    /// Base table first.
    pub tables: Vec<TableDef>,
}

impl EntityMapping {
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            tables: Vec::new(),
        }
    }

    #[must_use]
    pub fn table(mut self, table: TableDef) -> Self {
        self.tables.push(table);
        self
    }

    /// The standard chain for a FHIR domain resource: `resource` with the
    /// soft-delete bookkeeping, `domainresource` with a deferred `text`, and a
    /// table named after the type holding `columns`.
    pub fn domain_resource<I, S>(resource_type: &str, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(resource_type)
            .table(
                TableDef::new("resource")
                    .columns(["meta", "implicitRules", "language", IS_DELETED, DELETED_AT]),
            )
            .table(
                TableDef::new("domainresource")
                    .deferred("text")
                    .columns(["contained", "extension", "modifierExtension"]),
            )
            .table(TableDef::new(resource_type.to_lowercase()).columns(columns))
    }

    /// The table that stores `column`.
    pub fn table_for(&self, column: &str) -> Option<&TableDef> {
        self.tables.iter().find(|t| t.has_column(column))
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.table_for(column).is_some()
    }

    pub fn columns(&self) -> impl Iterator<Item = &ColumnDef> {
        self.tables.iter().flat_map(|t| t.columns.iter())
    }

    pub fn is_deferred(&self, column: &str) -> bool {
        self.columns().any(|c| c.name == column && c.deferred)
    }
}
