use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use papaya::HashMap as PapayaHashMap;
use serde_json::Value;
use tokio::sync::RwLock;

use octofhir_core::{FhirDateTime, now_utc};
use octofhir_storage::{
    ChangeType, ColumnFilter, Columns, CommitOutcome, EntityMapping, EntityRecord, HistoryRow,
    HistorySnapshot, IS_DELETED, LoadOptions, Session, StorageError, VersionedStorage, same_value,
};

use crate::factory::StorageOptions;

/// Rows are keyed by type and id: the `resource` and `domainresource`
/// tables hold every type.
type RowKey = (String, String);

fn row_key(resource_type: &str, id: &str) -> RowKey {
    (resource_type.to_string(), id.to_string())
}

/// One table: live rows plus its history shadow.
#[derive(Debug, Default)]
pub(crate) struct Table {
    live: HashMap<RowKey, Columns>,
    history: Vec<HistoryRow>,
}

impl Table {
    fn history_of<'a>(
        &'a self,
        resource_type: &'a str,
        id: &'a str,
    ) -> impl Iterator<Item = &'a HistoryRow> + 'a {
        self.history
            .iter()
            .filter(move |h| h.resource_type == resource_type && h.id == id)
    }
}

/// Per-resource bookkeeping owned by the engine.
#[derive(Debug, Clone)]
pub(crate) struct EntityState {
    version: u64,
    created_at: FhirDateTime,
    updated_at: FhirDateTime,
}

#[derive(Debug, Default)]
pub(crate) struct Database {
    tables: HashMap<String, Table>,
    entities: HashMap<RowKey, EntityState>,
}

impl Database {
    fn table_mut(&mut self, name: &str) -> &mut Table {
        self.tables.entry(name.to_string()).or_default()
    }

    fn has_history(&self, mapping: &EntityMapping, id: &str) -> bool {
        mapping.tables.first().is_some_and(|base| {
            self.tables
                .get(&base.name)
                .is_some_and(|t| t.history_of(&mapping.resource_type, id).next().is_some())
        })
    }

    fn entity(&self, resource_type: &str, id: &str) -> Option<&EntityState> {
        self.entities.get(&row_key(resource_type, id))
    }

    /// `Gone` when the type and id left history behind, `NotFound` otherwise.
    fn missing(&self, mapping: &EntityMapping, id: &str) -> StorageError {
        if self.has_history(mapping, id) {
            StorageError::gone(&mapping.resource_type, id)
        } else {
            StorageError::not_found(&mapping.resource_type, id)
        }
    }

    /// Joins the live rows of `id` across the chain.
    fn read(
        &self,
        mapping: &EntityMapping,
        id: &str,
        options: LoadOptions,
    ) -> Option<EntityRecord> {
        let key = row_key(&mapping.resource_type, id);
        let state = self.entities.get(&key)?;
        let mut columns = Columns::new();
        let mut unloaded = Vec::new();
        for table in &mapping.tables {
            let row = self.tables.get(&table.name).and_then(|t| t.live.get(&key));
            for column in &table.columns {
                if column.deferred && !options.include_deferred {
                    unloaded.push(column.name.clone());
                    continue;
                }
                let value = row
                    .and_then(|r| r.get(&column.name))
                    .cloned()
                    .unwrap_or(Value::Null);
                columns.insert(column.name.clone(), value);
            }
        }
        Some(EntityRecord {
            resource_type: mapping.resource_type.clone(),
            id: id.to_string(),
            version: state.version,
            columns,
            unloaded,
            created_at: state.created_at,
            updated_at: state.updated_at,
        })
    }
}

/// In-memory versioned storage.
///
/// Mappings live in a lock-free papaya map. All tables sit behind one
/// `RwLock`, so a commit (stale check, history copy and live write) is atomic
/// with respect to every other writer and reader.
#[derive(Debug)]
pub struct InMemoryStorage {
    mappings: PapayaHashMap<String, Arc<EntityMapping>>,
    db: RwLock<Database>,
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStorage {
    /// Creates a new in-memory storage with default options.
    pub fn new() -> Self {
        Self::with_options(StorageOptions::default())
    }

    /// Creates a new in-memory storage with the given options.
    pub fn with_options(options: StorageOptions) -> Self {
        let entities = options
            .preallocate_items
            .map(HashMap::with_capacity)
            .unwrap_or_default();
        Self {
            mappings: PapayaHashMap::new(),
            db: RwLock::new(Database {
                tables: HashMap::new(),
                entities,
            }),
        }
    }

    fn require_mapping(&self, resource_type: &str) -> Result<Arc<EntityMapping>, StorageError> {
        self.mapping(resource_type)
            .ok_or_else(|| StorageError::unknown_mapping(resource_type))
    }

    /// Number of live resources across all types.
    pub async fn count(&self) -> usize {
        self.db.read().await.entities.len()
    }
}

#[async_trait]
impl VersionedStorage for InMemoryStorage {
    fn register_mapping(&self, mapping: EntityMapping) -> Result<(), StorageError> {
        if mapping.tables.is_empty() {
            return Err(StorageError::internal(format!(
                "mapping for {} has no tables",
                mapping.resource_type
            )));
        }
        tracing::debug!(resource_type = %mapping.resource_type, tables = mapping.tables.len(), "registering entity mapping");
        let guard = self.mappings.pin();
        guard.insert(mapping.resource_type.clone(), Arc::new(mapping));
        Ok(())
    }

    fn mapping(&self, resource_type: &str) -> Option<Arc<EntityMapping>> {
        let guard = self.mappings.pin();
        guard.get(resource_type).cloned()
    }

    async fn insert(
        &self,
        resource_type: &str,
        id: &str,
        columns: Columns,
        at: FhirDateTime,
    ) -> Result<EntityRecord, StorageError> {
        let mapping = self.require_mapping(resource_type)?;
        if let Some(column) = columns.keys().find(|c| !mapping.has_column(c)) {
            return Err(StorageError::unknown_column(resource_type, column.clone()));
        }

        let key = row_key(resource_type, id);
        let mut db = self.db.write().await;
        if db.entities.contains_key(&key) || db.has_history(&mapping, id) {
            return Err(StorageError::already_exists(resource_type, id));
        }

        for table in &mapping.tables {
            let row: Columns = table
                .columns
                .iter()
                .map(|c| {
                    let value = columns.get(&c.name).cloned().unwrap_or_else(|| {
                        if c.name == IS_DELETED {
                            Value::Bool(false)
                        } else {
                            Value::Null
                        }
                    });
                    (c.name.clone(), value)
                })
                .collect();
            db.table_mut(&table.name).live.insert(key.clone(), row);
        }

        db.entities.insert(
            key,
            EntityState {
                version: 1,
                created_at: at,
                updated_at: at,
            },
        );
        tracing::debug!(resource_type, id, "inserted at version 1");

        db.read(&mapping, id, LoadOptions::full())
            .ok_or_else(|| StorageError::internal("inserted row vanished"))
    }

    async fn load(
        &self,
        resource_type: &str,
        id: &str,
        options: LoadOptions,
    ) -> Result<Option<EntityRecord>, StorageError> {
        let mapping = self.require_mapping(resource_type)?;
        let db = self.db.read().await;
        Ok(db.read(&mapping, id, options))
    }

    async fn commit(&self, session: Session) -> Result<CommitOutcome, StorageError> {
        let resource_type = session.resource_type();
        let id = session.id();
        let mapping = self.require_mapping(resource_type)?;
        if let Some(column) = session.pending().keys().find(|c| !mapping.has_column(c)) {
            return Err(StorageError::unknown_column(resource_type, column.clone()));
        }

        let key = row_key(resource_type, id);
        let mut db = self.db.write().await;
        let state = match db.entity(resource_type, id) {
            Some(state) => state.clone(),
            None => return Err(db.missing(&mapping, id)),
        };
        if state.version != session.observed_version() {
            tracing::warn!(
                resource_type,
                id,
                expected = session.observed_version(),
                actual = state.version,
                "rejecting stale write"
            );
            return Err(StorageError::stale_version(
                resource_type,
                id,
                session.observed_version(),
                state.version,
            ));
        }

        // Settle net changes against the stored rows, deferred columns included.
        let mut changes: Vec<(&str, &str, &Value)> = Vec::new();
        for (column, value) in session.pending() {
            let Some(table) = mapping.table_for(column) else {
                continue;
            };
            let stored = db
                .tables
                .get(&table.name)
                .and_then(|t| t.live.get(&key))
                .and_then(|row| row.get(column));
            if !same_value(stored, value) {
                changes.push((table.name.as_str(), column.as_str(), value));
            }
        }

        if changes.is_empty() {
            tracing::debug!(resource_type, id, version = state.version, "no net change");
            let record = db
                .read(&mapping, id, LoadOptions::full())
                .ok_or_else(|| StorageError::not_found(resource_type, id))?;
            return Ok(CommitOutcome::Unchanged(record));
        }

        let was_deleted = db
            .read(&mapping, id, LoadOptions::default())
            .is_some_and(|r| r.is_deleted());
        let becomes_deleted = changes
            .iter()
            .find(|(_, column, _)| *column == IS_DELETED)
            .map(|(_, _, v)| v.as_bool() == Some(true))
            .unwrap_or(was_deleted);
        let change = if becomes_deleted && !was_deleted {
            ChangeType::Delete
        } else {
            ChangeType::Update
        };

        let now = session.changed_at().unwrap_or_else(now_utc);
        for table in &mapping.tables {
            let t = db.table_mut(&table.name);
            let prior = t.live.get(&key).cloned().unwrap_or_default();
            t.history.push(HistoryRow {
                table: table.name.clone(),
                resource_type: resource_type.to_string(),
                id: id.to_string(),
                resource_version: state.version,
                resource_changed: now,
                change,
                row: prior,
            });
        }

        for (table, column, value) in changes {
            let row = db.table_mut(table).live.entry(key.clone()).or_default();
            row.insert(column.to_string(), value.clone());
        }

        let new_version = state.version + 1;
        if let Some(entity) = db.entities.get_mut(&key) {
            entity.version = new_version;
            entity.updated_at = now;
        }
        tracing::debug!(resource_type, id, version = new_version, ?change, "committed");

        db.read(&mapping, id, LoadOptions::full())
            .map(CommitOutcome::Committed)
            .ok_or_else(|| StorageError::internal("committed row vanished"))
    }

    async fn hard_delete(&self, resource_type: &str, id: &str) -> Result<(), StorageError> {
        let mapping = self.require_mapping(resource_type)?;
        let key = row_key(resource_type, id);
        let mut db = self.db.write().await;
        if db.entities.remove(&key).is_none() {
            return Err(db.missing(&mapping, id));
        }
        for table in &mapping.tables {
            db.table_mut(&table.name).live.remove(&key);
        }
        tracing::debug!(resource_type, id, "hard deleted live rows");
        Ok(())
    }

    async fn history(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<HistorySnapshot>, StorageError> {
        let mapping = self.require_mapping(resource_type)?;
        let db = self.db.read().await;

        let Some(base) = mapping.tables.first() else {
            return Ok(Vec::new());
        };
        let versions: Vec<u64> = db
            .tables
            .get(&base.name)
            .map(|t| t.history_of(resource_type, id).map(|h| h.resource_version).collect())
            .unwrap_or_default();

        let mut snapshots = Vec::with_capacity(versions.len());
        for version in versions {
            let rows: Vec<&HistoryRow> = mapping
                .tables
                .iter()
                .filter_map(|table| {
                    db.tables
                        .get(&table.name)?
                        .history_of(resource_type, id)
                        .find(|h| h.resource_version == version)
                })
                .collect();
            if let Some(snapshot) = HistorySnapshot::merge(resource_type, &rows) {
                snapshots.push(snapshot);
            }
        }
        snapshots.sort_by_key(|s| s.version);
        Ok(snapshots)
    }

    async fn table_history(
        &self,
        resource_type: &str,
        table: &str,
        id: &str,
    ) -> Result<Vec<HistoryRow>, StorageError> {
        let db = self.db.read().await;
        let mut rows: Vec<HistoryRow> = db
            .tables
            .get(table)
            .map(|t| t.history_of(resource_type, id).cloned().collect())
            .unwrap_or_default();
        rows.sort_by_key(|r| r.resource_version);
        Ok(rows)
    }

    async fn find(
        &self,
        resource_type: &str,
        filters: &[ColumnFilter],
    ) -> Result<Vec<EntityRecord>, StorageError> {
        let mapping = self.require_mapping(resource_type)?;
        let db = self.db.read().await;
        let mut found: Vec<EntityRecord> = db
            .entities
            .keys()
            .filter(|(rt, _)| rt == resource_type)
            .filter_map(|(_, id)| db.read(&mapping, id, LoadOptions::full()))
            .filter(|r| !r.is_deleted())
            .filter(|r| filters.iter().all(|f| f.matches(r)))
            .collect();
        found.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(found)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use octofhir_storage::{DELETED_AT, TableDef};
    use serde_json::json;

    fn patient_mapping() -> EntityMapping {
        EntityMapping::domain_resource("Patient", ["gender", "active", "managingOrganization"])
    }

    async fn storage_with_patient(id: &str) -> InMemoryStorage {
        let storage = InMemoryStorage::new();
        storage.register_mapping(patient_mapping()).unwrap();
        storage
            .register_mapping(EntityMapping::domain_resource("Organization", ["name"]))
            .unwrap();
        let columns: Columns = serde_json::from_value(json!({
            "gender": "male",
            "text": {"status": "generated", "div": "<div>Peter</div>"},
        }))
        .unwrap();
        storage.insert("Patient", id, columns, now_utc()).await.unwrap();
        storage
    }

    async fn set(storage: &InMemoryStorage, id: &str, column: &str, value: Value) -> CommitOutcome {
        let mut session = storage.begin("Patient", id).await.unwrap();
        session.set(column, value);
        storage.commit(session).await.unwrap()
    }

    #[tokio::test]
    async fn test_insert_starts_at_version_one_without_history() {
        let storage = storage_with_patient("p1").await;
        let record = storage
            .load("Patient", "p1", LoadOptions::default())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.version, 1);
        assert!(!record.is_deleted());
        assert!(!record.is_loaded("text"));
        assert!(storage.history("Patient", "p1").await.unwrap().is_empty());

        let err = storage
            .insert("Patient", "p1", Columns::new(), now_utc())
            .await
            .unwrap_err();
        assert!(err.is_already_exists());
    }

    #[tokio::test]
    async fn test_versions_increase_by_one_per_commit() {
        let storage = storage_with_patient("p1").await;
        for (i, gender) in ["female", "other", "male"].iter().enumerate() {
            let outcome = set(&storage, "p1", "gender", json!(gender)).await;
            assert!(outcome.is_committed());
            assert_eq!(outcome.record().version, i as u64 + 2);
        }

        let history = storage.history("Patient", "p1").await.unwrap();
        let versions: Vec<u64> = history.iter().map(|h| h.version).collect();
        assert_eq!(versions, [1, 2, 3]);
        assert_eq!(history[0].columns["gender"], json!("male"));
        assert_eq!(history[1].columns["gender"], json!("female"));
    }

    #[tokio::test]
    async fn test_several_writes_one_version() {
        let storage = storage_with_patient("p1").await;
        let mut session = storage.begin("Patient", "p1").await.unwrap();
        session.set("gender", json!("female"));
        session.set("active", json!(true));
        let outcome = storage.commit(session).await.unwrap();
        assert_eq!(outcome.record().version, 2);
        assert_eq!(storage.history("Patient", "p1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_reverted_write_does_not_bump() {
        let storage = storage_with_patient("p1").await;
        let mut session = storage.begin("Patient", "p1").await.unwrap();
        session.set("gender", json!("female"));
        session.set("gender", json!("male"));
        session.clear("active");
        let outcome = storage.commit(session).await.unwrap();
        assert!(!outcome.is_committed());
        assert_eq!(outcome.record().version, 1);
        assert!(storage.history("Patient", "p1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_stale_session_is_rejected() {
        let storage = Arc::new(storage_with_patient("p1").await);
        let first = storage.begin("Patient", "p1").await.unwrap();
        let mut second = storage.begin("Patient", "p1").await.unwrap();

        let racer = {
            let storage = Arc::clone(&storage);
            let mut first = first;
            tokio::spawn(async move {
                first.set("gender", json!("female"));
                storage.commit(first).await
            })
        };
        racer.await.unwrap().unwrap();

        second.set("gender", json!("other"));
        let err = storage.commit(second).await.unwrap_err();
        assert!(matches!(
            err,
            StorageError::StaleVersion {
                expected: 1,
                actual: 2,
                ..
            }
        ));

        let live = storage
            .load("Patient", "p1", LoadOptions::default())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(live.columns["gender"], json!("female"));
        assert_eq!(storage.history("Patient", "p1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_history_tables_share_versions_and_include_deferred() {
        let storage = storage_with_patient("p1").await;
        set(&storage, "p1", "gender", json!("female")).await;
        set(&storage, "p1", "active", json!(false)).await;

        for table in ["resource", "domainresource", "patient"] {
            let rows = storage.table_history("Patient", table, "p1").await.unwrap();
            let versions: Vec<u64> = rows.iter().map(|r| r.resource_version).collect();
            assert_eq!(versions, [1, 2], "table {table}");
        }

        let domain = storage.table_history("Patient", "domainresource", "p1").await.unwrap();
        assert_eq!(domain[0].row["text"]["status"], json!("generated"));
        assert!(domain[0].row.contains_key("contained"));
    }

    #[tokio::test]
    async fn test_soft_delete_and_resurrection() {
        let storage = storage_with_patient("p1").await;
        let mut session = storage.begin("Patient", "p1").await.unwrap();
        session.set(IS_DELETED, json!(true));
        session.set(DELETED_AT, json!("2024-01-01T00:00:00Z"));
        let deleted = storage.commit(session).await.unwrap().into_record();
        assert!(deleted.is_deleted());
        assert_eq!(deleted.version, 2);

        let history = storage.history("Patient", "p1").await.unwrap();
        assert_eq!(history[0].change, ChangeType::Delete);
        assert!(!history[0].is_deleted());
        assert!(storage.find("Patient", &[]).await.unwrap().is_empty());

        let revived = set(&storage, "p1", IS_DELETED, json!(false)).await;
        assert!(!revived.record().is_deleted());
        assert_eq!(revived.record().version, 3);

        let history = storage.history("Patient", "p1").await.unwrap();
        assert_eq!(history[1].version, 2);
        assert_eq!(history[1].change, ChangeType::Update);
        assert!(history[1].is_deleted());
        assert_eq!(history[1].columns[DELETED_AT], json!("2024-01-01T00:00:00Z"));
    }

    #[tokio::test]
    async fn test_hard_delete_keeps_history_without_snapshot() {
        let storage = storage_with_patient("p1").await;
        set(&storage, "p1", "gender", json!("female")).await;
        storage.hard_delete("Patient", "p1").await.unwrap();

        assert!(
            storage
                .load("Patient", "p1", LoadOptions::default())
                .await
                .unwrap()
                .is_none()
        );
        assert_eq!(storage.history("Patient", "p1").await.unwrap().len(), 1);
        assert!(
            storage
                .insert("Patient", "p1", Columns::new(), now_utc())
                .await
                .unwrap_err()
                .is_already_exists()
        );
        assert!(storage.hard_delete("Patient", "p1").await.unwrap_err().is_gone());
        assert!(storage.hard_delete("Patient", "never").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_referencing_entity_does_not_bump_target() {
        let storage = storage_with_patient("p1").await;
        storage
            .insert("Organization", "o1", Columns::new(), now_utc())
            .await
            .unwrap();

        set(
            &storage,
            "p1",
            "managingOrganization",
            json!({"reference": "Organization/o1"}),
        )
        .await;

        let org = storage
            .load("Organization", "o1", LoadOptions::default())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(org.version, 1);
        assert!(storage.history("Organization", "o1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_columns_and_mappings() {
        let storage = storage_with_patient("p1").await;
        let mut session = storage.begin("Patient", "p1").await.unwrap();
        session.set("shoeSize", json!(42));
        assert!(matches!(
            storage.commit(session).await.unwrap_err(),
            StorageError::UnknownColumn { .. }
        ));
        assert!(matches!(
            storage.load("Device", "d1", LoadOptions::default()).await.unwrap_err(),
            StorageError::UnknownMapping { .. }
        ));
        assert!(
            storage
                .register_mapping(EntityMapping::new("Empty"))
                .is_err()
        );
        let custom = EntityMapping::new("Basic").table(TableDef::new("basic").column("code"));
        storage.register_mapping(custom).unwrap();
        assert_eq!(storage.mapping("Basic").unwrap().tables.len(), 1);
    }

    #[tokio::test]
    async fn test_find_filters_live_rows() {
        let storage = storage_with_patient("p1").await;
        storage
            .insert(
                "Patient",
                "p2",
                serde_json::from_value(json!({"gender": "female"})).unwrap(),
                now_utc(),
            )
            .await
            .unwrap();
        let found = storage
            .find("Patient", &[ColumnFilter::new("gender", "female")])
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "p2");
        assert_eq!(storage.find("Patient", &[]).await.unwrap().len(), 2);
        assert_eq!(storage.count().await, 2);
    }

    #[tokio::test]
    async fn test_types_sharing_an_id_stay_apart() {
        let storage = storage_with_patient("shared").await;
        let org: Columns = serde_json::from_value(json!({"name": "ACME"})).unwrap();
        let inserted = storage
            .insert("Organization", "shared", org, now_utc())
            .await
            .unwrap();
        assert_eq!(inserted.version, 1);

        set(&storage, "shared", "gender", json!("female")).await;
        assert_eq!(storage.history("Patient", "shared").await.unwrap().len(), 1);
        assert!(storage.history("Organization", "shared").await.unwrap().is_empty());
        assert!(
            storage
                .table_history("Organization", "resource", "shared")
                .await
                .unwrap()
                .is_empty()
        );

        let org = storage
            .load("Organization", "shared", LoadOptions::default())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(org.version, 1);
        assert_eq!(org.columns["name"], json!("ACME"));

        storage.hard_delete("Patient", "shared").await.unwrap();
        assert!(
            storage
                .load("Organization", "shared", LoadOptions::default())
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn test_caller_timestamps_are_recorded() {
        let storage = InMemoryStorage::new();
        storage.register_mapping(patient_mapping()).unwrap();
        let created_at: FhirDateTime = "2024-03-01T10:00:00Z".parse().unwrap();
        let record = storage
            .insert("Patient", "p1", Columns::new(), created_at)
            .await
            .unwrap();
        assert_eq!(record.created_at, created_at);
        assert_eq!(record.updated_at, created_at);

        let changed_at: FhirDateTime = "2024-03-02T11:30:00Z".parse().unwrap();
        let mut session = storage.begin("Patient", "p1").await.unwrap();
        session.set("gender", json!("other"));
        session.set_changed_at(changed_at);
        let committed = storage.commit(session).await.unwrap().into_record();
        assert_eq!(committed.updated_at, changed_at);
        assert_eq!(committed.created_at, created_at);
        assert_eq!(storage.history("Patient", "p1").await.unwrap()[0].changed, changed_at);
    }

    #[tokio::test]
    async fn test_commit_after_hard_delete_is_gone() {
        let storage = storage_with_patient("p1").await;
        set(&storage, "p1", "gender", json!("female")).await;
        let mut session = storage.begin("Patient", "p1").await.unwrap();
        storage.hard_delete("Patient", "p1").await.unwrap();
        session.set("gender", json!("other"));
        assert!(storage.commit(session).await.unwrap_err().is_gone());
    }
}
