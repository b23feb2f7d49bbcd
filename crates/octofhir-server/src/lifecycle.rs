//! Resource lifecycle: create, read, update, delete and their conditional
//! and versioned variants.

use std::sync::Arc;

use serde_json::{Map, Value};

use octofhir_api::ApiResponse;
use octofhir_core::{
    FhirDateTime, ResourceMeta, ResourceType, generate_id, now_utc, parse_version_tag, validate_id,
};
use octofhir_elements::prune_nulls;
use octofhir_storage::{
    Columns, DELETED_AT, DynStorage, EntityRecord, HistorySnapshot, IS_DELETED, LoadOptions,
    Session,
};

use crate::conditional::{FilterMatch, parse_criteria, to_filters};
use crate::error::LifecycleError;
use crate::pipeline::Pipeline;
use crate::profiles::ResourceProfile;
use crate::registry::ProfileRegistry;
use crate::summary::{SummaryMode, project};

pub type LifecycleResult<T> = Result<T, LifecycleError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeKind {
    Created,
    Read,
    Updated,
    /// Update whose body matched the stored state; no new version.
    Unchanged,
    Deleted,
    AlreadyDeleted,
}

/// Rendered resource plus what the response headers need.
#[derive(Debug, Clone)]
pub struct ResourceOutcome {
    pub kind: OutcomeKind,
    pub resource: Value,
    pub version: u64,
    pub last_updated: FhirDateTime,
    pub warnings: Vec<String>,
}

impl ResourceOutcome {
    fn new(kind: OutcomeKind, record: &EntityRecord, warnings: Vec<String>) -> Self {
        Self {
            kind,
            resource: render(&record.resource_type, &record.id, &record.columns),
            version: record.version,
            last_updated: record.updated_at,
            warnings,
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.resource.get("id").and_then(Value::as_str)
    }

    /// 201 for a create, 200 otherwise, with `ETag` and `Last-Modified`.
    pub fn into_api_response(self) -> ApiResponse<Value> {
        let response = match self.kind {
            OutcomeKind::Created => ApiResponse::created(self.resource),
            _ => ApiResponse::ok(self.resource),
        }
        .with_etag_weak(self.version.to_string());
        match self.last_updated.to_http_date() {
            Some(date) => response.with_last_modified_raw(date),
            None => response,
        }
    }
}

pub struct ResourceManager {
    storage: DynStorage,
    registry: Arc<ProfileRegistry>,
    pipeline: Pipeline,
}

impl std::fmt::Debug for ResourceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceManager").finish_non_exhaustive()
    }
}

impl ResourceManager {
    pub fn new(storage: DynStorage, registry: Arc<ProfileRegistry>, pipeline: Pipeline) -> Self {
        Self {
            storage,
            registry,
            pipeline,
        }
    }

    pub fn storage(&self) -> &DynStorage {
        &self.storage
    }

    pub fn registry(&self) -> &ProfileRegistry {
        &self.registry
    }

    fn profile(&self, resource_type: &str) -> LifecycleResult<&ResourceProfile> {
        self.registry
            .get(resource_type)
            .ok_or_else(|| LifecycleError::UnknownResourceType(resource_type.to_string()))
    }

    /// Creates a resource at version 1 under a server-assigned id.
    pub async fn create(&self, resource_type: &str, body: Value) -> LifecycleResult<ResourceOutcome> {
        let profile = self.profile(resource_type)?;
        let body = envelope(profile, body)?;
        if body.contains_key("id") {
            return Err(LifecycleError::ClientSuppliedId);
        }
        self.create_unchecked(profile, Value::Object(body)).await
    }

    async fn create_unchecked(
        &self,
        profile: &ResourceProfile,
        body: Value,
    ) -> LifecycleResult<ResourceOutcome> {
        let validated = self.pipeline.validate(profile, &body).await?;
        let id = generate_id();
        let prepared = self.pipeline.derive_fields(profile, &id, validated);
        let record = self
            .pipeline
            .persist_new(self.storage.as_ref(), profile, &id, &prepared, now_utc())
            .await?;

        tracing::info!(resource_type = %profile.resource_type, %id, "resource created");
        Ok(ResourceOutcome::new(OutcomeKind::Created, &record, prepared.warnings))
    }

    /// Current state of a live resource.
    pub async fn get_by_id(&self, resource_type: &str, id: &str) -> LifecycleResult<ResourceOutcome> {
        let profile = self.profile(resource_type)?;
        let record = self.locate(profile, id).await?;
        if record.is_deleted() {
            return Err(gone(&record));
        }
        Ok(ResourceOutcome::new(OutcomeKind::Read, &record, Vec::new()))
    }

    /// A specific version. The live state is checked before history; a
    /// match on a deleted state is reported as gone.
    pub async fn get_by_vid(
        &self,
        resource_type: &str,
        id: &str,
        version: u64,
    ) -> LifecycleResult<ResourceOutcome> {
        let profile = self.profile(resource_type)?;
        check_id(id)?;
        let name = profile.name();
        let live = self
            .storage
            .load(&name, id, LoadOptions::full())
            .await?
            .filter(|r| r.version == version);
        if let Some(record) = &live
            && !record.is_deleted()
        {
            return Ok(ResourceOutcome::new(OutcomeKind::Read, record, Vec::new()));
        }

        let snapshot = self
            .storage
            .history(&name, id)
            .await?
            .into_iter()
            .find(|s| s.version == version);
        match (live, snapshot) {
            (_, Some(snapshot)) if !snapshot.is_deleted() => Ok(snapshot_outcome(snapshot)),
            (Some(record), _) => Err(gone(&record)),
            (None, Some(snapshot)) => Err(snapshot_gone(&snapshot)),
            (None, None) => Err(LifecycleError::not_found(resource_type, id)),
        }
    }

    /// Live, non-deleted resources matching the criteria. Unknown
    /// parameters are ignored.
    pub async fn filter(
        &self,
        resource_type: &str,
        params: &[(String, String)],
    ) -> LifecycleResult<FilterMatch> {
        let profile = self.profile(resource_type)?;
        let filters = to_filters(profile, params);
        let records = self.storage.find(&profile.name(), &filters).await?;
        tracing::debug!(
            resource_type,
            filters = filters.len(),
            matches = records.len(),
            "conditional lookup"
        );
        Ok(FilterMatch::from_records(records))
    }

    /// Full replace guarded by `If-Match`.
    ///
    /// Elements missing from `body` are cleared. A soft-deleted resource is
    /// resurrected unless the body carries `"is_deleted": true`.
    pub async fn update(
        &self,
        resource_type: &str,
        id: &str,
        body: Value,
        if_match: Option<&str>,
    ) -> LifecycleResult<ResourceOutcome> {
        let profile = self.profile(resource_type)?;
        let Some(tag) = if_match else {
            return Err(LifecycleError::PreconditionRequired {
                resource_type: resource_type.to_string(),
                id: id.to_string(),
            });
        };
        let expected = parse_version_tag(tag).map_err(LifecycleError::InvalidVersionTag)?;

        let mut body = envelope(profile, body)?;
        if let Some(body_id) = body.remove("id")
            && body_id.as_str() != Some(id)
        {
            return Err(LifecycleError::IdMismatch {
                id: id.to_string(),
                body: body_id.to_string(),
            });
        }
        let keep_deleted = body.remove(IS_DELETED) == Some(Value::Bool(true));

        let loaded = self.locate(profile, id).await?;
        if loaded.version != expected {
            return Err(LifecycleError::VersionConflict {
                resource_type: resource_type.to_string(),
                id: id.to_string(),
                expected,
                actual: loaded.version,
            });
        }

        let validated = self.pipeline.validate(profile, &Value::Object(body)).await?;
        let prepared = self.pipeline.derive_fields(profile, id, validated);
        let mut session = Session::new(loaded);
        self.pipeline
            .stage_replace(&mut session, &prepared, keep_deleted, now_utc());

        let committed = self.storage.commit(session).await?.is_committed();
        let record = self.fetch(profile, id).await?;
        let kind = if committed {
            tracing::info!(resource_type, id, version = record.version, "resource updated");
            OutcomeKind::Updated
        } else {
            tracing::debug!(resource_type, id, "update carried no changes");
            OutcomeKind::Unchanged
        };
        Ok(ResourceOutcome::new(kind, &record, prepared.warnings))
    }

    /// Soft delete: a versioned write of `is_deleted` and `deleted_at`.
    /// Deleting a deleted resource changes nothing.
    pub async fn delete(&self, resource_type: &str, id: &str) -> LifecycleResult<ResourceOutcome> {
        let profile = self.profile(resource_type)?;
        let loaded = self.locate(profile, id).await?;
        if loaded.is_deleted() {
            tracing::debug!(resource_type, id, "resource already deleted");
            return Ok(ResourceOutcome::new(OutcomeKind::AlreadyDeleted, &loaded, Vec::new()));
        }

        let now = now_utc();
        let meta = ResourceMeta::derive(loaded.get("meta"), loaded.version + 1, now);
        let mut session = Session::new(loaded);
        session.set_changed_at(now);
        session.set(IS_DELETED, Value::Bool(true));
        session.set(DELETED_AT, Value::String(now.to_string()));
        session.set("meta", meta.to_value());
        self.storage.commit(session).await?;

        let record = self.fetch(profile, id).await?;
        tracing::info!(resource_type, id, version = record.version, "resource deleted");
        Ok(ResourceOutcome::new(OutcomeKind::Deleted, &record, Vec::new()))
    }

    /// Removes the live rows. History stays; the id cannot be reused.
    pub async fn hard_delete(&self, resource_type: &str, id: &str) -> LifecycleResult<()> {
        let profile = self.profile(resource_type)?;
        check_id(id)?;
        self.storage.hard_delete(&profile.name(), id).await?;
        tracing::warn!(resource_type, id, "resource permanently removed");
        Ok(())
    }

    pub async fn get_summary(
        &self,
        resource_type: &str,
        id: &str,
        mode: SummaryMode,
    ) -> LifecycleResult<ResourceOutcome> {
        let profile = self.profile(resource_type)?;
        let mut outcome = self.get_by_id(resource_type, id).await?;
        outcome.resource = project(&outcome.resource, mode, profile.summary_fields);
        Ok(outcome)
    }

    /// Create unless `if_none_exist` already matches a resource.
    pub async fn conditional_create(
        &self,
        resource_type: &str,
        body: Value,
        if_none_exist: &str,
    ) -> LifecycleResult<ResourceOutcome> {
        let params = parse_criteria(if_none_exist);
        match self.filter(resource_type, &params).await? {
            FilterMatch::One(record) => {
                tracing::debug!(resource_type, id = %record.id, "conditional create matched");
                let record = self.fetch(self.profile(resource_type)?, &record.id).await?;
                Ok(ResourceOutcome::new(OutcomeKind::Read, &record, Vec::new()))
            }
            FilterMatch::None => self.create(resource_type, body).await,
            FilterMatch::Many(count) => Err(LifecycleError::MultipleMatches {
                resource_type: resource_type.to_string(),
                count,
            }),
        }
    }

    /// Update the single match, or create when nothing matches. The
    /// matched resource's current version stands in for `If-Match`.
    pub async fn conditional_update(
        &self,
        resource_type: &str,
        params: &[(String, String)],
        body: Value,
    ) -> LifecycleResult<ResourceOutcome> {
        match self.filter(resource_type, params).await? {
            FilterMatch::One(record) => {
                let tag = record.version.to_string();
                self.update(resource_type, &record.id, body, Some(&tag)).await
            }
            FilterMatch::None => {
                let profile = self.profile(resource_type)?;
                let mut body = envelope(profile, body)?;
                body.remove("id");
                self.create_unchecked(profile, Value::Object(body)).await
            }
            FilterMatch::Many(count) => Err(LifecycleError::MultipleMatches {
                resource_type: resource_type.to_string(),
                count,
            }),
        }
    }

    /// Soft-deletes the single resource matching `params`.
    pub async fn conditional_delete(
        &self,
        resource_type: &str,
        params: &[(String, String)],
    ) -> LifecycleResult<ResourceOutcome> {
        let record = self.filter(resource_type, params).await?.require_one(resource_type)?;
        self.delete(resource_type, &record.id).await
    }

    /// Every stored version, oldest first, the current state last.
    pub async fn history(&self, resource_type: &str, id: &str) -> LifecycleResult<Vec<ResourceOutcome>> {
        let profile = self.profile(resource_type)?;
        check_id(id)?;
        let name = profile.name();
        let mut versions: Vec<ResourceOutcome> = self
            .storage
            .history(&name, id)
            .await?
            .into_iter()
            .map(snapshot_outcome)
            .collect();
        if let Some(live) = self.storage.load(&name, id, LoadOptions::full()).await? {
            versions.push(ResourceOutcome::new(OutcomeKind::Read, &live, Vec::new()));
        }
        if versions.is_empty() {
            return Err(LifecycleError::not_found(resource_type, id));
        }
        Ok(versions)
    }

    /// Live rows with deferred columns. Without live rows the latest
    /// history snapshot makes the resource gone; no history, not found.
    async fn locate(&self, profile: &ResourceProfile, id: &str) -> LifecycleResult<EntityRecord> {
        check_id(id)?;
        let name = profile.name();
        if let Some(record) = self.storage.load(&name, id, LoadOptions::full()).await? {
            return Ok(record);
        }
        match self.storage.history(&name, id).await?.last() {
            Some(snapshot) => Err(snapshot_gone(snapshot)),
            None => Err(LifecycleError::not_found(name, id)),
        }
    }

    async fn fetch(&self, profile: &ResourceProfile, id: &str) -> LifecycleResult<EntityRecord> {
        let name = profile.name();
        self.storage
            .load(&name, id, LoadOptions::full())
            .await?
            .ok_or_else(|| LifecycleError::not_found(name, id))
    }
}

fn check_id(id: &str) -> LifecycleResult<()> {
    validate_id(id).map_err(LifecycleError::InvalidId)
}

/// Checks the body is an object of the right type and drops `resourceType`.
fn envelope(profile: &ResourceProfile, body: Value) -> LifecycleResult<Map<String, Value>> {
    let Value::Object(mut body) = body else {
        return Err(LifecycleError::invalid_body("resource body must be a JSON object"));
    };
    match body.remove("resourceType") {
        None => {}
        Some(Value::String(rt))
            if rt
                .parse::<ResourceType>()
                .is_ok_and(|rt| rt == profile.resource_type) => {}
        Some(other) => {
            return Err(LifecycleError::invalid_body(format!(
                "resourceType {other} does not match {}",
                profile.resource_type
            )));
        }
    }
    Ok(body)
}

fn gone(record: &EntityRecord) -> LifecycleError {
    let resource = render(&record.resource_type, &record.id, &record.columns);
    LifecycleError::gone_with(&record.resource_type, &record.id, resource)
}

fn snapshot_gone(snapshot: &HistorySnapshot) -> LifecycleError {
    let resource = render(&snapshot.resource_type, &snapshot.id, &snapshot.columns);
    LifecycleError::gone_with(&snapshot.resource_type, &snapshot.id, resource)
}

fn snapshot_outcome(snapshot: HistorySnapshot) -> ResourceOutcome {
    ResourceOutcome {
        kind: OutcomeKind::Read,
        resource: render(&snapshot.resource_type, &snapshot.id, &snapshot.columns),
        version: snapshot.version,
        last_updated: snapshot.changed,
        warnings: Vec::new(),
    }
}

/// JSON form of stored columns. Nulls and empty elements are omitted and
/// the soft-delete bookkeeping is never exposed.
fn render(resource_type: &str, id: &str, columns: &Columns) -> Value {
    let mut out = Map::new();
    out.insert("resourceType".into(), Value::String(resource_type.to_string()));
    out.insert("id".into(), Value::String(id.to_string()));
    for (column, value) in columns {
        if column == IS_DELETED || column == DELETED_AT {
            continue;
        }
        if let Some(value) = prune_nulls(value) {
            out.insert(column.clone(), value);
        }
    }
    Value::Object(out)
}
