//! Write pipeline: validate, compute derived fields, persist.
//!
//! Each stage is a separate step so the lifecycle manager can run them in
//! order and stop at the first failing stage. Derived fields (`meta` and the
//! generated narrative) are never computed as a side effect of persistence.

use std::sync::Arc;

use serde_json::{Value, json};

use octofhir_core::{FhirDateTime, ResourceMeta};
use octofhir_elements::{
    Coercer, TerminologyValidator, ValidationContext, ValidationOptions, finish, resolve_checks,
};
use octofhir_storage::{Columns, DELETED_AT, EntityRecord, IS_DELETED, Session, VersionedStorage};

use crate::error::LifecycleError;
use crate::profiles::ResourceProfile;
use crate::registry::ProfileRegistry;

const XHTML_NS: &str = "http://www.w3.org/1999/xhtml";

/// Columns that the pipeline owns. A full replace never takes them from the body.
const PROTECTED: &[&str] = &["meta", IS_DELETED, DELETED_AT];

/// A resource body that passed every validation stage.
#[derive(Debug, Clone)]
pub struct Validated {
    /// One entry per column of the table chain, absent elements as `null`.
    pub columns: Columns,
    pub client_meta: Option<Value>,
    pub warnings: Vec<String>,
}

/// A validated body with its derived fields filled in, ready to persist.
#[derive(Debug, Clone)]
pub struct Prepared {
    pub columns: Columns,
    pub client_meta: Option<Value>,
    pub warnings: Vec<String>,
}

impl Prepared {
    /// Server meta for `version`, keeping the client's profiles and tags.
    pub fn meta(&self, version: u64, last_updated: FhirDateTime) -> ResourceMeta {
        ResourceMeta::derive(self.client_meta.as_ref(), version, last_updated)
    }
}

pub struct Pipeline {
    registry: Arc<ProfileRegistry>,
    options: ValidationOptions,
    terminology: Option<Arc<dyn TerminologyValidator>>,
}

impl Pipeline {
    pub fn new(
        registry: Arc<ProfileRegistry>,
        options: ValidationOptions,
        terminology: Option<Arc<dyn TerminologyValidator>>,
    ) -> Self {
        Self {
            registry,
            options,
            terminology,
        }
    }

    pub fn registry(&self) -> &ProfileRegistry {
        &self.registry
    }

    /// Stage 1. Binds `body` to the profile schema, runs the resource rule
    /// and then confirms every bound code with the terminology service.
    ///
    /// Structural and semantic problems are reported together; the first
    /// terminology failure stops the stage.
    pub async fn validate(
        &self,
        profile: &ResourceProfile,
        body: &Value,
    ) -> Result<Validated, LifecycleError> {
        let root = profile.name();
        let coercer = Coercer::new(self.registry.schemas(), &self.options);
        let mut ctx = ValidationContext::new(&self.options);
        let record = coercer.bind(profile.schema, body, &root, &mut ctx);

        if let (Some(record), Some(rule)) = (&record, profile.rule)
            && !ctx.has_errors()
        {
            ctx.set_path(root.as_str());
            rule(record, &mut ctx);
        }

        let pending_warnings: Vec<String> = ctx.warnings().iter().map(ToString::to_string).collect();
        let coerced = finish(record, ctx).map_err(|errors| {
            tracing::warn!(resource_type = %root, issues = errors.len(), "resource failed validation");
            LifecycleError::Validation {
                errors,
                warnings: pending_warnings,
            }
        })?;

        match &self.terminology {
            Some(terminology) => {
                resolve_checks(terminology.as_ref(), &coerced.checks)
                    .await
                    .inspect_err(|e| tracing::warn!(resource_type = %root, error = %e, "terminology check failed"))?;
            }
            None if !coerced.checks.is_empty() => {
                tracing::debug!(
                    resource_type = %root,
                    skipped = coerced.checks.len(),
                    "terminology disabled, codes not checked"
                );
            }
            None => {}
        }

        let warnings: Vec<String> = coerced.warnings.iter().map(ToString::to_string).collect();
        for warning in &warnings {
            tracing::warn!(resource_type = %root, %warning, "validation warning");
        }

        let columns = coerced
            .record
            .fields()
            .filter(|(name, _)| !PROTECTED.contains(name))
            .map(|(name, value)| (name.to_string(), value.to_json()))
            .collect();

        Ok(Validated {
            columns,
            client_meta: body.get("meta").cloned(),
            warnings,
        })
    }

    /// Stage 2. Fills in the generated narrative when the client sent none.
    pub fn derive_fields(&self, profile: &ResourceProfile, id: &str, validated: Validated) -> Prepared {
        let Validated {
            mut columns,
            client_meta,
            warnings,
        } = validated;

        if columns.get("text").is_none_or(Value::is_null) {
            let display = columns
                .get(profile.display_field)
                .and_then(display_text)
                .unwrap_or_else(|| format!("{}/{id}", profile.resource_type));
            columns.insert("text".to_string(), generated_narrative(&display));
        }

        Prepared {
            columns,
            client_meta,
            warnings,
        }
    }

    /// Stage 3 for a new resource: version 1, no history.
    pub async fn persist_new(
        &self,
        storage: &dyn VersionedStorage,
        profile: &ResourceProfile,
        id: &str,
        prepared: &Prepared,
        now: FhirDateTime,
    ) -> Result<EntityRecord, LifecycleError> {
        let mut columns = prepared.columns.clone();
        columns.insert("meta".to_string(), prepared.meta(1, now).to_value());
        Ok(storage.insert(&profile.name(), id, columns, now).await?)
    }

    /// Stage 3 for a full replace. Every column is written; omitted elements
    /// become `null`. `keep_deleted` leaves a soft-deleted resource deleted,
    /// otherwise the write resurrects it. The commit is stamped with `now`,
    /// the same instant written to `meta.lastUpdated`.
    pub fn stage_replace(
        &self,
        session: &mut Session,
        prepared: &Prepared,
        keep_deleted: bool,
        now: FhirDateTime,
    ) {
        session.set_changed_at(now);
        for (column, value) in &prepared.columns {
            session.set(column.clone(), value.clone());
        }
        if keep_deleted {
            session.set(IS_DELETED, Value::Bool(true));
            if session.get(DELETED_AT).is_none() {
                session.set(DELETED_AT, Value::String(now.to_string()));
            }
        } else {
            session.set(IS_DELETED, Value::Bool(false));
            session.clear(DELETED_AT);
        }

        let next = session.observed_version() + 1;
        let meta = prepared.meta(next, now);
        if session.has_net_changes() || meta_tags_changed(session.loaded(), &meta) {
            session.set("meta", meta.to_value());
        }
    }
}

/// Whether client-controlled parts of meta differ from what is stored.
fn meta_tags_changed(loaded: &EntityRecord, meta: &ResourceMeta) -> bool {
    let stored: Option<ResourceMeta> = loaded
        .get("meta")
        .and_then(|m| serde_json::from_value(m.clone()).ok());
    match stored {
        Some(stored) => {
            stored.profile != meta.profile || stored.security != meta.security || stored.tag != meta.tag
        }
        None => true,
    }
}

/// Plain text shown in the generated narrative.
fn display_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Array(items) => items.iter().find_map(display_text),
        Value::Object(name) => {
            if let Some(text) = name.get("text").and_then(Value::as_str) {
                return Some(text.to_string());
            }
            let mut parts: Vec<&str> = name
                .get("given")
                .and_then(Value::as_array)
                .map(|g| g.iter().filter_map(Value::as_str).collect())
                .unwrap_or_default();
            if let Some(family) = name.get("family").and_then(Value::as_str) {
                parts.push(family);
            }
            (!parts.is_empty()).then(|| parts.join(" "))
        }
        _ => None,
    }
}

fn generated_narrative(display: &str) -> Value {
    json!({
        "id": null,
        "extension": null,
        "status": "generated",
        "div": format!(r#"<div xmlns="{XHTML_NS}">{}</div>"#, escape_xml(display)),
    })
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use octofhir_elements::StaticTerminology;

    fn pipeline(terminology: Option<Arc<dyn TerminologyValidator>>) -> Pipeline {
        let registry = Arc::new(ProfileRegistry::builtin().unwrap());
        Pipeline::new(registry, ValidationOptions::default(), terminology)
    }

    #[tokio::test]
    async fn validate_collects_structural_errors() {
        let pipeline = pipeline(None);
        let profile = pipeline.registry().get("Patient").unwrap().clone();
        let body = json!({
            "gender": 3,
            "name": {"family": "Chalmers"},
            "shoeSize": 42
        });
        let err = pipeline.validate(&profile, &body).await.unwrap_err();
        let LifecycleError::Validation { errors, .. } = err else {
            panic!("expected validation error, got {err:?}");
        };
        assert_eq!(errors.len(), 3);
        assert!(errors.mentions("shoeSize"));
        assert!(errors.mentions("expects an array"));
    }

    #[tokio::test]
    async fn rejected_resource_still_reports_warnings() {
        let pipeline = pipeline(None);
        let profile = pipeline.registry().get("Patient").unwrap().clone();
        let body = json!({
            "gender": 3,
            "address": [{"city": "Nairobi", "country": "Kenya"}]
        });
        let err = pipeline.validate(&profile, &body).await.unwrap_err();
        let LifecycleError::Validation { errors, warnings } = err else {
            panic!("expected validation error, got {err:?}");
        };
        assert_eq!(errors.len(), 1);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("country 'Kenya'"));
    }

    #[tokio::test]
    async fn resource_rule_runs_after_binding() {
        let pipeline = pipeline(None);
        let profile = pipeline.registry().get("Organization").unwrap().clone();
        let body = json!({
            "name": "ACME",
            "telecom": [{"system": "phone", "value": "555", "use": "home"}]
        });
        let err = pipeline.validate(&profile, &body).await.unwrap_err();
        assert!(err.to_string().contains("can never be of use `home`"));
    }

    #[tokio::test]
    async fn terminology_gate_fails_fast() {
        let terminology: Arc<dyn TerminologyValidator> = Arc::new(
            StaticTerminology::new().with_codes("administrative_gender", &["male", "female"]),
        );
        let pipeline = pipeline(Some(terminology));
        let profile = pipeline.registry().get("Patient").unwrap().clone();

        assert!(pipeline.validate(&profile, &json!({"gender": "female"})).await.is_ok());
        let err = pipeline
            .validate(&profile, &json!({"gender": "robot"}))
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::Terminology(_)));
        assert!(err.to_string().contains("patient gender robot"));
    }

    #[tokio::test]
    async fn derive_fields_generates_narrative_once() {
        let pipeline = pipeline(None);
        let profile = pipeline.registry().get("Patient").unwrap().clone();
        let body = json!({"name": [{"given": ["Peter", "James"], "family": "Chalmers&Co"}]});
        let validated = pipeline.validate(&profile, &body).await.unwrap();
        assert!(validated.columns.contains_key("deceasedBoolean"));
        assert!(!validated.columns.contains_key("meta"));

        let prepared = pipeline.derive_fields(&profile, "p1", validated);
        let div = prepared.columns["text"]["div"].as_str().unwrap();
        assert!(div.contains("Peter James Chalmers&amp;Co"));
        assert_eq!(prepared.columns["text"]["status"], "generated");

        let with_text = json!({"text": {"status": "additional", "div": format!(r#"<div xmlns="{XHTML_NS}">own</div>"#)}});
        let validated = pipeline.validate(&profile, &with_text).await.unwrap();
        let prepared = pipeline.derive_fields(&profile, "p1", validated);
        assert_eq!(prepared.columns["text"]["status"], "additional");
    }

    #[test]
    fn display_text_falls_back() {
        assert_eq!(display_text(&json!("ACME")), Some("ACME".into()));
        assert_eq!(display_text(&json!([{"text": "Dr. Who"}])), Some("Dr. Who".into()));
        assert_eq!(display_text(&json!(null)), None);
        assert_eq!(display_text(&json!([])), None);
    }
}
