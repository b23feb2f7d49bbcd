use crate::FhirDateTime;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// System of the tag marking a summary projection.
pub const SUBSETTED_SYSTEM: &str = "http://hl7.org/fhir/v3/ObservationValue";
pub const SUBSETTED_CODE: &str = "SUBSETTED";

/// `meta` of a stored resource. `versionId` and `lastUpdated` are always
/// server-derived; the remaining elements come from the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceMeta {
    #[serde(rename = "versionId")]
    pub version_id: String,
    #[serde(rename = "lastUpdated")]
    pub last_updated: FhirDateTime,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub profile: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub security: Vec<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub tag: Vec<Value>,
}

impl ResourceMeta {
    /// Builds server meta for `version`, keeping client-supplied
    /// `profile`, `security` and `tag` from `client_meta`.
    pub fn derive(client_meta: Option<&Value>, version: u64, last_updated: FhirDateTime) -> Self {
        let list = |key: &str| -> Vec<Value> {
            client_meta
                .and_then(|m| m.get(key))
                .and_then(Value::as_array)
                .map(|items| items.iter().filter(|v| !v.is_null()).cloned().collect())
                .unwrap_or_default()
        };
        let profile = list("profile")
            .into_iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect();

        Self {
            version_id: version.to_string(),
            last_updated,
            profile,
            security: list("security"),
            tag: list("tag"),
        }
    }

    pub fn version(&self) -> Option<u64> {
        self.version_id.parse().ok()
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// The `SUBSETTED` coding placed in `meta.tag` of summary projections.
pub fn subsetted_tag() -> Value {
    json!({
        "system": SUBSETTED_SYSTEM,
        "code": SUBSETTED_CODE,
        "display": "Resource encoded in summary mode"
    })
}

/// Adds the `SUBSETTED` tag to a resource's meta, once.
pub fn mark_subsetted(resource: &mut Value) {
    let Some(obj) = resource.as_object_mut() else {
        return;
    };
    let meta = obj.entry("meta").or_insert_with(|| json!({}));
    if !meta.is_object() {
        *meta = json!({});
    }
    let Some(meta) = meta.as_object_mut() else {
        return;
    };
    let tags = meta.entry("tag").or_insert_with(|| json!([]));
    if !tags.is_array() {
        *tags = json!([]);
    }
    if let Some(tags) = tags.as_array_mut() {
        let already = tags.iter().any(|t| {
            t.get("system").and_then(Value::as_str) == Some(SUBSETTED_SYSTEM)
                && t.get("code").and_then(Value::as_str) == Some(SUBSETTED_CODE)
        });
        if !already {
            tags.push(subsetted_tag());
        }
    }
}
