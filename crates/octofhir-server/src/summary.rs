//! `_summary` projections of a rendered resource.

use std::fmt;
use std::str::FromStr;

use octofhir_core::mark_subsetted;
use serde_json::{Map, Value};

use crate::error::LifecycleError;

/// Elements every summary keeps.
const ALWAYS: &[&str] = &["resourceType", "id", "meta"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryMode {
    /// Only elements marked as summary elements.
    True,
    /// Everything but the narrative.
    Data,
    /// `resourceType`, `id`, `meta` and the narrative.
    Text,
    /// The full resource.
    False,
}

impl SummaryMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::True => "true",
            Self::Data => "data",
            Self::Text => "text",
            Self::False => "false",
        }
    }

    /// Whether the projection drops elements and must be tagged `SUBSETTED`.
    pub fn is_subset(&self) -> bool {
        !matches!(self, Self::False)
    }
}

impl fmt::Display for SummaryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SummaryMode {
    type Err = LifecycleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "true" => Ok(Self::True),
            "data" => Ok(Self::Data),
            "text" => Ok(Self::Text),
            "false" => Ok(Self::False),
            other => Err(LifecycleError::invalid_body(format!(
                "Unknown _summary mode '{other}', expected true | data | text | false"
            ))),
        }
    }
}

/// Projects `resource` for `mode`. Subsets are tagged in `meta.tag`.
pub fn project(resource: &Value, mode: SummaryMode, summary_fields: &[&str]) -> Value {
    let Some(obj) = resource.as_object() else {
        return resource.clone();
    };
    let keep = |key: &str| -> bool {
        match mode {
            SummaryMode::False => true,
            SummaryMode::Data => key != "text",
            SummaryMode::Text => ALWAYS.contains(&key) || key == "text",
            SummaryMode::True => ALWAYS.contains(&key) || summary_fields.contains(&key),
        }
    };
    let projected: Map<String, Value> = obj
        .iter()
        .filter(|(k, _)| keep(k))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    let mut projected = Value::Object(projected);
    if mode.is_subset() {
        mark_subsetted(&mut projected);
    }
    projected
}
