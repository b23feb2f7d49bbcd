//! Valueset membership checks.
//!
//! Coercion only records the codes that need a lookup ([`TerminologyCheck`]).
//! They are resolved afterwards, in order, by a [`TerminologyValidator`]; the
//! first failure aborts the write. Lookups are never retried.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Valueset names published by the lookup service.
pub mod valuesets {
    pub const ADDRESS_USE: &str = "address_use";
    pub const ADDRESS_TYPE: &str = "address_type";
    pub const QUANTITY_COMPARATOR: &str = "quantity_comparator";
    pub const NAME_USE: &str = "name_use";
    pub const UNITS_OF_TIME: &str = "units_of_time";
    pub const EVENT_TIMING: &str = "event_timing";
    pub const TIMING_ABBREVIATION: &str = "timing_abbreviation";
    pub const CONTACT_POINT_SYSTEM: &str = "contact_point_system";
    pub const CONTACT_POINT_USE: &str = "contact_point_use";
    pub const SIGNATURE_TYPE: &str = "signature_type";
    pub const IDENTIFIER_TYPE: &str = "identifier_type";
    pub const IDENTIFIER_USE: &str = "identifier_use";
    pub const AGE_UNIT: &str = "age_unit";
    pub const NARRATIVE_STATUS: &str = "narrative_status";
    pub const CONTACT_ENTITY_TYPE: &str = "contactentity_type";
    pub const ORGANIZATION_TYPE: &str = "organization_type";
    pub const LOCATION_STATUS: &str = "location_status";
    pub const LOCATION_MODE: &str = "location_mode";
    pub const ROLE_CODE: &str = "RoleCode";
    pub const LOCATION_PHYSICAL_TYPE: &str = "location_physical_type";
    pub const SERVICE_CATEGORY: &str = "service_category";
    pub const SERVICE_TYPE: &str = "service_type";
    pub const C80_PRACTICE_CODES: &str = "c80_practice_codes";
    pub const SERVICE_PROVISION_CONDITIONS: &str = "service_provision_conditions";
    pub const SERVICE_REFERRAL_METHOD: &str = "service_referral_method";
    pub const DAYS_OF_WEEK: &str = "days_of_week";
    pub const ADMINISTRATIVE_GENDER: &str = "administrative_gender";
    pub const PRACTITIONER_ROLE: &str = "practitioner_role";
    pub const PRACTITIONER_SPECIALTY: &str = "practitioner_specialty";
    pub const ANZSCO_OCCUPATIONS: &str = "anzsco_occupations";
    pub const LANGUAGE: &str = "language";
    pub const MARITAL_STATUS: &str = "marital_status";
    pub const PATIENT_CONTACT_RELATIONSHIP: &str = "patient_contact_relationship";
    pub const ANIMAL_SPECIES: &str = "animal_species";
    pub const ANIMAL_BREEDS: &str = "animal_breeds";
    pub const ANIMAL_GENDER_STATUS: &str = "animal_genderstatus";
    pub const LINK_TYPE: &str = "link_type";
}

/// How many lookup matches a code needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchPolicy {
    /// `count == 1` with a matching entry. Single-valued code fields.
    Strict,
    /// At least one matching entry. Lists and CodeableConcepts.
    Any,
}

/// A code that must be confirmed before the enclosing write may proceed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TerminologyCheck {
    pub path: String,
    pub code: String,
    pub valueset: String,
    pub label: String,
    pub policy: MatchPolicy,
}

#[derive(Debug, thiserror::Error)]
pub enum TerminologyError {
    #[error("The {label} {code} must be defined in {url}")]
    NotAMember {
        label: String,
        code: String,
        url: String,
        matches: usize,
    },

    /// Transport or protocol failure. Reported with the same message as a
    /// non-member; the cause is kept as the error source.
    #[error("The {label} {code} must be defined in {url}")]
    Unavailable {
        label: String,
        code: String,
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Invalid terminology base URL '{0}'")]
    InvalidBaseUrl(String),
}

impl TerminologyError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }

    pub fn url(&self) -> Option<&str> {
        match self {
            Self::NotAMember { url, .. } | Self::Unavailable { url, .. } => Some(url),
            Self::InvalidBaseUrl(_) => None,
        }
    }
}

#[async_trait]
pub trait TerminologyValidator: Send + Sync {
    /// Confirms `check.code` is a member of `check.valueset`.
    async fn validate_in_valueset(&self, check: &TerminologyCheck) -> Result<(), TerminologyError>;
}

/// Resolves `checks` in order and stops at the first failure. Identical
/// checks are looked up once.
pub async fn resolve_checks(
    validator: &dyn TerminologyValidator,
    checks: &[TerminologyCheck],
) -> Result<(), TerminologyError> {
    let mut seen = HashSet::new();
    for check in checks {
        if !seen.insert((&check.code, &check.valueset, check.policy)) {
            continue;
        }
        validator.validate_in_valueset(check).await?;
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    data: Vec<Value>,
    count: Option<usize>,
}

fn entry_matches(entry: &Value, code: &str) -> bool {
    match entry {
        Value::String(s) => s == code,
        Value::Object(map) => map.get("code").and_then(Value::as_str) == Some(code),
        _ => false,
    }
}

/// Lookup service client: `GET {base}/{valueset}/?code={code}`.
#[derive(Debug, Clone)]
pub struct HttpTerminologyClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpTerminologyClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, TerminologyError> {
        let parsed = url::Url::parse(base_url)
            .map_err(|_| TerminologyError::InvalidBaseUrl(base_url.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(TerminologyError::InvalidBaseUrl(base_url.to_string()));
        }
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|_| TerminologyError::InvalidBaseUrl(base_url.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn valueset_url(&self, valueset: &str) -> String {
        format!("{}/{}/", self.base_url, valueset)
    }
}

#[async_trait]
impl TerminologyValidator for HttpTerminologyClient {
    async fn validate_in_valueset(&self, check: &TerminologyCheck) -> Result<(), TerminologyError> {
        let url = self.valueset_url(&check.valueset);
        let unavailable = |source: Box<dyn std::error::Error + Send + Sync>| TerminologyError::Unavailable {
            label: check.label.clone(),
            code: check.code.clone(),
            url: url.clone(),
            source,
        };

        tracing::debug!(valueset = %check.valueset, code = %check.code, "terminology lookup");
        let response = self
            .http
            .get(&url)
            .query(&[("code", check.code.as_str())])
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| unavailable(Box::new(e)))?;
        let body: LookupResponse = response.json().await.map_err(|e| unavailable(Box::new(e)))?;

        let matches = body.data.iter().filter(|e| entry_matches(e, &check.code)).count();
        let count = body.count.unwrap_or(body.data.len());
        let accepted = match check.policy {
            MatchPolicy::Strict => count == 1 && matches == 1,
            MatchPolicy::Any => matches >= 1,
        };

        if accepted {
            Ok(())
        } else {
            tracing::warn!(valueset = %check.valueset, code = %check.code, count, "code rejected by terminology lookup");
            Err(TerminologyError::NotAMember {
                label: check.label.clone(),
                code: check.code.clone(),
                url,
                matches,
            })
        }
    }
}

/// Fixed valueset table, for offline deployments and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticTerminology {
    sets: HashMap<String, HashSet<String>>,
}

impl StaticTerminology {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_codes(mut self, valueset: &str, codes: &[&str]) -> Self {
        self.sets
            .entry(valueset.to_string())
            .or_default()
            .extend(codes.iter().map(|c| (*c).to_string()));
        self
    }
}

#[async_trait]
impl TerminologyValidator for StaticTerminology {
    async fn validate_in_valueset(&self, check: &TerminologyCheck) -> Result<(), TerminologyError> {
        let member = self
            .sets
            .get(&check.valueset)
            .is_some_and(|codes| codes.contains(&check.code));
        if member {
            Ok(())
        } else {
            Err(TerminologyError::NotAMember {
                label: check.label.clone(),
                code: check.code.clone(),
                url: format!("static:{}", check.valueset),
                matches: 0,
            })
        }
    }
}
