//! Criteria for conditional create, update and delete.

use octofhir_storage::{ColumnFilter, EntityRecord};

use crate::error::LifecycleError;
use crate::profiles::ResourceProfile;

/// Parses an `If-None-Exist` style query (`identifier=123&gender=male`).
/// A leading `?` is ignored.
pub fn parse_criteria(query: &str) -> Vec<(String, String)> {
    let query = query.trim().trim_start_matches('?');
    url::form_urlencoded::parse(query.as_bytes())
        .filter(|(k, _)| !k.is_empty())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

/// Turns criteria into column filters. Parameters that name no column of
/// the profile are dropped.
pub fn to_filters(profile: &ResourceProfile, params: &[(String, String)]) -> Vec<ColumnFilter> {
    params
        .iter()
        .filter_map(|(name, value)| {
            if name == "_id" || profile.has_column(name) {
                Some(ColumnFilter::new(name.clone(), value.clone()))
            } else {
                tracing::warn!(
                    resource_type = %profile.resource_type,
                    param = %name,
                    "ignoring unknown conditional parameter"
                );
                None
            }
        })
        .collect()
}

/// Outcome of a conditional lookup. Ambiguity is never resolved silently.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterMatch {
    One(Box<EntityRecord>),
    None,
    Many(usize),
}

impl FilterMatch {
    pub fn from_records(mut records: Vec<EntityRecord>) -> Self {
        match records.len() {
            0 => Self::None,
            1 => records.pop().map_or(Self::None, |r| Self::One(Box::new(r))),
            n => Self::Many(n),
        }
    }

    /// Exactly one match, else 404 / 412 semantics.
    pub fn require_one(self, resource_type: &str) -> Result<EntityRecord, LifecycleError> {
        match self {
            Self::One(record) => Ok(*record),
            Self::None => Err(LifecycleError::NoMatch {
                resource_type: resource_type.to_string(),
            }),
            Self::Many(count) => Err(LifecycleError::MultipleMatches {
                resource_type: resource_type.to_string(),
                count,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_query_strings() {
        assert_eq!(
            parse_criteria("?identifier=http%3A%2F%2Fx%7C1&gender=male"),
            [
                ("identifier".to_string(), "http://x|1".to_string()),
                ("gender".to_string(), "male".to_string())
            ]
        );
        assert!(parse_criteria("").is_empty());
        assert_eq!(parse_criteria("name=a+b")[0].1, "a b");
    }

    #[test]
    fn match_counts() {
        assert_eq!(FilterMatch::from_records(vec![]), FilterMatch::None);
        let err = FilterMatch::Many(3).require_one("Patient").unwrap_err();
        assert!(matches!(err, LifecycleError::MultipleMatches { count: 3, .. }));
        assert!(FilterMatch::None.require_one("Patient").unwrap_err().is_not_found());
    }
}
