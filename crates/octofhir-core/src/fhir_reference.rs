//! Parsing of `Reference.reference` literals and target-type checks.
//!
//! Accepted shapes:
//! - relative: `Patient/123`, `Patient/123/_history/2`
//! - absolute: `http://example.org/fhir/Patient/123` (the last `Type/id` pair is used)
//! - contained: `#p1`
//! - URN: `urn:uuid:...`, `urn:oid:...`
//!
//! Contained and URN references carry no type, so they pass any target check.

use crate::error::{CoreError, Result};
use crate::id::validate_id;

/// Resource type named by `reference`. Contained and URN references give
/// `None`. A trailing `/_history/<version>` is accepted and ignored.
pub fn reference_type(reference: &str) -> Result<Option<String>> {
    let reference = reference.trim();
    if reference.is_empty() {
        return Err(CoreError::invalid_reference(reference, "empty reference"));
    }
    if reference.starts_with('#')
        || reference.starts_with("urn:uuid:")
        || reference.starts_with("urn:oid:")
    {
        return Ok(None);
    }

    let path = if reference.contains("://") {
        let url = url::Url::parse(reference)?;
        url.path().trim_matches('/').to_string()
    } else {
        reference.to_string()
    };

    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let (resource_type, id) = match segments.as_slice() {
        [.., t, id, "_history", _] | [.., t, id] => (*t, *id),
        _ => {
            return Err(CoreError::invalid_reference(
                reference,
                "expected ResourceType/id",
            ));
        }
    };

    let type_ok = resource_type
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_uppercase())
        && resource_type.chars().all(|c| c.is_ascii_alphanumeric());
    if !type_ok {
        return Err(CoreError::invalid_reference(
            reference,
            format!("'{resource_type}' is not a resource type"),
        ));
    }
    validate_id(id).map_err(|_| CoreError::invalid_reference(reference, format!("'{id}' is not a valid id")))?;

    Ok(Some(resource_type.to_string()))
}

/// Checks that `reference` points at one of `allowed` resource types.
/// An empty `allowed` list accepts any type.
pub fn check_reference_target(reference: &str, allowed: &[&str]) -> Result<()> {
    if let Some(resource_type) = reference_type(reference)?
        && !allowed.is_empty()
        && !allowed.contains(&resource_type.as_str())
    {
        return Err(CoreError::reference_target_mismatch(reference, allowed));
    }
    Ok(())
}
