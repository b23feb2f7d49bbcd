// Logical resource ids and version tags.
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{CoreError, Result};

static ID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9\-\.]{1,64}$").expect("static id pattern"));

/// Server-assigned logical id.
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Checks a logical id against the FHIR `id` datatype.
pub fn validate_id(id: &str) -> Result<()> {
    if ID_PATTERN.is_match(id) {
        Ok(())
    } else {
        Err(CoreError::invalid_id(id))
    }
}

/// Parses an `If-Match` style version tag: `3`, `"3"` or `W/"3"`.
pub fn parse_version_tag(tag: &str) -> Result<u64> {
    let trimmed = tag.trim();
    let unweak = trimmed.strip_prefix("W/").unwrap_or(trimmed);
    let unquoted = unweak
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(unweak);
    unquoted
        .parse::<u64>()
        .map_err(|_| CoreError::invalid_version_tag(tag))
}
