use std::sync::LazyLock;

use regex::Regex;

use crate::context::ValidationContext;
use crate::record::CompositeRecord;

static COUNTRY_CODE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z]{2,3}$").expect("Invalid country code regex"));

pub(super) fn validate_contact_point(record: &CompositeRecord, ctx: &mut ValidationContext<'_>) {
    if record.is_present("system") && !record.is_present("value") {
        ctx.field_error("value", "value must be provided when system is present");
    }
}

pub(super) fn validate_address(record: &CompositeRecord, ctx: &mut ValidationContext<'_>) {
    if let Some(country) = record.str("country")
        && !COUNTRY_CODE_REGEX.is_match(country)
    {
        ctx.warn(format!(
            "country '{country}' is not recommended; use an ISO 3166 2 or 3 letter code"
        ));
    }
}
