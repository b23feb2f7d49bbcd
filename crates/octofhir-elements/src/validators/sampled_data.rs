use std::sync::LazyLock;

use regex::Regex;

use crate::context::ValidationContext;
use crate::record::CompositeRecord;

static SAMPLED_DATA_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-9.][EUL ]*)*$").expect("Invalid sampled data regex"));

static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s\s").expect("Invalid whitespace regex"));

pub(super) fn validate_sampled_data(record: &CompositeRecord, ctx: &mut ValidationContext<'_>) {
    let Some(data) = record.str("data") else {
        return;
    };
    if WHITESPACE_RUN.is_match(data) {
        ctx.field_error("data", "data in sampleddata must not have more than 1 whitespace");
    }
    if !SAMPLED_DATA_REGEX.is_match(data) {
        ctx.field_error(
            "data",
            "Data should be composed of decimal values with spaces, or \"E\" | \"U\" | \"L\"",
        );
    }
}

#[cfg(test)]
mod tests {
    use crate::test_support::coerce_as;
    use serde_json::json;

    fn sample(data: &str) -> serde_json::Value {
        json!({
            "origin": {"value": 0},
            "period": 10,
            "dimensions": 1,
            "data": data,
        })
    }

    #[test]
    fn accepts_digits_and_markers() {
        coerce_as("SampledData", sample("1 2.5 E 3 U L")).unwrap();
    }

    #[test]
    fn rejects_double_space_and_foreign_characters() {
        let errs = coerce_as("SampledData", sample("1  2")).unwrap_err();
        assert!(errs.mentions("more than 1 whitespace"));

        let errs = coerce_as("SampledData", sample("1 x 2")).unwrap_err();
        assert!(errs.mentions("decimal values"));
    }

    #[test]
    fn origin_and_period_are_required() {
        let errs = coerce_as("SampledData", json!({"dimensions": 1, "data": "1"})).unwrap_err();
        assert!(errs.mentions("Field origin in column SampledData not nullable"));
        assert!(errs.mentions("Field period in column SampledData not nullable"));
    }
}
