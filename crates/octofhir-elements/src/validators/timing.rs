use crate::context::ValidationContext;
use crate::record::CompositeRecord;

const BOUNDS: [&str; 3] = ["boundsQuantity", "boundsRange", "boundsPeriod"];

pub(super) fn validate_timing_repeat(record: &CompositeRecord, ctx: &mut ValidationContext<'_>) {
    if record.is_present("periodMax") && !record.is_present("period") {
        ctx.error("If there is a periodMax, there must be a period");
    }
    if record.is_present("durationMax") && !record.is_present("duration") {
        ctx.error("If there is a durationMax, there must be a duration");
    }
    if record.is_present("duration") && !record.is_present("durationUnits") {
        ctx.error("durationUnits must be present for the duration provided");
    }
    if record.is_present("period") && !record.is_present("periodUnits") {
        ctx.error("periodUnits must be present for the period provided");
    }
    if record.is_present("frequency") && record.is_present("when") {
        ctx.error("Either frequency or when can exist, not both");
    }

    for field in ["duration", "durationMax", "period", "periodMax"] {
        if let Some(v) = record.decimal(field)
            && v < 0.0
        {
            ctx.field_error(field, format!("{field} SHALL be a non-negative value"));
        }
    }

    if BOUNDS.iter().filter(|b| record.is_present(b)).count() > 1 {
        ctx.error("Only one of boundsQuantity, boundsRange or boundsPeriod may be present");
    }
}

#[cfg(test)]
mod tests {
    use crate::test_support::coerce_as;
    use serde_json::json;

    #[test]
    fn max_requires_base_value() {
        let errs = coerce_as("TimingRepeat", json!({"periodMax": 2, "periodUnits": "h"})).unwrap_err();
        assert!(errs.mentions("If there is a periodMax, there must be a period"));

        let errs = coerce_as("TimingRepeat", json!({"durationMax": 2})).unwrap_err();
        assert!(errs.mentions("If there is a durationMax, there must be a duration"));
    }

    #[test]
    fn frequency_and_when_are_exclusive() {
        let errs = coerce_as("TimingRepeat", json!({"frequency": 2, "when": "HS"})).unwrap_err();
        assert!(errs.mentions("Either frequency or when"));
    }

    #[test]
    fn negative_values_are_rejected_and_collected() {
        let errs = coerce_as(
            "TimingRepeat",
            json!({"duration": -1, "durationUnits": "h", "period": -2, "periodUnits": "d"}),
        )
        .unwrap_err();
        assert!(errs.mentions("duration SHALL be a non-negative value"));
        assert!(errs.mentions("period SHALL be a non-negative value"));
        assert_eq!(errs.len(), 2);
    }

    #[test]
    fn timing_nests_repeat() {
        let ok = coerce_as(
            "Timing",
            json!({"repeat": {"frequency": 3, "period": 1, "periodUnits": "d"}}),
        )
        .unwrap();
        assert_eq!(ok.checks.len(), 1);
        assert_eq!(ok.checks[0].code, "d");

        let errs = coerce_as("Timing", json!({"repeat": {"durationMax": 1}})).unwrap_err();
        assert_eq!(errs.issues[0].path, "Timing.repeat");
    }
}
