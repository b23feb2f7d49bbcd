use crate::context::ValidationContext;
use crate::record::CompositeRecord;

pub const UCUM_SYSTEM: &str = "http://unitsofmeasure.org";

/// SimpleQuantity and everything built on it.
pub(super) fn validate_quantity(record: &CompositeRecord, ctx: &mut ValidationContext<'_>) {
    if record.is_present("code") && !record.is_present("system") {
        ctx.error("system must be specified if code is provided");
    }
    if let Some(system) = record.str("system")
        && system != UCUM_SYSTEM
    {
        ctx.warn(format!(
            "unit system {system} is not UCUM; {UCUM_SYSTEM} is recommended"
        ));
    }
}

pub(super) fn validate_money(record: &CompositeRecord, ctx: &mut ValidationContext<'_>) {
    validate_quantity(record, ctx);
    if record.is_present("value") && !record.is_present("code") {
        ctx.error("code must be specified if value is provided");
    }
}

pub(super) fn validate_range(record: &CompositeRecord, ctx: &mut ValidationContext<'_>) {
    let (Some(low), Some(high)) = (record.record("low"), record.record("high")) else {
        return;
    };

    if let (Some(lo), Some(hi)) = (low.decimal("value"), high.decimal("value"))
        && lo > hi
    {
        ctx.error(format!("low value {lo} cannot be greater than high value {hi}"));
    }
    for attr in ["unit", "code", "system"] {
        if low.str(attr) != high.str(attr) {
            ctx.error(format!("{attr} of low and high should match"));
        }
    }
}

pub(super) fn validate_ratio(record: &CompositeRecord, ctx: &mut ValidationContext<'_>) {
    if record.is_present("numerator") != record.is_present("denominator") {
        ctx.error("numerator and denominator must both be present or both be absent");
    }
}
