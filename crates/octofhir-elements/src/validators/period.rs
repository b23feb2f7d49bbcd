use octofhir_core::PartialDateTime;

use crate::context::ValidationContext;
use crate::record::CompositeRecord;

pub(super) fn validate_period(record: &CompositeRecord, ctx: &mut ValidationContext<'_>) {
    let (Some(start), Some(end)) = (record.str("start"), record.str("end")) else {
        return;
    };
    let (Ok(s), Ok(e)) = (start.parse::<PartialDateTime>(), end.parse::<PartialDateTime>()) else {
        return;
    };
    if s.earliest() > e.earliest() {
        ctx.error(format!("start {start} must not be after end {end}"));
    }
}
