use crate::context::ValidationContext;
use crate::record::CompositeRecord;

const NAME_PARTS: [&str; 4] = ["prefix", "family", "given", "suffix"];

pub(super) fn validate_human_name(record: &CompositeRecord, ctx: &mut ValidationContext<'_>) {
    let mut parts = Vec::new();
    for part in NAME_PARTS {
        for value in record.strings(part) {
            if value.chars().any(char::is_whitespace) {
                ctx.field_error(part, format!("{part} in name must not contain whitespace"));
            }
            parts.push(value);
        }
    }

    if let Some(text) = record.str("text")
        && let Some(word) = text.split_whitespace().find(|w| !parts.contains(w))
    {
        ctx.field_error(
            "text",
            format!("text must be composed of the other name parts; '{word}' is not one of them"),
        );
    }
}
