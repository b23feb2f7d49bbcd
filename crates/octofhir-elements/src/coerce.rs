//! Binds JSON values to composite schemas.
//!
//! Coercion walks the schema depth-first and collects every structural and
//! semantic problem instead of stopping at the first one. Nested records are
//! validated before their parent. Valueset bindings are not resolved here;
//! they come back as pending [`TerminologyCheck`]s.

use serde_json::{Map, Value};

use octofhir_core::check_reference_target;

use crate::context::{ValidationContext, ValidationOptions, join_path};
use crate::error::{ValidationErrors, ValidationIssue};
use crate::primitives::json_type_name;
use crate::record::{CompositeRecord, ElementValue};
use crate::schema::{CompositeSchema, FieldDef, FieldType, SchemaId, SchemaRegistry, ValueSetBinding};
use crate::terminology::TerminologyCheck;
use crate::validators::CompositeKind;

/// A successfully bound value.
#[derive(Debug, Clone)]
pub struct Coerced {
    pub record: CompositeRecord,
    pub warnings: Vec<ValidationIssue>,
    /// Codes to confirm against their valuesets before persisting.
    pub checks: Vec<TerminologyCheck>,
}

pub struct Coercer<'a> {
    registry: &'a SchemaRegistry,
    options: &'a ValidationOptions,
}

impl<'a> Coercer<'a> {
    pub fn new(registry: &'a SchemaRegistry, options: &'a ValidationOptions) -> Self {
        Self { registry, options }
    }

    pub fn registry(&self) -> &SchemaRegistry {
        self.registry
    }

    /// Coerces `value` against the schema registered as `type_name`.
    pub fn coerce_type(&self, type_name: &str, value: &Value) -> Result<Coerced, ValidationErrors> {
        let id = self.registry.id_of(type_name).ok_or_else(|| {
            ValidationErrors::single(ValidationIssue::structural(
                type_name,
                format!("Unknown datatype {type_name}"),
            ))
        })?;
        self.coerce(id, value)
    }

    /// Coerces `value` against `schema`, reporting paths from the schema name.
    pub fn coerce(&self, schema: SchemaId, value: &Value) -> Result<Coerced, ValidationErrors> {
        let root = self
            .registry
            .get(schema)
            .map(|s| s.name.clone())
            .unwrap_or_default();
        let mut ctx = ValidationContext::new(self.options);
        let record = self.bind(schema, value, &root, &mut ctx);
        finish(record, ctx)
    }

    /// Binds into an existing context so callers can add their own rules
    /// before [`finish`].
    pub fn bind(
        &self,
        id: SchemaId,
        value: &Value,
        path: &str,
        ctx: &mut ValidationContext<'_>,
    ) -> Option<CompositeRecord> {
        let Some(schema) = self.registry.get(id) else {
            ctx.structural(path, format!("unknown schema id {}", id.index()));
            return None;
        };

        let empty = Map::new();
        let map = match value {
            Value::Null => &empty,
            Value::Object(map) => map,
            other => {
                ctx.structural(
                    path,
                    format!("expected {} object but got {}", schema.name, json_type_name(other)),
                );
                return None;
            }
        };

        let issues_before = ctx.issue_count();
        tracing::trace!(schema = %schema.name, path, "binding composite");

        if !self.options.allow_unknown_fields {
            for key in map.keys() {
                if !schema.fields.iter().any(|f| claims(f, key)) {
                    ctx.structural(
                        join_path(path, key),
                        format!("Unknown field {key} in column {}", schema.name),
                    );
                }
            }
        }

        let mut fields = Vec::with_capacity(schema.fields.len());
        for field in &schema.fields {
            let (key, raw) = lookup(schema, field, map, path, ctx);
            let value = self.bind_field(schema, field, raw, &join_path(path, &key), ctx);
            fields.push((key, value));
        }
        let record = CompositeRecord::new(id, schema.name.clone(), fields);

        if ctx.issue_count() == issues_before
            && let Some(validate) = schema.kind.and_then(CompositeKind::validator)
        {
            ctx.set_path(path);
            validate(&record, ctx);
        }
        Some(record)
    }

    fn bind_field(
        &self,
        schema: &CompositeSchema,
        field: &FieldDef,
        raw: Option<&Value>,
        path: &str,
        ctx: &mut ValidationContext<'_>,
    ) -> ElementValue {
        let not_nullable = || format!("Field {} in column {} not nullable", field.name, schema.name);

        let raw = match raw {
            None | Some(Value::Null) => {
                if field.cardinality.is_required() {
                    ctx.structural(path, not_nullable());
                }
                return ElementValue::Null;
            }
            Some(v) => v,
        };

        if field.cardinality.is_many() {
            let Value::Array(items) = raw else {
                ctx.structural(
                    path,
                    format!("Field {} in column {} expects an array", field.name, schema.name),
                );
                return ElementValue::Null;
            };
            if items.is_empty() {
                if field.cardinality.is_required() {
                    ctx.structural(path, not_nullable());
                }
                return ElementValue::Null;
            }
            let bound = items
                .iter()
                .enumerate()
                .map(|(i, item)| self.bind_single(field, item, &format!("{path}[{i}]"), ctx))
                .collect();
            ElementValue::List(bound)
        } else {
            if raw.is_array() {
                ctx.structural(
                    path,
                    format!(
                        "Field {} in column {} expects a single value, not an array",
                        field.name, schema.name
                    ),
                );
                return ElementValue::Null;
            }
            self.bind_single(field, raw, path, ctx)
        }
    }

    fn bind_single(
        &self,
        field: &FieldDef,
        value: &Value,
        path: &str,
        ctx: &mut ValidationContext<'_>,
    ) -> ElementValue {
        match field.ty {
            FieldType::Primitive(kind) => {
                if let Err(reason) = kind.check(value) {
                    ctx.structural(path, reason);
                    return ElementValue::Null;
                }
                if let (Some(binding), Some(code)) = (&field.binding, value.as_str()) {
                    queue_check(ctx, path, code, binding);
                }
                ElementValue::Primitive(value.clone())
            }
            FieldType::Composite(id) => {
                let Some(record) = self.bind(id, value, path, ctx) else {
                    return ElementValue::Null;
                };
                self.check_reference(field, &record, path, ctx);
                if let Some(binding) = &field.binding {
                    for (code_path, code) in bound_codes(&record, path) {
                        queue_check(ctx, &code_path, code, binding);
                    }
                }
                ElementValue::Composite(record)
            }
            FieldType::Open => ElementValue::Open(value.clone()),
        }
    }

    fn check_reference(
        &self,
        field: &FieldDef,
        record: &CompositeRecord,
        path: &str,
        ctx: &mut ValidationContext<'_>,
    ) {
        let is_reference = self
            .registry
            .get(record.schema())
            .is_some_and(|s| s.kind == Some(CompositeKind::Reference));
        if !is_reference {
            return;
        }
        if let Some(reference) = record.str("reference") {
            let allowed: Vec<&str> = field.targets.iter().map(String::as_str).collect();
            if let Err(e) = check_reference_target(reference, &allowed) {
                ctx.structural(join_path(path, "reference"), e.to_string());
            }
        }
    }
}

/// Turns a bound record and its context into the final result.
pub fn finish(
    record: Option<CompositeRecord>,
    ctx: ValidationContext<'_>,
) -> Result<Coerced, ValidationErrors> {
    let (issues, warnings, checks) = ctx.into_parts();
    match record {
        Some(record) if issues.is_empty() => Ok(Coerced {
            record,
            warnings,
            checks,
        }),
        _ if issues.is_empty() => Err(ValidationErrors::single(ValidationIssue::structural(
            "",
            "value could not be bound",
        ))),
        _ => {
            tracing::debug!(count = issues.len(), "coercion rejected value");
            Err(ValidationErrors::new(issues))
        }
    }
}

fn choice_prefix(name: &str) -> Option<&str> {
    name.strip_suffix("[x]")
}

/// Whether `key` in the input belongs to `field`. A `name[x]` field claims
/// `nameString`, `nameCode`, and so on.
fn claims(field: &FieldDef, key: &str) -> bool {
    match choice_prefix(&field.name) {
        Some(prefix) => key
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with(|c: char| c.is_ascii_uppercase())),
        None => field.name == key,
    }
}

/// Finds the input for `field`, returning the key it was stored under.
fn lookup<'v>(
    schema: &CompositeSchema,
    field: &FieldDef,
    map: &'v Map<String, Value>,
    path: &str,
    ctx: &mut ValidationContext<'_>,
) -> (String, Option<&'v Value>) {
    if choice_prefix(&field.name).is_none() {
        return (field.name.clone(), map.get(&field.name));
    }
    let mut matches = map.iter().filter(|(k, _)| claims(field, k));
    let Some((key, value)) = matches.next() else {
        return (field.name.clone(), None);
    };
    if matches.next().is_some() {
        ctx.structural(
            join_path(path, &field.name),
            format!("Only one {} may be present in column {}", field.name, schema.name),
        );
    }
    (key.clone(), Some(value))
}

/// Codes carried by a bound composite: `Coding.code` or every
/// `CodeableConcept.coding[].code`.
fn bound_codes<'r>(record: &'r CompositeRecord, path: &str) -> Vec<(String, &'r str)> {
    match record.type_name() {
        "Coding" => record
            .str("code")
            .map(|c| vec![(join_path(path, "code"), c)])
            .unwrap_or_default(),
        "CodeableConcept" => record
            .records("coding")
            .into_iter()
            .enumerate()
            .filter_map(|(i, coding)| {
                coding
                    .str("code")
                    .map(|c| (format!("{path}.coding[{i}].code"), c))
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn queue_check(ctx: &mut ValidationContext<'_>, path: &str, code: &str, binding: &ValueSetBinding) {
    ctx.require_code(TerminologyCheck {
        path: path.to_string(),
        code: code.to_string(),
        valueset: binding.valueset.clone(),
        label: binding.label.clone(),
        policy: binding.policy,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::datatype_registry;
    use crate::error::IssueKind;
    use crate::terminology::MatchPolicy;
    use crate::test_support::{coerce_as, coerce_with};
    use serde_json::json;

    #[test]
    fn missing_required_fields_are_aggregated() {
        let errs = coerce_as("SampledData", json!({"data": "1"})).unwrap_err();
        let messages: Vec<&str> = errs.messages().collect();
        assert_eq!(
            messages,
            [
                "Field origin in column SampledData not nullable",
                "Field period in column SampledData not nullable",
                "Field dimensions in column SampledData not nullable",
            ]
        );
        assert!(errs.issues.iter().all(|i| i.kind == IssueKind::Structural));
    }

    #[test]
    fn empty_object_and_null_bind_all_optional_schema() {
        for input in [json!({}), Value::Null] {
            let ok = coerce_as("Period", input).unwrap();
            assert!(ok.record.get("start").is_null());
            assert!(ok.record.get("end").is_null());
            assert_eq!(ok.record.to_json(), json!({"id": null, "extension": null, "start": null, "end": null}));
        }
    }

    #[test]
    fn many_fields_require_arrays_and_keep_order() {
        let ok = coerce_as("HumanName", json!({"given": ["Peter", "James"]})).unwrap();
        assert_eq!(ok.record.strings("given"), ["Peter", "James"]);

        let errs = coerce_as("HumanName", json!({"given": "Peter"})).unwrap_err();
        assert!(errs.mentions("Field given in column HumanName expects an array"));

        let errs = coerce_as("HumanName", json!({"text": ["Peter"]})).unwrap_err();
        assert!(errs.mentions("expects a single value"));
    }

    #[test]
    fn nested_errors_are_collected_with_paths() {
        let errs = coerce_as(
            "Identifier",
            json!({
                "period": {"start": "yesterday"},
                "type": {"coding": [{"system": 42}]},
                "extra": true,
            }),
        )
        .unwrap_err();
        let paths: Vec<&str> = errs.issues.iter().map(|i| i.path.as_str()).collect();
        assert!(paths.contains(&"Identifier.extra"));
        assert!(paths.contains(&"Identifier.period.start"));
        assert!(paths.contains(&"Identifier.type.coding[0].system"));
        assert!(errs.mentions("Unknown field extra in column Identifier"));
        assert_eq!(errs.len(), 3);
    }

    #[test]
    fn unknown_fields_can_be_allowed() {
        let options = ValidationOptions {
            allow_unknown_fields: true,
            ..Default::default()
        };
        let ok = coerce_with(&options, "Period", json!({"start": "2020", "foo": 1})).unwrap();
        assert!(!ok.record.has_field("foo"));
    }

    #[test]
    fn reference_targets_are_enforced() {
        let errs = coerce_as(
            "Identifier",
            json!({"assigner": {"reference": "Patient/1"}}),
        )
        .unwrap_err();
        assert_eq!(errs.issues[0].path, "Identifier.assigner.reference");

        coerce_as("Identifier", json!({"assigner": {"reference": "Organization/1"}})).unwrap();
        coerce_as(
            "Identifier",
            json!({"assigner": {"reference": "http://example.org/fhir/Organization/1/_history/2"}}),
        )
        .unwrap();
    }

    #[test]
    fn bindings_queue_terminology_checks() {
        let ok = coerce_as(
            "Identifier",
            json!({
                "use": "official",
                "type": {"coding": [{"system": "http://hl7.org/fhir/v2/0203", "code": "MR"}, {"code": "DL"}]},
            }),
        )
        .unwrap();
        let found: Vec<(&str, &str, MatchPolicy)> = ok
            .checks
            .iter()
            .map(|c| (c.code.as_str(), c.valueset.as_str(), c.policy))
            .collect();
        assert_eq!(
            found,
            [
                ("official", "identifier_use", MatchPolicy::Strict),
                ("MR", "identifier_type", MatchPolicy::Any),
                ("DL", "identifier_type", MatchPolicy::Any),
            ]
        );
        assert_eq!(ok.checks[1].path, "Identifier.type.coding[0].code");
    }

    #[test]
    fn extension_value_is_a_choice() {
        let ok = coerce_as(
            "Extension",
            json!({"url": "http://example.org/ext", "valueString": "x"}),
        )
        .unwrap();
        assert_eq!(ok.record.get("valueString").to_json(), json!("x"));

        let errs = coerce_as(
            "Extension",
            json!({"url": "http://example.org/ext", "valueString": "x", "valueCode": "y"}),
        )
        .unwrap_err();
        assert!(errs.mentions("Only one value[x]"));
    }

    #[test]
    fn recursive_schemas_bind_at_depth() {
        let ok = coerce_as(
            "ConceptDefinition",
            json!({
                "code": "a",
                "concept": [{"code": "b", "concept": [{"code": "c"}]}],
            }),
        )
        .unwrap();
        let child = ok.record.records("concept")[0];
        assert_eq!(child.records("concept")[0].str("code"), Some("c"));

        let errs = coerce_as(
            "ConceptDefinition",
            json!({"code": "a", "concept": [{"concept": [{}]}]}),
        )
        .unwrap_err();
        assert_eq!(errs.len(), 2);
        assert_eq!(errs.issues[1].path, "ConceptDefinition.concept[0].concept[0].code");
    }

    #[test]
    fn nested_extensions_recurse() {
        coerce_as(
            "Coding",
            json!({
                "code": "x",
                "extension": [{"url": "http://a", "extension": [{"url": "http://b", "valueBoolean": true}]}],
            }),
        )
        .unwrap();
    }

    #[test]
    fn unknown_type_name() {
        let (registry, _) = datatype_registry().unwrap();
        let options = ValidationOptions::default();
        let errs = Coercer::new(&registry, &options)
            .coerce_type("Nope", &json!({}))
            .unwrap_err();
        assert!(errs.mentions("Unknown datatype Nope"));
    }

    #[test]
    fn scalar_for_composite_is_rejected() {
        let errs = coerce_as("Range", json!({"low": 5})).unwrap_err();
        assert!(errs.mentions("expected SimpleQuantity object but got number"));
    }
}
