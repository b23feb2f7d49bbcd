//! FHIR element model: composite schemas, value coercion, datatype
//! validators and valueset membership checks.

pub mod catalog;
pub mod coerce;
pub mod context;
pub mod error;
pub mod primitives;
pub mod record;
pub mod schema;
pub mod terminology;
pub mod validators;

pub use catalog::{Datatypes, datatype_registry, register_datatypes};
pub use coerce::{Coerced, Coercer, finish};
pub use context::{ValidationContext, ValidationOptions};
pub use error::{IssueKind, ValidationErrors, ValidationIssue};
pub use primitives::PrimitiveKind;
pub use record::{CompositeRecord, ElementValue, prune_nulls};
pub use schema::{
    Cardinality, CompositeSchema, FieldDef, FieldType, MaxOccurs, SchemaBuilder, SchemaError, SchemaId,
    SchemaRegistry, ValueSetBinding, backbone_fields, element_fields, extend,
};
pub use terminology::{
    HttpTerminologyClient, MatchPolicy, StaticTerminology, TerminologyCheck, TerminologyError,
    TerminologyValidator, resolve_checks, valuesets,
};
pub use validators::{CompositeKind, ValidatorFn};

#[cfg(test)]
pub(crate) mod test_support {
    use serde_json::Value;

    use crate::{Coerced, Coercer, ValidationErrors, ValidationOptions, datatype_registry};

    pub(crate) fn coerce_with(
        options: &ValidationOptions,
        type_name: &str,
        value: Value,
    ) -> Result<Coerced, ValidationErrors> {
        let (registry, _) = datatype_registry().expect("datatype catalog registers");
        Coercer::new(&registry, options).coerce_type(type_name, &value)
    }

    pub(crate) fn coerce_as(type_name: &str, value: Value) -> Result<Coerced, ValidationErrors> {
        coerce_with(&ValidationOptions::default(), type_name, value)
    }
}
