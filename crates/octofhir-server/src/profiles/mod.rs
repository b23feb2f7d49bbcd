//! Resource profiles: the fields, bindings, reference targets and summary
//! elements of each resource type the server stores.

mod healthcare_service;
mod location;
mod organization;
mod patient;
mod practitioner;
mod value_set;

use octofhir_core::ResourceType;
use octofhir_elements::{
    CompositeRecord, CompositeSchema, Datatypes, FieldDef, FieldType, PrimitiveKind, SchemaBuilder,
    SchemaError, SchemaId, SchemaRegistry, ValidationContext, extend,
};
use octofhir_storage::EntityMapping;

/// Resource-level invariant run after the resource body has been bound.
pub type ResourceRule = fn(&CompositeRecord, &mut ValidationContext<'_>);

#[derive(Debug, Clone)]
pub struct ResourceProfile {
    pub resource_type: ResourceType,
    /// Full resource schema: `resource` + `domainresource` + own fields.
    pub schema: SchemaId,
    /// Columns of the type's own table.
    pub columns: Vec<String>,
    /// Elements kept by `_summary=true`, besides `resourceType`, `id` and `meta`.
    pub summary_fields: &'static [&'static str],
    /// Element rendered into the generated narrative.
    pub display_field: &'static str,
    pub rule: Option<ResourceRule>,
}

impl ResourceProfile {
    pub fn name(&self) -> String {
        self.resource_type.to_string()
    }

    /// The table chain persisted for this type.
    pub fn mapping(&self) -> EntityMapping {
        EntityMapping::domain_resource(&self.name(), self.columns.iter().cloned())
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }
}

/// Registers the resource schema for `resource_type`. Returns the schema id
/// and the names of the own-table columns.
pub(crate) fn define(
    registry: &mut SchemaRegistry,
    datatypes: &Datatypes,
    resource_type: ResourceType,
    own: Vec<FieldDef>,
) -> Result<(SchemaId, Vec<String>), SchemaError> {
    let columns = own.iter().map(|f| f.name.clone()).collect();
    let schema = resource_schema(&resource_type.to_string(), datatypes, own);
    Ok((registry.register(schema)?, columns))
}

fn resource_schema(name: &str, datatypes: &Datatypes, own: Vec<FieldDef>) -> CompositeSchema {
    let base = extend(
        &datatypes.resource_fields(),
        datatypes.domain_resource_fields(),
    );
    SchemaBuilder::new(name).fields(extend(&base, own)).build()
}

/// Every built-in profile, in registration order.
pub(crate) fn builtin(
    registry: &mut SchemaRegistry,
    datatypes: &Datatypes,
) -> Result<Vec<ResourceProfile>, SchemaError> {
    Ok(vec![
        organization::profile(registry, datatypes)?,
        patient::profile(registry, datatypes)?,
        practitioner::profile(registry, datatypes)?,
        location::profile(registry, datatypes)?,
        healthcare_service::profile(registry, datatypes)?,
        value_set::profile(registry, datatypes)?,
    ])
}

pub(crate) fn prim(kind: PrimitiveKind) -> FieldType {
    FieldType::Primitive(kind)
}

pub(crate) fn composite(id: SchemaId) -> FieldType {
    FieldType::Composite(id)
}
