use octofhir_core::ResourceType;
use octofhir_elements::{
    CompositeRecord, Datatypes, FieldDef, PrimitiveKind, SchemaBuilder, SchemaError,
    SchemaRegistry, ValidationContext, valuesets,
};

use super::{ResourceProfile, composite, define, prim};

pub(crate) fn profile(
    registry: &mut SchemaRegistry,
    dt: &Datatypes,
) -> Result<ResourceProfile, SchemaError> {
    let position = registry.register(
        SchemaBuilder::new("LocationPosition")
            .fields(dt.backbone())
            .fields([
                FieldDef::required("longitude", prim(PrimitiveKind::Decimal)),
                FieldDef::required("latitude", prim(PrimitiveKind::Decimal)),
                FieldDef::optional("altitude", prim(PrimitiveKind::Decimal)),
            ])
            .build(),
    )?;

    let (schema, columns) = define(
        registry,
        dt,
        ResourceType::Location,
        vec![
            FieldDef::many("identifier", composite(dt.identifier)),
            FieldDef::optional("status", prim(PrimitiveKind::Code))
                .bound_to(valuesets::LOCATION_STATUS, "location status"),
            FieldDef::optional("name", prim(PrimitiveKind::String)),
            FieldDef::many("alias", prim(PrimitiveKind::String)),
            FieldDef::optional("description", prim(PrimitiveKind::String)),
            FieldDef::optional("mode", prim(PrimitiveKind::Code))
                .bound_to(valuesets::LOCATION_MODE, "location mode"),
            FieldDef::optional("type", composite(dt.codeable_concept))
                .bound_any(valuesets::ROLE_CODE, "location type"),
            FieldDef::many("telecom", composite(dt.contact_point)),
            FieldDef::optional("address", composite(dt.address)),
            FieldDef::optional("physicalType", composite(dt.codeable_concept))
                .bound_any(valuesets::LOCATION_PHYSICAL_TYPE, "location physical type"),
            FieldDef::optional("position", composite(position)),
            FieldDef::optional("managingOrganization", composite(dt.reference))
                .with_targets(&["Organization"]),
            FieldDef::optional("partOf", composite(dt.reference)).with_targets(&["Location"]),
            FieldDef::many("endpoint", composite(dt.reference)).with_targets(&["Endpoint"]),
        ],
    )?;

    Ok(ResourceProfile {
        resource_type: ResourceType::Location,
        schema,
        columns,
        summary_fields: &["identifier", "name"],
        display_field: "name",
        rule: Some(position_in_range),
    })
}

/// WGS84 bounds of `position`.
fn position_in_range(record: &CompositeRecord, ctx: &mut ValidationContext<'_>) {
    let Some(position) = record.record("position") else {
        return;
    };
    if position.decimal("latitude").is_some_and(|lat| !(-90.0..=90.0).contains(&lat)) {
        ctx.field_error("position.latitude", "latitude must be between -90 and 90");
    }
    if position.decimal("longitude").is_some_and(|lon| !(-180.0..=180.0).contains(&lon)) {
        ctx.field_error("position.longitude", "longitude must be between -180 and 180");
    }
}
