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
    let contact = registry.register(
        SchemaBuilder::new("OrganizationContact")
            .fields(dt.backbone())
            .fields([
                FieldDef::optional("purpose", composite(dt.codeable_concept))
                    .bound_any(valuesets::CONTACT_ENTITY_TYPE, "organization contact purpose"),
                FieldDef::optional("name", composite(dt.human_name)),
                FieldDef::optional("address", composite(dt.address)),
                FieldDef::many("telecom", composite(dt.contact_point)),
            ])
            .build(),
    )?;

    let (schema, columns) = define(
        registry,
        dt,
        ResourceType::Organization,
        vec![
            FieldDef::optional("active", prim(PrimitiveKind::Boolean)),
            FieldDef::optional("name", prim(PrimitiveKind::String)),
            FieldDef::many("alias", prim(PrimitiveKind::String)),
            FieldDef::many("identifier", composite(dt.identifier)),
            FieldDef::optional("type", composite(dt.codeable_concept))
                .bound_any(valuesets::ORGANIZATION_TYPE, "organization type code"),
            FieldDef::optional("partOf", composite(dt.reference)).with_targets(&["Organization"]),
            FieldDef::many("telecom", composite(dt.contact_point)),
            FieldDef::many("address", composite(dt.address)),
            FieldDef::many("endpoint", composite(dt.reference)).with_targets(&["Endpoint"]),
            FieldDef::many("contact", composite(contact)),
        ],
    )?;

    Ok(ResourceProfile {
        resource_type: ResourceType::Organization,
        schema,
        columns,
        summary_fields: &["identifier", "name", "type"],
        display_field: "name",
        rule: Some(no_home_use),
    })
}

/// An organization never has a `home` telecom or address.
fn no_home_use(record: &CompositeRecord, ctx: &mut ValidationContext<'_>) {
    for (i, telecom) in record.records("telecom").into_iter().enumerate() {
        if telecom.str("use") == Some("home") {
            ctx.field_error(
                &format!("telecom[{i}].use"),
                "The telecom of an organization can never be of use `home`",
            );
        }
    }
    for (i, address) in record.records("address").into_iter().enumerate() {
        if address.str("use") == Some("home") {
            ctx.field_error(
                &format!("address[{i}].use"),
                "An address of an organization can never be of use `home`",
            );
        }
    }
}
