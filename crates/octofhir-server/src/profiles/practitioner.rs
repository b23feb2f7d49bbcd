use octofhir_core::ResourceType;
use octofhir_elements::{
    Datatypes, FieldDef, PrimitiveKind, SchemaBuilder, SchemaError, SchemaRegistry, valuesets,
};

use super::{ResourceProfile, composite, define, prim};

pub(crate) fn profile(
    registry: &mut SchemaRegistry,
    dt: &Datatypes,
) -> Result<ResourceProfile, SchemaError> {
    let role = registry.register(
        SchemaBuilder::new("PractitionerPractitionerRole")
            .fields(dt.backbone())
            .fields([
                FieldDef::optional("organization", composite(dt.reference))
                    .with_targets(&["Organization"]),
                FieldDef::optional("role", composite(dt.codeable_concept))
                    .bound_any(valuesets::PRACTITIONER_ROLE, "practitioner role"),
                FieldDef::many("specialty", composite(dt.codeable_concept))
                    .bound_any(valuesets::PRACTITIONER_SPECIALTY, "practitioner specialty"),
                FieldDef::many("identifier", composite(dt.identifier)),
                FieldDef::many("telecom", composite(dt.contact_point)),
                FieldDef::optional("period", composite(dt.period)),
                FieldDef::many("location", composite(dt.reference)).with_targets(&["Location"]),
                FieldDef::many("healthcareService", composite(dt.reference))
                    .with_targets(&["HealthcareService"]),
            ])
            .build(),
    )?;

    let qualification = registry.register(
        SchemaBuilder::new("PractitionerQualification")
            .fields(dt.backbone())
            .fields([
                FieldDef::many("identifier", composite(dt.identifier)),
                FieldDef::required("code", composite(dt.codeable_concept))
                    .bound_any(valuesets::ANZSCO_OCCUPATIONS, "practitioner qualification"),
                FieldDef::optional("period", composite(dt.period)),
                FieldDef::optional("issuer", composite(dt.reference))
                    .with_targets(&["Organization"]),
            ])
            .build(),
    )?;

    let (schema, columns) = define(
        registry,
        dt,
        ResourceType::Practitioner,
        vec![
            FieldDef::many("identifier", composite(dt.identifier)),
            FieldDef::optional("active", prim(PrimitiveKind::Boolean)),
            FieldDef::many("name", composite(dt.human_name)),
            FieldDef::many("telecom", composite(dt.contact_point)),
            FieldDef::many("address", composite(dt.address)),
            FieldDef::optional("gender", prim(PrimitiveKind::Code))
                .bound_to(valuesets::ADMINISTRATIVE_GENDER, "practitioner gender"),
            FieldDef::optional("birthDate", prim(PrimitiveKind::Date)),
            FieldDef::many("photo", composite(dt.attachment)),
            FieldDef::many("practitionerRole", composite(role)),
            FieldDef::many("qualification", composite(qualification)),
            FieldDef::many("communication", composite(dt.codeable_concept))
                .bound_any(valuesets::LANGUAGE, "practitioner communication"),
        ],
    )?;

    Ok(ResourceProfile {
        resource_type: ResourceType::Practitioner,
        schema,
        columns,
        summary_fields: &["identifier", "name"],
        display_field: "name",
        rule: None,
    })
}
