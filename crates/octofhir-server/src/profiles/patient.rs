use octofhir_core::ResourceType;
use octofhir_elements::{
    CompositeRecord, Datatypes, FieldDef, PrimitiveKind, SchemaBuilder, SchemaError,
    SchemaRegistry, ValidationContext, valuesets,
};

use super::{ResourceProfile, composite, define, prim};

const CARE_PROVIDERS: &[&str] = &["Organization", "Practitioner"];

pub(crate) fn profile(
    registry: &mut SchemaRegistry,
    dt: &Datatypes,
) -> Result<ResourceProfile, SchemaError> {
    let contact = registry.register(
        SchemaBuilder::new("PatientContact")
            .fields(dt.backbone())
            .fields([
                FieldDef::many("relationship", composite(dt.codeable_concept)).bound_any(
                    valuesets::PATIENT_CONTACT_RELATIONSHIP,
                    "patient contact relationship",
                ),
                FieldDef::optional("name", composite(dt.human_name)),
                FieldDef::many("telecom", composite(dt.contact_point)),
                FieldDef::optional("address", composite(dt.address)),
                FieldDef::optional("gender", prim(PrimitiveKind::Code))
                    .bound_to(valuesets::ADMINISTRATIVE_GENDER, "patient contact gender"),
                FieldDef::optional("organization", composite(dt.reference))
                    .with_targets(&["Organization"]),
                FieldDef::optional("period", composite(dt.period)),
            ])
            .build(),
    )?;

    let animal = registry.register(
        SchemaBuilder::new("PatientAnimal")
            .fields(dt.backbone())
            .fields([
                FieldDef::required("species", composite(dt.codeable_concept))
                    .bound_any(valuesets::ANIMAL_SPECIES, "patient animal species"),
                FieldDef::optional("breed", composite(dt.codeable_concept))
                    .bound_any(valuesets::ANIMAL_BREEDS, "patient animal breed"),
                FieldDef::optional("genderStatus", composite(dt.codeable_concept)).bound_any(
                    valuesets::ANIMAL_GENDER_STATUS,
                    "patient animal gender status",
                ),
            ])
            .build(),
    )?;

    let communication = registry.register(
        SchemaBuilder::new("PatientCommunication")
            .fields(dt.backbone())
            .fields([
                FieldDef::required("language", composite(dt.codeable_concept))
                    .bound_any(valuesets::LANGUAGE, "patient communication language"),
                FieldDef::optional("preferred", prim(PrimitiveKind::Boolean)),
            ])
            .build(),
    )?;

    let link = registry.register(
        SchemaBuilder::new("PatientLink")
            .fields(dt.backbone())
            .fields([
                FieldDef::required("other", composite(dt.reference)).with_targets(&["Patient"]),
                FieldDef::required("type", prim(PrimitiveKind::Code))
                    .bound_to(valuesets::LINK_TYPE, "patient link type"),
            ])
            .build(),
    )?;

    let (schema, columns) = define(
        registry,
        dt,
        ResourceType::Patient,
        vec![
            FieldDef::many("identifier", composite(dt.identifier)),
            FieldDef::optional("active", prim(PrimitiveKind::Boolean)),
            FieldDef::many("name", composite(dt.human_name)),
            FieldDef::many("telecom", composite(dt.contact_point)),
            FieldDef::optional("gender", prim(PrimitiveKind::Code))
                .bound_to(valuesets::ADMINISTRATIVE_GENDER, "patient gender"),
            FieldDef::optional("birthDate", prim(PrimitiveKind::Date)),
            FieldDef::optional("deceasedBoolean", prim(PrimitiveKind::Boolean)),
            FieldDef::optional("deceasedDateTime", prim(PrimitiveKind::DateTime)),
            FieldDef::many("address", composite(dt.address)),
            FieldDef::optional("maritalStatus", composite(dt.codeable_concept))
                .bound_any(valuesets::MARITAL_STATUS, "patient marital status code"),
            FieldDef::optional("multipleBirthBoolean", prim(PrimitiveKind::Boolean)),
            FieldDef::optional("multipleBirthInteger", prim(PrimitiveKind::Integer)),
            FieldDef::many("photo", composite(dt.attachment)),
            FieldDef::many("contact", composite(contact)),
            FieldDef::optional("animal", composite(animal)),
            FieldDef::many("communication", composite(communication)),
            FieldDef::many("careProvider", composite(dt.reference)).with_targets(CARE_PROVIDERS),
            FieldDef::many("generalPractitioner", composite(dt.reference))
                .with_targets(CARE_PROVIDERS),
            FieldDef::optional("managingOrganization", composite(dt.reference))
                .with_targets(&["Organization"]),
            FieldDef::many("link", composite(link)),
        ],
    )?;

    Ok(ResourceProfile {
        resource_type: ResourceType::Patient,
        schema,
        columns,
        summary_fields: &["identifier", "name"],
        display_field: "name",
        rule: Some(single_choice_values),
    })
}

/// `deceased[x]` and `multipleBirth[x]` are stored as separate columns but
/// only one variant of each may be set.
fn single_choice_values(record: &CompositeRecord, ctx: &mut ValidationContext<'_>) {
    for (a, b) in [
        ("deceasedBoolean", "deceasedDateTime"),
        ("multipleBirthBoolean", "multipleBirthInteger"),
    ] {
        if record.is_present(a) && record.is_present(b) {
            ctx.error(format!("Only one of {a} and {b} may be present"));
        }
    }
}
