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
    let available_time = registry.register(
        SchemaBuilder::new("HealthcareServiceAvailableTime")
            .fields(dt.backbone())
            .fields([
                FieldDef::many("daysOfWeek", prim(PrimitiveKind::Code))
                    .bound_to(valuesets::DAYS_OF_WEEK, "service available Time"),
                FieldDef::optional("allDay", prim(PrimitiveKind::Boolean)),
                FieldDef::optional("availableStartTime", prim(PrimitiveKind::Time)),
                FieldDef::optional("availableEndTime", prim(PrimitiveKind::Time)),
            ])
            .build(),
    )?;

    let not_available = registry.register(
        SchemaBuilder::new("HealthcareServiceNotAvailable")
            .fields(dt.backbone())
            .fields([
                FieldDef::required("description", prim(PrimitiveKind::String)),
                FieldDef::optional("during", composite(dt.period)),
            ])
            .build(),
    )?;

    let (schema, columns) = define(
        registry,
        dt,
        ResourceType::HealthcareService,
        vec![
            FieldDef::many("identifier", composite(dt.identifier)),
            FieldDef::optional("active", prim(PrimitiveKind::Boolean)),
            FieldDef::optional("providedBy", composite(dt.reference))
                .with_targets(&["Organization"]),
            FieldDef::optional("serviceCategory", composite(dt.codeable_concept))
                .bound_any(valuesets::SERVICE_CATEGORY, "service category"),
            FieldDef::many("serviceType", composite(dt.codeable_concept))
                .bound_any(valuesets::SERVICE_TYPE, "service type"),
            FieldDef::many("specialty", composite(dt.codeable_concept))
                .bound_any(valuesets::C80_PRACTICE_CODES, "service specialty"),
            FieldDef::many("location", composite(dt.reference)).with_targets(&["Location"]),
            FieldDef::optional("serviceName", prim(PrimitiveKind::String)),
            FieldDef::optional("comment", prim(PrimitiveKind::String)),
            FieldDef::optional("extraDetails", prim(PrimitiveKind::String)),
            FieldDef::optional("photo", composite(dt.attachment)),
            FieldDef::many("telecom", composite(dt.contact_point)),
            FieldDef::many("coverageArea", composite(dt.reference)).with_targets(&["Location"]),
            FieldDef::many("serviceProvisionCode", composite(dt.codeable_concept)).bound_any(
                valuesets::SERVICE_PROVISION_CONDITIONS,
                "service provision code",
            ),
            FieldDef::optional("eligibility", composite(dt.codeable_concept)),
            FieldDef::optional("eligibilityNote", prim(PrimitiveKind::String)),
            FieldDef::many("programName", prim(PrimitiveKind::String)),
            FieldDef::many("characteristic", composite(dt.codeable_concept)),
            FieldDef::many("referralMethod", composite(dt.codeable_concept))
                .bound_any(valuesets::SERVICE_REFERRAL_METHOD, "service referral method"),
            FieldDef::optional("publicKey", prim(PrimitiveKind::String)),
            FieldDef::optional("appointmentRequired", prim(PrimitiveKind::Boolean)),
            FieldDef::many("availableTime", composite(available_time)),
            FieldDef::many("notAvailable", composite(not_available)),
            FieldDef::optional("availabilityExceptions", prim(PrimitiveKind::String)),
        ],
    )?;

    Ok(ResourceProfile {
        resource_type: ResourceType::HealthcareService,
        schema,
        columns,
        summary_fields: &["identifier", "serviceName"],
        display_field: "serviceName",
        rule: Some(available_hours),
    })
}

/// Opening hours must not end before they start.
fn available_hours(record: &CompositeRecord, ctx: &mut ValidationContext<'_>) {
    for (i, slot) in record.records("availableTime").into_iter().enumerate() {
        if let (Some(start), Some(end)) = (slot.str("availableStartTime"), slot.str("availableEndTime"))
            && start > end
        {
            ctx.field_error(
                &format!("availableTime[{i}]"),
                "availableStartTime must not be after availableEndTime",
            );
        }
    }
}
