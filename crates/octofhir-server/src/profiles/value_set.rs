use octofhir_core::ResourceType;
use octofhir_elements::{
    CompositeRecord, Datatypes, FieldDef, FieldType, PrimitiveKind, SchemaBuilder, SchemaError,
    SchemaRegistry, ValidationContext,
};

use super::{ResourceProfile, composite, define, prim};

pub(crate) fn profile(
    registry: &mut SchemaRegistry,
    dt: &Datatypes,
) -> Result<ResourceProfile, SchemaError> {
    let contact = registry.register(
        SchemaBuilder::new("ValueSetContact")
            .fields(dt.backbone())
            .fields([
                FieldDef::optional("name", prim(PrimitiveKind::String)),
                FieldDef::many("telecom", composite(dt.contact_point)),
            ])
            .build(),
    )?;

    let code_system = registry.register(
        SchemaBuilder::new("ValueSetCodeSystem")
            .fields(dt.backbone())
            .fields([
                FieldDef::required("system", prim(PrimitiveKind::Uri)),
                FieldDef::optional("version", prim(PrimitiveKind::String)),
                FieldDef::optional("caseSensitive", prim(PrimitiveKind::Boolean)),
                FieldDef::one_or_more("concept", composite(dt.concept_definition)),
            ])
            .build(),
    )?;

    let concept_reference = registry.register(
        SchemaBuilder::new("ValueSetConceptReference")
            .fields(dt.backbone())
            .fields([
                FieldDef::required("code", prim(PrimitiveKind::Code)),
                FieldDef::optional("display", prim(PrimitiveKind::String)),
            ])
            .build(),
    )?;

    let filter = registry.register(
        SchemaBuilder::new("ValueSetFilter")
            .fields(dt.backbone())
            .fields([
                FieldDef::required("property", prim(PrimitiveKind::Code)),
                FieldDef::required("op", prim(PrimitiveKind::Code)),
                FieldDef::required("value", prim(PrimitiveKind::Code)),
            ])
            .build(),
    )?;

    let concept_set = registry.register(
        SchemaBuilder::new("ValueSetConceptSet")
            .fields(dt.backbone())
            .fields([
                FieldDef::required("system", prim(PrimitiveKind::Uri)),
                FieldDef::optional("version", prim(PrimitiveKind::String)),
                FieldDef::many("concept", composite(concept_reference)),
                FieldDef::many("filter", composite(filter)),
            ])
            .build(),
    )?;

    let compose = registry.register(
        SchemaBuilder::new("ValueSetCompose")
            .fields(dt.backbone())
            .fields([
                FieldDef::many("import", prim(PrimitiveKind::Uri)),
                FieldDef::many("include", composite(concept_set)),
                FieldDef::many("exclude", composite(concept_set)),
            ])
            .build(),
    )?;

    let parameter = registry.register(
        SchemaBuilder::new("ValueSetExpansionParameter")
            .fields(dt.backbone())
            .fields([
                FieldDef::required("name", prim(PrimitiveKind::String)),
                FieldDef::optional("value[x]", FieldType::Open),
            ])
            .build(),
    )?;

    // `contains` nests itself to any depth
    let contains = registry.reserve("ValueSetExpansionContains")?;
    registry.define(
        contains,
        SchemaBuilder::new("ValueSetExpansionContains")
            .fields(dt.backbone())
            .fields([
                FieldDef::optional("system", prim(PrimitiveKind::Uri)),
                FieldDef::optional("abstract", prim(PrimitiveKind::Boolean)),
                FieldDef::optional("version", prim(PrimitiveKind::String)),
                FieldDef::optional("code", prim(PrimitiveKind::Code)),
                FieldDef::optional("display", prim(PrimitiveKind::String)),
                FieldDef::many("contains", composite(contains)),
            ])
            .build(),
    )?;

    let expansion = registry.register(
        SchemaBuilder::new("ValueSetExpansion")
            .fields(dt.backbone())
            .fields([
                FieldDef::required("identifier", prim(PrimitiveKind::Uri)),
                FieldDef::required("timestamp", prim(PrimitiveKind::DateTime)),
                FieldDef::optional("total", prim(PrimitiveKind::Integer)),
                FieldDef::optional("offset", prim(PrimitiveKind::Integer)),
                FieldDef::many("parameter", composite(parameter)),
                FieldDef::many("contains", composite(contains)),
            ])
            .build(),
    )?;

    let (schema, columns) = define(
        registry,
        dt,
        ResourceType::ValueSet,
        vec![
            FieldDef::optional("url", prim(PrimitiveKind::Uri)),
            FieldDef::optional("identifier", composite(dt.identifier)),
            FieldDef::optional("version", prim(PrimitiveKind::String)),
            FieldDef::optional("name", prim(PrimitiveKind::String)),
            FieldDef::required("status", prim(PrimitiveKind::Code)),
            FieldDef::optional("experimental", prim(PrimitiveKind::Boolean)),
            FieldDef::optional("publisher", prim(PrimitiveKind::String)),
            FieldDef::many("contact", composite(contact)),
            FieldDef::optional("date", prim(PrimitiveKind::DateTime)),
            FieldDef::optional("lockedDate", prim(PrimitiveKind::Date)),
            FieldDef::optional("description", prim(PrimitiveKind::String)),
            FieldDef::many("useContext", composite(dt.codeable_concept)),
            FieldDef::optional("immutable", prim(PrimitiveKind::Boolean)),
            FieldDef::optional("requirements", prim(PrimitiveKind::String)),
            FieldDef::optional("copyright", prim(PrimitiveKind::String)),
            FieldDef::optional("extensible", prim(PrimitiveKind::Boolean)),
            FieldDef::optional("codeSystem", composite(code_system)),
            FieldDef::optional("compose", composite(compose)),
            FieldDef::optional("expansion", composite(expansion)),
        ],
    )?;

    Ok(ResourceProfile {
        resource_type: ResourceType::ValueSet,
        schema,
        columns,
        summary_fields: &["url", "identifier", "version", "name", "status", "description"],
        display_field: "name",
        rule: Some(content_and_system),
    })
}

/// A value set defines, composes or expands codes, and an inline code
/// system is not identified by the value set's own url.
fn content_and_system(record: &CompositeRecord, ctx: &mut ValidationContext<'_>) {
    if ["codeSystem", "compose", "expansion"]
        .iter()
        .all(|f| !record.is_present(f))
    {
        ctx.error("A value set needs at least one of codeSystem, compose or expansion");
    }
    if let (Some(url), Some(system)) = (
        record.str("url"),
        record.record("codeSystem").and_then(|cs| cs.str("system")),
    ) && url == system
    {
        ctx.field_error("codeSystem.system", "The code system url must differ from the value set url");
    }
}
