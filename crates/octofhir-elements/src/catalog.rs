//! The FHIR datatypes known to the server.
//!
//! Reference: <https://www.hl7.org/fhir/datatypes.html>

use crate::primitives::PrimitiveKind;
use crate::schema::{
    FieldDef, FieldType, SchemaBuilder, SchemaError, SchemaId, SchemaRegistry, backbone_fields,
    element_fields, extend,
};
use crate::terminology::valuesets;
use crate::validators::CompositeKind;

/// Ids of the registered datatypes.
#[derive(Debug, Clone, Copy)]
pub struct Datatypes {
    pub extension: SchemaId,
    pub coding: SchemaId,
    pub codeable_concept: SchemaId,
    pub period: SchemaId,
    pub reference: SchemaId,
    pub identifier: SchemaId,
    pub human_name: SchemaId,
    pub contact_point: SchemaId,
    pub address: SchemaId,
    pub attachment: SchemaId,
    pub simple_quantity: SchemaId,
    pub quantity: SchemaId,
    pub age: SchemaId,
    pub count: SchemaId,
    pub distance: SchemaId,
    pub duration: SchemaId,
    pub money: SchemaId,
    pub range: SchemaId,
    pub ratio: SchemaId,
    pub sampled_data: SchemaId,
    pub signature: SchemaId,
    pub timing_repeat: SchemaId,
    pub timing: SchemaId,
    pub annotation: SchemaId,
    pub narrative: SchemaId,
    pub meta: SchemaId,
    pub concept_definition: SchemaId,
}

impl Datatypes {
    /// Fields shared by element-level types.
    pub fn element(&self) -> Vec<FieldDef> {
        element_fields(self.extension)
    }

    /// Fields shared by backbone elements nested in resources.
    pub fn backbone(&self) -> Vec<FieldDef> {
        backbone_fields(self.extension)
    }

    /// Columns of the `resource` table.
    pub fn resource_fields(&self) -> Vec<FieldDef> {
        vec![
            FieldDef::optional("meta", FieldType::Composite(self.meta)),
            FieldDef::optional("implicitRules", prim(PrimitiveKind::Uri)),
            FieldDef::optional("language", prim(PrimitiveKind::Code))
                .bound_to(valuesets::LANGUAGE, "resource language"),
        ]
    }

    /// Columns of the `domainresource` table.
    pub fn domain_resource_fields(&self) -> Vec<FieldDef> {
        vec![
            FieldDef::optional("text", FieldType::Composite(self.narrative)),
            FieldDef::many("contained", FieldType::Open),
            FieldDef::many("extension", FieldType::Composite(self.extension)),
            FieldDef::many("modifierExtension", FieldType::Composite(self.extension)),
        ]
    }
}

fn prim(kind: PrimitiveKind) -> FieldType {
    FieldType::Primitive(kind)
}

fn quantity_fields(element: &[FieldDef], comparator: bool) -> Vec<FieldDef> {
    let mut fields = vec![FieldDef::optional("value", prim(PrimitiveKind::Decimal))];
    if comparator {
        fields.push(
            FieldDef::optional("comparator", prim(PrimitiveKind::Code))
                .bound_to(valuesets::QUANTITY_COMPARATOR, "quantity comparator"),
        );
    }
    fields.extend([
        FieldDef::optional("unit", prim(PrimitiveKind::String)),
        FieldDef::optional("system", prim(PrimitiveKind::Uri)),
        FieldDef::optional("code", prim(PrimitiveKind::Code)),
    ]);
    extend(element, fields)
}

/// Registers every datatype into `registry`.
pub fn register_datatypes(registry: &mut SchemaRegistry) -> Result<Datatypes, SchemaError> {
    use PrimitiveKind::*;

    // Extension and ConceptDefinition refer to themselves.
    let extension = registry.reserve("Extension")?;
    let concept_definition = registry.reserve("ConceptDefinition")?;
    let element = element_fields(extension);

    registry.define(
        extension,
        SchemaBuilder::new("Extension")
            .kind(CompositeKind::Extension)
            .fields(element.clone())
            .field(FieldDef::required("url", prim(Uri)))
            .field(FieldDef::optional("value[x]", FieldType::Open))
            .build(),
    )?;

    let coding = registry.register(
        SchemaBuilder::new("Coding")
            .kind(CompositeKind::Coding)
            .fields(element.clone())
            .fields([
                FieldDef::optional("system", prim(Uri)),
                FieldDef::optional("version", prim(String)),
                FieldDef::optional("code", prim(Code)),
                FieldDef::optional("display", prim(String)),
                FieldDef::optional("userSelected", prim(Boolean)),
            ])
            .build(),
    )?;

    let codeable_concept = registry.register(
        SchemaBuilder::new("CodeableConcept")
            .kind(CompositeKind::CodeableConcept)
            .fields(element.clone())
            .fields([
                FieldDef::many("coding", FieldType::Composite(coding)),
                FieldDef::optional("text", prim(String)),
            ])
            .build(),
    )?;

    let period = registry.register(
        SchemaBuilder::new("Period")
            .kind(CompositeKind::Period)
            .fields(element.clone())
            .fields([
                FieldDef::optional("start", prim(DateTime)),
                FieldDef::optional("end", prim(DateTime)),
            ])
            .build(),
    )?;

    let reference = registry.register(
        SchemaBuilder::new("Reference")
            .kind(CompositeKind::Reference)
            .fields(element.clone())
            .fields([
                FieldDef::optional("reference", prim(String)),
                FieldDef::optional("type", prim(Uri)),
                FieldDef::optional("display", prim(String)),
            ])
            .build(),
    )?;

    let identifier = registry.register(
        SchemaBuilder::new("Identifier")
            .kind(CompositeKind::Identifier)
            .fields(element.clone())
            .fields([
                FieldDef::optional("use", prim(Code)).bound_to(valuesets::IDENTIFIER_USE, "identifier use"),
                FieldDef::optional("type", FieldType::Composite(codeable_concept))
                    .bound_any(valuesets::IDENTIFIER_TYPE, "identifier type"),
                FieldDef::optional("system", prim(Uri)),
                FieldDef::optional("value", prim(String)),
                FieldDef::optional("period", FieldType::Composite(period)),
                FieldDef::optional("assigner", FieldType::Composite(reference)).with_targets(&["Organization"]),
            ])
            .build(),
    )?;

    let human_name = registry.register(
        SchemaBuilder::new("HumanName")
            .kind(CompositeKind::HumanName)
            .fields(element.clone())
            .fields([
                FieldDef::optional("use", prim(Code)).bound_to(valuesets::NAME_USE, "humanname use"),
                FieldDef::optional("text", prim(String)),
                FieldDef::optional("family", prim(String)),
                FieldDef::many("given", prim(String)),
                FieldDef::many("prefix", prim(String)),
                FieldDef::many("suffix", prim(String)),
                FieldDef::optional("period", FieldType::Composite(period)),
            ])
            .build(),
    )?;

    let contact_point = registry.register(
        SchemaBuilder::new("ContactPoint")
            .kind(CompositeKind::ContactPoint)
            .fields(element.clone())
            .fields([
                FieldDef::optional("system", prim(Code))
                    .bound_to(valuesets::CONTACT_POINT_SYSTEM, "contactpoint system"),
                FieldDef::optional("value", prim(String)),
                FieldDef::optional("use", prim(Code)).bound_to(valuesets::CONTACT_POINT_USE, "contactpoint use"),
                FieldDef::optional("rank", prim(PositiveInt)),
                FieldDef::optional("period", FieldType::Composite(period)),
            ])
            .build(),
    )?;

    let address = registry.register(
        SchemaBuilder::new("Address")
            .kind(CompositeKind::Address)
            .fields(element.clone())
            .fields([
                FieldDef::optional("use", prim(Code)).bound_to(valuesets::ADDRESS_USE, "address use"),
                FieldDef::optional("type", prim(Code)).bound_to(valuesets::ADDRESS_TYPE, "address type"),
                FieldDef::optional("text", prim(String)),
                FieldDef::many("line", prim(String)),
                FieldDef::optional("city", prim(String)),
                FieldDef::optional("district", prim(String)),
                FieldDef::optional("state", prim(String)),
                FieldDef::optional("postalCode", prim(String)),
                FieldDef::optional("country", prim(String)),
                FieldDef::optional("period", FieldType::Composite(period)),
            ])
            .build(),
    )?;

    let attachment = registry.register(
        SchemaBuilder::new("Attachment")
            .kind(CompositeKind::Attachment)
            .fields(element.clone())
            .fields([
                FieldDef::optional("contentType", prim(Code)),
                FieldDef::optional("language", prim(Code)),
                FieldDef::optional("data", prim(Base64Binary)),
                FieldDef::optional("url", prim(Uri)),
                FieldDef::optional("size", prim(UnsignedInt)),
                FieldDef::optional("hash", prim(Base64Binary)),
                FieldDef::optional("title", prim(String)),
                FieldDef::optional("creation", prim(DateTime)),
            ])
            .build(),
    )?;

    let simple_quantity = registry.register(
        SchemaBuilder::new("SimpleQuantity")
            .kind(CompositeKind::SimpleQuantity)
            .fields(quantity_fields(&element, false))
            .build(),
    )?;

    let quantity_like = |name: &str, kind: CompositeKind| {
        SchemaBuilder::new(name)
            .kind(kind)
            .fields(quantity_fields(&element, true))
    };

    let quantity = registry.register(quantity_like("Quantity", CompositeKind::Quantity).build())?;
    let age = registry.register(
        quantity_like("Age", CompositeKind::Age)
            .field(FieldDef::optional("code", prim(Code)).bound_to(valuesets::AGE_UNIT, "age units"))
            .build(),
    )?;
    let count = registry.register(quantity_like("Count", CompositeKind::Count).build())?;
    let distance = registry.register(quantity_like("Distance", CompositeKind::Distance).build())?;
    let duration = registry.register(
        quantity_like("Duration", CompositeKind::Duration)
            .field(FieldDef::optional("code", prim(Code)).bound_to(valuesets::UNITS_OF_TIME, "duration units"))
            .build(),
    )?;
    let money = registry.register(quantity_like("Money", CompositeKind::Money).build())?;

    let range = registry.register(
        SchemaBuilder::new("Range")
            .kind(CompositeKind::Range)
            .fields(element.clone())
            .fields([
                FieldDef::optional("low", FieldType::Composite(simple_quantity)),
                FieldDef::optional("high", FieldType::Composite(simple_quantity)),
            ])
            .build(),
    )?;

    let ratio = registry.register(
        SchemaBuilder::new("Ratio")
            .kind(CompositeKind::Ratio)
            .fields(element.clone())
            .fields([
                FieldDef::optional("numerator", FieldType::Composite(quantity)),
                FieldDef::optional("denominator", FieldType::Composite(quantity)),
            ])
            .build(),
    )?;

    let sampled_data = registry.register(
        SchemaBuilder::new("SampledData")
            .kind(CompositeKind::SampledData)
            .fields(element.clone())
            .fields([
                FieldDef::required("origin", FieldType::Composite(simple_quantity)),
                FieldDef::required("period", prim(Decimal)),
                FieldDef::optional("factor", prim(Decimal)),
                FieldDef::optional("lowerLimit", prim(Decimal)),
                FieldDef::optional("upperLimit", prim(Decimal)),
                FieldDef::required("dimensions", prim(PositiveInt)),
                FieldDef::required("data", prim(String)),
            ])
            .build(),
    )?;

    let signature = registry.register(
        SchemaBuilder::new("Signature")
            .kind(CompositeKind::Signature)
            .fields(element.clone())
            .fields([
                FieldDef::one_or_more("type", FieldType::Composite(coding))
                    .bound_any(valuesets::SIGNATURE_TYPE, "signature code"),
                FieldDef::required("when", prim(Instant)),
                FieldDef::optional("whoUri", prim(Uri)),
                FieldDef::optional("whoReference", FieldType::Composite(reference)).with_targets(&[
                    "Practitioner",
                    "RelatedPerson",
                    "Patient",
                    "Device",
                    "Organization",
                ]),
                FieldDef::required("contentType", prim(Code)),
                FieldDef::required("blob", prim(Base64Binary)),
            ])
            .build(),
    )?;

    let timing_repeat = registry.register(
        SchemaBuilder::new("TimingRepeat")
            .kind(CompositeKind::TimingRepeat)
            .fields(element.clone())
            .fields([
                FieldDef::optional("boundsQuantity", FieldType::Composite(duration)),
                FieldDef::optional("boundsRange", FieldType::Composite(range)),
                FieldDef::optional("boundsPeriod", FieldType::Composite(period)),
                FieldDef::optional("count", prim(Integer)),
                FieldDef::optional("duration", prim(Decimal)),
                FieldDef::optional("durationMax", prim(Decimal)),
                FieldDef::optional("durationUnits", prim(Code))
                    .bound_to(valuesets::UNITS_OF_TIME, "timing durationUnits"),
                FieldDef::optional("frequency", prim(Integer)),
                FieldDef::optional("frequencyMax", prim(Integer)),
                FieldDef::optional("period", prim(Decimal)),
                FieldDef::optional("periodMax", prim(Decimal)),
                FieldDef::optional("periodUnits", prim(Code))
                    .bound_to(valuesets::UNITS_OF_TIME, "timing periodUnits"),
                FieldDef::optional("when", prim(Code)).bound_to(valuesets::EVENT_TIMING, "timing when"),
            ])
            .build(),
    )?;

    let timing = registry.register(
        SchemaBuilder::new("Timing")
            .kind(CompositeKind::Timing)
            .fields(element.clone())
            .fields([
                FieldDef::many("event", prim(DateTime)),
                FieldDef::optional("repeat", FieldType::Composite(timing_repeat)),
                FieldDef::optional("code", FieldType::Composite(codeable_concept))
                    .bound_any(valuesets::TIMING_ABBREVIATION, "timing code"),
            ])
            .build(),
    )?;

    let annotation = registry.register(
        SchemaBuilder::new("Annotation")
            .kind(CompositeKind::Annotation)
            .fields(element.clone())
            .fields([
                FieldDef::optional("authorReference", FieldType::Composite(reference))
                    .with_targets(&["Practitioner", "Patient", "RelatedPerson"]),
                FieldDef::optional("authorString", prim(String)),
                FieldDef::optional("time", prim(DateTime)),
                FieldDef::required("text", prim(String)),
            ])
            .build(),
    )?;

    let narrative = registry.register(
        SchemaBuilder::new("Narrative")
            .kind(CompositeKind::Narrative)
            .fields(element.clone())
            .fields([
                FieldDef::required("status", prim(Code)).bound_to(valuesets::NARRATIVE_STATUS, "narrative status"),
                FieldDef::required("div", prim(Xhtml)),
            ])
            .build(),
    )?;

    let meta = registry.register(
        SchemaBuilder::new("Meta")
            .kind(CompositeKind::Meta)
            .fields(element.clone())
            .fields([
                FieldDef::optional("versionId", prim(Id)),
                FieldDef::optional("lastUpdated", prim(Instant)),
                FieldDef::many("profile", prim(Uri)),
                FieldDef::many("security", FieldType::Composite(coding)),
                FieldDef::many("tag", FieldType::Composite(coding)),
            ])
            .build(),
    )?;

    registry.define(
        concept_definition,
        SchemaBuilder::new("ConceptDefinition")
            .fields(backbone_fields(extension))
            .fields([
                FieldDef::required("code", prim(Code)),
                FieldDef::optional("display", prim(String)),
                FieldDef::optional("definition", prim(String)),
                FieldDef::many("concept", FieldType::Composite(concept_definition)),
            ])
            .build(),
    )?;

    registry.verify()?;

    Ok(Datatypes {
        extension,
        coding,
        codeable_concept,
        period,
        reference,
        identifier,
        human_name,
        contact_point,
        address,
        attachment,
        simple_quantity,
        quantity,
        age,
        count,
        distance,
        duration,
        money,
        range,
        ratio,
        sampled_data,
        signature,
        timing_repeat,
        timing,
        annotation,
        narrative,
        meta,
        concept_definition,
    })
}

/// A fresh registry holding only the datatypes.
pub fn datatype_registry() -> Result<(SchemaRegistry, Datatypes), SchemaError> {
    let mut registry = SchemaRegistry::new();
    let datatypes = register_datatypes(&mut registry)?;
    Ok((registry, datatypes))
}
