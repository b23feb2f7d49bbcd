use crate::context::ValidationContext;
use crate::record::CompositeRecord;

/// Terminology systems accepted in `Coding.system`, besides any page under
/// [`HL7_FHIR_PREFIX`].
pub const SANCTIONED_CODE_SYSTEMS: &[&str] = &[
    "http://ihtsdo.org",
    "http://snomed.info/sct",
    "http://www.nlm.nih.gov/",
    "http://www.nlm.nih.gov/research/umls/rxnorm",
    "http://loinc.org",
    "http://unitsofmeasure.org",
    "http://ncimeta.nci.nih.gov",
    "http://www.ama-assn.org/go/cpt",
    "http://www.nlm.nih.gov/research/umls/sourcereleasedocs/current/NDFRT/",
    "http://www.fda.gov/Drugs/InformationOnDrugs/ucm142438.htm",
    "http://www2a.cdc.gov/vaccines/iis/iisstandards/vaccines.asp?rpt=cvx",
    "http://www.iso.org/iso/country_codes.htm",
    "urn:iso:std:iso:3166",
    "http://www.nubc.org",
    "http://www.radlex.org",
    "http://www.who.int/classifications/icd/en/",
    "http://www.icd10data.com/icd10pcs",
    "http://www.cms.gov/Medicare/Coding/ICD10/",
    "http://www.cdc.gov/nchs/icd/icd9.htm",
    "http://www.ph3c.org/",
    "http://www.who.int/classifications/icf/en/",
    "https://www.hl7.org/implement/standards/product_brief.cfm?product_id=186",
    "http://www.whocc.no/atc/structure_and_principles/",
    "http://tools.ietf.org/html/bcp47",
    "urn:ietf:bcp:47",
    "http://tools.ietf.org/html/bcp13",
    "urn:ietf:bcp:13",
    "http://hit-testing.nist.gov:13110/rtmms/index.html#rosetta",
];

const HL7_FHIR_PREFIX: &str = "http://hl7.org/fhir/";

pub fn is_sanctioned_system(system: &str, extra: &[String]) -> bool {
    system.starts_with(HL7_FHIR_PREFIX)
        || SANCTIONED_CODE_SYSTEMS.contains(&system)
        || extra.iter().any(|s| s == system)
}

pub(super) fn validate_coding(record: &CompositeRecord, ctx: &mut ValidationContext<'_>) {
    if let Some(system) = record.str("system")
        && !is_sanctioned_system(system, &ctx.options().extra_code_systems)
    {
        ctx.field_error(
            "system",
            format!(
                "The provided system uri {system} is not a sanctioned uri. Use a sanctioned uri from [http://hl7.org/fhir/terminologies-systems.html]"
            ),
        );
    }
}
