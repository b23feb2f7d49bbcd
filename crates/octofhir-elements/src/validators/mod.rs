//! Cross-field invariants of composite datatypes.
//!
//! Every datatype with rules beyond cardinality has a [`CompositeKind`]; the
//! kind maps to its validator through a static `match`. Validators receive a
//! fully coerced record and report through the [`ValidationContext`].
//! Valueset bindings are declared on fields in the catalog, not here.

mod attachment;
mod coding;
mod contact;
mod human_name;
mod narrative;
mod period;
mod quantity;
mod sampled_data;
mod signature;
mod timing;

pub use coding::{SANCTIONED_CODE_SYSTEMS, is_sanctioned_system};
pub use narrative::{ALLOWED_ATTRIBUTES, ALLOWED_TAGS};
pub use quantity::UCUM_SYSTEM;
pub use signature::SIGNATURE_CONTENT_TYPES;

use std::fmt;

use crate::context::ValidationContext;
use crate::record::CompositeRecord;

pub type ValidatorFn = fn(&CompositeRecord, &mut ValidationContext<'_>);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompositeKind {
    Address,
    Age,
    Annotation,
    Attachment,
    CodeableConcept,
    Coding,
    ContactPoint,
    Count,
    Distance,
    Duration,
    Extension,
    HumanName,
    Identifier,
    Meta,
    Money,
    Narrative,
    Period,
    Quantity,
    Range,
    Ratio,
    Reference,
    SampledData,
    Signature,
    SimpleQuantity,
    Timing,
    TimingRepeat,
}

impl CompositeKind {
    pub const ALL: &'static [CompositeKind] = &[
        Self::Address,
        Self::Age,
        Self::Annotation,
        Self::Attachment,
        Self::CodeableConcept,
        Self::Coding,
        Self::ContactPoint,
        Self::Count,
        Self::Distance,
        Self::Duration,
        Self::Extension,
        Self::HumanName,
        Self::Identifier,
        Self::Meta,
        Self::Money,
        Self::Narrative,
        Self::Period,
        Self::Quantity,
        Self::Range,
        Self::Ratio,
        Self::Reference,
        Self::SampledData,
        Self::Signature,
        Self::SimpleQuantity,
        Self::Timing,
        Self::TimingRepeat,
    ];

    pub fn type_name(self) -> &'static str {
        match self {
            Self::Address => "Address",
            Self::Age => "Age",
            Self::Annotation => "Annotation",
            Self::Attachment => "Attachment",
            Self::CodeableConcept => "CodeableConcept",
            Self::Coding => "Coding",
            Self::ContactPoint => "ContactPoint",
            Self::Count => "Count",
            Self::Distance => "Distance",
            Self::Duration => "Duration",
            Self::Extension => "Extension",
            Self::HumanName => "HumanName",
            Self::Identifier => "Identifier",
            Self::Meta => "Meta",
            Self::Money => "Money",
            Self::Narrative => "Narrative",
            Self::Period => "Period",
            Self::Quantity => "Quantity",
            Self::Range => "Range",
            Self::Ratio => "Ratio",
            Self::Reference => "Reference",
            Self::SampledData => "SampledData",
            Self::Signature => "Signature",
            Self::SimpleQuantity => "SimpleQuantity",
            Self::Timing => "Timing",
            Self::TimingRepeat => "TimingRepeat",
        }
    }

    /// Case-insensitive lookup by datatype name.
    pub fn from_type_name(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|k| k.type_name().eq_ignore_ascii_case(name))
    }

    /// The invariant check for this kind, if it has any.
    pub fn validator(self) -> Option<ValidatorFn> {
        match self {
            Self::Range => Some(quantity::validate_range),
            Self::Ratio => Some(quantity::validate_ratio),
            Self::SimpleQuantity
            | Self::Quantity
            | Self::Age
            | Self::Count
            | Self::Distance
            | Self::Duration => Some(quantity::validate_quantity),
            Self::Money => Some(quantity::validate_money),
            Self::Attachment => Some(attachment::validate_attachment),
            Self::HumanName => Some(human_name::validate_human_name),
            Self::TimingRepeat => Some(timing::validate_timing_repeat),
            Self::SampledData => Some(sampled_data::validate_sampled_data),
            Self::Narrative => Some(narrative::validate_narrative),
            Self::Signature => Some(signature::validate_signature),
            Self::Coding => Some(coding::validate_coding),
            Self::ContactPoint => Some(contact::validate_contact_point),
            Self::Address => Some(contact::validate_address),
            Self::Period => Some(period::validate_period),
            Self::Annotation
            | Self::CodeableConcept
            | Self::Extension
            | Self::Identifier
            | Self::Meta
            | Self::Reference
            | Self::Timing => None,
        }
    }
}

impl fmt::Display for CompositeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}
