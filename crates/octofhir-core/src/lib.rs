pub mod error;
pub mod fhir;
pub mod fhir_reference;
pub mod id;
pub mod resource;
pub mod time;

pub use error::{CoreError, ErrorCategory, Result};
pub use fhir::ResourceType;
pub use fhir_reference::{check_reference_target, reference_type};
pub use id::{generate_id, parse_version_tag, validate_id};
pub use resource::{ResourceMeta, mark_subsetted, subsetted_tag};
pub use time::{DatePrecision, FhirDateTime, PartialDateTime, now_utc};
