use thiserror::Error;

/// Core error types shared by the validation and storage layers
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid FHIR resource type: {0}")]
    InvalidResourceType(String),

    #[error("Invalid FHIR ID: {0}")]
    InvalidId(String),

    #[error("Invalid FHIR DateTime: {0}")]
    InvalidDateTime(String),

    #[error("Invalid reference '{reference}': {reason}")]
    InvalidReference { reference: String, reason: String },

    #[error("Reference '{reference}' must point to one of [{allowed}]")]
    ReferenceTargetMismatch { reference: String, allowed: String },

    #[error("Invalid concurrency token: {0}")]
    InvalidVersionTag(String),

    #[error("URL parsing error: {0}")]
    UrlError(#[from] url::ParseError),
}

impl CoreError {
    /// Create a new InvalidResourceType error
    pub fn invalid_resource_type(resource_type: impl Into<String>) -> Self {
        Self::InvalidResourceType(resource_type.into())
    }

    /// Create a new InvalidId error
    pub fn invalid_id(id: impl Into<String>) -> Self {
        Self::InvalidId(id.into())
    }

    /// Create a new InvalidDateTime error
    pub fn invalid_date_time(datetime: impl Into<String>) -> Self {
        Self::InvalidDateTime(datetime.into())
    }

    pub fn invalid_reference(reference: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidReference {
            reference: reference.into(),
            reason: reason.into(),
        }
    }

    pub fn reference_target_mismatch(reference: impl Into<String>, allowed: &[&str]) -> Self {
        Self::ReferenceTargetMismatch {
            reference: reference.into(),
            allowed: allowed.join(", "),
        }
    }

    pub fn invalid_version_tag(tag: impl Into<String>) -> Self {
        Self::InvalidVersionTag(tag.into())
    }

    /// Get error category for logging
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidResourceType(_)
            | Self::InvalidId(_)
            | Self::InvalidDateTime(_)
            | Self::InvalidVersionTag(_) => ErrorCategory::Format,
            Self::InvalidReference { .. }
            | Self::ReferenceTargetMismatch { .. }
            | Self::UrlError(_) => ErrorCategory::Reference,
        }
    }
}

/// Error categories for log fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// A lexical value does not have the expected form.
    Format,
    /// A reference is malformed or points at a disallowed type.
    Reference,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Format => write!(f, "format"),
            Self::Reference => write!(f, "reference"),
        }
    }
}

/// Convenience result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;
