//! Errors raised while orchestrating resource lifecycle operations.

use std::fmt;

use serde_json::Value;

use octofhir_api::{ApiError, OperationOutcome, OperationOutcomeIssue};
use octofhir_core::CoreError;
use octofhir_elements::{IssueKind, SchemaError, TerminologyError, ValidationErrors};
use octofhir_storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Unknown resource type: {0}")]
    UnknownResourceType(String),

    #[error("Resource id must not be supplied on create")]
    ClientSuppliedId,

    #[error("Resource id {body} does not match {id}")]
    IdMismatch { id: String, body: String },

    #[error("Invalid resource body: {0}")]
    InvalidBody(String),

    #[error("Validation failed: {errors}")]
    Validation {
        errors: ValidationErrors,
        warnings: Vec<String>,
    },

    #[error(transparent)]
    Terminology(#[from] TerminologyError),

    #[error("If-Match header is required to update {resource_type}/{id}")]
    PreconditionRequired { resource_type: String, id: String },

    #[error("Invalid version tag: {0}")]
    InvalidVersionTag(#[source] CoreError),

    #[error("Version conflict for {resource_type}/{id}: expected {expected}, current {actual}")]
    VersionConflict {
        resource_type: String,
        id: String,
        expected: u64,
        actual: u64,
    },

    #[error("Resource {resource_type}/{id} not found")]
    NotFound { resource_type: String, id: String },

    #[error("Resource {resource_type}/{id} has been deleted")]
    Gone {
        resource_type: String,
        id: String,
        /// Last known state, when one was recorded.
        resource: Option<Box<Value>>,
    },

    #[error("Invalid resource id: {0}")]
    InvalidId(#[source] CoreError),

    #[error("No {resource_type} matches the given criteria")]
    NoMatch { resource_type: String },

    #[error("{count} {resource_type} resources match the given criteria")]
    MultipleMatches { resource_type: String, count: usize },

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("Storage error: {0}")]
    Storage(#[source] StorageError),
}

impl LifecycleError {
    #[must_use]
    pub fn not_found(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource_type: resource_type.into(),
            id: id.into(),
        }
    }

    #[must_use]
    pub fn gone(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::Gone {
            resource_type: resource_type.into(),
            id: id.into(),
            resource: None,
        }
    }

    /// Gone, carrying the deleted state for the response body.
    #[must_use]
    pub fn gone_with(resource_type: impl Into<String>, id: impl Into<String>, resource: Value) -> Self {
        Self::Gone {
            resource_type: resource_type.into(),
            id: id.into(),
            resource: Some(Box::new(resource)),
        }
    }

    /// The deleted state carried by a `Gone` error.
    pub fn gone_resource(&self) -> Option<&Value> {
        match self {
            Self::Gone { resource, .. } => resource.as_deref(),
            _ => None,
        }
    }

    #[must_use]
    pub fn invalid_body(message: impl Into<String>) -> Self {
        Self::InvalidBody(message.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::NoMatch { .. })
    }

    pub fn is_gone(&self) -> bool {
        matches!(self, Self::Gone { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::VersionConflict { .. })
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. } | Self::Terminology(_))
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::UnknownResourceType(_)
            | Self::ClientSuppliedId
            | Self::IdMismatch { .. }
            | Self::InvalidBody(_)
            | Self::InvalidId(_)
            | Self::InvalidVersionTag(_) => ErrorCategory::Request,
            Self::Validation { .. } => ErrorCategory::Validation,
            Self::Terminology(_) => ErrorCategory::Terminology,
            Self::PreconditionRequired { .. }
            | Self::VersionConflict { .. }
            | Self::MultipleMatches { .. } => ErrorCategory::Concurrency,
            Self::NotFound { .. } | Self::Gone { .. } | Self::NoMatch { .. } => {
                ErrorCategory::NotFound
            }
            Self::Schema(_) | Self::Storage(_) => ErrorCategory::Internal,
        }
    }

    /// Maps this error onto the HTTP status-code contract.
    pub fn into_api_error(self) -> ApiError {
        let message = self.to_string();
        match self {
            Self::UnknownResourceType(_) => ApiError::not_found(message),
            Self::ClientSuppliedId
            | Self::IdMismatch { .. }
            | Self::InvalidBody(_)
            | Self::InvalidId(_)
            | Self::InvalidVersionTag(_) => ApiError::bad_request(message),
            Self::Validation { errors, warnings } => ApiError::unprocessable_entity(
                message,
                Some(validation_outcome(&errors, warnings)),
            ),
            Self::Terminology(e) => {
                let mut issue = OperationOutcomeIssue::new("error", "code-invalid", e.to_string());
                if let Some(url) = e.url() {
                    issue = issue.at(url);
                }
                ApiError::unprocessable_entity(message, Some(OperationOutcome::new(vec![issue])))
            }
            Self::PreconditionRequired { .. } => ApiError::precondition_required(message),
            Self::VersionConflict { .. } => ApiError::conflict(message),
            Self::NotFound { .. } | Self::NoMatch { .. } => ApiError::not_found(message),
            Self::Gone {
                resource: Some(resource),
                ..
            } => ApiError::gone_with_resource(message, *resource),
            Self::Gone { resource: None, .. } => ApiError::gone(message),
            Self::MultipleMatches { .. } => ApiError::precondition_failed(message),
            Self::Schema(_) | Self::Storage(_) => ApiError::internal(message),
        }
    }
}

impl From<StorageError> for LifecycleError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::StaleVersion {
                resource_type,
                id,
                expected,
                actual,
            } => Self::VersionConflict {
                resource_type,
                id,
                expected,
                actual,
            },
            StorageError::NotFound { resource_type, id } => Self::NotFound { resource_type, id },
            StorageError::Gone { resource_type, id } => Self::gone(resource_type, id),
            StorageError::UnknownMapping { resource_type } => {
                Self::UnknownResourceType(resource_type)
            }
            other => Self::Storage(other),
        }
    }
}

impl From<LifecycleError> for ApiError {
    fn from(err: LifecycleError) -> Self {
        err.into_api_error()
    }
}

/// Builds the outcome report for a failed validation.
pub fn validation_outcome(errors: &ValidationErrors, warnings: Vec<String>) -> OperationOutcome {
    let issues = errors
        .issues
        .iter()
        .map(|issue| {
            let code = match issue.kind {
                IssueKind::Structural => "structure",
                IssueKind::Semantic => "invariant",
            };
            OperationOutcomeIssue::new("error", code, issue.message.clone()).at(issue.path.clone())
        })
        .collect();
    OperationOutcome::new(issues).with_warnings(warnings)
}

/// Coarse error classes used in log fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Request,
    Validation,
    Terminology,
    Concurrency,
    NotFound,
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Request => write!(f, "request"),
            Self::Validation => write!(f, "validation"),
            Self::Terminology => write!(f, "terminology"),
            Self::Concurrency => write!(f, "concurrency"),
            Self::NotFound => write!(f, "not_found"),
            Self::Internal => write!(f, "internal"),
        }
    }
}
