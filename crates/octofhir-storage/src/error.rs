//! Storage error types for the versioned storage layer.

use std::fmt;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// No live row and no history exist for the resource.
    #[error("Resource not found: {resource_type}/{id}")]
    NotFound {
        /// The type of resource that was not found.
        resource_type: String,
        /// The ID of the resource that was not found.
        id: String,
    },

    /// The resource existed once but is deleted now.
    #[error("Resource gone: {resource_type}/{id}")]
    Gone {
        resource_type: String,
        id: String,
    },

    /// The live row moved on since the session loaded it.
    #[error("Stale version for {resource_type}/{id}: expected {expected}, found {actual}")]
    StaleVersion {
        resource_type: String,
        id: String,
        /// Version the writer observed.
        expected: u64,
        /// Version currently committed.
        actual: u64,
    },

    /// Attempted to insert an id that is, or was, in use.
    #[error("Resource already exists: {resource_type}/{id}")]
    AlreadyExists {
        /// The type of resource that already exists.
        resource_type: String,
        /// The ID of the resource that already exists.
        id: String,
    },

    /// No entity mapping is registered for the resource type.
    #[error("No entity mapping registered for {resource_type}")]
    UnknownMapping { resource_type: String },

    /// A write named a column that no table in the chain declares.
    #[error("Unknown column {column} for {resource_type}")]
    UnknownColumn {
        resource_type: String,
        column: String,
    },

    /// An internal storage error occurred.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl StorageError {
    /// Creates a new `NotFound` error.
    #[must_use]
    pub fn not_found(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource_type: resource_type.into(),
            id: id.into(),
        }
    }

    /// Creates a new `Gone` error.
    #[must_use]
    pub fn gone(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::Gone {
            resource_type: resource_type.into(),
            id: id.into(),
        }
    }

    /// Creates a new `StaleVersion` error.
    #[must_use]
    pub fn stale_version(
        resource_type: impl Into<String>,
        id: impl Into<String>,
        expected: u64,
        actual: u64,
    ) -> Self {
        Self::StaleVersion {
            resource_type: resource_type.into(),
            id: id.into(),
            expected,
            actual,
        }
    }

    /// Creates a new `AlreadyExists` error.
    #[must_use]
    pub fn already_exists(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::AlreadyExists {
            resource_type: resource_type.into(),
            id: id.into(),
        }
    }

    #[must_use]
    pub fn unknown_mapping(resource_type: impl Into<String>) -> Self {
        Self::UnknownMapping {
            resource_type: resource_type.into(),
        }
    }

    #[must_use]
    pub fn unknown_column(resource_type: impl Into<String>, column: impl Into<String>) -> Self {
        Self::UnknownColumn {
            resource_type: resource_type.into(),
            column: column.into(),
        }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` if this is a not found error.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    #[must_use]
    pub fn is_gone(&self) -> bool {
        matches!(self, Self::Gone { .. })
    }

    /// Returns `true` if a concurrent writer committed first.
    #[must_use]
    pub fn is_stale_version(&self) -> bool {
        matches!(self, Self::StaleVersion { .. })
    }

    /// Returns `true` if this is an already exists error.
    #[must_use]
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }

    /// Returns the error category for logging/monitoring purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::Gone { .. } => ErrorCategory::Gone,
            Self::StaleVersion { .. } | Self::AlreadyExists { .. } => ErrorCategory::Conflict,
            Self::UnknownMapping { .. } | Self::UnknownColumn { .. } => ErrorCategory::Mapping,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }
}

/// Categories of storage errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Resource not found.
    NotFound,
    /// Resource deleted.
    Gone,
    /// Conflict (version or existence).
    Conflict,
    /// Entity mapping misuse.
    Mapping,
    /// Internal error.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not_found"),
            Self::Gone => write!(f, "gone"),
            Self::Conflict => write!(f, "conflict"),
            Self::Mapping => write!(f, "mapping"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StorageError::not_found("Patient", "123");
        assert_eq!(err.to_string(), "Resource not found: Patient/123");

        let err = StorageError::stale_version("Patient", "123", 1, 2);
        assert_eq!(
            err.to_string(),
            "Stale version for Patient/123: expected 1, found 2"
        );

        let err = StorageError::already_exists("Patient", "456");
        assert_eq!(err.to_string(), "Resource already exists: Patient/456");
    }

    #[test]
    fn test_error_predicates() {
        let err = StorageError::not_found("Patient", "123");
        assert!(err.is_not_found());
        assert!(!err.is_stale_version());
        assert!(!err.is_gone());

        let err = StorageError::stale_version("Patient", "123", 1, 2);
        assert!(err.is_stale_version());
        assert!(StorageError::gone("Patient", "1").is_gone());
    }

    #[test]
    fn test_error_category() {
        assert_eq!(
            StorageError::not_found("Patient", "123").category(),
            ErrorCategory::NotFound
        );
        assert_eq!(
            StorageError::stale_version("Patient", "1", 1, 2).category(),
            ErrorCategory::Conflict
        );
        assert_eq!(
            StorageError::unknown_column("Patient", "foo").category(),
            ErrorCategory::Mapping
        );
        assert_eq!(ErrorCategory::Gone.to_string(), "gone");
    }
}
