//! Validation error types.
//!
//! Structural and semantic problems found while binding a value are collected
//! into [`ValidationErrors`] and reported together.

use std::fmt;

/// Where a validation issue came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IssueKind {
    /// Missing required field, wrong cardinality, malformed primitive, unknown field.
    Structural,
    /// Cross-field invariant of a datatype or resource.
    Semantic,
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Structural => write!(f, "structural"),
            Self::Semantic => write!(f, "semantic"),
        }
    }
}

/// One problem found at `path` (e.g. `Patient.name[0].given`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub path: String,
    pub message: String,
    pub kind: IssueKind,
}

impl ValidationIssue {
    #[must_use]
    pub fn structural(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            kind: IssueKind::Structural,
        }
    }

    #[must_use]
    pub fn semantic(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            kind: IssueKind::Semantic,
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

/// Every issue found while binding one value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrors {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationErrors {
    #[must_use]
    pub fn new(issues: Vec<ValidationIssue>) -> Self {
        Self { issues }
    }

    #[must_use]
    pub fn single(issue: ValidationIssue) -> Self {
        Self { issues: vec![issue] }
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn messages(&self) -> impl Iterator<Item = &str> {
        self.issues.iter().map(|i| i.message.as_str())
    }

    /// True if any issue message contains `needle`.
    pub fn mentions(&self, needle: &str) -> bool {
        self.issues.iter().any(|i| i.message.contains(needle))
    }

    pub fn has_structural(&self) -> bool {
        self.issues.iter().any(|i| i.kind == IssueKind::Structural)
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined: Vec<String> = self.issues.iter().map(ToString::to_string).collect();
        write!(f, "{}", joined.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}
