//! State threaded through coercion and validation of one value.

use serde::{Deserialize, Serialize};

use crate::error::ValidationIssue;
use crate::terminology::TerminologyCheck;

/// Knobs that change how strictly values are bound.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationOptions {
    /// Code systems accepted by `Coding.system` on top of the built-in list.
    pub extra_code_systems: Vec<String>,
    /// Accept object keys that the schema does not declare. They are dropped.
    pub allow_unknown_fields: bool,
}

/// Collects errors, warnings and pending terminology checks.
///
/// Validators report against the current path, which the coercer sets before
/// handing a record over.
#[derive(Debug)]
pub struct ValidationContext<'a> {
    options: &'a ValidationOptions,
    path: String,
    issues: Vec<ValidationIssue>,
    warnings: Vec<ValidationIssue>,
    checks: Vec<TerminologyCheck>,
}

impl<'a> ValidationContext<'a> {
    pub fn new(options: &'a ValidationOptions) -> Self {
        Self {
            options,
            path: String::new(),
            issues: Vec::new(),
            warnings: Vec::new(),
            checks: Vec::new(),
        }
    }

    pub fn options(&self) -> &ValidationOptions {
        self.options
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn set_path(&mut self, path: impl Into<String>) {
        self.path = path.into();
    }

    /// Records a semantic error at the current path.
    pub fn error(&mut self, message: impl Into<String>) {
        self.issues
            .push(ValidationIssue::semantic(self.path.clone(), message));
    }

    /// Records a semantic error at `<current path>.<field>`.
    pub fn field_error(&mut self, field: &str, message: impl Into<String>) {
        let path = join_path(&self.path, field);
        self.issues.push(ValidationIssue::semantic(path, message));
    }

    pub(crate) fn structural(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.issues.push(ValidationIssue::structural(path, message));
    }

    /// Records a non-fatal warning at the current path.
    pub fn warn(&mut self, message: impl Into<String>) {
        let warning = ValidationIssue::semantic(self.path.clone(), message);
        tracing::debug!(%warning, "validation warning");
        self.warnings.push(warning);
    }

    pub fn require_code(&mut self, check: TerminologyCheck) {
        self.checks.push(check);
    }

    pub fn warnings(&self) -> &[ValidationIssue] {
        &self.warnings
    }

    pub fn issue_count(&self) -> usize {
        self.issues.len()
    }

    pub fn has_errors(&self) -> bool {
        !self.issues.is_empty()
    }

    pub fn into_parts(self) -> (Vec<ValidationIssue>, Vec<ValidationIssue>, Vec<TerminologyCheck>) {
        (self.issues, self.warnings, self.checks)
    }
}

pub(crate) fn join_path(base: &str, segment: &str) -> String {
    if base.is_empty() {
        segment.to_string()
    } else {
        format!("{base}.{segment}")
    }
}
