//! Cardinality constraints layered over the built-in resource profiles.
//!
//! A constraint can only narrow a profile: `min` grows and a single-valued
//! element may become a list. Constraints are read from the `differential`
//! of a StructureDefinition, one `element` per constrained path.

use std::path::Path;

use octofhir_elements::{Cardinality, MaxOccurs, SchemaError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConstraintError {
    #[error("reading profile '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("profile is not well-formed XML: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error("expected a StructureDefinition, found '{0}'")]
    NotAStructureDefinition(String),

    #[error("StructureDefinition has no differential elements")]
    EmptyDifferential,

    #[error("element '{path}' has an invalid {bound} '{value}'")]
    InvalidBound {
        path: String,
        bound: &'static str,
        value: String,
    },

    #[error("no profile registered for resource type '{0}'")]
    UnknownResourceType(String),

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// Cardinality required of one element of the resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldConstraint {
    pub field: String,
    pub cardinality: Cardinality,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileConstraint {
    pub resource_type: String,
    pub fields: Vec<FieldConstraint>,
}

impl ProfileConstraint {
    pub fn new<S: Into<String>>(
        resource_type: impl Into<String>,
        fields: impl IntoIterator<Item = (S, Cardinality)>,
    ) -> Self {
        Self {
            resource_type: resource_type.into(),
            fields: fields
                .into_iter()
                .map(|(field, cardinality)| FieldConstraint {
                    field: field.into(),
                    cardinality,
                })
                .collect(),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConstraintError> {
        let xml = std::fs::read_to_string(path).map_err(|source| ConstraintError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_structure_definition(&xml)
    }

    /// Reads the differential of a StructureDefinition.
    ///
    /// The first element names the resource; every later element is one
    /// field constraint, its path taken relative to the resource. Omitted
    /// `min` or `max` leave that bound of the base profile as it is.
    pub fn from_structure_definition(xml: &str) -> Result<Self, ConstraintError> {
        let doc = roxmltree::Document::parse(xml)?;
        let root = doc.root_element();
        if root.tag_name().name() != "StructureDefinition" {
            return Err(ConstraintError::NotAStructureDefinition(
                root.tag_name().name().to_string(),
            ));
        }

        let mut elements = root
            .children()
            .find(|n| n.has_tag_name("differential"))
            .into_iter()
            .flat_map(|d| d.children().filter(|n| n.has_tag_name("element")));

        let resource_type = elements
            .next()
            .and_then(|e| value_of(e, "path"))
            .ok_or(ConstraintError::EmptyDifferential)?
            .to_string();
        let prefix = format!("{resource_type}.");

        let mut fields = Vec::new();
        for element in elements {
            let Some(path) = value_of(element, "path") else {
                continue;
            };
            let field = path.strip_prefix(&prefix).unwrap_or(path);
            let min = match value_of(element, "min") {
                Some(raw) => raw.parse::<u32>().map_err(|_| invalid(path, "min", raw))?,
                None => 0,
            };
            let max = match value_of(element, "max") {
                Some(raw) => parse_max(raw).ok_or_else(|| invalid(path, "max", raw))?,
                None => MaxOccurs::One,
            };
            fields.push(FieldConstraint {
                field: field.to_string(),
                cardinality: Cardinality { min, max },
            });
        }

        tracing::debug!(%resource_type, fields = fields.len(), "read StructureDefinition differential");
        Ok(Self {
            resource_type,
            fields,
        })
    }

    pub fn pairs(&self) -> Vec<(&str, Cardinality)> {
        self.fields
            .iter()
            .map(|f| (f.field.as_str(), f.cardinality))
            .collect()
    }
}

/// Narrows `base` by `constraint`. Neither bound is ever relaxed.
pub fn tighten(base: Cardinality, constraint: Cardinality) -> Cardinality {
    let max = if base.is_many() || constraint.is_many() {
        MaxOccurs::Many
    } else {
        MaxOccurs::One
    };
    Cardinality {
        min: base.min.max(constraint.min),
        max,
    }
}

fn value_of<'a>(element: roxmltree::Node<'a, '_>, child: &str) -> Option<&'a str> {
    element
        .children()
        .find(|n| n.has_tag_name(child))
        .and_then(|n| n.attribute("value"))
}

fn parse_max(raw: &str) -> Option<MaxOccurs> {
    match raw {
        "*" => Some(MaxOccurs::Many),
        n => n
            .parse::<u32>()
            .ok()
            .map(|n| if n > 1 { MaxOccurs::Many } else { MaxOccurs::One }),
    }
}

fn invalid(path: &str, bound: &'static str, value: &str) -> ConstraintError {
    ConstraintError::InvalidBound {
        path: path.to_string(),
        bound,
        value: value.to_string(),
    }
}
