//! Composite schemas.
//!
//! A schema is an ordered list of [`FieldDef`]s. Schemas are composed, not
//! inherited: [`extend`] returns a new field list from a base list plus extra
//! fields, and [`SchemaBuilder`] assembles the final value. Schemas live in a
//! [`SchemaRegistry`] arena and refer to each other by [`SchemaId`], so a
//! schema may reference itself (concept hierarchies, extensions on extensions).

use std::collections::HashMap;
use std::fmt;

use crate::primitives::PrimitiveKind;
use crate::terminology::MatchPolicy;
use crate::validators::CompositeKind;

/// Index of a schema inside a [`SchemaRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SchemaId(pub(crate) usize);

impl SchemaId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaxOccurs {
    One,
    Many,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cardinality {
    pub min: u32,
    pub max: MaxOccurs,
}

impl Cardinality {
    pub const OPTIONAL: Self = Self { min: 0, max: MaxOccurs::One };
    pub const REQUIRED: Self = Self { min: 1, max: MaxOccurs::One };
    pub const MANY: Self = Self { min: 0, max: MaxOccurs::Many };
    pub const ONE_OR_MORE: Self = Self { min: 1, max: MaxOccurs::Many };

    pub fn is_required(self) -> bool {
        self.min >= 1
    }

    pub fn is_many(self) -> bool {
        self.max == MaxOccurs::Many
    }
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.max {
            MaxOccurs::One => write!(f, "{}..1", self.min),
            MaxOccurs::Many => write!(f, "{}..*", self.min),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Primitive(PrimitiveKind),
    Composite(SchemaId),
    /// Any JSON value, kept as supplied (`Extension.value[x]`).
    Open,
}

/// Binds a coded field to an externally maintained valueset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueSetBinding {
    /// Valueset name appended to the terminology base URL.
    pub valueset: String,
    /// Human label used in error messages ("patient gender").
    pub label: String,
    pub policy: MatchPolicy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    pub name: String,
    pub cardinality: Cardinality,
    pub ty: FieldType,
    /// Allowed resource types when the field is a Reference. Empty means any.
    pub targets: Vec<String>,
    pub binding: Option<ValueSetBinding>,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, cardinality: Cardinality, ty: FieldType) -> Self {
        Self {
            name: name.into(),
            cardinality,
            ty,
            targets: Vec::new(),
            binding: None,
        }
    }

    pub fn optional(name: impl Into<String>, ty: FieldType) -> Self {
        Self::new(name, Cardinality::OPTIONAL, ty)
    }

    pub fn required(name: impl Into<String>, ty: FieldType) -> Self {
        Self::new(name, Cardinality::REQUIRED, ty)
    }

    pub fn many(name: impl Into<String>, ty: FieldType) -> Self {
        Self::new(name, Cardinality::MANY, ty)
    }

    pub fn one_or_more(name: impl Into<String>, ty: FieldType) -> Self {
        Self::new(name, Cardinality::ONE_OR_MORE, ty)
    }

    pub fn with_targets(mut self, targets: &[&str]) -> Self {
        self.targets = targets.iter().map(|t| (*t).to_string()).collect();
        self
    }

    /// Binds every code in this field; exactly one lookup match is required.
    pub fn bound_to(mut self, valueset: &str, label: &str) -> Self {
        self.binding = Some(ValueSetBinding {
            valueset: valueset.to_string(),
            label: label.to_string(),
            policy: MatchPolicy::Strict,
        });
        self
    }

    /// Like [`bound_to`](Self::bound_to) but accepts one or more lookup matches.
    pub fn bound_any(mut self, valueset: &str, label: &str) -> Self {
        self.binding = Some(ValueSetBinding {
            valueset: valueset.to_string(),
            label: label.to_string(),
            policy: MatchPolicy::Any,
        });
        self
    }
}

/// Returns `base` followed by `extra`. A field in `extra` whose name already
/// exists in `base` replaces it in place.
pub fn extend(base: &[FieldDef], extra: impl IntoIterator<Item = FieldDef>) -> Vec<FieldDef> {
    let mut fields = base.to_vec();
    for field in extra {
        match fields.iter_mut().find(|f| f.name == field.name) {
            Some(existing) => *existing = field,
            None => fields.push(field),
        }
    }
    fields
}

/// Fields every element carries: `id` and `extension`.
pub fn element_fields(extension: SchemaId) -> Vec<FieldDef> {
    vec![
        FieldDef::optional("id", FieldType::Primitive(PrimitiveKind::String)),
        FieldDef::many("extension", FieldType::Composite(extension)),
    ]
}

/// Element fields plus `modifierExtension`.
pub fn backbone_fields(extension: SchemaId) -> Vec<FieldDef> {
    extend(
        &element_fields(extension),
        [FieldDef::many("modifierExtension", FieldType::Composite(extension))],
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositeSchema {
    pub name: String,
    pub kind: Option<CompositeKind>,
    pub fields: Vec<FieldDef>,
}

impl CompositeSchema {
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn required_fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter().filter(|f| f.cardinality.is_required())
    }
}

pub struct SchemaBuilder {
    name: String,
    kind: Option<CompositeKind>,
    fields: Vec<FieldDef>,
}

impl SchemaBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: None,
            fields: Vec::new(),
        }
    }

    pub fn kind(mut self, kind: CompositeKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn fields(mut self, fields: impl IntoIterator<Item = FieldDef>) -> Self {
        self.fields = extend(&self.fields, fields);
        self
    }

    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields = extend(&self.fields, [field]);
        self
    }

    pub fn build(self) -> CompositeSchema {
        CompositeSchema {
            name: self.name,
            kind: self.kind,
            fields: self.fields,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("schema '{0}' is already registered")]
    Duplicate(String),
    #[error("schema id {0} was never reserved")]
    UnknownId(usize),
    #[error("schema id {0} is already defined")]
    AlreadyDefined(usize),
    #[error("schema '{0}' was reserved but never defined")]
    Undefined(String),
    #[error("schema '{schema}' field '{field}' refers to unknown schema id {id}")]
    DanglingField {
        schema: String,
        field: String,
        id: usize,
    },
}

/// Arena of schemas addressed by [`SchemaId`].
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    slots: Vec<(String, Option<CompositeSchema>)>,
    by_name: HashMap<String, SchemaId>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves an id for `name` so fields can refer to it before it is defined.
    pub fn reserve(&mut self, name: &str) -> Result<SchemaId, SchemaError> {
        if self.by_name.contains_key(name) {
            return Err(SchemaError::Duplicate(name.to_string()));
        }
        let id = SchemaId(self.slots.len());
        self.slots.push((name.to_string(), None));
        self.by_name.insert(name.to_string(), id);
        Ok(id)
    }

    pub fn define(&mut self, id: SchemaId, schema: CompositeSchema) -> Result<SchemaId, SchemaError> {
        let slot = self
            .slots
            .get_mut(id.0)
            .ok_or(SchemaError::UnknownId(id.0))?;
        if slot.1.is_some() {
            return Err(SchemaError::AlreadyDefined(id.0));
        }
        slot.1 = Some(schema);
        Ok(id)
    }

    pub fn register(&mut self, schema: CompositeSchema) -> Result<SchemaId, SchemaError> {
        let id = self.reserve(&schema.name)?;
        self.define(id, schema)
    }

    pub fn get(&self, id: SchemaId) -> Option<&CompositeSchema> {
        self.slots.get(id.0).and_then(|(_, s)| s.as_ref())
    }

    pub fn id_of(&self, name: &str) -> Option<SchemaId> {
        self.by_name.get(name).copied()
    }

    pub fn by_name(&self, name: &str) -> Option<&CompositeSchema> {
        self.id_of(name).and_then(|id| self.get(id))
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Checks every reserved slot is defined and every composite field
    /// points at an existing slot.
    pub fn verify(&self) -> Result<(), SchemaError> {
        for (name, slot) in &self.slots {
            let schema = slot
                .as_ref()
                .ok_or_else(|| SchemaError::Undefined(name.clone()))?;
            for field in &schema.fields {
                if let FieldType::Composite(target) = field.ty
                    && target.0 >= self.slots.len()
                {
                    return Err(SchemaError::DanglingField {
                        schema: name.clone(),
                        field: field.name.clone(),
                        id: target.0,
                    });
                }
            }
        }
        Ok(())
    }
}
