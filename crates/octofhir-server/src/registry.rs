//! The set of resource profiles known to the server.

use indexmap::IndexMap;

use octofhir_elements::{
    Cardinality, CompositeSchema, Datatypes, FieldDef, SchemaError, SchemaRegistry, extend,
    register_datatypes,
};
use octofhir_storage::{StorageError, VersionedStorage};

use crate::constraints::{ConstraintError, FieldConstraint, ProfileConstraint, tighten};
use crate::profiles::{self, ResourceProfile};

/// Datatype schemas plus one profile per resource type.
///
/// Built once at startup and shared by reference. Constraints are applied
/// before the registry is shared; nothing is registered afterwards.
#[derive(Debug)]
pub struct ProfileRegistry {
    schemas: SchemaRegistry,
    datatypes: Datatypes,
    profiles: IndexMap<String, ResourceProfile>,
    constraints: Vec<ProfileConstraint>,
}

impl ProfileRegistry {
    /// Registers the datatype catalog and every built-in resource profile.
    ///
    /// # Errors
    ///
    /// Returns `SchemaError` if a schema name is registered twice or a
    /// schema refers to an id that was never defined.
    pub fn builtin() -> Result<Self, SchemaError> {
        let mut schemas = SchemaRegistry::new();
        let datatypes = register_datatypes(&mut schemas)?;
        let profiles = profiles::builtin(&mut schemas, &datatypes)?
            .into_iter()
            .map(|p| (p.name(), p))
            .collect();
        schemas.verify()?;
        Ok(Self {
            schemas,
            datatypes,
            profiles,
            constraints: Vec::new(),
        })
    }

    /// Replaces the profile of `resource_type` with a derived one whose
    /// listed fields carry the tightened cardinality. Fields the profile
    /// does not have are skipped.
    pub fn constrain(
        &mut self,
        resource_type: &str,
        fields: &[(&str, Cardinality)],
    ) -> Result<(), ConstraintError> {
        let profile = self
            .profiles
            .get(resource_type)
            .ok_or_else(|| ConstraintError::UnknownResourceType(resource_type.to_string()))?;
        let base = self
            .schemas
            .get(profile.schema)
            .ok_or(SchemaError::UnknownId(profile.schema.index()))?;

        let mut narrowed: Vec<FieldDef> = Vec::new();
        let mut applied = Vec::new();
        for &(field, cardinality) in fields {
            let Some(def) = base.field(field) else {
                tracing::warn!(resource_type, field, "constraint on unknown field skipped");
                continue;
            };
            let cardinality = tighten(def.cardinality, cardinality);
            narrowed.push(FieldDef {
                cardinality,
                ..def.clone()
            });
            applied.push(FieldConstraint {
                field: field.to_string(),
                cardinality,
            });
        }

        let generation = self
            .constraints
            .iter()
            .filter(|c| c.resource_type == resource_type)
            .count()
            + 1;
        let derived = CompositeSchema {
            name: format!("{resource_type}Constrained{generation}"),
            kind: base.kind,
            fields: extend(&base.fields, narrowed),
        };
        let schema = self.schemas.register(derived)?;
        if let Some(profile) = self.profiles.get_mut(resource_type) {
            profile.schema = schema;
        }

        tracing::info!(resource_type, fields = applied.len(), "profile constrained");
        self.constraints.push(ProfileConstraint {
            resource_type: resource_type.to_string(),
            fields: applied,
        });
        Ok(())
    }

    pub fn apply(&mut self, constraint: &ProfileConstraint) -> Result<(), ConstraintError> {
        self.constrain(&constraint.resource_type, &constraint.pairs())
    }

    /// Constraints applied so far, with the cardinality each field ended up with.
    pub fn constraints(&self) -> &[ProfileConstraint] {
        &self.constraints
    }

    pub fn schemas(&self) -> &SchemaRegistry {
        &self.schemas
    }

    pub fn datatypes(&self) -> &Datatypes {
        &self.datatypes
    }

    pub fn get(&self, resource_type: &str) -> Option<&ResourceProfile> {
        self.profiles.get(resource_type)
    }

    pub fn resource_types(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResourceProfile> {
        self.profiles.values()
    }

    /// Registers the table chain of every profile with `storage`.
    pub fn register_mappings(&self, storage: &dyn VersionedStorage) -> Result<(), StorageError> {
        for profile in self.iter() {
            storage.register_mapping(profile.mapping())?;
        }
        tracing::debug!(count = self.profiles.len(), backend = storage.backend_name(), "registered entity mappings");
        Ok(())
    }
}
