//! Model-document entities: data types, vertex types, relationship types,
//! and the definitions (property, artifact, import) they carry.
//!
//! The derivation chain (`derived_from`) is common to every derivable
//! entity kind, so it lives once on [`Derivable`] and is composed into the
//! concrete kinds rather than re-implemented per kind.

use serde_json::Value;

use crate::arena::{Arena, ModuleId};
use crate::constraint::Constraint;
use crate::reference::ReferenceCell;

/// Fields shared by every named, derivable entity: data types, vertex
/// types and relationship types alike. Generic over the concrete kind so
/// `derived_from` points at a sibling of the same kind (a vertex type
/// derives from a vertex type, never from a relationship type).
#[derive(Debug, Clone)]
pub struct Derivable<T> {
    pub name: String,
    pub label: Option<String>,
    pub description: Option<String>,
    pub derived_from: Option<ReferenceCell<T>>,
}

impl<T> Derivable<T> {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Derivable {
            name: name.into(),
            label: None,
            description: None,
            derived_from: None,
        }
    }
}

/// A single `{alias: file}` import edge authored in a module's `imports`
/// section. The shorthand forms (`"path.yaml"`, `{alias: path.yaml}`) are
/// normalized to this shape by the document layer before reaching here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportDefinition {
    pub file: String,
    pub alias: Option<String>,
}

/// `type`, `required`, `default`, `allows_multiple` and the min/max
/// assignment bounds authored on a property slot of an instancable type.
#[derive(Debug, Clone)]
pub struct PropertyDefinition {
    pub name: String,
    pub label: Option<String>,
    pub description: Option<String>,
    pub r#type: ReferenceCell<DataType>,
    pub required: bool,
    pub default: Option<Value>,
    pub allows_multiple: bool,
    pub min_assignments: Option<u64>,
    pub max_assignments: Option<u64>,
}

impl PropertyDefinition {
    #[must_use]
    pub fn new(name: impl Into<String>, type_ref: ReferenceCell<DataType>) -> Self {
        PropertyDefinition {
            name: name.into(),
            label: None,
            description: None,
            r#type: type_ref,
            required: false,
            default: None,
            allows_multiple: true,
            min_assignments: None,
            max_assignments: None,
        }
    }
}

/// `default_path`, `mime_type`, `required`, `allows_multiple` and the
/// min/max assignment bounds authored on an artifact slot.
#[derive(Debug, Clone)]
pub struct ArtifactDefinition {
    pub name: String,
    pub label: Option<String>,
    pub description: Option<String>,
    pub default_path: Option<String>,
    pub mime_type: String,
    pub required: bool,
    pub allows_multiple: bool,
    pub min_assignments: Option<u64>,
    pub max_assignments: Option<u64>,
}

impl ArtifactDefinition {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        ArtifactDefinition {
            name: name.into(),
            label: None,
            description: None,
            default_path: None,
            mime_type: "application/octet-stream".to_string(),
            required: false,
            allows_multiple: true,
            min_assignments: None,
            max_assignments: None,
        }
    }
}

/// Property and artifact slots shared by every instancable type (vertex
/// types and relationship types), plus free-form metadata.
#[derive(Debug, Clone, Default)]
pub struct InstancableSlots {
    pub properties: Arena<PropertyDefinition>,
    pub artifacts: Arena<ArtifactDefinition>,
    pub metadata: Option<Value>,
}

/// A scalar or structured data type: either a JSON Schema object authored
/// inline or by `$name` reference into a module's `schema_definitions`,
/// plus a closed set of constraints layered on top.
#[derive(Debug, Clone)]
pub struct DataType {
    pub derivable: Derivable<DataType>,
    pub constraints: Vec<Constraint>,
    pub object_schema: Option<Value>,
    pub object_schema_ref_used: Option<String>,
    pub object_schema_resolved: Option<Value>,
}

impl DataType {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        DataType {
            derivable: Derivable::new(name),
            constraints: Vec::new(),
            object_schema: None,
            object_schema_ref_used: None,
            object_schema_resolved: None,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.derivable.name
    }
}

/// A vertex type: an instancable kind with no extra fields of its own,
/// mirroring the marker subclass it is grounded on.
#[derive(Debug, Clone)]
pub struct VertexType {
    pub derivable: Derivable<VertexType>,
    pub slots: InstancableSlots,
}

impl VertexType {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        VertexType {
            derivable: Derivable::new(name),
            slots: InstancableSlots::default(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.derivable.name
    }
}

/// A relationship type: an instancable kind additionally constrained to a
/// set of valid source and target vertex types.
#[derive(Debug, Clone)]
pub struct RelationshipType {
    pub derivable: Derivable<RelationshipType>,
    pub slots: InstancableSlots,
    pub valid_source_types: Vec<ReferenceCell<VertexType>>,
    pub valid_target_types: Vec<ReferenceCell<VertexType>>,
}

impl RelationshipType {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        RelationshipType {
            derivable: Derivable::new(name),
            slots: InstancableSlots::default(),
            valid_source_types: Vec::new(),
            valid_target_types: Vec::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.derivable.name
    }
}

/// The root entity of a model document: the arenas of data types, vertex
/// types and relationship types it declares, plus its own import edges and
/// any inline JSON Schema definitions addressable by `$name`.
#[derive(Debug, Default)]
pub struct OntologyModel {
    pub name: String,
    pub imports: Vec<ImportDefinition>,
    pub data_types: Arena<DataType>,
    pub vertex_types: Arena<VertexType>,
    pub relationship_types: Arena<RelationshipType>,
    pub schema_definitions: indexmap::IndexMap<String, Value>,
}

impl OntologyModel {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        OntologyModel {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// A loaded model document together with the resolved targets of its
/// import edges. `resolved_imports` pairs each authored [`ImportDefinition`]
/// with the [`ModuleId`] of the module it resolved to, looked up through
/// the loader crate's module registry; the imported [`OntologyModel`]
/// itself is reached through that module rather than duplicated here.
#[derive(Debug)]
pub struct ModelModule {
    pub source_path: std::path::PathBuf,
    pub orig_name: Option<String>,
    pub model: OntologyModel,
    pub resolved_imports: Vec<(ImportDefinition, ModuleId)>,
}

impl ModelModule {
    #[must_use]
    pub fn new(source_path: std::path::PathBuf, model: OntologyModel) -> Self {
        ModelModule {
            source_path,
            orig_name: None,
            model,
            resolved_imports: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_orig_name(mut self, orig_name: impl Into<String>) -> Self {
        self.orig_name = Some(orig_name.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;

    #[test]
    fn data_type_starts_with_no_schema() {
        let dt = DataType::new("Text");
        assert_eq!(dt.name(), "Text");
        assert!(dt.object_schema.is_none());
    }

    #[test]
    fn relationship_type_tracks_endpoint_references() {
        let mut rt = RelationshipType::new("Owns");
        rt.valid_source_types
            .push(ReferenceCell::global("Person", Context::root()));
        rt.valid_target_types
            .push(ReferenceCell::global("Asset", Context::root()));
        assert_eq!(rt.valid_source_types.len(), 1);
        assert!(!rt.valid_source_types[0].fulfilled());
    }

    #[test]
    fn model_arenas_start_empty() {
        let model = OntologyModel::new("empty");
        assert!(model.data_types.is_empty());
        assert!(model.vertex_types.is_empty());
        assert!(model.relationship_types.is_empty());
    }
}
