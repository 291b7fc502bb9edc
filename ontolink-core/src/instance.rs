//! Ontology-document entities: vertex and relationship instances, the
//! property/artifact assignments they carry, and the document root that
//! owns them.

use serde_json::Value;

use crate::arena::{Arena, ModuleId};
use crate::model::{ArtifactDefinition, ImportDefinition, PropertyDefinition, RelationshipType, VertexType};
use crate::reference::ReferenceCell;

/// One authored `property: value` pair on an instance. `property` is
/// owner-scoped: it resolves against the properties declared by the
/// instance's own type, not a global registry, so the same alias can mean
/// different property definitions on different types.
#[derive(Debug, Clone)]
pub struct PropertyAssignment {
    pub id: String,
    pub property: ReferenceCell<PropertyDefinition>,
    pub value: Value,
}

/// One authored artifact attachment on an instance, owner-scoped the same
/// way as [`PropertyAssignment::property`].
#[derive(Debug, Clone)]
pub struct ArtifactAssignment {
    pub id: String,
    pub artifact: ReferenceCell<ArtifactDefinition>,
    pub path: Option<String>,
}

/// Fields shared by vertex and relationship instances.
#[derive(Debug, Clone)]
pub struct InstanceCore {
    pub name: String,
    pub label: Option<String>,
    pub description: Option<String>,
    pub metadata: Option<Value>,
    pub properties: Vec<PropertyAssignment>,
    pub artifacts: Vec<ArtifactAssignment>,
}

impl InstanceCore {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        InstanceCore {
            name: name.into(),
            label: None,
            description: None,
            metadata: None,
            properties: Vec::new(),
            artifacts: Vec::new(),
        }
    }
}

/// A vertex instance: an [`InstanceCore`] tagged with a global reference to
/// the vertex type it instantiates.
#[derive(Debug, Clone)]
pub struct Vertex {
    pub core: InstanceCore,
    pub r#type: ReferenceCell<VertexType>,
}

impl Vertex {
    #[must_use]
    pub fn new(name: impl Into<String>, type_ref: ReferenceCell<VertexType>) -> Self {
        Vertex {
            core: InstanceCore::new(name),
            r#type: type_ref,
        }
    }
}

/// A relationship instance: an [`InstanceCore`] tagged with its
/// relationship type and the source/target vertices it connects.
#[derive(Debug, Clone)]
pub struct Relationship {
    pub core: InstanceCore,
    pub r#type: ReferenceCell<RelationshipType>,
    pub source: ReferenceCell<Vertex>,
    pub target: ReferenceCell<Vertex>,
}

impl Relationship {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        type_ref: ReferenceCell<RelationshipType>,
        source: ReferenceCell<Vertex>,
        target: ReferenceCell<Vertex>,
    ) -> Self {
        Relationship {
            core: InstanceCore::new(name),
            r#type: type_ref,
            source,
            target,
        }
    }
}

/// The root entity of an ontology document: the arenas of vertex and
/// relationship instances it declares, plus its own import edges.
#[derive(Debug, Default)]
pub struct Ontology {
    pub name: String,
    pub imports: Vec<ImportDefinition>,
    pub vertices: Arena<Vertex>,
    pub relationships: Arena<Relationship>,
}

impl Ontology {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Ontology {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// A loaded ontology document together with the resolved targets of its
/// import edges, mirroring [`crate::model::ModelModule`]. An ontology
/// document only ever imports model documents (never another ontology
/// document), so every entry's [`ModuleId`] addresses a `ModelModule` in
/// the loader's registry.
#[derive(Debug)]
pub struct OntologyModule {
    pub source_path: std::path::PathBuf,
    pub ontology: Ontology,
    pub resolved_imports: Vec<(ImportDefinition, ModuleId)>,
}

impl OntologyModule {
    #[must_use]
    pub fn new(source_path: std::path::PathBuf, ontology: Ontology) -> Self {
        OntologyModule {
            source_path,
            ontology,
            resolved_imports: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;

    #[test]
    fn vertex_starts_with_unfulfilled_type() {
        let v = Vertex::new("alice", ReferenceCell::global("Person", Context::root()));
        assert!(!v.r#type.fulfilled());
        assert_eq!(v.core.name, "alice");
    }

    #[test]
    fn relationship_carries_source_and_target_cells() {
        let rel = Relationship::new(
            "owns-1",
            ReferenceCell::global("Owns", Context::root()),
            ReferenceCell::global("alice", Context::root()),
            ReferenceCell::global("car-1", Context::root()),
        );
        assert!(!rel.source.fulfilled());
        assert!(!rel.target.fulfilled());
    }

    #[test]
    fn ontology_arenas_start_empty() {
        let ontology = Ontology::new("empty");
        assert!(ontology.vertices.is_empty());
        assert!(ontology.relationships.is_empty());
    }
}
