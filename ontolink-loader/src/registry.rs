//! The parser's module table and cross-module alias registries.
//!
//! Every loaded document — model or ontology — becomes a [`LoadedModule`]
//! stored in a flat, insertion-ordered [`ModuleRegistry`]. Alongside the
//! modules themselves, the registry keeps one flat alias→[`GlobalId`] map
//! per section (`data_types`, `vertex_types`, `relationship_types`,
//! `vertices`, `relationships`), keyed by name *across all loaded modules*,
//! not scoped per module. A name registered
//! twice (two distinct modules declaring the same type name) overwrites
//! the earlier entry, mirroring a plain `dict[name] = entity` assignment
//! in the source this registry is grounded on — the within-module
//! uniqueness invariant is enforced separately, at
//! build time, before a name ever reaches this registry.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use ontolink_core::prelude::*;

/// Tag identifying which section of the document model a registered name
/// belongs to, used only for error messages (`Unknown reference: VertexType "Foo"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    DataType,
    VertexType,
    RelationshipType,
    Vertex,
    Relationship,
}

impl Section {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Section::DataType => "DataType",
            Section::VertexType => "VertexType",
            Section::RelationshipType => "RelationshipType",
            Section::Vertex => "Vertex",
            Section::Relationship => "Relationship",
        }
    }
}

/// Either concrete module kind the parser can hold. Kept as a plain enum
/// rather than a trait object since the two kinds do not share behavior
/// beyond what [`ModuleRegistry`] already provides uniformly (path,
/// artifacts, resolved imports).
#[derive(Debug)]
pub enum LoadedModule {
    Model(ModelModule),
    Ontology(OntologyModule),
}

impl LoadedModule {
    #[must_use]
    pub fn source_path(&self) -> &Path {
        match self {
            LoadedModule::Model(m) => &m.source_path,
            LoadedModule::Ontology(o) => &o.source_path,
        }
    }

    #[must_use]
    pub fn as_model(&self) -> Option<&ModelModule> {
        match self {
            LoadedModule::Model(m) => Some(m),
            LoadedModule::Ontology(_) => None,
        }
    }

    #[must_use]
    pub fn as_model_mut(&mut self) -> Option<&mut ModelModule> {
        match self {
            LoadedModule::Model(m) => Some(m),
            LoadedModule::Ontology(_) => None,
        }
    }

    #[must_use]
    pub fn as_ontology(&self) -> Option<&OntologyModule> {
        match self {
            LoadedModule::Ontology(o) => Some(o),
            LoadedModule::Model(_) => None,
        }
    }

    #[must_use]
    pub fn as_ontology_mut(&mut self) -> Option<&mut OntologyModule> {
        match self {
            LoadedModule::Ontology(o) => Some(o),
            LoadedModule::Model(_) => None,
        }
    }

    /// The resolved import edges of either module kind, used by the
    /// transitive-closure walk shared by import-cycle handling and
    /// archive export — both document kinds carry the same
    /// `(ImportDefinition, ModuleId)` shape.
    #[must_use]
    pub fn resolved_imports(&self) -> &[(ImportDefinition, ModuleId)] {
        match self {
            LoadedModule::Model(m) => &m.resolved_imports,
            LoadedModule::Ontology(o) => &o.resolved_imports,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            LoadedModule::Model(m) => &m.model.name,
            LoadedModule::Ontology(o) => &o.ontology.name,
        }
    }

    #[must_use]
    pub fn imports(&self) -> &[ImportDefinition] {
        match self {
            LoadedModule::Model(m) => &m.model.imports,
            LoadedModule::Ontology(o) => &o.ontology.imports,
        }
    }
}

/// A non-model file discovered beside a loaded module, carried through to
/// re-export under the same relative path.
#[derive(Debug, Clone)]
pub struct ArtifactFile {
    /// Path relative to the owning module's directory.
    pub relative_path: PathBuf,
    /// Absolute path on disk (or, for an archive-extracted module, inside
    /// the parser's temp directory).
    pub absolute_path: PathBuf,
    /// Whether the first KiB decoded as UTF-8 at discovery time. `None`
    /// when probing was deferred ([`crate::config::ArtifactProbing::Lazy`]).
    pub is_text: Option<bool>,
}

/// The parser's module table plus the five flat section registries.
#[derive(Debug, Default)]
pub struct ModuleRegistry {
    modules: Vec<LoadedModule>,
    by_path: IndexMap<PathBuf, ModuleId>,
    artifacts: IndexMap<ModuleId, Vec<ArtifactFile>>,

    data_types: IndexMap<String, GlobalId<DataType>>,
    vertex_types: IndexMap<String, GlobalId<VertexType>>,
    relationship_types: IndexMap<String, GlobalId<RelationshipType>>,
    vertices: IndexMap<String, GlobalId<Vertex>>,
    relationships: IndexMap<String, GlobalId<Relationship>>,
}

impl ModuleRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_model(&mut self, path: PathBuf, module: ModelModule) -> ModuleId {
        let id = ModuleId::new(self.modules.len());
        self.modules.push(LoadedModule::Model(module));
        self.by_path.insert(path, id);
        self.artifacts.insert(id, Vec::new());
        id
    }

    pub fn insert_ontology(&mut self, path: PathBuf, module: OntologyModule) -> ModuleId {
        let id = ModuleId::new(self.modules.len());
        self.modules.push(LoadedModule::Ontology(module));
        self.by_path.insert(path, id);
        self.artifacts.insert(id, Vec::new());
        id
    }

    #[must_use]
    pub fn module(&self, id: ModuleId) -> &LoadedModule {
        &self.modules[id.index()]
    }

    pub fn module_mut(&mut self, id: ModuleId) -> &mut LoadedModule {
        &mut self.modules[id.index()]
    }

    #[must_use]
    pub fn model(&self, id: ModuleId) -> &ModelModule {
        self.module(id).as_model().expect("module id did not address a model module")
    }

    pub fn model_mut(&mut self, id: ModuleId) -> &mut ModelModule {
        self.module_mut(id).as_model_mut().expect("module id did not address a model module")
    }

    #[must_use]
    pub fn ontology(&self, id: ModuleId) -> &OntologyModule {
        self.module(id).as_ontology().expect("module id did not address an ontology module")
    }

    pub fn ontology_mut(&mut self, id: ModuleId) -> &mut OntologyModule {
        self.module_mut(id).as_ontology_mut().expect("module id did not address an ontology module")
    }

    #[must_use]
    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    #[must_use]
    pub fn model_count(&self) -> usize {
        self.modules.iter().filter(|m| matches!(m, LoadedModule::Model(_))).count()
    }

    #[must_use]
    pub fn ontology_count(&self) -> usize {
        self.modules.iter().filter(|m| matches!(m, LoadedModule::Ontology(_))).count()
    }

    #[must_use]
    pub fn find_by_path(&self, path: &Path) -> Option<ModuleId> {
        self.by_path.get(path).copied()
    }

    /// Find an already-loaded *model* module by the original string the
    /// importing document used to name it (alias reuse).
    #[must_use]
    pub fn find_by_orig_name(&self, orig_name: &str) -> Option<ModuleId> {
        self.modules.iter().enumerate().find_map(|(i, m)| match m {
            LoadedModule::Model(model) if model.orig_name.as_deref() == Some(orig_name) => {
                Some(ModuleId::new(i))
            }
            _ => None,
        })
    }

    pub fn artifacts(&self, id: ModuleId) -> &[ArtifactFile] {
        self.artifacts.get(&id).map_or(&[], Vec::as_slice)
    }

    pub fn artifacts_mut(&mut self, id: ModuleId) -> &mut Vec<ArtifactFile> {
        self.artifacts.entry(id).or_default()
    }

    pub fn register_data_type(&mut self, name: impl Into<String>, module: ModuleId, id: EntityId<DataType>) {
        self.data_types.insert(name.into(), GlobalId::new(module, id));
    }

    pub fn register_vertex_type(&mut self, name: impl Into<String>, module: ModuleId, id: EntityId<VertexType>) {
        self.vertex_types.insert(name.into(), GlobalId::new(module, id));
    }

    pub fn register_relationship_type(
        &mut self,
        name: impl Into<String>,
        module: ModuleId,
        id: EntityId<RelationshipType>,
    ) {
        self.relationship_types.insert(name.into(), GlobalId::new(module, id));
    }

    pub fn register_vertex(&mut self, name: impl Into<String>, module: ModuleId, id: EntityId<Vertex>) {
        self.vertices.insert(name.into(), GlobalId::new(module, id));
    }

    pub fn register_relationship(&mut self, name: impl Into<String>, module: ModuleId, id: EntityId<Relationship>) {
        self.relationships.insert(name.into(), GlobalId::new(module, id));
    }

    #[must_use]
    pub fn lookup_data_type(&self, name: &str) -> Option<GlobalId<DataType>> {
        self.data_types.get(name).copied()
    }

    #[must_use]
    pub fn lookup_vertex_type(&self, name: &str) -> Option<GlobalId<VertexType>> {
        self.vertex_types.get(name).copied()
    }

    #[must_use]
    pub fn lookup_relationship_type(&self, name: &str) -> Option<GlobalId<RelationshipType>> {
        self.relationship_types.get(name).copied()
    }

    #[must_use]
    pub fn lookup_vertex(&self, name: &str) -> Option<GlobalId<Vertex>> {
        self.vertices.get(name).copied()
    }

    #[must_use]
    pub fn lookup_relationship(&self, name: &str) -> Option<GlobalId<Relationship>> {
        self.relationships.get(name).copied()
    }

    #[must_use]
    pub fn data_type(&self, gid: GlobalId<DataType>) -> &DataType {
        self.model(gid.module).model.data_types.get(gid.id)
    }

    #[must_use]
    pub fn vertex_type(&self, gid: GlobalId<VertexType>) -> &VertexType {
        self.model(gid.module).model.vertex_types.get(gid.id)
    }

    #[must_use]
    pub fn relationship_type(&self, gid: GlobalId<RelationshipType>) -> &RelationshipType {
        self.model(gid.module).model.relationship_types.get(gid.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_fetch_model_module() {
        let mut reg = ModuleRegistry::new();
        let model = OntologyModel::new("a");
        let id = reg.insert_model(PathBuf::from("/a.yml"), ModelModule::new(PathBuf::from("/a.yml"), model));
        assert_eq!(reg.module_count(), 1);
        assert_eq!(reg.find_by_path(Path::new("/a.yml")), Some(id));
        assert!(reg.model(id).model.data_types.is_empty());
    }

    #[test]
    fn register_and_lookup_by_name() {
        let mut reg = ModuleRegistry::new();
        let model = OntologyModel::new("a");
        let id = reg.insert_model(PathBuf::from("/a.yml"), ModelModule::new(PathBuf::from("/a.yml"), model));
        let dt_id = reg.model_mut(id).model.data_types.insert("Text", DataType::new("Text")).unwrap();
        reg.register_data_type("Text", id, dt_id);
        let found = reg.lookup_data_type("Text").unwrap();
        assert_eq!(found.module, id);
        assert_eq!(found.id, dt_id);
    }
}
