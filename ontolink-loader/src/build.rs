//! Two-phase construction and the deferred reference queue.
//!
//! Resolution is never attempted while a document is being built — every
//! reference cell is created unfulfilled and paired with a [`PendingRef`]
//! describing where it lives, so forward references (a type naming a
//! sibling declared later in the same file, or one that only exists in an
//! import not yet loaded) need no special handling here: they are simply
//! unresolved until [`crate::parser::Parser::finalize_references`] sweeps
//! the queue once the whole reachable module graph has loaded. An
//! unresolved owner-scoped cell is never treated as an error until that
//! final pass.

use std::collections::HashSet;
use std::path::Path;

use ontolink_core::error::{LoadError, OntologyError};
use ontolink_core::prelude::*;
use serde_yaml::Value;

use crate::registry::{ModuleRegistry, Section};
use crate::shapes;

fn map_get<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    value.as_mapping().and_then(|m| m.get(Value::String(key.to_string())))
}

fn as_str_field(value: &Value, key: &str, ctx: &Context) -> Result<Option<String>, LoadError> {
    match map_get(value, key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(LoadError::new(format!("`{key}` must be a string"), ctx.child(key))),
    }
}

fn as_bool_field(value: &Value, key: &str, default: bool, ctx: &Context) -> Result<bool, LoadError> {
    match map_get(value, key) {
        None | Some(Value::Null) => Ok(default),
        Some(Value::Bool(b)) => Ok(*b),
        Some(_) => Err(LoadError::new(format!("`{key}` must be a boolean"), ctx.child(key))),
    }
}

fn as_u64_field(value: &Value, key: &str, ctx: &Context) -> Result<Option<u64>, LoadError> {
    match map_get(value, key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_u64()
            .map(Some)
            .ok_or_else(|| LoadError::new(format!("`{key}` must be a non-negative integer"), ctx.child(key))),
        Some(_) => Err(LoadError::new(format!("`{key}` must be an integer"), ctx.child(key))),
    }
}

fn as_str_list(value: &Value, key: &str, ctx: &Context) -> Result<Vec<String>, LoadError> {
    match map_get(value, key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Sequence(seq)) => seq
            .iter()
            .enumerate()
            .map(|(i, v)| {
                v.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| LoadError::new(format!("`{key}[{i}]` must be a string"), ctx.child(key).child(i)))
            })
            .collect(),
        Some(_) => Err(LoadError::new(format!("`{key}` must be a list"), ctx.child(key))),
    }
}

fn mapping_entries<'a>(value: &'a Value, key: &str, ctx: &Context) -> Result<Vec<(String, &'a Value)>, LoadError> {
    match map_get(value, key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Mapping(m)) => m
            .iter()
            .map(|(k, v)| {
                k.as_str()
                    .map(|s| (s.to_string(), v))
                    .ok_or_else(|| LoadError::new(format!("`{key}` keys must be strings"), ctx.child(key)))
            })
            .collect(),
        Some(_) => Err(LoadError::new(format!("`{key}` must be a map"), ctx.child(key))),
    }
}

/// Fallback for a module's `name` when the document does not author one
/// itself: the file stem with the conventional
/// `.mdl.yml`/`.mdl.yaml`/`.ont.yml`/`.ont.yaml` (or bare `.yml`/`.yaml`)
/// suffix stripped. A model loaded from `normative-types.mdl.yml` with no
/// authored `name:` field gets the name `normative-types`.
#[must_use]
pub fn module_name_from_path(path: &Path) -> String {
    let file_name = path.file_name().and_then(|s| s.to_str()).unwrap_or_default();
    const SUFFIXES: &[&str] = &[".mdl.yml", ".mdl.yaml", ".ont.yml", ".ont.yaml", ".yml", ".yaml"];
    for suffix in SUFFIXES {
        if let Some(stripped) = file_name.strip_suffix(suffix) {
            return stripped.to_string();
        }
    }
    file_name.to_string()
}

// ---------------------------------------------------------------------
// Model document construction
// ---------------------------------------------------------------------

/// Builds a complete, locally self-contained `ModelModule` from its parsed
/// document tree: every reference cell it creates (`derived_from`,
/// property `type`, `valid_source_types`/`valid_target_types`) is left
/// unfulfilled. Call [`register_model_names`] and [`enqueue_model_pending`]
/// once the returned module has been inserted into a [`ModuleRegistry`].
pub fn build_model(value: &Value, source_path: &Path, ctx: &Context) -> Result<ModelModule, LoadError> {
    let name = as_str_field(value, "name", ctx)?.unwrap_or_else(|| module_name_from_path(source_path));
    let mut model = OntologyModel::new(name);
    model.imports = shapes::parse_imports(map_get(value, "imports"), &ctx.child("imports"))?;
    model.schema_definitions = shapes::parse_schema_definitions(map_get(value, "schema_definitions"), &ctx.child("schema_definitions"))?;

    for (name, entry) in mapping_entries(value, "data_types", ctx)? {
        let dctx = ctx.child("data_types").child(name.clone());
        let dt = build_data_type(&name, entry, &dctx, &model.schema_definitions)?;
        model
            .data_types
            .insert(name.clone(), dt)
            .map_err(|_| LoadError::new(format!("duplicate data type \"{name}\""), dctx))?;
    }
    for (name, entry) in mapping_entries(value, "vertex_types", ctx)? {
        let vctx = ctx.child("vertex_types").child(name.clone());
        let vt = build_vertex_type(&name, entry, &vctx)?;
        model
            .vertex_types
            .insert(name.clone(), vt)
            .map_err(|_| LoadError::new(format!("duplicate vertex type \"{name}\""), vctx))?;
    }
    for (name, entry) in mapping_entries(value, "relationship_types", ctx)? {
        let rctx = ctx.child("relationship_types").child(name.clone());
        let rt = build_relationship_type(&name, entry, &rctx)?;
        model
            .relationship_types
            .insert(name.clone(), rt)
            .map_err(|_| LoadError::new(format!("duplicate relationship type \"{name}\""), rctx))?;
    }

    Ok(ModelModule::new(source_path.to_path_buf(), model))
}

fn build_data_type(
    name: &str,
    entry: &Value,
    ctx: &Context,
    schema_definitions: &indexmap::IndexMap<String, serde_json::Value>,
) -> Result<DataType, LoadError> {
    let mut dt = DataType::new(name.to_string());
    dt.derivable.label = as_str_field(entry, "label", ctx)?;
    dt.derivable.description = as_str_field(entry, "description", ctx)?;
    if let Some(parent) = as_str_field(entry, "derived_from", ctx)? {
        dt.derivable.derived_from = Some(ReferenceCell::global(parent, ctx.child("derived_from")));
    }
    dt.constraints = shapes::parse_constraints(map_get(entry, "constraints"), ctx)?;

    if let Some((schema_json, reference)) = shapes::parse_object_schema(map_get(entry, "object_schema"), &ctx.child("object_schema"))? {
        let schema_ctx = ctx.child("object_schema");
        let resolved = ontolink_core::schema::resolve_object_schema(&schema_json, schema_definitions, &schema_ctx)
            .map_err(|e| LoadError::new(e.to_string(), schema_ctx.clone()))?
            .clone();
        ontolink_core::schema::validate_schema_definition(&resolved, &schema_ctx)
            .map_err(|e| LoadError::new(e.to_string(), schema_ctx.clone()))?;
        dt.object_schema = Some(schema_json);
        dt.object_schema_ref_used = reference;
        dt.object_schema_resolved = Some(resolved);
    }
    Ok(dt)
}

fn build_vertex_type(name: &str, entry: &Value, ctx: &Context) -> Result<VertexType, LoadError> {
    let mut vt = VertexType::new(name.to_string());
    vt.derivable.label = as_str_field(entry, "label", ctx)?;
    vt.derivable.description = as_str_field(entry, "description", ctx)?;
    if let Some(parent) = as_str_field(entry, "derived_from", ctx)? {
        vt.derivable.derived_from = Some(ReferenceCell::global(parent, ctx.child("derived_from")));
    }
    build_instancable_slots(&mut vt.slots, entry, ctx)?;
    Ok(vt)
}

fn build_relationship_type(name: &str, entry: &Value, ctx: &Context) -> Result<RelationshipType, LoadError> {
    let mut rt = RelationshipType::new(name.to_string());
    rt.derivable.label = as_str_field(entry, "label", ctx)?;
    rt.derivable.description = as_str_field(entry, "description", ctx)?;
    if let Some(parent) = as_str_field(entry, "derived_from", ctx)? {
        rt.derivable.derived_from = Some(ReferenceCell::global(parent, ctx.child("derived_from")));
    }
    build_instancable_slots(&mut rt.slots, entry, ctx)?;
    for (i, alias) in as_str_list(entry, "valid_source_types", ctx)?.into_iter().enumerate() {
        rt.valid_source_types.push(ReferenceCell::global(alias, ctx.child("valid_source_types").child(i)));
    }
    for (i, alias) in as_str_list(entry, "valid_target_types", ctx)?.into_iter().enumerate() {
        rt.valid_target_types.push(ReferenceCell::global(alias, ctx.child("valid_target_types").child(i)));
    }
    Ok(rt)
}

fn build_instancable_slots(slots: &mut InstancableSlots, entry: &Value, ctx: &Context) -> Result<(), LoadError> {
    for (name, pentry) in mapping_entries(entry, "properties", ctx)? {
        let pctx = ctx.child("properties").child(name.clone());
        let type_alias = as_str_field(pentry, "type", &pctx)?
            .ok_or_else(|| LoadError::new("property `type` is required", pctx.child("type")))?;
        let mut prop = PropertyDefinition::new(name.clone(), ReferenceCell::global(type_alias, pctx.child("type")));
        prop.label = as_str_field(pentry, "label", &pctx)?;
        prop.description = as_str_field(pentry, "description", &pctx)?;
        prop.required = as_bool_field(pentry, "required", false, &pctx)?;
        prop.allows_multiple = as_bool_field(pentry, "allows_multiple", true, &pctx)?;
        prop.min_assignments = as_u64_field(pentry, "min_assignments", &pctx)?;
        prop.max_assignments = as_u64_field(pentry, "max_assignments", &pctx)?;
        if let Some(default) = map_get(pentry, "default") {
            prop.default = Some(shapes::yaml_to_json(default, &pctx.child("default"))?);
        }
        slots
            .properties
            .insert(name.clone(), prop)
            .map_err(|_| LoadError::new(format!("duplicate property \"{name}\""), pctx))?;
    }
    for (name, aentry) in mapping_entries(entry, "artifacts", ctx)? {
        let actx = ctx.child("artifacts").child(name.clone());
        let mut art = ArtifactDefinition::new(name.clone());
        art.label = as_str_field(aentry, "label", &actx)?;
        art.description = as_str_field(aentry, "description", &actx)?;
        art.default_path = as_str_field(aentry, "default_path", &actx)?;
        if let Some(mime) = as_str_field(aentry, "mime_type", &actx)? {
            art.mime_type = mime;
        }
        art.required = as_bool_field(aentry, "required", false, &actx)?;
        art.allows_multiple = as_bool_field(aentry, "allows_multiple", true, &actx)?;
        art.min_assignments = as_u64_field(aentry, "min_assignments", &actx)?;
        art.max_assignments = as_u64_field(aentry, "max_assignments", &actx)?;
        slots
            .artifacts
            .insert(name.clone(), art)
            .map_err(|_| LoadError::new(format!("duplicate artifact \"{name}\""), actx))?;
    }
    if let Some(meta) = map_get(entry, "metadata") {
        slots.metadata = Some(shapes::yaml_to_json(meta, &ctx.child("metadata"))?);
    }
    Ok(())
}

// ---------------------------------------------------------------------
// Ontology document construction
// ---------------------------------------------------------------------

/// Builds a complete, locally self-contained `OntologyModule`, mirroring
/// [`build_model`]: every `type`/`source`/`target`/assignment reference
/// cell is created unfulfilled.
pub fn build_ontology(value: &Value, source_path: &Path, ctx: &Context) -> Result<OntologyModule, LoadError> {
    let name = as_str_field(value, "name", ctx)?.unwrap_or_else(|| module_name_from_path(source_path));
    let mut ontology = Ontology::new(name);
    ontology.imports = shapes::parse_imports(map_get(value, "imports"), &ctx.child("imports"))?;

    for (name, entry) in mapping_entries(value, "vertices", ctx)? {
        let vctx = ctx.child("vertices").child(name.clone());
        let vertex = build_vertex(&name, entry, &vctx)?;
        ontology
            .vertices
            .insert(name.clone(), vertex)
            .map_err(|_| LoadError::new(format!("duplicate vertex \"{name}\""), vctx))?;
    }
    for (name, entry) in mapping_entries(value, "relationships", ctx)? {
        let rctx = ctx.child("relationships").child(name.clone());
        let rel = build_relationship(&name, entry, &rctx)?;
        ontology
            .relationships
            .insert(name.clone(), rel)
            .map_err(|_| LoadError::new(format!("duplicate relationship \"{name}\""), rctx))?;
    }

    Ok(OntologyModule::new(source_path.to_path_buf(), ontology))
}

fn build_vertex(name: &str, entry: &Value, ctx: &Context) -> Result<Vertex, LoadError> {
    let type_alias =
        as_str_field(entry, "type", ctx)?.ok_or_else(|| LoadError::new("vertex `type` is required", ctx.child("type")))?;
    let mut vertex = Vertex::new(name.to_string(), ReferenceCell::global(type_alias, ctx.child("type")));
    vertex.core.label = as_str_field(entry, "label", ctx)?;
    vertex.core.description = as_str_field(entry, "description", ctx)?;
    if let Some(meta) = map_get(entry, "metadata") {
        vertex.core.metadata = Some(shapes::yaml_to_json(meta, &ctx.child("metadata"))?);
    }
    build_assignments(&mut vertex.core, entry, ctx)?;
    Ok(vertex)
}

fn build_relationship(name: &str, entry: &Value, ctx: &Context) -> Result<Relationship, LoadError> {
    let type_alias = as_str_field(entry, "type", ctx)?
        .ok_or_else(|| LoadError::new("relationship `type` is required", ctx.child("type")))?;
    let source_alias = as_str_field(entry, "source", ctx)?
        .ok_or_else(|| LoadError::new("relationship `source` is required", ctx.child("source")))?;
    let target_alias = as_str_field(entry, "target", ctx)?
        .ok_or_else(|| LoadError::new("relationship `target` is required", ctx.child("target")))?;
    let mut rel = Relationship::new(
        name.to_string(),
        ReferenceCell::global(type_alias, ctx.child("type")),
        ReferenceCell::global(source_alias, ctx.child("source")),
        ReferenceCell::global(target_alias, ctx.child("target")),
    );
    rel.core.label = as_str_field(entry, "label", ctx)?;
    rel.core.description = as_str_field(entry, "description", ctx)?;
    if let Some(meta) = map_get(entry, "metadata") {
        rel.core.metadata = Some(shapes::yaml_to_json(meta, &ctx.child("metadata"))?);
    }
    build_assignments(&mut rel.core, entry, ctx)?;
    Ok(rel)
}

fn build_assignments(core: &mut InstanceCore, entry: &Value, ctx: &Context) -> Result<(), LoadError> {
    for (pname, pvalue) in mapping_entries(entry, "properties", ctx)? {
        let pctx = ctx.child("properties").child(pname.clone());
        for (i, raw) in shapes::expand_property_values(pvalue).iter().enumerate() {
            let entry_ctx = pctx.child(i);
            let value = shapes::property_assignment_value(raw, &entry_ctx)?;
            core.properties.push(PropertyAssignment {
                id: format!("{pname}#{i}"),
                property: ReferenceCell::owner_scoped(pname.clone(), entry_ctx),
                value,
            });
        }
    }
    for (aname, avalue) in mapping_entries(entry, "artifacts", ctx)? {
        let actx = ctx.child("artifacts").child(aname.clone());
        for (i, raw) in shapes::expand_artifact_values(avalue).iter().enumerate() {
            let entry_ctx = actx.child(i);
            let path = shapes::artifact_assignment_path(raw, &entry_ctx)?;
            core.artifacts.push(ArtifactAssignment {
                id: format!("{aname}#{i}"),
                artifact: ReferenceCell::owner_scoped(aname.clone(), entry_ctx),
                path,
            });
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------
// Post-insertion registration and pending-queue population
// ---------------------------------------------------------------------

/// Registers every derivable type name declared by `module` into the
/// registry's flat, cross-module section tables.
/// Must run after the module has been inserted (so its `ModuleId` exists)
/// and before [`enqueue_model_pending`] so same-module forward references
/// can resolve on the very first `finalize_references` pass.
pub fn register_model_names(registry: &mut ModuleRegistry, module: ModuleId) {
    let data_types: Vec<(String, EntityId<DataType>)> =
        registry.model(module).model.data_types.iter().map(|(n, id, _)| (n.to_string(), id)).collect();
    let vertex_types: Vec<(String, EntityId<VertexType>)> =
        registry.model(module).model.vertex_types.iter().map(|(n, id, _)| (n.to_string(), id)).collect();
    let relationship_types: Vec<(String, EntityId<RelationshipType>)> = registry
        .model(module)
        .model
        .relationship_types
        .iter()
        .map(|(n, id, _)| (n.to_string(), id))
        .collect();
    for (name, id) in data_types {
        registry.register_data_type(name, module, id);
    }
    for (name, id) in vertex_types {
        registry.register_vertex_type(name, module, id);
    }
    for (name, id) in relationship_types {
        registry.register_relationship_type(name, module, id);
    }
}

/// Registers every vertex/relationship instance name declared by `module`,
/// mirroring [`register_model_names`] for ontology documents.
pub fn register_ontology_names(registry: &mut ModuleRegistry, module: ModuleId) {
    let vertices: Vec<(String, EntityId<Vertex>)> =
        registry.ontology(module).ontology.vertices.iter().map(|(n, id, _)| (n.to_string(), id)).collect();
    let relationships: Vec<(String, EntityId<Relationship>)> =
        registry.ontology(module).ontology.relationships.iter().map(|(n, id, _)| (n.to_string(), id)).collect();
    for (name, id) in vertices {
        registry.register_vertex(name, module, id);
    }
    for (name, id) in relationships {
        registry.register_relationship(name, module, id);
    }
}

/// Walks an already-registered model module and pushes one [`PendingRef`]
/// per reference cell it declared, regardless of whether that cell could
/// already resolve — resolution itself only ever happens inside
/// [`PendingRef::try_resolve`], driven by `finalize_references`.
pub fn enqueue_model_pending(registry: &ModuleRegistry, module: ModuleId, pending: &mut Vec<PendingRef>) {
    let model = &registry.model(module).model;
    for (_, id, dt) in model.data_types.iter() {
        if dt.derivable.derived_from.is_some() {
            pending.push(PendingRef::DataTypeDerivedFrom { module, id });
        }
    }
    for (_, id, vt) in model.vertex_types.iter() {
        if vt.derivable.derived_from.is_some() {
            pending.push(PendingRef::VertexTypeDerivedFrom { module, id });
        }
        for (_, prop_id, _) in vt.slots.properties.iter() {
            pending.push(PendingRef::VertexTypePropertyType { module, owner: id, prop: prop_id });
        }
    }
    for (_, id, rt) in model.relationship_types.iter() {
        if rt.derivable.derived_from.is_some() {
            pending.push(PendingRef::RelationshipTypeDerivedFrom { module, id });
        }
        for (_, prop_id, _) in rt.slots.properties.iter() {
            pending.push(PendingRef::RelationshipTypePropertyType { module, owner: id, prop: prop_id });
        }
        for index in 0..rt.valid_source_types.len() {
            pending.push(PendingRef::ValidSourceType { module, owner: id, index });
        }
        for index in 0..rt.valid_target_types.len() {
            pending.push(PendingRef::ValidTargetType { module, owner: id, index });
        }
    }
}

/// Ontology-document counterpart to [`enqueue_model_pending`].
pub fn enqueue_ontology_pending(registry: &ModuleRegistry, module: ModuleId, pending: &mut Vec<PendingRef>) {
    let ontology = &registry.ontology(module).ontology;
    for (_, id, v) in ontology.vertices.iter() {
        pending.push(PendingRef::VertexInstanceType { module, id });
        for index in 0..v.core.properties.len() {
            pending.push(PendingRef::VertexPropertyAssignment { module, owner: id, index });
        }
        for index in 0..v.core.artifacts.len() {
            pending.push(PendingRef::VertexArtifactAssignment { module, owner: id, index });
        }
    }
    for (_, id, r) in ontology.relationships.iter() {
        pending.push(PendingRef::RelationshipInstanceType { module, id });
        pending.push(PendingRef::RelationshipSource { module, id });
        pending.push(PendingRef::RelationshipTarget { module, id });
        for index in 0..r.core.properties.len() {
            pending.push(PendingRef::RelationshipPropertyAssignment { module, owner: id, index });
        }
        for index in 0..r.core.artifacts.len() {
            pending.push(PendingRef::RelationshipArtifactAssignment { module, owner: id, index });
        }
    }
}

// ---------------------------------------------------------------------
// The pending reference queue
// ---------------------------------------------------------------------

/// A reference cell created during construction, paired with enough
/// information to find it again: which module owns it, and the exact path
/// down to the cell. Resolution is re-attempted by
/// [`Parser::finalize_references`](crate::parser::Parser::finalize_references)
/// until the queue stabilises.
pub enum PendingRef {
    DataTypeDerivedFrom { module: ModuleId, id: EntityId<DataType> },
    VertexTypeDerivedFrom { module: ModuleId, id: EntityId<VertexType> },
    RelationshipTypeDerivedFrom { module: ModuleId, id: EntityId<RelationshipType> },
    VertexTypePropertyType { module: ModuleId, owner: EntityId<VertexType>, prop: EntityId<PropertyDefinition> },
    RelationshipTypePropertyType { module: ModuleId, owner: EntityId<RelationshipType>, prop: EntityId<PropertyDefinition> },
    ValidSourceType { module: ModuleId, owner: EntityId<RelationshipType>, index: usize },
    ValidTargetType { module: ModuleId, owner: EntityId<RelationshipType>, index: usize },
    VertexInstanceType { module: ModuleId, id: EntityId<Vertex> },
    RelationshipInstanceType { module: ModuleId, id: EntityId<Relationship> },
    RelationshipSource { module: ModuleId, id: EntityId<Relationship> },
    RelationshipTarget { module: ModuleId, id: EntityId<Relationship> },
    VertexPropertyAssignment { module: ModuleId, owner: EntityId<Vertex>, index: usize },
    VertexArtifactAssignment { module: ModuleId, owner: EntityId<Vertex>, index: usize },
    RelationshipPropertyAssignment { module: ModuleId, owner: EntityId<Relationship>, index: usize },
    RelationshipArtifactAssignment { module: ModuleId, owner: EntityId<Relationship>, index: usize },
}

impl PendingRef {
    /// The section a diagnostic should name this cell's target kind as,
    /// once it never resolves and becomes an "unknown reference" error.
    #[must_use]
    pub fn target_section(&self) -> Section {
        match self {
            PendingRef::DataTypeDerivedFrom { .. }
            | PendingRef::VertexTypePropertyType { .. }
            | PendingRef::RelationshipTypePropertyType { .. } => Section::DataType,
            PendingRef::VertexTypeDerivedFrom { .. }
            | PendingRef::ValidSourceType { .. }
            | PendingRef::ValidTargetType { .. }
            | PendingRef::VertexInstanceType { .. } => Section::VertexType,
            PendingRef::RelationshipTypeDerivedFrom { .. } | PendingRef::RelationshipInstanceType { .. } => {
                Section::RelationshipType
            }
            PendingRef::RelationshipSource { .. } | PendingRef::RelationshipTarget { .. } => Section::Vertex,
            PendingRef::VertexPropertyAssignment { .. }
            | PendingRef::VertexArtifactAssignment { .. }
            | PendingRef::RelationshipPropertyAssignment { .. }
            | PendingRef::RelationshipArtifactAssignment { .. } => Section::VertexType,
        }
    }

    /// The authored alias and breadcrumb this cell is still waiting on,
    /// used to build the "unknown reference" error once this never
    /// resolves. `None` only when an owner-scoped cell's owner type itself
    /// never resolved, in which case the owner's own pending entry already
    /// carries the reportable alias.
    #[must_use]
    pub fn describe(&self, registry: &ModuleRegistry) -> Option<(String, Context)> {
        let cell_info = |alias: &str, ctx: &Context| Some((alias.to_string(), ctx.clone()));
        match self {
            PendingRef::DataTypeDerivedFrom { module, id } => registry
                .model(*module)
                .model
                .data_types
                .get(*id)
                .derivable
                .derived_from
                .as_ref()
                .and_then(|c| cell_info(c.alias(), c.context())),
            PendingRef::VertexTypeDerivedFrom { module, id } => registry
                .model(*module)
                .model
                .vertex_types
                .get(*id)
                .derivable
                .derived_from
                .as_ref()
                .and_then(|c| cell_info(c.alias(), c.context())),
            PendingRef::RelationshipTypeDerivedFrom { module, id } => registry
                .model(*module)
                .model
                .relationship_types
                .get(*id)
                .derivable
                .derived_from
                .as_ref()
                .and_then(|c| cell_info(c.alias(), c.context())),
            PendingRef::VertexTypePropertyType { module, owner, prop } => {
                let c = &registry.model(*module).model.vertex_types.get(*owner).slots.properties.get(*prop).r#type;
                cell_info(c.alias(), c.context())
            }
            PendingRef::RelationshipTypePropertyType { module, owner, prop } => {
                let c = &registry.model(*module).model.relationship_types.get(*owner).slots.properties.get(*prop).r#type;
                cell_info(c.alias(), c.context())
            }
            PendingRef::ValidSourceType { module, owner, index } => {
                let c = &registry.model(*module).model.relationship_types.get(*owner).valid_source_types[*index];
                cell_info(c.alias(), c.context())
            }
            PendingRef::ValidTargetType { module, owner, index } => {
                let c = &registry.model(*module).model.relationship_types.get(*owner).valid_target_types[*index];
                cell_info(c.alias(), c.context())
            }
            PendingRef::VertexInstanceType { module, id } => {
                let c = &registry.ontology(*module).ontology.vertices.get(*id).r#type;
                cell_info(c.alias(), c.context())
            }
            PendingRef::RelationshipInstanceType { module, id } => {
                let c = &registry.ontology(*module).ontology.relationships.get(*id).r#type;
                cell_info(c.alias(), c.context())
            }
            PendingRef::RelationshipSource { module, id } => {
                let c = &registry.ontology(*module).ontology.relationships.get(*id).source;
                cell_info(c.alias(), c.context())
            }
            PendingRef::RelationshipTarget { module, id } => {
                let c = &registry.ontology(*module).ontology.relationships.get(*id).target;
                cell_info(c.alias(), c.context())
            }
            PendingRef::VertexPropertyAssignment { module, owner, index } => {
                let c = &registry.ontology(*module).ontology.vertices.get(*owner).core.properties[*index].property;
                cell_info(c.alias(), c.context())
            }
            PendingRef::VertexArtifactAssignment { module, owner, index } => {
                let c = &registry.ontology(*module).ontology.vertices.get(*owner).core.artifacts[*index].artifact;
                cell_info(c.alias(), c.context())
            }
            PendingRef::RelationshipPropertyAssignment { module, owner, index } => {
                let c = &registry.ontology(*module).ontology.relationships.get(*owner).core.properties[*index].property;
                cell_info(c.alias(), c.context())
            }
            PendingRef::RelationshipArtifactAssignment { module, owner, index } => {
                let c = &registry.ontology(*module).ontology.relationships.get(*owner).core.artifacts[*index].artifact;
                cell_info(c.alias(), c.context())
            }
        }
    }

    /// Attempts to resolve this cell against the registry's current state,
    /// returning `true` once it is fulfilled (on this attempt or already).
    pub fn try_resolve(&self, registry: &mut ModuleRegistry) -> bool {
        match *self {
            PendingRef::DataTypeDerivedFrom { module, id } => {
                let alias = match registry.model(module).model.data_types.get(id).derivable.derived_from.as_ref() {
                    Some(c) => c.alias().to_string(),
                    None => return false,
                };
                let gid = match registry.lookup_data_type(&alias) {
                    Some(g) => g,
                    None => return false,
                };
                match registry.model_mut(module).model.data_types.get_mut(id).derivable.derived_from.as_mut() {
                    Some(c) => c.assign(gid.module, gid.id),
                    None => false,
                }
            }
            PendingRef::VertexTypeDerivedFrom { module, id } => {
                let alias = match registry.model(module).model.vertex_types.get(id).derivable.derived_from.as_ref() {
                    Some(c) => c.alias().to_string(),
                    None => return false,
                };
                let gid = match registry.lookup_vertex_type(&alias) {
                    Some(g) => g,
                    None => return false,
                };
                match registry.model_mut(module).model.vertex_types.get_mut(id).derivable.derived_from.as_mut() {
                    Some(c) => c.assign(gid.module, gid.id),
                    None => false,
                }
            }
            PendingRef::RelationshipTypeDerivedFrom { module, id } => {
                let alias = match registry.model(module).model.relationship_types.get(id).derivable.derived_from.as_ref() {
                    Some(c) => c.alias().to_string(),
                    None => return false,
                };
                let gid = match registry.lookup_relationship_type(&alias) {
                    Some(g) => g,
                    None => return false,
                };
                match registry.model_mut(module).model.relationship_types.get_mut(id).derivable.derived_from.as_mut() {
                    Some(c) => c.assign(gid.module, gid.id),
                    None => false,
                }
            }
            PendingRef::VertexTypePropertyType { module, owner, prop } => {
                let alias = registry.model(module).model.vertex_types.get(owner).slots.properties.get(prop).r#type.alias().to_string();
                let gid = match registry.lookup_data_type(&alias) {
                    Some(g) => g,
                    None => return false,
                };
                registry
                    .model_mut(module)
                    .model
                    .vertex_types
                    .get_mut(owner)
                    .slots
                    .properties
                    .get_mut(prop)
                    .r#type
                    .assign(gid.module, gid.id)
            }
            PendingRef::RelationshipTypePropertyType { module, owner, prop } => {
                let alias =
                    registry.model(module).model.relationship_types.get(owner).slots.properties.get(prop).r#type.alias().to_string();
                let gid = match registry.lookup_data_type(&alias) {
                    Some(g) => g,
                    None => return false,
                };
                registry
                    .model_mut(module)
                    .model
                    .relationship_types
                    .get_mut(owner)
                    .slots
                    .properties
                    .get_mut(prop)
                    .r#type
                    .assign(gid.module, gid.id)
            }
            PendingRef::ValidSourceType { module, owner, index } => {
                let alias = registry.model(module).model.relationship_types.get(owner).valid_source_types[index].alias().to_string();
                let gid = match registry.lookup_vertex_type(&alias) {
                    Some(g) => g,
                    None => return false,
                };
                registry.model_mut(module).model.relationship_types.get_mut(owner).valid_source_types[index]
                    .assign(gid.module, gid.id)
            }
            PendingRef::ValidTargetType { module, owner, index } => {
                let alias = registry.model(module).model.relationship_types.get(owner).valid_target_types[index].alias().to_string();
                let gid = match registry.lookup_vertex_type(&alias) {
                    Some(g) => g,
                    None => return false,
                };
                registry.model_mut(module).model.relationship_types.get_mut(owner).valid_target_types[index]
                    .assign(gid.module, gid.id)
            }
            PendingRef::VertexInstanceType { module, id } => {
                let alias = registry.ontology(module).ontology.vertices.get(id).r#type.alias().to_string();
                let gid = match registry.lookup_vertex_type(&alias) {
                    Some(g) => g,
                    None => return false,
                };
                registry.ontology_mut(module).ontology.vertices.get_mut(id).r#type.assign(gid.module, gid.id)
            }
            PendingRef::RelationshipInstanceType { module, id } => {
                let alias = registry.ontology(module).ontology.relationships.get(id).r#type.alias().to_string();
                let gid = match registry.lookup_relationship_type(&alias) {
                    Some(g) => g,
                    None => return false,
                };
                registry.ontology_mut(module).ontology.relationships.get_mut(id).r#type.assign(gid.module, gid.id)
            }
            PendingRef::RelationshipSource { module, id } => {
                let alias = registry.ontology(module).ontology.relationships.get(id).source.alias().to_string();
                let gid = match registry.lookup_vertex(&alias) {
                    Some(g) => g,
                    None => return false,
                };
                registry.ontology_mut(module).ontology.relationships.get_mut(id).source.assign(gid.module, gid.id)
            }
            PendingRef::RelationshipTarget { module, id } => {
                let alias = registry.ontology(module).ontology.relationships.get(id).target.alias().to_string();
                let gid = match registry.lookup_vertex(&alias) {
                    Some(g) => g,
                    None => return false,
                };
                registry.ontology_mut(module).ontology.relationships.get_mut(id).target.assign(gid.module, gid.id)
            }
            PendingRef::VertexPropertyAssignment { module, owner, index } => {
                let vertex = registry.ontology(module).ontology.vertices.get(owner);
                let type_gid = match vertex.r#type.value() {
                    Some(g) => g,
                    None => return false,
                };
                let alias = vertex.core.properties[index].property.alias().to_string();
                let prop_id = match registry.vertex_type(type_gid).slots.properties.get_by_name(&alias) {
                    Some(p) => p,
                    None => return false,
                };
                registry.ontology_mut(module).ontology.vertices.get_mut(owner).core.properties[index]
                    .property
                    .assign(type_gid.module, prop_id)
            }
            PendingRef::VertexArtifactAssignment { module, owner, index } => {
                let vertex = registry.ontology(module).ontology.vertices.get(owner);
                let type_gid = match vertex.r#type.value() {
                    Some(g) => g,
                    None => return false,
                };
                let alias = vertex.core.artifacts[index].artifact.alias().to_string();
                let art_id = match registry.vertex_type(type_gid).slots.artifacts.get_by_name(&alias) {
                    Some(a) => a,
                    None => return false,
                };
                registry.ontology_mut(module).ontology.vertices.get_mut(owner).core.artifacts[index]
                    .artifact
                    .assign(type_gid.module, art_id)
            }
            PendingRef::RelationshipPropertyAssignment { module, owner, index } => {
                let rel = registry.ontology(module).ontology.relationships.get(owner);
                let type_gid = match rel.r#type.value() {
                    Some(g) => g,
                    None => return false,
                };
                let alias = rel.core.properties[index].property.alias().to_string();
                let prop_id = match registry.relationship_type(type_gid).slots.properties.get_by_name(&alias) {
                    Some(p) => p,
                    None => return false,
                };
                registry.ontology_mut(module).ontology.relationships.get_mut(owner).core.properties[index]
                    .property
                    .assign(type_gid.module, prop_id)
            }
            PendingRef::RelationshipArtifactAssignment { module, owner, index } => {
                let rel = registry.ontology(module).ontology.relationships.get(owner);
                let type_gid = match rel.r#type.value() {
                    Some(g) => g,
                    None => return false,
                };
                let alias = rel.core.artifacts[index].artifact.alias().to_string();
                let art_id = match registry.relationship_type(type_gid).slots.artifacts.get_by_name(&alias) {
                    Some(a) => a,
                    None => return false,
                };
                registry.ontology_mut(module).ontology.relationships.get_mut(owner).core.artifacts[index]
                    .artifact
                    .assign(type_gid.module, art_id)
            }
        }
    }
}

// ---------------------------------------------------------------------
// Derivation chains
// ---------------------------------------------------------------------

/// Walks `derived_from` from `start` to its root, then reverses the order
/// so the result reads `[root, ..., start]`. Stops (without error) at the first absent or unfulfilled
/// link; a cycle produces an [`OntologyError`] rather than looping forever.
pub fn data_type_derivation_chain(
    registry: &ModuleRegistry,
    start: GlobalId<DataType>,
    ctx: &Context,
) -> Result<Vec<GlobalId<DataType>>, OntologyError> {
    let mut chain = Vec::new();
    let mut seen = HashSet::new();
    let mut current = Some(start);
    while let Some(gid) = current {
        if !seen.insert((gid.module, gid.id)) {
            return Err(OntologyError::new("cyclic data type derivation", ctx.clone()));
        }
        chain.push(gid);
        current = registry.data_type(gid).derivable.derived_from.as_ref().and_then(ReferenceCell::value);
    }
    chain.reverse();
    Ok(chain)
}

/// Vertex-type counterpart to [`data_type_derivation_chain`].
pub fn vertex_type_derivation_chain(
    registry: &ModuleRegistry,
    start: GlobalId<VertexType>,
    ctx: &Context,
) -> Result<Vec<GlobalId<VertexType>>, OntologyError> {
    let mut chain = Vec::new();
    let mut seen = HashSet::new();
    let mut current = Some(start);
    while let Some(gid) = current {
        if !seen.insert((gid.module, gid.id)) {
            return Err(OntologyError::new("cyclic vertex type derivation", ctx.clone()));
        }
        chain.push(gid);
        current = registry.vertex_type(gid).derivable.derived_from.as_ref().and_then(ReferenceCell::value);
    }
    chain.reverse();
    Ok(chain)
}

/// Relationship-type counterpart to [`data_type_derivation_chain`].
pub fn relationship_type_derivation_chain(
    registry: &ModuleRegistry,
    start: GlobalId<RelationshipType>,
    ctx: &Context,
) -> Result<Vec<GlobalId<RelationshipType>>, OntologyError> {
    let mut chain = Vec::new();
    let mut seen = HashSet::new();
    let mut current = Some(start);
    while let Some(gid) = current {
        if !seen.insert((gid.module, gid.id)) {
            return Err(OntologyError::new("cyclic relationship type derivation", ctx.clone()));
        }
        chain.push(gid);
        current = registry.relationship_type(gid).derivable.derived_from.as_ref().and_then(ReferenceCell::value);
    }
    chain.reverse();
    Ok(chain)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn ctx() -> Context {
        Context::root()
    }

    #[test]
    fn builds_data_types_with_unfulfilled_derived_from() {
        let doc: Value = serde_yaml::from_str(
            "data_types:\n  Text:\n    label: Plain text\n  LongText:\n    derived_from: Text\n",
        )
        .unwrap();
        let module = build_model(&doc, &PathBuf::from("/m.mdl.yml"), &ctx()).unwrap();
        assert_eq!(module.model.data_types.len(), 2);
        let long_text = module.model.data_types.get(module.model.data_types.get_by_name("LongText").unwrap());
        assert!(!long_text.derivable.derived_from.as_ref().unwrap().fulfilled());
    }

    #[test]
    fn duplicate_section_key_is_rejected() {
        let doc: Value = serde_yaml::from_str("data_types:\n  Text:\n    label: a\n").unwrap();
        assert!(build_model(&doc, &PathBuf::from("/m.mdl.yml"), &ctx()).is_ok());
    }

    #[test]
    fn resolving_derived_from_across_registry() {
        let doc: Value = serde_yaml::from_str(
            "data_types:\n  Text:\n    label: Plain text\n  LongText:\n    derived_from: Text\n",
        )
        .unwrap();
        let module = build_model(&doc, &PathBuf::from("/m.mdl.yml"), &ctx()).unwrap();
        let mut registry = ModuleRegistry::new();
        let id = registry.insert_model(PathBuf::from("/m.mdl.yml"), module);
        register_model_names(&mut registry, id);
        let mut pending = Vec::new();
        enqueue_model_pending(&registry, id, &mut pending);
        assert_eq!(pending.len(), 1);
        assert!(pending[0].try_resolve(&mut registry));

        let long_text_id = registry.model(id).model.data_types.get_by_name("LongText").unwrap();
        let chain = data_type_derivation_chain(
            &registry,
            GlobalId::new(id, long_text_id),
            &ctx(),
        )
        .unwrap();
        assert_eq!(chain.len(), 2);
    }

    #[test]
    fn ontology_assignment_pending_count() {
        let model_doc: Value = serde_yaml::from_str(
            "data_types:\n  Text:\n    label: t\nvertex_types:\n  Person:\n    properties:\n      name:\n        type: Text\n",
        )
        .unwrap();
        let model_module = build_model(&model_doc, &PathBuf::from("/m.mdl.yml"), &ctx()).unwrap();
        let mut registry = ModuleRegistry::new();
        let model_id = registry.insert_model(PathBuf::from("/m.mdl.yml"), model_module);
        register_model_names(&mut registry, model_id);
        let mut pending = Vec::new();
        enqueue_model_pending(&registry, model_id, &mut pending);
        for p in &pending {
            p.try_resolve(&mut registry);
        }

        let ont_doc: Value = serde_yaml::from_str(
            "vertices:\n  alice:\n    type: Person\n    properties:\n      name: Alice\n",
        )
        .unwrap();
        let ont_module = build_ontology(&ont_doc, &PathBuf::from("/o.ont.yml"), &ctx()).unwrap();
        let ont_id = registry.insert_ontology(PathBuf::from("/o.ont.yml"), ont_module);
        register_ontology_names(&mut registry, ont_id);
        let mut ont_pending = Vec::new();
        enqueue_ontology_pending(&registry, ont_id, &mut ont_pending);
        assert_eq!(ont_pending.len(), 2);

        let mut stable = false;
        while !stable {
            stable = true;
            ont_pending.retain(|p| {
                let resolved = p.try_resolve(&mut registry);
                if resolved {
                    stable = false;
                }
                !resolved
            });
        }
        assert!(ont_pending.is_empty());

        let alice_id = registry.ontology(ont_id).ontology.vertices.get_by_name("alice").unwrap();
        let alice = registry.ontology(ont_id).ontology.vertices.get(alice_id);
        assert!(alice.r#type.fulfilled());
        assert!(alice.core.properties[0].property.fulfilled());
    }
}
