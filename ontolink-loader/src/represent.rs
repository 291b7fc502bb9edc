//! Canonical representation / export: turning a loaded module back into
//! the single canonical YAML shape it would have been authored in, with
//! every shorthand collapsed to its one canonical form.
//!
//! Builds a `serde_yaml::Value`/`IndexMap` tree field-by-field with `if let
//! Some(...)` guards skipping absent values, rather than deriving
//! `Serialize` on the domain structs directly — the domain structs here
//! hold `ReferenceCell`s and arena handles that have no context-free
//! `Serialize` impl of their own, so manual tree-building is the only
//! option. The assignment-grouping algorithm (scalar vs. list collapse,
//! duplicate-single-valued-assignment detection) mirrors how property and
//! artifact assignments are authored in the first place.

use indexmap::IndexMap;
use serde_yaml::Value as Yaml;

use ontolink_core::constraint::Constraint;
use ontolink_core::error::OntologyError;
use ontolink_core::prelude::*;

use crate::registry::ModuleRegistry;

fn json_to_yaml(value: &serde_json::Value) -> Yaml {
    serde_yaml::to_value(value).unwrap_or(Yaml::Null)
}

fn yaml_map(entries: Vec<(&str, Yaml)>) -> Yaml {
    let mut map = serde_yaml::Mapping::new();
    for (k, v) in entries {
        if !matches!(v, Yaml::Null) {
            map.insert(Yaml::String(k.to_string()), v);
        }
    }
    Yaml::Mapping(map)
}

/// Collapses one constraint back to its authored `{kind: args}` shorthand.
fn constraint_to_yaml(constraint: &Constraint) -> Yaml {
    let args = match constraint {
        Constraint::Less(v) | Constraint::Greater(v) | Constraint::LessOrEquals(v) | Constraint::GreaterOrEquals(v)
        | Constraint::Equals(v) | Constraint::NotEquals(v) => json_to_yaml(v),
        Constraint::Included(v) | Constraint::NotIncluded(v) => {
            Yaml::Sequence(v.iter().map(json_to_yaml).collect())
        }
        Constraint::InRange(lo, hi) | Constraint::NotInRange(lo, hi) => {
            Yaml::Sequence(vec![json_to_yaml(lo), json_to_yaml(hi)])
        }
        Constraint::Contains(s) | Constraint::NotContains(s) | Constraint::StartsWith(s)
        | Constraint::EndsWith(s) | Constraint::Matches(s) | Constraint::NotMatches(s) => Yaml::String(s.clone()),
        Constraint::Length(n) | Constraint::MinLength(n) | Constraint::MaxLength(n) => Yaml::Number((*n).into()),
    };
    let mut map = serde_yaml::Mapping::new();
    map.insert(Yaml::String(constraint.kind_name().to_string()), args);
    Yaml::Mapping(map)
}

/// Collapses an import edge back to its shorthand: `{alias: file}` when an
/// alias is present, otherwise the bare path string.
fn import_to_yaml(import: &ImportDefinition) -> Yaml {
    match &import.alias {
        Some(alias) => {
            let mut map = serde_yaml::Mapping::new();
            map.insert(Yaml::String(alias.clone()), Yaml::String(import.file.clone()));
            Yaml::Mapping(map)
        }
        None => Yaml::String(import.file.clone()),
    }
}

fn imports_to_yaml(imports: &[ImportDefinition]) -> Option<Yaml> {
    if imports.is_empty() {
        None
    } else {
        Some(Yaml::Sequence(imports.iter().map(import_to_yaml).collect()))
    }
}

fn dt_alias(registry: &ModuleRegistry, cell: &ReferenceCell<DataType>) -> String {
    cell.value()
        .and_then(|gid| registry.model(gid.module).model.data_types.name_of(gid.id).map(str::to_string))
        .unwrap_or_else(|| cell.alias().to_string())
}

fn vt_alias(registry: &ModuleRegistry, cell: &ReferenceCell<VertexType>) -> String {
    cell.value()
        .and_then(|gid| registry.model(gid.module).model.vertex_types.name_of(gid.id).map(str::to_string))
        .unwrap_or_else(|| cell.alias().to_string())
}

fn rt_alias(registry: &ModuleRegistry, cell: &ReferenceCell<RelationshipType>) -> String {
    cell.value()
        .and_then(|gid| registry.model(gid.module).model.relationship_types.name_of(gid.id).map(str::to_string))
        .unwrap_or_else(|| cell.alias().to_string())
}

fn derivable_fields<T>(derivable: &ontolink_core::model::Derivable<T>, derived_alias: Option<String>) -> Vec<(&'static str, Yaml)> {
    let mut fields = Vec::new();
    if let Some(label) = &derivable.label {
        fields.push(("label", Yaml::String(label.clone())));
    }
    if let Some(description) = &derivable.description {
        fields.push(("description", Yaml::String(description.clone())));
    }
    if let Some(alias) = derived_alias {
        fields.push(("derived_from", Yaml::String(alias)));
    }
    fields
}

fn property_definition_to_yaml(registry: &ModuleRegistry, prop: &PropertyDefinition) -> Yaml {
    let mut fields = vec![("type", Yaml::String(dt_alias(registry, &prop.r#type)))];
    if let Some(label) = &prop.label {
        fields.push(("label", Yaml::String(label.clone())));
    }
    if let Some(description) = &prop.description {
        fields.push(("description", Yaml::String(description.clone())));
    }
    if prop.required {
        fields.push(("required", Yaml::Bool(true)));
    }
    if !prop.allows_multiple {
        fields.push(("allows_multiple", Yaml::Bool(false)));
    }
    if let Some(default) = &prop.default {
        fields.push(("default", json_to_yaml(default)));
    }
    if let Some(min) = prop.min_assignments {
        fields.push(("min_assignments", Yaml::Number(min.into())));
    }
    if let Some(max) = prop.max_assignments {
        fields.push(("max_assignments", Yaml::Number(max.into())));
    }
    yaml_map(fields)
}

fn artifact_definition_to_yaml(art: &ArtifactDefinition) -> Yaml {
    let mut fields = Vec::new();
    if let Some(label) = &art.label {
        fields.push(("label", Yaml::String(label.clone())));
    }
    if let Some(description) = &art.description {
        fields.push(("description", Yaml::String(description.clone())));
    }
    if let Some(default_path) = &art.default_path {
        fields.push(("default_path", Yaml::String(default_path.clone())));
    }
    if art.mime_type != "application/octet-stream" {
        fields.push(("mime_type", Yaml::String(art.mime_type.clone())));
    }
    if art.required {
        fields.push(("required", Yaml::Bool(true)));
    }
    if !art.allows_multiple {
        fields.push(("allows_multiple", Yaml::Bool(false)));
    }
    if let Some(min) = art.min_assignments {
        fields.push(("min_assignments", Yaml::Number(min.into())));
    }
    if let Some(max) = art.max_assignments {
        fields.push(("max_assignments", Yaml::Number(max.into())));
    }
    yaml_map(fields)
}

fn instancable_slots_to_yaml(registry: &ModuleRegistry, slots: &InstancableSlots) -> Vec<(&'static str, Yaml)> {
    let mut fields = Vec::new();
    if !slots.properties.is_empty() {
        let mut map = serde_yaml::Mapping::new();
        for (name, _, prop) in slots.properties.iter() {
            map.insert(Yaml::String(name.to_string()), property_definition_to_yaml(registry, prop));
        }
        fields.push(("properties", Yaml::Mapping(map)));
    }
    if !slots.artifacts.is_empty() {
        let mut map = serde_yaml::Mapping::new();
        for (name, _, art) in slots.artifacts.iter() {
            map.insert(Yaml::String(name.to_string()), artifact_definition_to_yaml(art));
        }
        fields.push(("artifacts", Yaml::Mapping(map)));
    }
    if let Some(metadata) = &slots.metadata {
        fields.push(("metadata", json_to_yaml(metadata)));
    }
    fields
}

/// Builds the canonical document tree for a loaded model module.
#[must_use]
pub fn represent_model(registry: &ModuleRegistry, module: ModuleId) -> Yaml {
    let model = &registry.model(module).model;
    let mut top = vec![("name", Yaml::String(model.name.clone()))];

    if let Some(imports) = imports_to_yaml(&model.imports) {
        top.push(("imports", imports));
    }
    if !model.schema_definitions.is_empty() {
        let mut map = serde_yaml::Mapping::new();
        for (k, v) in &model.schema_definitions {
            map.insert(Yaml::String(k.clone()), json_to_yaml(v));
        }
        top.push(("schema_definitions", Yaml::Mapping(map)));
    }
    if !model.data_types.is_empty() {
        let mut map = serde_yaml::Mapping::new();
        for (name, _, dt) in model.data_types.iter() {
            let derived = dt.derivable.derived_from.as_ref().map(|c| dt_alias(registry, c));
            let mut fields = derivable_fields(&dt.derivable, derived);
            if !dt.constraints.is_empty() {
                fields.push(("constraints", Yaml::Sequence(dt.constraints.iter().map(constraint_to_yaml).collect())));
            }
            if let Some(schema) = &dt.object_schema {
                fields.push(("object_schema", json_to_yaml(schema)));
            }
            map.insert(Yaml::String(name.to_string()), yaml_map(fields));
        }
        top.push(("data_types", Yaml::Mapping(map)));
    }
    if !model.vertex_types.is_empty() {
        let mut map = serde_yaml::Mapping::new();
        for (name, _, vt) in model.vertex_types.iter() {
            let derived = vt.derivable.derived_from.as_ref().map(|c| vt_alias(registry, c));
            let mut fields = derivable_fields(&vt.derivable, derived);
            fields.extend(instancable_slots_to_yaml(registry, &vt.slots));
            map.insert(Yaml::String(name.to_string()), yaml_map(fields));
        }
        top.push(("vertex_types", Yaml::Mapping(map)));
    }
    if !model.relationship_types.is_empty() {
        let mut map = serde_yaml::Mapping::new();
        for (name, _, rt) in model.relationship_types.iter() {
            let derived = rt.derivable.derived_from.as_ref().map(|c| rt_alias(registry, c));
            let mut fields = derivable_fields(&rt.derivable, derived);
            fields.extend(instancable_slots_to_yaml(registry, &rt.slots));
            if !rt.valid_source_types.is_empty() {
                fields.push((
                    "valid_source_types",
                    Yaml::Sequence(rt.valid_source_types.iter().map(|c| Yaml::String(vt_alias(registry, c))).collect()),
                ));
            }
            if !rt.valid_target_types.is_empty() {
                fields.push((
                    "valid_target_types",
                    Yaml::Sequence(rt.valid_target_types.iter().map(|c| Yaml::String(vt_alias(registry, c))).collect()),
                ));
            }
            map.insert(Yaml::String(name.to_string()), yaml_map(fields));
        }
        top.push(("relationship_types", Yaml::Mapping(map)));
    }

    yaml_map(top)
}

/// Groups a flat list of property assignments by authored alias, collapsing
/// each group to the scalar or list form its property definition's
/// `allows_multiple` calls for.
/// Raises [`OntologyError`] if more than one value is assigned to an alias
/// that does not allow multiple assignments.
fn group_property_assignments(registry: &ModuleRegistry, assignments: &[PropertyAssignment]) -> Result<Yaml, OntologyError> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: IndexMap<String, (bool, Vec<Yaml>)> = IndexMap::new();
    for assignment in assignments {
        let alias = assignment.property.alias().to_string();
        let allows_multiple = assignment
            .property
            .value()
            .map(|gid| property_definition_by_global_id(registry, gid).allows_multiple)
            .unwrap_or(true);
        let entry = groups.entry(alias.clone()).or_insert_with(|| {
            order.push(alias.clone());
            (allows_multiple, Vec::new())
        });
        entry.1.push(json_to_yaml(&assignment.value));
    }
    let mut map = serde_yaml::Mapping::new();
    for alias in order {
        let (allows_multiple, values) = &groups[&alias];
        if *allows_multiple {
            map.insert(Yaml::String(alias), Yaml::Sequence(values.clone()));
        } else {
            if values.len() > 1 {
                return Err(OntologyError::new(
                    format!("property \"{alias}\" does not allow multiple assignments but has {}", values.len()),
                    assignment_context(assignments, &alias),
                ));
            }
            map.insert(Yaml::String(alias), values[0].clone());
        }
    }
    Ok(Yaml::Mapping(map))
}

fn assignment_context(assignments: &[PropertyAssignment], alias: &str) -> Context {
    assignments
        .iter()
        .find(|a| a.property.alias() == alias)
        .map(|a| a.property.context().clone())
        .unwrap_or_else(Context::root)
}

/// Fetches the [`PropertyDefinition`] a fulfilled property reference cell
/// resolved to. The cell's `GlobalId` always addresses an entity inside the
/// owning vertex/relationship type's own `slots.properties` arena
/// (owner-scoped resolution), never a module-level one, so the lookup must
/// go through every instancable arena the module registry exposes.
fn property_definition_by_global_id(registry: &ModuleRegistry, gid: GlobalId<PropertyDefinition>) -> &PropertyDefinition {
    for (_, _, vt) in registry.model(gid.module).model.vertex_types.iter() {
        if let Some(found) = vt.slots.properties.iter().find(|(_, id, _)| *id == gid.id) {
            return found.2;
        }
    }
    for (_, _, rt) in registry.model(gid.module).model.relationship_types.iter() {
        if let Some(found) = rt.slots.properties.iter().find(|(_, id, _)| *id == gid.id) {
            return found.2;
        }
    }
    panic!("property reference resolved to an id absent from every instancable type in its module")
}

fn artifact_definition_by_global_id(registry: &ModuleRegistry, gid: GlobalId<ArtifactDefinition>) -> &ArtifactDefinition {
    for (_, _, vt) in registry.model(gid.module).model.vertex_types.iter() {
        if let Some(found) = vt.slots.artifacts.iter().find(|(_, id, _)| *id == gid.id) {
            return found.2;
        }
    }
    for (_, _, rt) in registry.model(gid.module).model.relationship_types.iter() {
        if let Some(found) = rt.slots.artifacts.iter().find(|(_, id, _)| *id == gid.id) {
            return found.2;
        }
    }
    panic!("artifact reference resolved to an id absent from every instancable type in its module")
}

fn group_artifact_assignments(registry: &ModuleRegistry, assignments: &[ArtifactAssignment]) -> Result<Yaml, OntologyError> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: IndexMap<String, (bool, Vec<Yaml>)> = IndexMap::new();
    for assignment in assignments {
        let alias = assignment.artifact.alias().to_string();
        let allows_multiple = assignment
            .artifact
            .value()
            .map(|gid| artifact_definition_by_global_id(registry, gid).allows_multiple)
            .unwrap_or(true);
        let value = match &assignment.path {
            Some(p) => Yaml::String(p.clone()),
            None => Yaml::Null,
        };
        let entry = groups.entry(alias.clone()).or_insert_with(|| {
            order.push(alias.clone());
            (allows_multiple, Vec::new())
        });
        entry.1.push(value);
    }
    let mut map = serde_yaml::Mapping::new();
    for alias in order {
        let (allows_multiple, values) = &groups[&alias];
        if *allows_multiple {
            map.insert(Yaml::String(alias), Yaml::Sequence(values.clone()));
        } else {
            if values.len() > 1 {
                return Err(OntologyError::new(
                    format!("artifact \"{alias}\" does not allow multiple assignments but has {}", values.len()),
                    Context::root(),
                ));
            }
            map.insert(Yaml::String(alias), values[0].clone());
        }
    }
    Ok(Yaml::Mapping(map))
}

fn vertex_to_yaml(registry: &ModuleRegistry, vertex: &Vertex) -> Result<Yaml, OntologyError> {
    let mut fields = vec![("type", Yaml::String(vt_alias(registry, &vertex.r#type)))];
    if let Some(label) = &vertex.core.label {
        fields.push(("label", Yaml::String(label.clone())));
    }
    if let Some(description) = &vertex.core.description {
        fields.push(("description", Yaml::String(description.clone())));
    }
    if !vertex.core.properties.is_empty() {
        fields.push(("properties", group_property_assignments(registry, &vertex.core.properties)?));
    }
    if !vertex.core.artifacts.is_empty() {
        fields.push(("artifacts", group_artifact_assignments(registry, &vertex.core.artifacts)?));
    }
    if let Some(metadata) = &vertex.core.metadata {
        fields.push(("metadata", json_to_yaml(metadata)));
    }
    Ok(yaml_map(fields))
}

fn relationship_to_yaml(registry: &ModuleRegistry, rel: &Relationship) -> Result<Yaml, OntologyError> {
    let source_name = rel
        .source
        .value()
        .and_then(|gid| registry.ontology(gid.module).ontology.vertices.name_of(gid.id).map(str::to_string))
        .unwrap_or_else(|| rel.source.alias().to_string());
    let target_name = rel
        .target
        .value()
        .and_then(|gid| registry.ontology(gid.module).ontology.vertices.name_of(gid.id).map(str::to_string))
        .unwrap_or_else(|| rel.target.alias().to_string());

    let mut fields = vec![
        ("type", Yaml::String(rt_alias(registry, &rel.r#type))),
        ("source", Yaml::String(source_name)),
        ("target", Yaml::String(target_name)),
    ];
    if let Some(label) = &rel.core.label {
        fields.push(("label", Yaml::String(label.clone())));
    }
    if let Some(description) = &rel.core.description {
        fields.push(("description", Yaml::String(description.clone())));
    }
    if !rel.core.properties.is_empty() {
        fields.push(("properties", group_property_assignments(registry, &rel.core.properties)?));
    }
    if !rel.core.artifacts.is_empty() {
        fields.push(("artifacts", group_artifact_assignments(registry, &rel.core.artifacts)?));
    }
    if let Some(metadata) = &rel.core.metadata {
        fields.push(("metadata", json_to_yaml(metadata)));
    }
    Ok(yaml_map(fields))
}

/// Builds the canonical document tree for a loaded ontology module.
pub fn represent_ontology(registry: &ModuleRegistry, module: ModuleId) -> Result<Yaml, OntologyError> {
    let ontology = &registry.ontology(module).ontology;
    let mut top = vec![("name", Yaml::String(ontology.name.clone()))];

    if let Some(imports) = imports_to_yaml(&ontology.imports) {
        top.push(("imports", imports));
    }
    if !ontology.vertices.is_empty() {
        let mut map = serde_yaml::Mapping::new();
        for (name, _, v) in ontology.vertices.iter() {
            map.insert(Yaml::String(name.to_string()), vertex_to_yaml(registry, v)?);
        }
        top.push(("vertices", Yaml::Mapping(map)));
    }
    if !ontology.relationships.is_empty() {
        let mut map = serde_yaml::Mapping::new();
        for (name, _, r) in ontology.relationships.iter() {
            map.insert(Yaml::String(name.to_string()), relationship_to_yaml(registry, r)?);
        }
        top.push(("relationships", Yaml::Mapping(map)));
    }

    Ok(yaml_map(top))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::{build_model, build_ontology, enqueue_model_pending, enqueue_ontology_pending, register_model_names, register_ontology_names};
    use std::path::PathBuf;

    fn ctx() -> Context {
        Context::root()
    }

    #[test]
    fn import_shorthand_collapses_to_alias_map() {
        let import = ImportDefinition { file: "a.mdl.yml".to_string(), alias: Some("a".to_string()) };
        let yaml = import_to_yaml(&import);
        assert_eq!(serde_yaml::to_string(&yaml).unwrap().trim(), "a: a.mdl.yml");
    }

    #[test]
    fn bare_import_with_no_alias_collapses_to_string() {
        let import = ImportDefinition { file: "a.mdl.yml".to_string(), alias: None };
        assert_eq!(import_to_yaml(&import), Yaml::String("a.mdl.yml".to_string()));
    }

    #[test]
    fn represents_model_with_derivation_alias() {
        let doc: serde_yaml::Value = serde_yaml::from_str(
            "data_types:\n  Text:\n    label: Plain text\n  LongText:\n    derived_from: Text\n    max_length: 1000\n",
        )
        .unwrap();
        let module = build_model(&doc, &PathBuf::from("/m.mdl.yml"), &ctx()).unwrap();
        let mut registry = ModuleRegistry::new();
        let id = registry.insert_model(PathBuf::from("/m.mdl.yml"), module);
        register_model_names(&mut registry, id);
        let mut pending = Vec::new();
        enqueue_model_pending(&registry, id, &mut pending);
        for p in &pending {
            p.try_resolve(&mut registry);
        }
        let yaml = represent_model(&registry, id);
        let rendered = serde_yaml::to_string(&yaml).unwrap();
        assert!(rendered.contains("derived_from: Text"));
    }

    #[test]
    fn represents_ontology_vertex_with_scalar_property() {
        let model_doc: serde_yaml::Value = serde_yaml::from_str(
            "data_types:\n  Text:\n    label: t\nvertex_types:\n  Person:\n    properties:\n      name:\n        type: Text\n        allows_multiple: false\n",
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

        let ont_doc: serde_yaml::Value = serde_yaml::from_str("vertices:\n  alice:\n    type: Person\n    properties:\n      name: Alice\n").unwrap();
        let ont_module = build_ontology(&ont_doc, &PathBuf::from("/o.ont.yml"), &ctx()).unwrap();
        let ont_id = registry.insert_ontology(PathBuf::from("/o.ont.yml"), ont_module);
        register_ontology_names(&mut registry, ont_id);
        let mut ont_pending = Vec::new();
        enqueue_ontology_pending(&registry, ont_id, &mut ont_pending);
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

        let yaml = represent_ontology(&registry, ont_id).unwrap();
        let rendered = serde_yaml::to_string(&yaml).unwrap();
        assert!(rendered.contains("name: Alice"));
        assert!(!rendered.contains("- Alice"));
    }
}
