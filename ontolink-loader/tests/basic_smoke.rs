#![allow(missing_docs)]

use ontolink_loader::prelude::*;

fn write(dir: &std::path::Path, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

#[test]
fn loads_a_model_and_checks_a_constraint_against_an_assigned_value() {
    let dir = tempfile::tempdir().unwrap();
    let model_path = write(
        dir.path(),
        "normative-types.mdl.yml",
        "data_types:\n  Text:\n    label: Plain text\n  ShortCode:\n    derived_from: Text\n    constraints:\n      - max_length: 8\nvertex_types:\n  Widget:\n    properties:\n      code:\n        type: ShortCode\n",
    );
    let ont_path = write(
        dir.path(),
        "widgets.ont.yml",
        "imports:\n  - normative-types.mdl.yml\nvertices:\n  w1:\n    type: Widget\n    properties:\n      code: ABC\n",
    );

    let mut parser = Parser::default();
    let ont_id = parser.load_ontology_yaml_file(&ont_path).unwrap();
    parser.finalize_references().unwrap();

    let registry = parser.registry();
    let w1_id = registry.ontology(ont_id).ontology.vertices.get_by_name("w1").unwrap();
    let w1 = registry.ontology(ont_id).ontology.vertices.get(w1_id);
    let code_assignment = &w1.core.properties[0];
    assert!(code_assignment.property.fulfilled());

    let code_type_id = registry.lookup_data_type("ShortCode").unwrap();
    let code_type = registry.data_type(code_type_id);
    for constraint in &code_type.constraints {
        assert!(constraint.check(&code_assignment.value, &Context::root()).unwrap());
    }
    let _ = model_path;
}

#[test]
fn shorthand_assignments_normalize_to_the_same_shape_as_the_long_form() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "normative-types.mdl.yml",
        "data_types:\n  Text:\n    label: t\nvertex_types:\n  Person:\n    properties:\n      nickname:\n        type: Text\n        allows_multiple: true\n",
    );
    let ont_path = write(
        dir.path(),
        "people.ont.yml",
        "imports:\n  - normative-types.mdl.yml\nvertices:\n  alice:\n    type: Person\n    properties:\n      nickname: [Ally, Al]\n",
    );
    let mut parser = Parser::default();
    let ont_id = parser.load_ontology_yaml_file(&ont_path).unwrap();
    parser.finalize_references().unwrap();

    let registry = parser.registry();
    let alice_id = registry.ontology(ont_id).ontology.vertices.get_by_name("alice").unwrap();
    let alice = registry.ontology(ont_id).ontology.vertices.get(alice_id);
    assert_eq!(alice.core.properties.len(), 2);
    assert!(alice.core.properties.iter().all(|p| p.property.fulfilled()));
}
