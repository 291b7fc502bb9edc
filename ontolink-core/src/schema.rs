//! JSON Schema support for `object_schema`.
//!
//! A data type's `object_schema` is authored either inline, as a full
//! Draft-07 schema object, or as a `$name` string indirecting into the
//! owning model's `schema_definitions` table. Resolution happens once,
//! while loading the model; the resolved schema is cached alongside the
//! reference so downstream validation never re-resolves it.

use serde_json::Value;

use crate::context::Context;
use crate::error::OntologyError;

/// Checks that `schema` is itself a well-formed Draft-07 schema document,
/// rejecting the data type's `object_schema` before it is ever used to
/// validate instance data.
pub fn validate_schema_definition(schema: &Value, context: &Context) -> Result<(), OntologyError> {
    jsonschema::options()
        .with_draft(jsonschema::Draft::Draft7)
        .build(schema)
        .map(|_| ())
        .map_err(|e| OntologyError::new(format!("invalid JSON Schema: {e}"), context.clone()))
}

/// A named entry in a module's `schema_definitions` table must use a `$`
/// prefix, matching the key shape the shorthand-reference form expects.
#[must_use]
pub fn is_schema_definition_key(key: &str) -> bool {
    key.starts_with('$') && key.len() > 1
}

/// Resolves a `DataType.object_schema` value into the schema it actually
/// denotes: returned as-is if authored inline, or looked up by name if
/// authored as a `$name` string reference.
pub fn resolve_object_schema<'a>(
    object_schema: &'a Value,
    schema_definitions: &'a indexmap::IndexMap<String, Value>,
    context: &Context,
) -> Result<&'a Value, OntologyError> {
    match object_schema {
        Value::String(name) => schema_definitions.get(name).ok_or_else(|| {
            OntologyError::new(format!("invalid schema reference \"{name}\""), context.clone())
        }),
        other => Ok(other),
    }
}

/// Validates `value` against an already-resolved Draft-07 `object_schema`.
pub fn validate_value(schema: &Value, value: &Value, context: &Context) -> Result<(), OntologyError> {
    let validator = jsonschema::options()
        .with_draft(jsonschema::Draft::Draft7)
        .build(schema)
        .map_err(|e| OntologyError::new(format!("invalid JSON Schema: {e}"), context.clone()))?;
    let errors: Vec<String> = validator.iter_errors(value).map(|e| e.to_string()).collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(OntologyError::new(
            format!("value does not satisfy schema: {}", errors.join("; ")),
            context.clone(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rejects_malformed_schema() {
        let bad = json!({"type": "not-a-real-type"});
        assert!(validate_schema_definition(&bad, &Context::root()).is_err());
    }

    #[test]
    fn accepts_well_formed_schema() {
        let good = json!({"type": "object", "properties": {"x": {"type": "integer"}}});
        assert!(validate_schema_definition(&good, &Context::root()).is_ok());
    }

    #[test]
    fn resolves_named_schema_reference() {
        let mut defs = indexmap::IndexMap::new();
        defs.insert("$point".to_string(), json!({"type": "object"}));
        let resolved = resolve_object_schema(&json!("$point"), &defs, &Context::root()).unwrap();
        assert_eq!(resolved, &json!({"type": "object"}));
    }

    #[test]
    fn unknown_schema_reference_errors() {
        let defs = indexmap::IndexMap::new();
        assert!(resolve_object_schema(&json!("$missing"), &defs, &Context::root()).is_err());
    }

    #[test]
    fn validates_value_against_schema() {
        let schema = json!({"type": "integer"});
        assert!(validate_value(&schema, &json!(5), &Context::root()).is_ok());
        assert!(validate_value(&schema, &json!("nope"), &Context::root()).is_err());
    }
}
