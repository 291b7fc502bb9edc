//! Shorthand normalisation for authored YAML surface forms.
//!
//! Every function here takes the already-parsed `serde_yaml::Value` node
//! for one authored construct and collapses its shorthand variants down to
//! the single canonical shape the two-phase builder in [`crate::build`]
//! consumes. Kept as plain functions over `serde_yaml::Value` rather than
//! `#[serde(untagged)]` enums because two of these
//! shapes — the import shorthand and the property-assignment shorthand —
//! use an arbitrary author-chosen string as a *map key*, which an untagged
//! enum over fixed field names cannot express; inspecting the `Value` tree
//! directly handles that uniformly alongside the fixed-field forms.

use ontolink_core::prelude::*;
use ontolink_core::error::LoadError;
use serde_yaml::Value;

/// One authored import entry, normalised from any of the three shorthand
/// forms: a bare path string, a single-entry `{alias: file}` map, or a
/// structured `{file, alias}` map.
pub fn parse_import(value: &Value, ctx: &Context) -> Result<ImportDefinition, LoadError> {
    match value {
        Value::String(path) => Ok(ImportDefinition {
            file: path.clone(),
            alias: None,
        }),
        Value::Mapping(map) => {
            if map.contains_key(Value::String("file".to_string())) {
                let file = map
                    .get(Value::String("file".to_string()))
                    .and_then(Value::as_str)
                    .ok_or_else(|| LoadError::new("import `file` must be a string", ctx.clone()))?
                    .to_string();
                let alias = map
                    .get(Value::String("alias".to_string()))
                    .map(|v| {
                        v.as_str()
                            .map(str::to_string)
                            .ok_or_else(|| LoadError::new("import `alias` must be a string", ctx.clone()))
                    })
                    .transpose()?;
                Ok(ImportDefinition { file, alias })
            } else if let Some((key, value)) = map.iter().next().filter(|_| map.len() == 1) {
                let alias = key
                    .as_str()
                    .ok_or_else(|| LoadError::new("import alias key must be a string", ctx.clone()))?
                    .to_string();
                let file = value
                    .as_str()
                    .ok_or_else(|| LoadError::new("import path value must be a string", ctx.clone()))?
                    .to_string();
                Ok(ImportDefinition {
                    file,
                    alias: Some(alias),
                })
            } else {
                Err(LoadError::new(
                    "import map shorthand must have exactly one entry, or use `file`/`alias` keys",
                    ctx.clone(),
                ))
            }
        }
        other => Err(LoadError::new(
            format!("import entry must be a string or map, got {other:?}"),
            ctx.clone(),
        )),
    }
}

/// Validates and collapses the whole `imports` list, enforcing alias
/// uniqueness.
pub fn parse_imports(value: Option<&Value>, ctx: &Context) -> Result<Vec<ImportDefinition>, LoadError> {
    let Some(value) = value else {
        return Ok(Vec::new());
    };
    let Value::Sequence(seq) = value else {
        return Err(LoadError::new("`imports` must be a list", ctx.clone()));
    };
    let mut imports = Vec::with_capacity(seq.len());
    let mut seen_aliases = std::collections::HashSet::new();
    for (i, entry) in seq.iter().enumerate() {
        let child_ctx = ctx.child("imports").child(i);
        let import = parse_import(entry, &child_ctx)?;
        if let Some(alias) = &import.alias {
            if !seen_aliases.insert(alias.clone()) {
                return Err(LoadError::new(
                    format!("duplicate import alias \"{alias}\""),
                    child_ctx,
                ));
            }
        }
        imports.push(import);
    }
    Ok(imports)
}

/// One authored `{kind: args}` constraint entry.
pub fn parse_constraint(value: &Value, ctx: &Context) -> Result<Constraint, LoadError> {
    let Value::Mapping(map) = value else {
        return Err(LoadError::new("constraint must be a single-entry map", ctx.clone()));
    };
    if map.len() != 1 {
        return Err(LoadError::new(
            "constraint map must have exactly one `{kind: args}` entry",
            ctx.clone(),
        ));
    }
    let (kind, args) = map.iter().next().expect("checked len == 1");
    let kind = kind
        .as_str()
        .ok_or_else(|| LoadError::new("constraint kind must be a string", ctx.clone()))?;
    if !Constraint::known_kinds().contains(&kind) {
        return Err(LoadError::new(format!("unknown constraint kind \"{kind}\""), ctx.clone()));
    }
    let args_json = yaml_to_json(args, ctx)?;
    build_constraint(kind, args_json, ctx)
}

fn build_constraint(kind: &str, args: serde_json::Value, ctx: &Context) -> Result<Constraint, LoadError> {
    let as_string = |v: &serde_json::Value| -> Result<String, LoadError> {
        v.as_str()
            .map(str::to_string)
            .ok_or_else(|| LoadError::new(format!("constraint \"{kind}\" args must be a string"), ctx.clone()))
    };
    let as_u64 = |v: &serde_json::Value| -> Result<u64, LoadError> {
        v.as_u64()
            .ok_or_else(|| LoadError::new(format!("constraint \"{kind}\" args must be a non-negative integer"), ctx.clone()))
    };
    let as_pair = |v: &serde_json::Value| -> Result<(serde_json::Value, serde_json::Value), LoadError> {
        let arr = v
            .as_array()
            .ok_or_else(|| LoadError::new(format!("constraint \"{kind}\" args must be a two-element list"), ctx.clone()))?;
        if arr.len() != 2 {
            return Err(LoadError::new(format!("constraint \"{kind}\" args must have exactly two elements"), ctx.clone()));
        }
        Ok((arr[0].clone(), arr[1].clone()))
    };
    let as_list = |v: &serde_json::Value| -> Result<Vec<serde_json::Value>, LoadError> {
        v.as_array()
            .cloned()
            .ok_or_else(|| LoadError::new(format!("constraint \"{kind}\" args must be a list"), ctx.clone()))
    };

    Ok(match kind {
        "less" => Constraint::Less(args),
        "greater" => Constraint::Greater(args),
        "less_or_equals" => Constraint::LessOrEquals(args),
        "greater_or_equals" => Constraint::GreaterOrEquals(args),
        "equals" => Constraint::Equals(args),
        "not_equals" => Constraint::NotEquals(args),
        "included" => Constraint::Included(as_list(&args)?),
        "not_included" => Constraint::NotIncluded(as_list(&args)?),
        "in_range" => {
            let (lo, hi) = as_pair(&args)?;
            Constraint::InRange(lo, hi)
        }
        "not_in_range" => {
            let (lo, hi) = as_pair(&args)?;
            Constraint::NotInRange(lo, hi)
        }
        "contains" => Constraint::Contains(as_string(&args)?),
        "not_contains" => Constraint::NotContains(as_string(&args)?),
        "starts_with" => Constraint::StartsWith(as_string(&args)?),
        "ends_with" => Constraint::EndsWith(as_string(&args)?),
        "matches" => Constraint::Matches(as_string(&args)?),
        "not_matches" => Constraint::NotMatches(as_string(&args)?),
        "length" => Constraint::Length(as_u64(&args)?),
        "min_length" => Constraint::MinLength(as_u64(&args)?),
        "max_length" => Constraint::MaxLength(as_u64(&args)?),
        other => return Err(LoadError::new(format!("unknown constraint kind \"{other}\""), ctx.clone())),
    })
}

/// Collapses a whole `constraints` list.
pub fn parse_constraints(value: Option<&Value>, ctx: &Context) -> Result<Vec<Constraint>, LoadError> {
    let Some(value) = value else {
        return Ok(Vec::new());
    };
    let Value::Sequence(seq) = value else {
        return Err(LoadError::new("`constraints` must be a list", ctx.clone()));
    };
    seq.iter()
        .enumerate()
        .map(|(i, v)| parse_constraint(v, &ctx.child("constraints").child(i)))
        .collect()
}

/// Normalises the authored value under one property name in an instance's
/// `properties` map into the list of raw per-assignment values it denotes.
/// The list form is used whenever the
/// author wrote a YAML sequence; scalar and structured single values each
/// produce a one-element list.
pub fn expand_property_values(value: &Value) -> Vec<Value> {
    match value {
        Value::Sequence(seq) => seq.clone(),
        other => vec![other.clone()],
    }
}

/// Extracts the scalar value carried by one property assignment entry,
/// accepting either a bare scalar or a `{value: ...}` structured shape.
pub fn property_assignment_value(entry: &Value, ctx: &Context) -> Result<serde_json::Value, LoadError> {
    match entry {
        Value::Mapping(map) => match map.get(Value::String("value".to_string())) {
            Some(inner) => yaml_to_json(inner, ctx),
            None => yaml_to_json(entry, ctx),
        },
        other => yaml_to_json(other, ctx),
    }
}

/// Normalises the authored value under one artifact name into the list of
/// raw per-assignment path strings it denotes: a bare path string, a
/// `{path: ...}` structured shape, or a list of either.
pub fn expand_artifact_values(value: &Value) -> Vec<Value> {
    match value {
        Value::Sequence(seq) => seq.clone(),
        other => vec![other.clone()],
    }
}

/// Extracts the path carried by one artifact assignment entry.
pub fn artifact_assignment_path(entry: &Value, ctx: &Context) -> Result<Option<String>, LoadError> {
    match entry {
        Value::String(s) => Ok(Some(s.clone())),
        Value::Mapping(map) => {
            let path = map
                .get(Value::String("path".to_string()))
                .map(|v| {
                    v.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| LoadError::new("artifact `path` must be a string", ctx.clone()))
                })
                .transpose()?;
            Ok(path)
        }
        other => Err(LoadError::new(
            format!("artifact assignment must be a string path or `{{path: ...}}` map, got {other:?}"),
            ctx.clone(),
        )),
    }
}

/// A module's `schema_definitions` map: `$name -> JSON Schema`. Keys must
/// match the `$`-prefixed identifier pattern.
pub fn parse_schema_definitions(
    value: Option<&Value>,
    ctx: &Context,
) -> Result<indexmap::IndexMap<String, serde_json::Value>, LoadError> {
    let Some(value) = value else {
        return Ok(indexmap::IndexMap::new());
    };
    let Value::Mapping(map) = value else {
        return Err(LoadError::new("`schema_definitions` must be a map", ctx.clone()));
    };
    let mut out = indexmap::IndexMap::new();
    for (k, v) in map {
        let key = k
            .as_str()
            .ok_or_else(|| LoadError::new("schema_definitions key must be a string", ctx.clone()))?;
        if !ontolink_core::schema::is_schema_definition_key(key) {
            return Err(LoadError::new(
                format!("schema_definitions key \"{key}\" must start with \"$\""),
                ctx.clone(),
            ));
        }
        let schema_json = yaml_to_json(v, ctx)?;
        ontolink_core::schema::validate_schema_definition(&schema_json, &ctx.child(key.to_string()))
            .map_err(|e| LoadError::new(e.to_string(), ctx.child(key.to_string())))?;
        out.insert(key.to_string(), schema_json);
    }
    Ok(out)
}

/// `DataType.object_schema`: either a `$name` reference or an inline
/// Draft-07 document.
pub fn parse_object_schema(
    value: Option<&Value>,
    ctx: &Context,
) -> Result<Option<(serde_json::Value, Option<String>)>, LoadError> {
    let Some(value) = value else {
        return Ok(None);
    };
    let schema_json = yaml_to_json(value, ctx)?;
    let reference = match &schema_json {
        serde_json::Value::String(s) if s.starts_with('$') => Some(s.clone()),
        _ => None,
    };
    Ok(Some((schema_json, reference)))
}

/// Converts a parsed YAML node into the equivalent JSON value, used for
/// every field this crate ultimately stores as `serde_json::Value`
/// (constraint args, default values, schema documents).
pub fn yaml_to_json(value: &Value, ctx: &Context) -> Result<serde_json::Value, LoadError> {
    serde_json::to_value(value).map_err(|e| LoadError::new(format!("could not convert YAML to JSON: {e}"), ctx.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> Context {
        Context::root()
    }

    #[test]
    fn bare_string_import_has_no_alias() {
        let v: Value = serde_yaml::from_str("\"normative-types.mdl.yml\"").unwrap();
        let import = parse_import(&v, &ctx()).unwrap();
        assert_eq!(import.file, "normative-types.mdl.yml");
        assert!(import.alias.is_none());
    }

    #[test]
    fn single_entry_map_import_is_alias_to_file() {
        let v: Value = serde_yaml::from_str("norm: normative-types.mdl.yml").unwrap();
        let import = parse_import(&v, &ctx()).unwrap();
        assert_eq!(import.alias.as_deref(), Some("norm"));
        assert_eq!(import.file, "normative-types.mdl.yml");
    }

    #[test]
    fn structured_import_uses_explicit_keys() {
        let v: Value = serde_yaml::from_str("file: normative-types.mdl.yml\nalias: norm").unwrap();
        let import = parse_import(&v, &ctx()).unwrap();
        assert_eq!(import.alias.as_deref(), Some("norm"));
        assert_eq!(import.file, "normative-types.mdl.yml");
    }

    #[test]
    fn duplicate_import_alias_is_rejected() {
        let v: Value = serde_yaml::from_str("- a: one.yml\n- a: two.yml").unwrap();
        let err = parse_imports(Some(&v), &ctx()).unwrap_err();
        assert!(err.message.contains("duplicate import alias"));
    }

    #[test]
    fn constraint_shorthand_parses_known_kind() {
        let v: Value = serde_yaml::from_str("max_length: 10").unwrap();
        let c = parse_constraint(&v, &ctx()).unwrap();
        assert_eq!(c.kind_name(), "max_length");
    }

    #[test]
    fn constraint_shorthand_rejects_unknown_kind() {
        let v: Value = serde_yaml::from_str("bogus_kind: 10").unwrap();
        assert!(parse_constraint(&v, &ctx()).is_err());
    }

    #[test]
    fn property_value_accepts_scalar_and_structured() {
        let scalar: Value = serde_yaml::from_str("42").unwrap();
        assert_eq!(property_assignment_value(&scalar, &ctx()).unwrap(), serde_json::json!(42));

        let structured: Value = serde_yaml::from_str("value: 42").unwrap();
        assert_eq!(property_assignment_value(&structured, &ctx()).unwrap(), serde_json::json!(42));
    }

    #[test]
    fn artifact_path_accepts_string_and_structured() {
        let s: Value = serde_yaml::from_str("\"photo.png\"").unwrap();
        assert_eq!(artifact_assignment_path(&s, &ctx()).unwrap().as_deref(), Some("photo.png"));

        let structured: Value = serde_yaml::from_str("path: photo.png").unwrap();
        assert_eq!(artifact_assignment_path(&structured, &ctx()).unwrap().as_deref(), Some("photo.png"));
    }

    #[test]
    fn object_schema_reference_is_recognised() {
        let v: Value = serde_yaml::from_str("\"$point\"").unwrap();
        let (_, reference) = parse_object_schema(Some(&v), &ctx()).unwrap().unwrap();
        assert_eq!(reference.as_deref(), Some("$point"));
    }
}
