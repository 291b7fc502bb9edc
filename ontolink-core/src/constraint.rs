//! The closed set of constraint kinds a `DataType` may carry, each a pure
//! predicate over a `serde_json::Value`.
//!
//! `check` dispatches uniformly to [`Constraint::predicate`] rather than
//! recursing into itself, and `Equals`/`NotEquals` report distinct kind
//! names so the two can never be confused by a lookup keyed on that name.

use regex::Regex;
use serde_json::Value;

use crate::context::Context;
use crate::error::CheckConstraintError;

/// One of the nineteen constraint kinds, each carrying its authored `args`
/// payload verbatim.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", content = "args", rename_all = "snake_case")]
pub enum Constraint {
    Less(Value),
    Greater(Value),
    LessOrEquals(Value),
    GreaterOrEquals(Value),
    Equals(Value),
    NotEquals(Value),
    Included(Vec<Value>),
    NotIncluded(Vec<Value>),
    InRange(Value, Value),
    NotInRange(Value, Value),
    Contains(String),
    NotContains(String),
    StartsWith(String),
    EndsWith(String),
    Matches(String),
    NotMatches(String),
    Length(u64),
    MinLength(u64),
    MaxLength(u64),
}

impl Constraint {
    /// The wire name used in the one-entry `{kind: args}` shorthand map.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Constraint::Less(_) => "less",
            Constraint::Greater(_) => "greater",
            Constraint::LessOrEquals(_) => "less_or_equals",
            Constraint::GreaterOrEquals(_) => "greater_or_equals",
            Constraint::Equals(_) => "equals",
            Constraint::NotEquals(_) => "not_equals",
            Constraint::Included(_) => "included",
            Constraint::NotIncluded(_) => "not_included",
            Constraint::InRange(_, _) => "in_range",
            Constraint::NotInRange(_, _) => "not_in_range",
            Constraint::Contains(_) => "contains",
            Constraint::NotContains(_) => "not_contains",
            Constraint::StartsWith(_) => "starts_with",
            Constraint::EndsWith(_) => "ends_with",
            Constraint::Matches(_) => "matches",
            Constraint::NotMatches(_) => "not_matches",
            Constraint::Length(_) => "length",
            Constraint::MinLength(_) => "min_length",
            Constraint::MaxLength(_) => "max_length",
        }
    }

    /// All recognized kind names, used by the shorthand-map deserializer to
    /// reject unknown constraint kinds with a useful message.
    #[must_use]
    pub fn known_kinds() -> &'static [&'static str] {
        &[
            "less",
            "greater",
            "less_or_equals",
            "greater_or_equals",
            "equals",
            "not_equals",
            "included",
            "not_included",
            "in_range",
            "not_in_range",
            "contains",
            "not_contains",
            "starts_with",
            "ends_with",
            "matches",
            "not_matches",
            "length",
            "min_length",
            "max_length",
        ]
    }

    /// Pure predicate evaluation; never fails on a well-formed value.
    /// Returns `Err` only when the payload is structurally incompatible
    /// with the kind (e.g. `matches` with a non-string value, or a
    /// malformed regex) — a data-quality problem the representation layer
    /// surfaces as a [`CheckConstraintError`] rather than silently failing
    /// closed.
    pub fn predicate(&self, value: &Value, context: &Context) -> Result<bool, CheckConstraintError> {
        use Constraint::*;
        let err = |msg: &str| CheckConstraintError::new(msg.to_string(), context.clone());
        Ok(match self {
            Less(args) => compare(value, args, context)? == std::cmp::Ordering::Less,
            Greater(args) => compare(value, args, context)? == std::cmp::Ordering::Greater,
            LessOrEquals(args) => compare(value, args, context)? != std::cmp::Ordering::Greater,
            GreaterOrEquals(args) => compare(value, args, context)? != std::cmp::Ordering::Less,
            Equals(args) => value == args,
            NotEquals(args) => value != args,
            Included(args) => args.contains(value),
            NotIncluded(args) => !args.contains(value),
            InRange(lo, hi) => {
                compare(value, lo, context)? != std::cmp::Ordering::Less
                    && compare(value, hi, context)? != std::cmp::Ordering::Greater
            }
            NotInRange(lo, hi) => {
                !(compare(value, lo, context)? != std::cmp::Ordering::Less
                    && compare(value, hi, context)? != std::cmp::Ordering::Greater)
            }
            Contains(needle) => as_str(value, context)?.contains(needle.as_str()),
            NotContains(needle) => !as_str(value, context)?.contains(needle.as_str()),
            StartsWith(prefix) => as_str(value, context)?.starts_with(prefix.as_str()),
            EndsWith(suffix) => as_str(value, context)?.ends_with(suffix.as_str()),
            Matches(pattern) => {
                let re = Regex::new(&format!("^(?:{pattern})"))
                    .map_err(|e| err(&format!("bad regex '{pattern}': {e}")))?;
                re.is_match(as_str(value, context)?)
            }
            NotMatches(pattern) => {
                let re = Regex::new(&format!("^(?:{pattern})"))
                    .map_err(|e| err(&format!("bad regex '{pattern}': {e}")))?;
                !re.is_match(as_str(value, context)?)
            }
            Length(n) => length_of(value, context)? == *n,
            MinLength(n) => length_of(value, context)? >= *n,
            MaxLength(n) => length_of(value, context)? <= *n,
        })
    }

    /// `check(value)`: the predicate result. A higher-level caller that
    /// wants to raise on failure should
    /// use [`Constraint::check_or_raise`].
    pub fn check(&self, value: &Value, context: &Context) -> Result<bool, CheckConstraintError> {
        self.predicate(value, context)
    }

    /// Raises [`CheckConstraintError`] when the predicate is false.
    pub fn check_or_raise(&self, value: &Value, context: &Context) -> Result<(), CheckConstraintError> {
        if self.check(value, context)? {
            Ok(())
        } else {
            Err(CheckConstraintError::new(
                format!("value did not satisfy {}", self.kind_name()),
                context.clone(),
            ))
        }
    }
}

fn as_str<'a>(value: &'a Value, context: &Context) -> Result<&'a str, CheckConstraintError> {
    value
        .as_str()
        .ok_or_else(|| CheckConstraintError::new("expected a string value".to_string(), context.clone()))
}

fn length_of(value: &Value, context: &Context) -> Result<u64, CheckConstraintError> {
    match value {
        Value::String(s) => Ok(s.chars().count() as u64),
        Value::Array(a) => Ok(a.len() as u64),
        Value::Object(o) => Ok(o.len() as u64),
        _ => Err(CheckConstraintError::new(
            "expected a string, array or object value".to_string(),
            context.clone(),
        )),
    }
}

fn compare(value: &Value, args: &Value, context: &Context) -> Result<std::cmp::Ordering, CheckConstraintError> {
    match (value, args) {
        (Value::Number(a), Value::Number(b)) => {
            let (a, b) = (a.as_f64(), b.as_f64());
            match (a, b) {
                (Some(a), Some(b)) => a
                    .partial_cmp(&b)
                    .ok_or_else(|| CheckConstraintError::new("non-comparable numbers".to_string(), context.clone())),
                _ => Err(CheckConstraintError::new("non-numeric comparison".to_string(), context.clone())),
            }
        }
        (Value::String(a), Value::String(b)) => Ok(a.cmp(b)),
        _ => Err(CheckConstraintError::new(
            "values are not mutually comparable".to_string(),
            context.clone(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx() -> Context {
        Context::root()
    }

    #[test]
    fn equals_and_not_equals_have_distinct_names() {
        assert_eq!(Constraint::Equals(json!(1)).kind_name(), "equals");
        assert_eq!(Constraint::NotEquals(json!(1)).kind_name(), "not_equals");
        assert_ne!(
            Constraint::Equals(json!(1)).kind_name(),
            Constraint::NotEquals(json!(1)).kind_name()
        );
    }

    #[test]
    fn comparison_predicates() {
        assert!(Constraint::Less(json!(10)).check(&json!(5), &ctx()).unwrap());
        assert!(!Constraint::Less(json!(10)).check(&json!(15), &ctx()).unwrap());
        assert!(Constraint::GreaterOrEquals(json!(5))
            .check(&json!(5), &ctx())
            .unwrap());
    }

    #[test]
    fn in_range_is_inclusive() {
        let c = Constraint::InRange(json!(1), json!(10));
        assert!(c.check(&json!(1), &ctx()).unwrap());
        assert!(c.check(&json!(10), &ctx()).unwrap());
        assert!(!c.check(&json!(11), &ctx()).unwrap());
    }

    #[test]
    fn matches_is_anchored_at_start() {
        let c = Constraint::Matches("abc".to_string());
        assert!(c.check(&json!("abcdef"), &ctx()).unwrap());
        assert!(!c.check(&json!("xabc"), &ctx()).unwrap());
    }

    #[test]
    fn length_predicates() {
        assert!(Constraint::Length(3).check(&json!("abc"), &ctx()).unwrap());
        assert!(Constraint::MinLength(2).check(&json!([1, 2, 3]), &ctx()).unwrap());
        assert!(Constraint::MaxLength(1).check(&json!({"a": 1}), &ctx()).unwrap());
    }

    #[test]
    fn contains_checks_substring() {
        assert!(Constraint::Contains("ell".to_string())
            .check(&json!("hello"), &ctx())
            .unwrap());
        assert!(!Constraint::NotContains("ell".to_string())
            .check(&json!("hello"), &ctx())
            .unwrap());
    }

    #[test]
    fn check_or_raise_reports_kind_name() {
        let c = Constraint::Equals(json!(1));
        let err = c.check_or_raise(&json!(2), &ctx()).unwrap_err();
        assert!(err.message.contains("equals"));
    }
}
