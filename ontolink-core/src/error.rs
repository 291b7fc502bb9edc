//! Error taxonomy for ontology loading, import resolution and constraint
//! checking, following the thiserror-enum-with-constructor-methods idiom.

use thiserror::Error;

use crate::context::Context;

/// Failure while checking a value against a single constraint.
#[derive(Error, Debug)]
#[error("constraint check failed at {context}: {message}")]
pub struct CheckConstraintError {
    /// Human-readable explanation of the failed predicate.
    pub message: String,
    /// Where in the document the checked value lives.
    pub context: Context,
}

impl CheckConstraintError {
    #[must_use]
    pub fn new(message: impl Into<String>, context: Context) -> Self {
        Self {
            message: message.into(),
            context,
        }
    }
}

/// A single entry in a [`LoadError`]'s accumulated error list.
#[derive(Debug, Clone)]
pub struct ErrorDetail {
    pub message: String,
    pub context: Context,
}

impl std::fmt::Display for ErrorDetail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (at {})", self.message, self.context)
    }
}

/// Raised when resolving a single import edge fails. Distinct from
/// [`LoadError`] so a chain of import-resolution strategies can
/// catch-and-continue on to the next strategy.
#[derive(Error, Debug)]
#[error("import failed at {context}: {message}")]
pub struct ImportError {
    pub message: String,
    pub context: Context,
}

impl ImportError {
    #[must_use]
    pub fn new(message: impl Into<String>, context: Context) -> Self {
        Self {
            message: message.into(),
            context,
        }
    }
}

/// Any failure that is not a document-load failure or an import failure: a
/// reference used without an owner, a malformed owner-scoped reference, a
/// duplicate non-repeatable assignment, a bad constraint name.
#[derive(Error, Debug)]
#[error("{message} (at {context})")]
pub struct OntologyError {
    pub message: String,
    pub context: Context,
}

impl OntologyError {
    #[must_use]
    pub fn new(message: impl Into<String>, context: Context) -> Self {
        Self {
            message: message.into(),
            context,
        }
    }
}

/// Top-level failure raised by the parser while loading a model or ontology
/// document. Carries an accumulated list of sub-errors, mirroring the
/// `errors: List[...]` field of the loader this taxonomy is grounded on.
#[derive(Error, Debug)]
pub struct LoadError {
    pub message: String,
    pub context: Context,
    pub errors: Vec<ErrorDetail>,
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (at {})", self.message, self.context)?;
        if !self.errors.is_empty() {
            write!(f, "\nerrors:")?;
            for e in &self.errors {
                write!(f, "\n  - {e}")?;
            }
        }
        Ok(())
    }
}

impl LoadError {
    #[must_use]
    pub fn new(message: impl Into<String>, context: Context) -> Self {
        Self {
            message: message.into(),
            context,
            errors: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_errors(
        message: impl Into<String>,
        context: Context,
        errors: Vec<ErrorDetail>,
    ) -> Self {
        Self {
            message: message.into(),
            context,
            errors,
        }
    }
}

/// Umbrella error type returned from the public loader API, so callers do
/// not need to match on which internal stage failed.
#[derive(Error, Debug)]
pub enum OntolinkError {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Import(#[from] ImportError),
    #[error(transparent)]
    Ontology(#[from] OntologyError),
    #[error(transparent)]
    Constraint(#[from] CheckConstraintError),
    #[error("yaml error at {context}: {source}")]
    Yaml {
        #[source]
        source: serde_yaml::Error,
        context: Context,
    },
    #[error("json error at {context}: {source}")]
    Json {
        #[source]
        source: serde_json::Error,
        context: Context,
    },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl OntolinkError {
    #[must_use]
    pub fn yaml(source: serde_yaml::Error, context: Context) -> Self {
        Self::Yaml { source, context }
    }

    #[must_use]
    pub fn json(source: serde_json::Error, context: Context) -> Self {
        Self::Json { source, context }
    }
}

/// Result alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, OntolinkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_error_renders_accumulated_errors() {
        let ctx = Context::root().child("vertex_types").child(0usize);
        let err = LoadError::with_errors(
            "bad data",
            ctx.clone(),
            vec![ErrorDetail {
                message: "missing name".into(),
                context: ctx.child("name"),
            }],
        );
        let rendered = err.to_string();
        assert!(rendered.contains("bad data"));
        assert!(rendered.contains("missing name"));
    }
}
