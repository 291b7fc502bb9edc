//! Breadcrumb trail attached to every error raised while loading or checking
//! a document, mirroring the segment-chain used by the loader this crate
//! grew out of (name/data pairs linked to a parent, inherited down the call
//! graph instead of rebuilt at each error site).

use std::fmt;
use std::sync::Arc;

/// One step of a [`Context`] chain: a field name, a list index, or an
/// opaque marker (e.g. a module's original name).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// A struct field or map key.
    Field(String),
    /// A list index.
    Index(usize),
    /// A free-form marker, used for module/document boundaries.
    Marker(String),
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Field(s) | Segment::Marker(s) => write!(f, "{s}"),
            Segment::Index(i) => write!(f, "[{i}]"),
        }
    }
}

impl From<&str> for Segment {
    fn from(value: &str) -> Self {
        Segment::Field(value.to_string())
    }
}

impl From<String> for Segment {
    fn from(value: String) -> Self {
        Segment::Field(value)
    }
}

impl From<usize> for Segment {
    fn from(value: usize) -> Self {
        Segment::Index(value)
    }
}

/// A linked breadcrumb: each child holds a reference-counted pointer to its
/// parent so creating a child is cheap and contexts can be cloned freely
/// into pending-reference queues and error values.
#[derive(Debug, Clone)]
pub struct Context {
    segment: Segment,
    parent: Option<Arc<Context>>,
}

impl Context {
    /// The root context for a parser instance.
    #[must_use]
    pub fn root() -> Self {
        Context {
            segment: Segment::Marker("root".to_string()),
            parent: None,
        }
    }

    /// Build a child context one step below this one.
    #[must_use]
    pub fn child(&self, segment: impl Into<Segment>) -> Context {
        Context {
            segment: segment.into(),
            parent: Some(Arc::new(self.clone())),
        }
    }

    /// The full path from the root to this context, root first.
    #[must_use]
    pub fn path(&self) -> Vec<Segment> {
        let mut path = match &self.parent {
            Some(parent) => parent.path(),
            None => Vec::new(),
        };
        path.push(self.segment.clone());
        path
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = self.path();
        let rendered: Vec<String> = path.iter().map(Segment::to_string).collect();
        write!(f, "{}", rendered.join("."))
    }
}

impl Default for Context {
    fn default() -> Self {
        Context::root()
    }
}
