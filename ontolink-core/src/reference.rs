//! Deferred-binding reference cells.
//!
//! A cell starts out holding only an authored alias; it becomes `fulfilled`
//! once a resolver assigns it the [`EntityId`] of the entity the alias
//! names. Two flavors exist: a cell resolved globally
//! against the parser's section registries ([`ReferenceCell::global`]), and
//! one resolved locally through an owning instance's type
//! ([`ReferenceCell::owner_scoped`]). Both constructors are the only way to
//! produce a cell — the `kind` field is private, so code outside this
//! module cannot fabricate an owner-scoped cell without going through the
//! factory, which is how this crate makes the "owner-scoped reference
//! constructed without its resolution path" failure mode unreachable by
//! construction rather than a runtime check.

use crate::arena::{EntityId, GlobalId, ModuleId};
use crate::context::Context;

/// Which strategy resolves a cell's alias into a value. Carried on the cell
/// purely as a tag for the resolver driving [`crate::arena::Arena`] lookups
/// elsewhere in the workspace — this crate does not itself perform lookups,
/// since that requires registries this crate does not own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    /// Resolved against the parser's section-wide registries by alias.
    Global,
    /// Resolved through an owning instance's type definition.
    OwnerScoped,
}

/// A typed pending lookup: an authored alias, optionally resolved to the
/// [`EntityId`] of an entity of kind `T`.
#[derive(Debug, Clone)]
pub struct ReferenceCell<T> {
    alias: String,
    value: Option<GlobalId<T>>,
    context: Context,
    kind: ReferenceKind,
}

impl<T> ReferenceCell<T> {
    /// A cell resolved against the parser's global section registries.
    #[must_use]
    pub fn global(alias: impl Into<String>, context: Context) -> Self {
        ReferenceCell {
            alias: alias.into(),
            value: None,
            context,
            kind: ReferenceKind::Global,
        }
    }

    /// A cell resolved through an owning instance's type definition. The
    /// caller is expected to also register a matching entry in the pending
    /// reference queue describing how to re-attempt resolution (see
    /// `PendingRef` in the loader crate).
    #[must_use]
    pub fn owner_scoped(alias: impl Into<String>, context: Context) -> Self {
        ReferenceCell {
            alias: alias.into(),
            value: None,
            context,
            kind: ReferenceKind::OwnerScoped,
        }
    }

    #[must_use]
    pub fn alias(&self) -> &str {
        &self.alias
    }

    #[must_use]
    pub fn context(&self) -> &Context {
        &self.context
    }

    #[must_use]
    pub fn kind(&self) -> ReferenceKind {
        self.kind
    }

    #[must_use]
    pub fn fulfilled(&self) -> bool {
        self.value.is_some()
    }

    #[must_use]
    pub fn value(&self) -> Option<GlobalId<T>> {
        self.value
    }

    /// Assign a resolved value. Returns whether the cell is now fulfilled.
    pub fn assign(&mut self, module: ModuleId, id: EntityId<T>) -> bool {
        self.value = Some(GlobalId::new(module, id));
        true
    }

    /// True iff the cell holds a resolved value. In the arena model every
    /// cell is reached only through an entity that is itself already placed
    /// in an arena, so there is no "owner never attached" failure mode to
    /// check here — finalization is purely the fulfilled check.
    #[must_use]
    pub fn finalize(&self) -> bool {
        self.fulfilled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Dummy;

    #[test]
    fn global_cell_starts_unfulfilled() {
        let cell: ReferenceCell<Dummy> = ReferenceCell::global("foo", Context::root());
        assert!(!cell.fulfilled());
        assert_eq!(cell.kind(), ReferenceKind::Global);
    }

    #[test]
    fn owner_scoped_cell_is_tagged() {
        let cell: ReferenceCell<Dummy> = ReferenceCell::owner_scoped("bar", Context::root());
        assert_eq!(cell.kind(), ReferenceKind::OwnerScoped);
    }
}
