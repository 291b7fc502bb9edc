//! Per-section storage for owned entities.
//!
//! Rather than an `Rc<RefCell<_>>` object graph with direct owner/owned
//! back-pointers, entities of a given kind live in a flat [`Arena`]: a
//! `Vec<T>` plus a name index. Handles into the arena ([`EntityId`]) are
//! `Copy`, so a struct can hold a reference to a sibling entity without
//! fighting the borrow checker, and a back-pointer to an owner is just
//! another `EntityId` (or small enum of them) rather than a strong
//! reference that would need `Weak` to avoid a cycle.

use std::hash::Hash;
use std::marker::PhantomData;

use indexmap::IndexMap;

/// A `Copy + Eq + Hash` handle into an [`Arena<T>`], phantom-typed by the
/// entity kind it indexes so handles for different sections cannot be
/// confused at compile time.
pub struct EntityId<T> {
    index: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> EntityId<T> {
    fn new(index: usize) -> Self {
        EntityId {
            index: index.try_into().expect("arena index overflowed u32"),
            _marker: PhantomData,
        }
    }

    /// The raw index, useful for deterministic iteration order keyed by
    /// insertion order.
    #[must_use]
    pub fn index(self) -> usize {
        self.index as usize
    }
}

impl<T> Clone for EntityId<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> Copy for EntityId<T> {}
impl<T> PartialEq for EntityId<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}
impl<T> Eq for EntityId<T> {}
impl<T> Hash for EntityId<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.index.hash(state);
    }
}
impl<T> std::fmt::Debug for EntityId<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EntityId({})", self.index)
    }
}

/// An insertion-ordered, name-indexed store of entities of one kind.
///
/// Lookup by name matches the `Dict[str, Entity]` sections of the document
/// model (`data_types`, `vertex_types`, ...): authors declare entities as a
/// `{name: definition}` map, and the map's order is a source of truth for
/// deterministic re-serialization.
#[derive(Debug, Clone)]
pub struct Arena<T> {
    items: Vec<T>,
    by_name: IndexMap<String, EntityId<T>>,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Arena {
            items: Vec::new(),
            by_name: IndexMap::new(),
        }
    }
}

/// Returned by [`Arena::insert`] when the name is already registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DuplicateName;

impl<T> Arena<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new entity under `name`, returning its handle. Fails if the
    /// name is already taken within this section.
    pub fn insert(&mut self, name: impl Into<String>, value: T) -> Result<EntityId<T>, DuplicateName> {
        let name = name.into();
        if self.by_name.contains_key(&name) {
            return Err(DuplicateName);
        }
        let id = EntityId::new(self.items.len());
        self.items.push(value);
        self.by_name.insert(name, id);
        Ok(id)
    }

    #[must_use]
    pub fn get(&self, id: EntityId<T>) -> &T {
        &self.items[id.index()]
    }

    pub fn get_mut(&mut self, id: EntityId<T>) -> &mut T {
        &mut self.items[id.index()]
    }

    #[must_use]
    pub fn get_by_name(&self, name: &str) -> Option<EntityId<T>> {
        self.by_name.get(name).copied()
    }

    #[must_use]
    pub fn name_of(&self, id: EntityId<T>) -> Option<&str> {
        self.by_name
            .iter()
            .find(|(_, v)| **v == id)
            .map(|(k, _)| k.as_str())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterate entities in declaration order, paired with their name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, EntityId<T>, &T)> {
        self.by_name
            .iter()
            .map(move |(name, id)| (name.as_str(), *id, self.get(*id)))
    }
}

/// Opaque identifier for a loaded module (model or ontology document),
/// assigned by the loader crate's module registry in load order. Kept
/// deliberately flat (no phantom type over "model" vs "ontology") so a
/// single [`GlobalId`] shape serves every cross-module reference; the
/// loader's registry is the only place that knows which concrete module
/// kind a given id addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(u32);

impl ModuleId {
    #[must_use]
    pub fn new(index: usize) -> Self {
        ModuleId(index.try_into().expect("module index overflowed u32"))
    }

    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A fully-qualified handle to an entity: which module it lives in, plus
/// its local [`EntityId`] within that module's arena for entities of kind
/// `T`. Reference cells resolve to this rather than a bare `EntityId`
/// because a name may resolve to an entity declared in a different module
/// than the one holding the reference (an imported data type, a vertex
/// type derived from one in another file, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GlobalId<T> {
    pub module: ModuleId,
    pub id: EntityId<T>,
}

impl<T> GlobalId<T> {
    #[must_use]
    pub fn new(module: ModuleId, id: EntityId<T>) -> Self {
        GlobalId { module, id }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Dummy(u32);

    #[test]
    fn insert_and_lookup_by_name() {
        let mut arena: Arena<Dummy> = Arena::new();
        let id = arena.insert("foo", Dummy(42)).unwrap();
        assert_eq!(arena.get(id).0, 42);
        assert_eq!(arena.get_by_name("foo"), Some(id));
        assert_eq!(arena.name_of(id), Some("foo"));
    }

    #[test]
    fn duplicate_name_rejected() {
        let mut arena: Arena<Dummy> = Arena::new();
        arena.insert("foo", Dummy(1)).unwrap();
        assert!(arena.insert("foo", Dummy(2)).is_err());
    }

    #[test]
    fn iteration_preserves_insertion_order() {
        let mut arena: Arena<Dummy> = Arena::new();
        arena.insert("b", Dummy(2)).unwrap();
        arena.insert("a", Dummy(1)).unwrap();
        let names: Vec<&str> = arena.iter().map(|(n, _, _)| n).collect();
        assert_eq!(names, vec!["b", "a"]);
    }
}
