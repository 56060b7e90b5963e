//! Arena storage for IR nodes.
//!
//! Nodes are appended to a single vector and never freed individually, so an
//! index is a stable identity for the lifetime of the graph. Killing a node
//! only flags it; the slot stays allocated and its id is never reused.
//!
//! Side tables (traversal state, marks) live in [`SecondaryMap`]s keyed by the
//! same ids, so passes never need to touch the node structure itself.

use std::marker::PhantomData;
use std::ops::{Index, IndexMut};

// =============================================================================
// Typed ID
// =============================================================================

/// A type-safe index into an [`Arena`].
///
/// Ids are handed out in allocation order, so comparing two ids tells which
/// item was created first. The graph reducer relies on this to separate nodes
/// that existed before a reduction from nodes the reduction created.
pub struct Id<T> {
    index: u32,
    _marker: PhantomData<fn() -> T>,
}

// Manual impls so `Id<T>` is `Copy`/`Eq`/`Ord` whatever `T` is.
impl<T> Copy for Id<T> {}

impl<T> Clone for Id<T> {
    #[inline]
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> PartialEq for Id<T> {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl<T> Eq for Id<T> {}

impl<T> PartialOrd for Id<T> {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Id<T> {
    #[inline]
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.index.cmp(&other.index)
    }
}

impl<T> std::hash::Hash for Id<T> {
    #[inline]
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.index.hash(state);
    }
}

impl<T> Id<T> {
    /// Create an id from a raw index.
    #[inline]
    pub const fn new(index: u32) -> Self {
        Id {
            index,
            _marker: PhantomData,
        }
    }

    /// The raw index.
    #[inline]
    pub const fn index(self) -> u32 {
        self.index
    }

    /// The index as `usize`.
    #[inline]
    pub const fn as_usize(self) -> usize {
        self.index as usize
    }
}

impl<T> std::fmt::Debug for Id<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.index)
    }
}

impl<T> std::fmt::Display for Id<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.index)
    }
}

// =============================================================================
// Arena
// =============================================================================

/// Append-only storage; the whole arena is dropped at once with its graph.
#[derive(Debug, Clone)]
pub struct Arena<T> {
    items: Vec<T>,
}

impl<T> Arena<T> {
    /// Create an empty arena.
    #[inline]
    pub fn new() -> Self {
        Arena { items: Vec::new() }
    }

    /// Create an arena with room for `capacity` items.
    #[inline]
    pub fn with_capacity(capacity: usize) -> Self {
        Arena {
            items: Vec::with_capacity(capacity),
        }
    }

    /// Append an item and return its id.
    #[inline]
    pub fn alloc(&mut self, item: T) -> Id<T> {
        let index = u32::try_from(self.items.len()).unwrap_or(u32::MAX);
        debug_assert!(index < u32::MAX, "arena exhausted the u32 id space");
        self.items.push(item);
        Id::new(index)
    }

    #[inline]
    pub fn get(&self, id: Id<T>) -> Option<&T> {
        self.items.get(id.as_usize())
    }

    #[inline]
    pub fn get_mut(&mut self, id: Id<T>) -> Option<&mut T> {
        self.items.get_mut(id.as_usize())
    }

    /// Number of items ever allocated (killed nodes included).
    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterate over all items with their ids, in allocation order.
    pub fn iter(&self) -> impl Iterator<Item = (Id<T>, &T)> {
        self.items
            .iter()
            .enumerate()
            .map(|(i, item)| (Id::new(i as u32), item))
    }

    /// Iterate over all ids, in allocation order.
    pub fn ids(&self) -> impl Iterator<Item = Id<T>> {
        (0..self.items.len() as u32).map(Id::new)
    }

    /// Reserve room for `additional` more items.
    #[inline]
    pub fn reserve(&mut self, additional: usize) {
        self.items.reserve(additional);
    }
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Index<Id<T>> for Arena<T> {
    type Output = T;

    #[inline]
    fn index(&self, id: Id<T>) -> &Self::Output {
        &self.items[id.as_usize()]
    }
}

impl<T> IndexMut<Id<T>> for Arena<T> {
    #[inline]
    fn index_mut(&mut self, id: Id<T>) -> &mut Self::Output {
        &mut self.items[id.as_usize()]
    }
}

// =============================================================================
// Secondary Map
// =============================================================================

/// Dense side table keyed by arena ids.
///
/// Reads past the end yield `V::default()`, so the table never needs to be
/// sized up front: items allocated after the table was created simply read as
/// default until written.
#[derive(Debug, Clone)]
pub struct SecondaryMap<K, V> {
    values: Vec<V>,
    _marker: PhantomData<fn() -> K>,
}

impl<K, V: Default + Clone> SecondaryMap<K, V> {
    pub fn new() -> Self {
        SecondaryMap {
            values: Vec::new(),
            _marker: PhantomData,
        }
    }

    /// Create a table pre-sized for `capacity` ids.
    pub fn with_capacity(capacity: usize) -> Self {
        SecondaryMap {
            values: vec![V::default(); capacity],
            _marker: PhantomData,
        }
    }

    pub fn get(&self, id: Id<K>) -> Option<&V> {
        self.values.get(id.as_usize())
    }

    /// Mutable access, growing the table if `id` is past the end.
    pub fn get_mut(&mut self, id: Id<K>) -> &mut V {
        let idx = id.as_usize();
        if idx >= self.values.len() {
            self.values.resize(idx + 1, V::default());
        }
        &mut self.values[idx]
    }

    pub fn set(&mut self, id: Id<K>, value: V) {
        *self.get_mut(id) = value;
    }

    /// Forget every entry; all ids read as default afterwards.
    pub fn clear(&mut self) {
        self.values.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (Id<K>, &V)> {
        self.values
            .iter()
            .enumerate()
            .map(|(i, v)| (Id::new(i as u32), v))
    }
}

impl<K, V: Copy + Default> SecondaryMap<K, V> {
    /// Read an entry by value, defaulting for ids never written.
    #[inline]
    pub fn value(&self, id: Id<K>) -> V {
        self.values.get(id.as_usize()).copied().unwrap_or_default()
    }
}

impl<K, V: Default + Clone> Default for SecondaryMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    struct Slot {
        value: i32,
    }

    #[test]
    fn test_ids_follow_allocation_order() {
        let mut arena: Arena<Slot> = Arena::new();

        let a = arena.alloc(Slot { value: 10 });
        let b = arena.alloc(Slot { value: 20 });
        let c = arena.alloc(Slot { value: 30 });

        assert!(a < b && b < c);
        assert_eq!(c.index(), 2);
        assert_eq!(arena[b].value, 20);
        assert_eq!(arena.len(), 3);
        assert_eq!(arena.ids().collect::<Vec<_>>(), vec![a, b, c]);
    }

    #[test]
    fn test_arena_mutation() {
        let mut arena: Arena<Slot> = Arena::with_capacity(4);
        let id = arena.alloc(Slot { value: 1 });
        arena[id].value = 7;
        assert_eq!(arena.get(id).map(|s| s.value), Some(7));
        assert!(arena.get(Id::new(5)).is_none());
    }

    #[test]
    fn test_secondary_map_reads_default_past_end() {
        let map: SecondaryMap<Slot, u8> = SecondaryMap::new();
        assert_eq!(map.value(Id::new(100)), 0);
        assert!(map.get(Id::new(0)).is_none());
    }

    #[test]
    fn test_secondary_map_grows_on_write() {
        let mut map: SecondaryMap<Slot, u8> = SecondaryMap::with_capacity(2);
        map.set(Id::new(9), 3);
        assert_eq!(map.value(Id::new(9)), 3);
        assert_eq!(map.value(Id::new(1)), 0);

        *map.get_mut(Id::new(1)) += 2;
        assert_eq!(map.value(Id::new(1)), 2);

        map.clear();
        assert_eq!(map.value(Id::new(9)), 0);
    }

    #[test]
    fn test_id_formatting() {
        let id: Id<Slot> = Id::new(42);
        assert_eq!(format!("{id}"), "#42");
        assert_eq!(format!("{id:?}"), "#42");
    }
}
