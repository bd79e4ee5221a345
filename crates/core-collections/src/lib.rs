//! Small indexed collections shared by the event-structure core.
//!
//! Nothing here is general-purpose: each type exists because one specific
//! access pattern in `core-structure` / `core-execution` needs it and a
//! generic map (`HashMap`, `BTreeMap`) would either hide the invariant the
//! caller relies on or cost more than the access pattern requires.

use std::collections::HashMap;
use std::hash::Hash;

/// Global, monotonically increasing identifier. `Event::id` in `core-types`
/// is one of these; it also doubles as the sort key for [`SortedById`].
pub type Id = u64;

/// Anything that can report the global id it should be sorted/looked up by.
pub trait HasId {
    fn id(&self) -> Id;
}

/// An append-mostly list kept sorted by [`HasId::id`].
///
/// The event structure only ever appends (ids are assigned in order, so
/// `push` keeps the list sorted for free) or truncates (backtracking drops
/// a suffix). Binary search gives `O(log n)` lookup by id without pulling in
/// a full ordered-map crate for what is, in practice, a `Vec` with a
/// sorted-invariant and a handful of helpers.
#[derive(Debug, Clone, Default)]
pub struct SortedById<T> {
    items: Vec<T>,
}

impl<T: HasId> SortedById<T> {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Appends `item`. Requires `item.id()` to be greater than the id of
    /// every item currently stored (panics otherwise — this is an internal
    /// invariant, not user input).
    pub fn push(&mut self, item: T) {
        debug_assert!(
            self.items.last().map(|l| l.id() < item.id()).unwrap_or(true),
            "SortedById::push requires strictly increasing ids"
        );
        self.items.push(item);
    }

    pub fn get(&self, id: Id) -> Option<&T> {
        self.items
            .binary_search_by_key(&id, |it| it.id())
            .ok()
            .map(|idx| &self.items[idx])
    }

    pub fn get_mut(&mut self, id: Id) -> Option<&mut T> {
        match self.items.binary_search_by_key(&id, |it| it.id()) {
            Ok(idx) => Some(&mut self.items[idx]),
            Err(_) => None,
        }
    }

    /// Truncates the list so that no stored item has an id strictly greater
    /// than `id`. Items beyond the cut point become unreachable (backtracking
    /// drops them).
    pub fn truncate_after(&mut self, id: Id) {
        let cut = match self.items.binary_search_by_key(&id, |it| it.id()) {
            Ok(idx) => idx + 1,
            Err(idx) => idx,
        };
        self.items.truncate(cut);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn last(&self) -> Option<&T> {
        self.items.last()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }
}

/// Dense per-thread storage, indexed directly by thread id (a small
/// non-negative integer per `spec.md` §3). Grows on demand; absent slots
/// read as `None` rather than forcing every caller to pre-size the vector.
#[derive(Debug, Clone, Default)]
pub struct DenseMap<T> {
    slots: Vec<Option<T>>,
}

impl<T> DenseMap<T> {
    pub fn new() -> Self {
        Self { slots: Vec::new() }
    }

    pub fn get(&self, idx: usize) -> Option<&T> {
        self.slots.get(idx).and_then(|s| s.as_ref())
    }

    pub fn get_mut(&mut self, idx: usize) -> Option<&mut T> {
        self.slots.get_mut(idx).and_then(|s| s.as_mut())
    }

    pub fn set(&mut self, idx: usize, value: T) {
        if idx >= self.slots.len() {
            self.slots.resize_with(idx + 1, || None);
        }
        self.slots[idx] = Some(value);
    }

    pub fn remove(&mut self, idx: usize) -> Option<T> {
        self.slots.get_mut(idx).and_then(|s| s.take())
    }

    pub fn capacity_len(&self) -> usize {
        self.slots.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &T)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|v| (i, v)))
    }
}

/// Map keyed by object identity (an opaque allocation handle), used for the
/// event structure's allocation-event index and the driver's dangling-request
/// map. A thin wrapper rather than a bare `HashMap` so call sites read as
/// "identity lookup", not "generic map", and so the one extra operation both
/// callers need (`get_or_none`, returning `None` for keys never inserted
/// without the `Option<&V>` vs "key absent" ambiguity a raw `HashMap::get`
/// already resolves — kept anyway for call-site clarity) lives in one place.
#[derive(Debug, Clone, Default)]
pub struct IdentityMap<K, V> {
    inner: HashMap<K, V>,
}

impl<K: Eq + Hash, V> IdentityMap<K, V> {
    pub fn new() -> Self {
        Self {
            inner: HashMap::new(),
        }
    }

    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        self.inner.insert(key, value)
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.inner.get(key)
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.inner.remove(key)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.inner.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
