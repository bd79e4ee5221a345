//! Thread, object and event identifiers.

use std::fmt;

/// A small non-negative integer naming a thread (`spec.md` §3).
///
/// A run of `n` user threads reserves two extra identifiers beyond
/// `0..n`: the *main* thread (runs initialization logic) and the *init*
/// thread (hosts the root event). [`ThreadId::main`] / [`ThreadId::init`]
/// compute those reserved ids from `n` so callers never have to hardcode
/// the offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ThreadId(pub usize);

impl ThreadId {
    pub const fn new(id: usize) -> Self {
        Self(id)
    }

    /// The main thread for a run of `user_threads` user threads.
    pub const fn main(user_threads: usize) -> Self {
        Self(user_threads)
    }

    /// The init thread (hosts the root event) for a run of `user_threads`
    /// user threads.
    pub const fn init(user_threads: usize) -> Self {
        Self(user_threads + 1)
    }

    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

/// Global, monotonic event identifier and the sort key used throughout the
/// core (`core_collections::Id`, re-exported here so downstream crates don't
/// need a direct `core-collections` dependency just to name this type).
pub type Id = core_collections::Id;

/// Opaque handle to an allocated object. Any object may also serve as a
/// monitor (mutex), mirroring the JVM-style memory model this core targets;
/// see [`crate::label::MutexHandle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectHandle(pub u64);

impl fmt::Display for ObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "obj#{}", self.0)
    }
}

/// A memory location: a field/element slot within an allocated object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Location {
    pub object: ObjectHandle,
    pub offset: u32,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}+{}", self.object, self.offset)
    }
}

/// A small, closed set of thread ids — used for fork/join targets. Kept
/// sorted so two sets with the same members compare equal regardless of
/// construction order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThreadIdSet(Vec<ThreadId>);

impl ThreadIdSet {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn from_iter(iter: impl IntoIterator<Item = ThreadId>) -> Self {
        let mut v: Vec<ThreadId> = iter.into_iter().collect();
        v.sort_unstable();
        v.dedup();
        Self(v)
    }

    pub fn single(id: ThreadId) -> Self {
        Self(vec![id])
    }

    pub fn contains(&self, id: ThreadId) -> bool {
        self.0.binary_search(&id).is_ok()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = ThreadId> + '_ {
        self.0.iter().copied()
    }
}
