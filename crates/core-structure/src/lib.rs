//! The backtrackable event structure: append-only storage, conflict
//! discovery, candidate synchronization and the public append operations
//! (`spec.md` §3 "Event Structure" / "Backtrackable Event", §4.2–§4.5).
//!
//! Module layout mirrors the spec's own decomposition of §4.3–§4.5 into
//! separate steps rather than one monolithic `append`:
//! - [`backtrack`] — the mutable bit layered on an otherwise-immutable event.
//! - [`conflicts`] — step 1, conflict discovery.
//! - [`candidates`] — the candidate-narrowing rules §4.4 applies before
//!   handing a set of events to `core_sync::sync`.
//! - [`respond`] — binary/barrier response synthesis and the frontier/pinned
//!   snapshot bookkeeping from §4.3 step 3.
//! - [`structure`] — the append-only arena itself: [`EventStructure`].
//! - [`ops`] — the public operations of §4.5, typed wrappers over
//!   [`ops::add_send`] / [`ops::add_request`].

pub mod backtrack;
pub mod candidates;
pub mod conflicts;
pub mod ops;
pub mod respond;
pub mod structure;

pub use backtrack::BacktrackableEvent;
pub use respond::add_response_events;
pub use structure::EventStructure;

use core_types::{Location, Value};

/// Supplies the value a location reads as before any `Write` to it has
/// happened (`spec.md` §6 "memoryInitializer"). The one piece of external
/// context response synthesis needs that isn't itself an event.
pub trait MemoryInitializer: Send + Sync {
    fn initial_value(&self, location: Location) -> Value;
}

/// A [`MemoryInitializer`] that always answers with the same value,
/// regardless of location — the common case for a test that zero-initializes
/// every field (`spec.md` §8 scenarios S1–S6 all start from `x = y = 0`).
pub struct ConstantInitializer(pub Value);

impl MemoryInitializer for ConstantInitializer {
    fn initial_value(&self, _location: Location) -> Value {
        self.0
    }
}
