//! The immutable event record (`spec.md` §3 "Event").

use crate::ids::{Id, ThreadId};
use crate::label::Label;
use core_clock::Clock;
use core_collections::HasId;

/// An atomic, immutable program event.
///
/// Events are created once and never mutated — the only mutable bit
/// anywhere in the model is [`crate::backtrack::BacktrackableEvent::visited`],
/// which lives one layer up in `core-structure`.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// Monotonic across the whole event structure; also the sort key.
    pub id: Id,
    pub thread: ThreadId,
    /// 0-based position of this event within its own thread.
    pub thread_position: usize,
    pub label: Label,
    /// Previous event in the same thread, or `None` for a thread's root.
    pub parent: Option<Id>,
    /// Events this one synchronized with: empty for Sends, one entry for a
    /// Binary response, several for a Barrier response.
    pub dependencies: Vec<Id>,
    /// Per-thread max positions of every causal predecessor, inclusive of
    /// this event itself.
    pub causality_clock: Clock,
    /// The `ObjectAllocation` Send that allocated the object this event
    /// touches, if any.
    pub allocation_event: Option<Id>,
    /// For a `Write`, the event that allocated the value being written, if
    /// the value is itself an object reference produced elsewhere.
    pub source: Option<Id>,
}

impl Event {
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

impl HasId for Event {
    fn id(&self) -> Id {
        self.id
    }
}
