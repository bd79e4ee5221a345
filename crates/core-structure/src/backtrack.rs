//! The one mutable bit layered on top of an otherwise-immutable [`Event`]
//! (`spec.md` §4.2 "Backtrackable Event").

use core_collections::HasId;
use core_execution::ExecutionFrontier;
use core_types::{Event, Id};

/// An event as stored in the event structure: the immutable record plus the
/// bookkeeping backtracking needs to treat it as a future exploration root.
#[derive(Debug, Clone)]
pub struct BacktrackableEvent {
    pub event: Event,
    /// Whether the current or a past exploration has already added this
    /// event to its execution. Unvisited events are backtrack points.
    pub visited: bool,
    /// The execution frontier immediately before this event was appended,
    /// with conflicting events and dangling requests already cut — i.e.
    /// exactly the execution a future exploration resumes from if it picks
    /// this event as its next step.
    pub frontier_snapshot: ExecutionFrontier,
    /// The pinned-event frontier this event's exploration inherits: an
    /// event id here cannot be re-chosen differently than it was this time.
    pub pinned_frontier: ExecutionFrontier,
}

impl HasId for BacktrackableEvent {
    fn id(&self) -> Id {
        self.event.id
    }
}
