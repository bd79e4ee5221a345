//! Memory-location views (`spec.md` §4.8).
//!
//! These are recomputed per read-request — there is no cross-call cache —
//! which keeps the append path's invariants simple at the cost of repeating
//! a thread-local walk backwards to the last write. See `DESIGN.md` for the
//! reasoning (the spec describes the computation but not its lifecycle).

use crate::frontier::ExecutionFrontier;
use crate::store::EventStore;
use core_types::{Id, Location, Payload};

/// For each thread in `frontier`, the latest `Write` to `loc` at or before
/// that thread's frontier position, if any.
pub fn memory_view(loc: Location, frontier: &ExecutionFrontier, store: &impl EventStore) -> ExecutionFrontier {
    let mut view = ExecutionFrontier::new();
    for (thread, last_id) in frontier.iter() {
        let mut cursor = Some(last_id);
        while let Some(id) = cursor {
            let event = store.event(id);
            if let Payload::Write { location, .. } = &event.label.payload {
                if *location == loc {
                    view.set(thread, id);
                    break;
                }
            }
            cursor = event.parent;
        }
    }
    view
}

/// The pairwise hb-maximal writes within `memory_view(loc, frontier)` — the
/// set of writes a fresh read at `frontier` could race with.
pub fn racy_writes(loc: Location, frontier: &ExecutionFrontier, store: &impl EventStore) -> Vec<Id> {
    let view = memory_view(loc, frontier, store);
    let ids: Vec<Id> = view.iter().map(|(_, id)| id).collect();
    ids.iter()
        .copied()
        .filter(|&id| {
            let clock = &store.event(id).causality_clock;
            !ids.iter().any(|&other| {
                other != id && clock.lt(&store.event(other).causality_clock)
            })
        })
        .collect()
}
