//! Candidate discovery for synchronization (`spec.md` §4.4).
//!
//! A candidate is an event already in the current execution that a new
//! Request or Send might synchronize with. Two refinements narrow the raw
//! set before [`core_sync::sync`] gets to decide shape-compatibility:
//!
//! - a candidate under a pinned frontier is excluded unless it is itself a
//!   still-blocked dangling request (re-synchronizing a choice a previous
//!   backtrack point already fixed would silently change that branch's
//!   outcome);
//! - a `Read` request additionally drops any write candidate that a
//!   same-thread coherence rule or a fresher racy write has superseded
//!   (`spec.md` §4.4 "stale"/"racy").
//!
//! `spec.md` also says a candidate must not be "a strict causal predecessor"
//! of the requesting event. Read literally that would exclude a thread's own
//! most recent write from its own next read's candidates, which can't be
//! right — every ordinary same-thread read-after-write would then have
//! nothing to synchronize with. We read it as already implied by the pinned
//! exclusion above (a causal predecessor that's been pinned past is exactly
//! the "foreclosed alternative" the rule is protecting) and don't apply a
//! separate raw-causality filter; see `DESIGN.md`.

use core_execution::{racy_writes, Execution, ExecutionFrontier};
use core_types::{Event, Id, Payload, ThreadId};

use crate::structure::EventStructure;

pub fn raw_candidates(
    structure: &EventStructure,
    execution: &Execution,
    pinned: &ExecutionFrontier,
    requester: Id,
) -> Vec<Id> {
    let mut out = Vec::new();
    for id in execution.all_ids() {
        if id == requester {
            continue;
        }
        let event = structure.event(id);
        if is_pinned_past(pinned, structure, event) && structure.dangling_response(id).is_none() {
            continue;
        }
        out.push(id);
    }
    out.sort_unstable();
    out
}

fn is_pinned_past(pinned: &ExecutionFrontier, structure: &EventStructure, event: &Event) -> bool {
    match pinned.get(event.thread) {
        Some(pinned_id) => {
            let pinned_position = structure.event(pinned_id).thread_position;
            event.thread_position < pinned_position
        }
        None => false,
    }
}

/// Narrows `candidates` (already filtered to `Write`/`Initialization` shapes
/// by `sync`) to the ones a fresh `Read` at `location` may still observe.
pub fn filter_read_candidates(
    structure: &EventStructure,
    execution: &Execution,
    requester_thread: ThreadId,
    location: core_types::Location,
    candidates: Vec<Id>,
) -> Vec<Id> {
    let frontier = execution.frontier();
    let last_observed = last_observed_write(structure, execution, requester_thread, location);
    let racy = racy_writes(location, &frontier, structure);

    candidates
        .into_iter()
        .filter(|&id| {
            if matches!(structure.event(id).label.payload, Payload::Initialization { .. }) {
                return true;
            }
            let clock = &structure.event(id).causality_clock;
            if let Some(stale) = last_observed {
                if id != stale && clock.lt(&structure.event(stale).causality_clock) {
                    return false;
                }
            }
            !racy
                .iter()
                .any(|&r| r != id && clock.lt(&structure.event(r).causality_clock))
        })
        .collect()
}

/// The write this thread last read from at `location`, if it has read there
/// before (walking its own program order backwards).
fn last_observed_write(
    structure: &EventStructure,
    execution: &Execution,
    thread: ThreadId,
    location: core_types::Location,
) -> Option<Id> {
    for &id in execution.ids_in_thread(thread).iter().rev() {
        let event = structure.event(id);
        if let Payload::Read { location: read_loc, .. } = &event.label.payload {
            if *read_loc == location && event.label.is_response() {
                return event.dependencies.first().copied();
            }
        }
    }
    None
}
