//! Conflict discovery (`spec.md` §4.3 step 1).
//!
//! Three independent rules decide whether an about-to-be-appended
//! `(thread, label, parent, dependencies)` tuple conflicts with an event
//! already in the structure:
//!
//! 1. Another event already occupies the thread slot this one would take —
//!    the structure is append-only across explorations, so an earlier
//!    exploration's branch can still be sitting at that position.
//! 2. Two non-reentrant `Lock` responses witnessed by the same `Unlock` *or*
//!    the same `ObjectAllocation`: a release (or, for the very first
//!    acquisition, the allocation itself) can only actually hand the monitor
//!    to one acquirer.
//! 3. Two non-broadcast `Wait` responses witnessed by the same `Notify`: a
//!    single wake-one can only actually wake one waiter.

use core_collections::SortedById;
use core_types::{Event, Id, Label, Payload, ThreadId};

use crate::backtrack::BacktrackableEvent;

pub fn discover_conflicts(
    events: &SortedById<BacktrackableEvent>,
    thread: ThreadId,
    label: &Label,
    parent: Option<Id>,
    dependencies: &[Id],
    event_at: impl Fn(Id) -> Event,
) -> Vec<Event> {
    let position = parent.map(|p| event_at(p).thread_position + 1).unwrap_or(0);
    let mut conflicts = Vec::new();

    for be in events.iter() {
        if be.event.thread == thread && be.event.thread_position == position {
            conflicts.push(be.event.clone());
        }
    }

    if label.is_response() && !label.is_reentry() {
        match (&label.payload, dependencies.first()) {
            (Payload::Lock { mutex, .. }, Some(&witness)) => {
                let witness_event = event_at(witness);
                if matches!(
                    witness_event.label.payload,
                    Payload::Unlock { .. } | Payload::ObjectAllocation { .. }
                ) {
                    for be in events.iter() {
                        if be.event.thread == thread || !be.event.label.is_response() {
                            continue;
                        }
                        if let Payload::Lock { mutex: other_mutex, .. } = &be.event.label.payload {
                            if other_mutex == mutex && be.event.dependencies.first() == Some(&witness) {
                                conflicts.push(be.event.clone());
                            }
                        }
                    }
                }
            }
            (Payload::Wait { mutex }, Some(&witness)) => {
                let witness_event = event_at(witness);
                if matches!(
                    witness_event.label.payload,
                    Payload::Notify { broadcast: false, .. }
                ) {
                    for be in events.iter() {
                        if be.event.thread == thread || !be.event.label.is_response() {
                            continue;
                        }
                        if let Payload::Wait { mutex: other_mutex } = &be.event.label.payload {
                            if other_mutex == mutex && be.event.dependencies.first() == Some(&witness) {
                                conflicts.push(be.event.clone());
                            }
                        }
                    }
                }
            }
            _ => {}
        }
    }

    conflicts
}
