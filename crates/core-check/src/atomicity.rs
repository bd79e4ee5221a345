//! Incremental atomicity checker (`spec.md` §4.7).
//!
//! For every exclusive `Read` immediately followed, in its own thread, by an
//! exclusive `Write` to the same location (a read-modify-write pair), no
//! other write to that location may be ordered between them in
//! happens-before.

use crate::Inconsistency;
use core_collections::DenseMap;
use core_execution::{EventStore, Execution};
use core_types::{Event, Id, Location, Payload};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy)]
struct PendingRmw {
    read: Id,
    location: Location,
}

/// Tracks, per thread, the most recent exclusive read awaiting its paired
/// write, and, per location, every write observed so far (in the order they
/// were appended) to test "ordered between" against.
#[derive(Debug)]
pub struct AtomicityChecker {
    pending: DenseMap<PendingRmw>,
    writes_by_location: HashMap<Location, Vec<Id>>,
}

impl AtomicityChecker {
    pub fn new() -> Self {
        Self {
            pending: DenseMap::new(),
            writes_by_location: HashMap::new(),
        }
    }

    pub fn reset(&mut self, execution: &Execution, store: &dyn EventStore) {
        self.pending = DenseMap::new();
        self.writes_by_location.clear();
        let mut ids: Vec<Id> = execution.all_ids().collect();
        ids.sort_unstable();
        for id in ids {
            self.check_event(store.event(id), store);
        }
    }

    pub fn check_event(&mut self, event: &Event, store: &dyn EventStore) -> Option<Inconsistency> {
        match &event.label.payload {
            Payload::Read { location, exclusive: true, .. } if event.label.is_response() => {
                self.pending.set(
                    event.thread.index(),
                    PendingRmw { read: event.id, location: *location },
                );
                None
            }
            Payload::Write { location, exclusive, .. } if event.label.is_send() => {
                let result = if *exclusive {
                    self.check_rmw_pair(event, *location, store)
                } else {
                    None
                };
                self.writes_by_location.entry(*location).or_default().push(event.id);
                result
            }
            _ => None,
        }
    }

    fn check_rmw_pair(
        &mut self,
        write: &Event,
        location: Location,
        store: &dyn EventStore,
    ) -> Option<Inconsistency> {
        let pending = *self.pending.get(write.thread.index())?;
        if pending.location != location || write.parent != Some(pending.read) {
            return None;
        }
        self.pending.remove(write.thread.index());

        let read_clock = &store.event(pending.read).causality_clock;
        let write_clock = &write.causality_clock;
        let violation = self
            .writes_by_location
            .get(&location)
            .into_iter()
            .flatten()
            .copied()
            .find(|&other| {
                let other_clock = &store.event(other).causality_clock;
                read_clock.lt(other_clock) && other_clock.lt(write_clock)
            });

        violation.map(|other| {
            tracing::debug!(target: "check.atomicity", read = pending.read, write = write.id, other, "rmw pair not atomic");
            Inconsistency::Atomicity {
                read: pending.read,
                write: write.id,
                other,
                location,
            }
        })
    }

    /// No further obligation beyond the incremental per-event check: every
    /// RMW pair was already validated as its write was appended.
    pub fn check(&mut self, _store: &dyn EventStore) -> Option<Inconsistency> {
        None
    }
}
