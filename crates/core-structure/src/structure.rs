//! The event structure's append-only storage (`spec.md` §4.2, §4.3).

use core_clock::Clock;
use core_collections::{IdentityMap, SortedById};
use core_execution::EventStore;
use core_types::{Event, Id, Label, Location, ObjectHandle, ThreadId, Value};

use crate::backtrack::BacktrackableEvent;
use crate::conflicts::discover_conflicts;
use crate::MemoryInitializer;

/// Everything the exploration has ever created, across every branch it has
/// visited or left for later — an append-only arena, truncated only when a
/// backtrack point is abandoned for good (`spec.md` §3 "Event Structure").
pub struct EventStructure {
    events: SortedById<BacktrackableEvent>,
    /// Object handle -> the `ObjectAllocation` event that introduced it.
    allocations: IdentityMap<ObjectHandle, Id>,
    /// Request id -> unblocking response id, once one has been chosen for
    /// it. A request present with no response yet is dangling and blocked.
    dangling: IdentityMap<Id, Option<Id>>,
    /// Supplies the value a location reads as before any `Write` to it has
    /// happened — the one piece of external context read-synthesis needs
    /// that isn't already captured by an event in the structure.
    memory_initializer: Box<dyn MemoryInitializer>,
}

impl EventStore for EventStructure {
    fn event(&self, id: Id) -> &Event {
        &self
            .events
            .get(id)
            .unwrap_or_else(|| panic!("event {id} not in structure"))
            .event
    }
}

impl EventStructure {
    pub fn new(memory_initializer: Box<dyn MemoryInitializer>) -> Self {
        Self {
            events: SortedById::new(),
            allocations: IdentityMap::new(),
            dangling: IdentityMap::new(),
            memory_initializer,
        }
    }

    pub fn initial_value(&self, location: Location) -> Value {
        self.memory_initializer.initial_value(location)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn backtrackable(&self, id: Id) -> Option<&BacktrackableEvent> {
        self.events.get(id)
    }

    pub fn visited(&self, id: Id) -> bool {
        self.backtrackable(id).map(|be| be.visited).unwrap_or(false)
    }

    pub fn mark_visited(&mut self, id: Id) {
        if let Some(be) = self.events.get_mut(id) {
            be.visited = true;
        }
    }

    pub fn allocation_of(&self, handle: ObjectHandle) -> Option<Id> {
        self.allocations.get(&handle).copied()
    }

    pub fn dangling_response(&self, request: Id) -> Option<Option<Id>> {
        self.dangling.get(&request).copied()
    }

    pub fn mark_dangling(&mut self, request: Id) {
        self.dangling.insert(request, None);
    }

    pub fn record_unblocking(&mut self, request: Id, response: Id) {
        self.dangling.insert(request, Some(response));
    }

    /// The highest-id unvisited event still in the structure — the next
    /// backtrack point `startNextExploration` resumes from (`spec.md` §4.6).
    pub fn highest_unvisited(&self) -> Option<Id> {
        self.events
            .iter()
            .rev()
            .find(|be| !be.visited)
            .map(|be| be.event.id)
    }

    /// Drops every stored event with an id greater than `id` — abandoning
    /// whatever exploration branches they represented (`spec.md` §4.6
    /// "abortExploration").
    pub fn truncate_after(&mut self, id: Id) {
        self.events.truncate_after(id);
        self.allocations = IdentityMap::new();
        for be in self.events.iter() {
            if let core_types::Payload::ObjectAllocation { handle } = &be.event.label.payload {
                self.allocations.insert(*handle, be.event.id);
            }
        }
        let retained: Vec<Id> = self.events.iter().map(|be| be.event.id).collect();
        let retained_set: std::collections::HashSet<Id> = retained.into_iter().collect();
        let mut next_dangling = IdentityMap::new();
        for (req, resp) in self.dangling_entries() {
            if retained_set.contains(&req) && resp.map(|r| retained_set.contains(&r)).unwrap_or(true) {
                next_dangling.insert(req, resp);
            }
        }
        self.dangling = next_dangling;
    }

    fn dangling_entries(&self) -> Vec<(Id, Option<Id>)> {
        // `IdentityMap` doesn't expose iteration (none of its other callers
        // need it); rebuilding from scratch on truncate is the one place
        // that does, so we reconstruct from the events we just kept instead
        // of growing the collection's public surface for a single caller.
        self.events
            .iter()
            .filter_map(|be| {
                self.dangling
                    .get(&be.event.id)
                    .map(|resp| (be.event.id, *resp))
            })
            .collect()
    }

    fn next_id(&self) -> Id {
        self.events.len() as Id
    }

    fn causality_clock_for(&self, thread: ThreadId, parent: Option<Id>, dependencies: &[Id]) -> (usize, Clock) {
        let thread_position = parent.map(|p| self.event(p).thread_position + 1).unwrap_or(0);
        let mut clock = parent.map(|p| self.event(p).causality_clock.clone()).unwrap_or_default();
        for &dep in dependencies {
            clock.join(&self.event(dep).causality_clock);
        }
        clock.set(thread.index(), thread_position as u32);
        (thread_position, clock)
    }

    fn allocation_for(&self, label: &Label) -> Option<Id> {
        let handle = label.payload.location().map(|loc| loc.object).or_else(|| label.payload.mutex());
        handle.and_then(|h| self.allocation_of(h))
    }

    /// `spec.md` §4.3 step 1, exposed so callers that need the same
    /// conflict set again later (the frontier snapshot taken at persist
    /// time) don't have to re-derive the rules themselves.
    pub fn conflicts_for(
        &self,
        thread: ThreadId,
        label: &Label,
        parent: Option<Id>,
        dependencies: &[Id],
    ) -> Vec<Event> {
        discover_conflicts(&self.events, thread, label, parent, dependencies, |id| {
            self.event(id).clone()
        })
    }

    /// Runs conflict discovery and the causality check, then constructs (but
    /// does not persist) the event — `spec.md` §4.3 steps 1-3. Returns
    /// `None` on a causality violation, matching the `Option<Event>`
    /// `CausalityViolation` signal in `spec.md` §7.
    pub fn create_event(
        &self,
        thread: ThreadId,
        label: Label,
        parent: Option<Id>,
        dependencies: Vec<Id>,
    ) -> Option<Event> {
        let conflicts = self.conflicts_for(thread, &label, parent, &dependencies);

        for dep in parent.into_iter().chain(dependencies.iter().copied()) {
            let dep_clock = &self.event(dep).causality_clock;
            if conflicts.iter().any(|c| dep_clock.le(&c.causality_clock)) {
                tracing::debug!(target: "structure.causality", dep, "causality violation");
                return None;
            }
        }

        let (thread_position, causality_clock) = self.causality_clock_for(thread, parent, &dependencies);
        let allocation_event = self.allocation_for(&label);
        let id = self.next_id();
        Some(Event {
            id,
            thread,
            thread_position,
            label,
            parent,
            dependencies,
            causality_clock,
            allocation_event,
            source: None,
        })
    }

    /// Persists `event` to the append-only store with the given backtrack
    /// bookkeeping — `spec.md` §4.3 step 4.
    pub(crate) fn persist(
        &mut self,
        event: Event,
        visited: bool,
        frontier_snapshot: core_execution::ExecutionFrontier,
        pinned_frontier: core_execution::ExecutionFrontier,
    ) {
        if let core_types::Payload::ObjectAllocation { handle } = &event.label.payload {
            self.allocations.insert(*handle, event.id);
        }
        tracing::trace!(
            target: "structure.append",
            id = event.id,
            thread = event.thread.index(),
            visited,
            "persisted event"
        );
        self.events.push(BacktrackableEvent {
            event,
            visited,
            frontier_snapshot,
            pinned_frontier,
        });
    }
}
