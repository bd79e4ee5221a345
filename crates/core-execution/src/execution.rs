use crate::frontier::ExecutionFrontier;
use crate::store::EventStore;
use anyhow::{bail, Result};
use core_collections::DenseMap;
use core_types::{Event, Id, ThreadId};

/// A causally-closed set of events, partitioned per thread and kept in
/// thread-position order (`spec.md` §3 "Execution").
///
/// `Execution` only stores ids — it is a cheap-to-clone view into whatever
/// [`EventStore`] owns the real `Event` records.
#[derive(Debug, Clone, Default)]
pub struct Execution {
    per_thread: DenseMap<Vec<Id>>,
}

impl Execution {
    pub fn new() -> Self {
        Self {
            per_thread: DenseMap::new(),
        }
    }

    /// Rebuilds an `Execution` from a frontier by walking each thread's
    /// parent chain back to its root. Used when rewinding to a backtrack
    /// point's `frontierSnapshot` (`spec.md` §4.6).
    pub fn from_frontier(frontier: &ExecutionFrontier, store: &impl EventStore) -> Self {
        let mut exec = Execution::new();
        for (thread, last_id) in frontier.iter() {
            let mut ids = Vec::new();
            let mut cursor = Some(last_id);
            while let Some(id) = cursor {
                let event = store.event(id);
                ids.push(id);
                cursor = event.parent;
            }
            ids.reverse();
            exec.per_thread.set(thread.index(), ids);
        }
        exec
    }

    pub fn last_event(&self, thread: ThreadId) -> Option<Id> {
        self.per_thread.get(thread.index()).and_then(|v| v.last().copied())
    }

    pub fn first_event(&self, thread: ThreadId) -> Option<Id> {
        self.per_thread.get(thread.index()).and_then(|v| v.first().copied())
    }

    pub fn event_at(&self, thread: ThreadId, pos: usize) -> Option<Id> {
        self.per_thread.get(thread.index()).and_then(|v| v.get(pos).copied())
    }

    pub fn thread_len(&self, thread: ThreadId) -> usize {
        self.per_thread.get(thread.index()).map(Vec::len).unwrap_or(0)
    }

    pub fn contains_position(&self, thread: ThreadId, pos: usize) -> bool {
        pos < self.thread_len(thread)
    }

    pub fn contains(&self, event: &Event) -> bool {
        self.contains_position(event.thread, event.thread_position)
    }

    pub fn thread_count(&self) -> usize {
        self.per_thread.capacity_len()
    }

    /// Appends `event`. Requires `event.parent == self.last_event(event.thread)`
    /// and `event.thread_position` to be the next free slot in its thread.
    pub fn add(&mut self, event: &Event) -> Result<()> {
        let expected_pos = self.thread_len(event.thread);
        if event.thread_position != expected_pos {
            bail!(
                "event {} has thread_position {} but thread {} expects {}",
                event.id,
                event.thread_position,
                event.thread,
                expected_pos
            );
        }
        let expected_parent = if expected_pos == 0 {
            None
        } else {
            self.last_event(event.thread)
        };
        if event.parent != expected_parent {
            bail!(
                "event {} parent mismatch: expected {:?}, got {:?}",
                event.id,
                expected_parent,
                event.parent
            );
        }
        match self.per_thread.get_mut(event.thread.index()) {
            Some(v) => v.push(event.id),
            None => self.per_thread.set(event.thread.index(), vec![event.id]),
        }
        Ok(())
    }

    /// Drops events at thread `t` with `thread_position >= pos`.
    pub fn cut(&mut self, thread: ThreadId, pos: usize) {
        if let Some(v) = self.per_thread.get_mut(thread.index()) {
            v.truncate(pos);
        }
    }

    /// Cuts the thread of `event` right after `event` itself.
    pub fn cut_next(&mut self, event: &Event) {
        self.cut(event.thread, event.thread_position + 1);
    }

    /// For each conflicting event, cuts its thread at that event's position
    /// (i.e. the conflicting event and everything after it is dropped).
    pub fn cut_conflicts(&mut self, conflicts: &[Event]) {
        for conflict in conflicts {
            self.cut(conflict.thread, conflict.thread_position);
        }
    }

    /// For each thread whose last event is a blocking `Request` with no
    /// recorded `Response`, cuts the request off. A request is structurally
    /// dangling iff it is still the last event of its thread: a response
    /// would otherwise occupy that slot.
    pub fn cut_dangling_request_events(&mut self, store: &impl EventStore) {
        for idx in 0..self.per_thread.capacity_len() {
            let thread = ThreadId(idx);
            if let Some(last_id) = self.last_event(thread) {
                let event = store.event(last_id);
                if event.label.is_blocking() {
                    self.cut(thread, event.thread_position);
                }
            }
        }
    }

    /// The "last event per thread" cut representation of this execution.
    pub fn frontier(&self) -> ExecutionFrontier {
        let mut frontier = ExecutionFrontier::new();
        for idx in 0..self.per_thread.capacity_len() {
            if let Some(id) = self.last_event(ThreadId(idx)) {
                frontier.set(ThreadId(idx), id);
            }
        }
        frontier
    }

    pub fn ids_in_thread(&self, thread: ThreadId) -> &[Id] {
        self.per_thread
            .get(thread.index())
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn all_ids(&self) -> impl Iterator<Item = Id> + '_ {
        (0..self.per_thread.capacity_len())
            .flat_map(move |idx| self.ids_in_thread(ThreadId(idx)).iter().copied())
    }
}
