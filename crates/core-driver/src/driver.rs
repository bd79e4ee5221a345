//! Driver state, lifecycle (`startNextExploration` / `initializeExploration`
//! / `abortExploration`) and the read-only queries of `spec.md` §4.6, §6.

use core_check::{CompositeChecker, ConsistencyModel, Inconsistency};
use core_execution::{Execution, ExecutionFrontier, EventStore};
use core_structure::{BacktrackableEvent, EventStructure, MemoryInitializer};
use core_types::{Event, Id, Payload, ThreadId};

/// `startNextExploration` / `initializeExploration` / `abortExploration`
/// plus the public append facade (`ops.rs`) and queries of `spec.md` §6
/// (`isActive`, `isBlockedRequest`, ...).
///
/// Owns everything the spec's control-flow description calls mutable:
/// the event structure, the execution currently considered "taken", the
/// replay cursor, and the consistency checkers. A user of this type is the
/// instrumented runtime stand-in (`mc-harness`): it calls the append
/// operations in `ops.rs` in program order per thread and inspects the
/// queries below to decide which thread can make progress next.
pub struct ExplorationDriver {
    pub(crate) structure: EventStructure,
    pub(crate) current_execution: Execution,
    pub(crate) played_frontier: ExecutionFrontier,
    /// The scripted suffix of events to replay in a fixed order — every id
    /// currently in `current_execution`, sorted ascending. Ascending-by-id
    /// is a valid linearization compatible with happens-before (`spec.md`
    /// §8 invariant 2: `e ≤ f ⟹ e.id < f.id`), which is what this stands in
    /// for "the checker's declared execution order" (`spec.md` §4.6):
    /// neither checker exposes its internal order publicly, and any total
    /// order extending hb replays the same scripted events in the same
    /// relative positions. See `DESIGN.md`.
    pub(crate) replayer: Vec<Id>,
    pub(crate) replay_cursor: usize,
    pub(crate) pinned_events: ExecutionFrontier,
    pub(crate) current_root: Option<Id>,
    pub(crate) checker: CompositeChecker,
    pub(crate) user_threads: usize,
    /// Whether the very first exploration (from the structure's root,
    /// before any backtrack point exists to pick) has been handed out yet.
    /// `spec.md` §4.6 describes `startNextExploration` purely in terms of
    /// "the highest-id unvisited backtrackable event", which has nothing to
    /// select on a brand-new structure (the root is persisted already
    /// visited, per `spec.md` §3 "Sends ... never themselves backtrack
    /// points"). This flag is the bootstrap step the spec leaves implicit;
    /// see `DESIGN.md`.
    pub(crate) bootstrapped: bool,
}

impl ExplorationDriver {
    /// Builds a driver for a run of `user_threads` user threads and seeds
    /// the root `Initialization` event on the reserved init thread
    /// (`spec.md` §3 "Thread identifier").
    pub fn new(
        user_threads: usize,
        model: ConsistencyModel,
        memory_initializer: Box<dyn MemoryInitializer>,
    ) -> Self {
        let mut structure = EventStructure::new(memory_initializer);
        let mut current_execution = Execution::new();
        let pinned = ExecutionFrontier::new();
        let init_thread = ThreadId::init(user_threads);
        let main_thread = ThreadId::main(user_threads);
        let root = core_structure::ops::add_initialization(
            &mut structure,
            &mut current_execution,
            &pinned,
            init_thread,
            main_thread,
        )
        .expect("root Initialization event never conflicts on an empty structure");

        let mut checker = CompositeChecker::new(model);
        checker.reset(&current_execution, &structure);

        Self {
            structure,
            current_execution,
            played_frontier: ExecutionFrontier::new(),
            replayer: vec![root.id],
            replay_cursor: 0,
            pinned_events: pinned,
            current_root: Some(root.id),
            checker,
            user_threads,
            bootstrapped: false,
        }
    }

    pub fn init_thread(&self) -> ThreadId {
        ThreadId::init(self.user_threads)
    }

    pub fn main_thread(&self) -> ThreadId {
        ThreadId::main(self.user_threads)
    }

    /// `spec.md` §4.6 `startNextExploration`.
    ///
    /// Finds the highest-id unvisited backtrackable event, truncates the
    /// structure to end with it, rewinds `current_execution` to its
    /// creation-time frontier, re-appends it, resets the checkers and
    /// checks the freshly-rewound execution. Returns `false` once no
    /// unvisited event remains — exploration of this test is complete.
    pub fn start_next_exploration(&mut self) -> bool {
        if !self.bootstrapped {
            self.bootstrapped = true;
            self.checker.reset(&self.current_execution, &self.structure);
            self.checker.check(&self.structure);
            self.rebuild_replayer();
            tracing::debug!(target: "driver.explore", "bootstrap exploration from root");
            return true;
        }

        let Some(next_id) = self.structure.highest_unvisited() else {
            tracing::debug!(target: "driver.explore", "no unvisited backtrack points remain");
            return false;
        };
        self.structure.truncate_after(next_id);
        self.structure.mark_visited(next_id);

        let be: BacktrackableEvent = self
            .structure
            .backtrackable(next_id)
            .cloned()
            .expect("just truncated to end with this event");

        self.current_execution = Execution::from_frontier(&be.frontier_snapshot, &self.structure);
        self.current_execution
            .add(&be.event)
            .expect("frontier_snapshot was computed with this event's own conflicts already cut");
        self.pinned_events = be.pinned_frontier;
        self.current_root = Some(next_id);

        self.checker.reset(&self.current_execution, &self.structure);
        self.checker.check_event(&be.event, &self.structure);
        self.checker.check(&self.structure);

        self.rebuild_replayer();
        tracing::debug!(target: "driver.explore", root = next_id, "starting exploration");
        true
    }

    fn rebuild_replayer(&mut self) {
        let mut ids: Vec<Id> = self.current_execution.all_ids().collect();
        ids.sort_unstable();
        self.replayer = ids;
        self.replay_cursor = 0;
    }

    /// `spec.md` §4.6 `initializeExploration`: prime `playedFrontier` with
    /// the init-thread root and advance the replayer past it.
    pub fn initialize_exploration(&mut self) {
        self.played_frontier = ExecutionFrontier::new();
        let init_thread = self.init_thread();
        if let Some(&root_id) = self.replayer.first() {
            self.played_frontier.set(init_thread, root_id);
            self.replay_cursor = 1;
        } else {
            self.replay_cursor = 0;
        }
    }

    /// `spec.md` §4.6 `abortExploration`: cut each thread back to what was
    /// actually replayed, except a blocking request's already-discovered
    /// response is kept when every one of its dependencies was itself
    /// already replayed — retaining it lets the *next* exploration's
    /// conflict discovery still see (and reject) a double-unblock.
    pub fn abort_exploration(&mut self) {
        let thread_count = self.current_execution.thread_count();
        for idx in 0..thread_count {
            let thread = ThreadId(idx);
            let mut keep_pos = match self.played_frontier.get(thread) {
                Some(id) => self.structure.event(id).thread_position + 1,
                None => 0,
            };
            if let Some(extra_id) = self.current_execution.event_at(thread, keep_pos) {
                let extra = self.structure.event(extra_id).clone();
                let request_is_blocking = extra
                    .parent
                    .map(|p| self.structure.event(p).label.is_blocking())
                    .unwrap_or(false);
                let deps_all_replayed = extra.dependencies.iter().all(|&dep| {
                    let dep_event = self.structure.event(dep);
                    self.played_frontier
                        .get(dep_event.thread)
                        .map(|played| self.structure.event(played).thread_position >= dep_event.thread_position)
                        .unwrap_or(false)
                });
                if extra.label.is_response() && request_is_blocking && deps_all_replayed {
                    keep_pos += 1;
                }
            }
            self.current_execution.cut(thread, keep_pos);
        }
        tracing::debug!(target: "driver.replay", "aborted exploration, truncated to replayed frontier");
    }

    pub fn check_consistency(&self) -> Option<Inconsistency> {
        self.checker.detected().cloned()
    }

    pub fn is_started_thread(&self, thread: ThreadId) -> bool {
        thread == self.main_thread()
            || thread == self.init_thread()
            || self.current_execution.thread_len(thread) > 0
    }

    pub fn is_finished_thread(&self, thread: ThreadId) -> bool {
        self.current_execution
            .ids_in_thread(thread)
            .iter()
            .any(|&id| matches!(self.structure.event(id).label.payload, Payload::ThreadFinish { .. }))
    }

    pub fn is_active(&self, thread: ThreadId) -> bool {
        self.is_started_thread(thread) && !self.is_finished_thread(thread)
    }

    pub fn is_blocked_request(&self, event: &Event) -> bool {
        matches!(self.structure.dangling_response(event.id), Some(None))
    }

    pub fn is_blocked_awaiting_request(&self, event: &Event) -> bool {
        matches!(self.structure.dangling_response(event.id), Some(Some(_)))
    }

    /// The response already synthesized for `request`, if some other
    /// thread's `Send` has since resolved it (`spec.md` §4.5's re-attempt
    /// path) — `None` while it's still a dangling blocked request.
    pub fn response_for(&self, request: &Event) -> Option<Event> {
        self.current_execution
            .ids_in_thread(request.thread)
            .iter()
            .find_map(|&id| {
                let event = self.structure.event(id);
                (event.parent == Some(request.id)).then(|| event.clone())
            })
    }

    /// The dangling blocked request currently sitting at the end of
    /// `thread`'s program order, if any. A blocked request is by
    /// construction the last event of its thread — nothing can be appended
    /// past an unresolved blocking request.
    pub fn get_blocked_request(&self, thread: ThreadId) -> Option<Event> {
        let id = self.current_execution.last_event(thread)?;
        let event = self.structure.event(id);
        if event.label.is_blocking() && self.is_blocked_request(event) {
            Some(event.clone())
        } else {
            None
        }
    }

    /// The backtrack point the current exploration started from, or `None`
    /// before the first call to `start_next_exploration`.
    pub fn current_root(&self) -> Option<Id> {
        self.current_root
    }

    pub fn structure(&self) -> &EventStructure {
        &self.structure
    }

    pub fn execution(&self) -> &Execution {
        &self.current_execution
    }
}
