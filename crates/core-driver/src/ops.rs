//! The public append facade of `spec.md` §4.5 / §4.6 step "addResponseEvents"
//! — typed wrappers that additionally know how to *replay*.
//!
//! Every wrapper here first asks [`ExplorationDriver::can_replay_next_event`]
//! whether the scripted suffix already has an answer for this thread's next
//! step. If so, the existing event(s) are adopted verbatim (no new id is
//! minted, nothing is re-checked — the prefix up to the current exploration
//! root was already validated in one shot by `start_next_exploration`).
//! Only once replay is exhausted does a call fall through to
//! `core_structure::ops`, mint a genuinely new event, and run it past the
//! incremental checker. A `Send` capable of unblocking some other thread's
//! dangling request (`Write`, `Unlock`, `Notify`, `Unpark`, `ThreadFinish`,
//! `ThreadFork`, `ObjectAllocation`) additionally triggers
//! [`ExplorationDriver::resolve_dangling`] afterwards.

use core_execution::{Execution, ExecutionFrontier};
use core_structure::EventStructure;
use core_types::{Event, Location, MutexHandle, ObjectHandle, ThreadId, ThreadIdSet, Value};

use crate::driver::ExplorationDriver;
use crate::error::CoreError;

impl ExplorationDriver {
    /// `true` iff the next scripted event in the replay suffix belongs to
    /// `thread` — the replay-side half of `spec.md` §4.6's
    /// `canReplayNextEvent`.
    pub fn can_replay_next_event(&self, thread: ThreadId) -> bool {
        self.replayer
            .get(self.replay_cursor)
            .map(|&id| self.structure.event(id).thread == thread)
            .unwrap_or(false)
    }

    /// The thread the replayer expects to move next, if replay isn't
    /// exhausted. The harness calls this to decide which OS thread to run
    /// when none of its own heuristics apply (`spec.md` §4.6 "the
    /// instrumented runtime cooperates by calling
    /// `internalThreadSwitchCallback(t)`").
    pub fn next_replay_thread(&self) -> Option<ThreadId> {
        self.replayer
            .get(self.replay_cursor)
            .map(|&id| self.structure.event(id).thread)
    }

    pub fn is_replaying(&self) -> bool {
        self.replay_cursor < self.replayer.len()
    }

    fn replay_next(&mut self, thread: ThreadId) -> Event {
        let id = self.replayer[self.replay_cursor];
        self.replay_cursor += 1;
        self.played_frontier.set(thread, id);
        self.structure.event(id).clone()
    }

    fn do_send<F>(&mut self, thread: ThreadId, build: F, resolve_after: bool) -> Result<Event, CoreError>
    where
        F: FnOnce(&mut EventStructure, &mut Execution, &ExecutionFrontier, ThreadId) -> anyhow::Result<Event>,
    {
        if self.can_replay_next_event(thread) {
            return Ok(self.replay_next(thread));
        }
        let event = build(&mut self.structure, &mut self.current_execution, &self.pinned_events, thread)
            .map_err(|e| CoreError::InvariantViolation(e.to_string()))?;
        self.checker.check_event(&event, &self.structure);
        if resolve_after {
            self.resolve_dangling()?;
        }
        Ok(event)
    }

    fn do_request<F>(&mut self, thread: ThreadId, build: F) -> Result<(Event, Option<Event>), CoreError>
    where
        F: FnOnce(
            &mut EventStructure,
            &mut Execution,
            &ExecutionFrontier,
            ThreadId,
        ) -> anyhow::Result<(Event, Option<Event>)>,
    {
        if self.can_replay_next_event(thread) {
            let req = self.replay_next(thread);
            let resp = if self.can_replay_next_event(thread) {
                let next_id = self.replayer[self.replay_cursor];
                if self.structure.event(next_id).parent == Some(req.id) {
                    Some(self.replay_next(thread))
                } else {
                    None
                }
            } else {
                None
            };
            return Ok((req, resp));
        }
        let (req, resp) = build(&mut self.structure, &mut self.current_execution, &self.pinned_events, thread)
            .map_err(|e| CoreError::InvariantViolation(e.to_string()))?;
        self.checker.check_event(&req, &self.structure);
        if let Some(r) = &resp {
            self.checker.check_event(r, &self.structure);
        }
        self.resolve_dangling()?;
        Ok((req, resp))
    }

    /// Re-attempts synchronization for every thread whose last event is
    /// still a dangling blocked request — a blocked request is, by
    /// construction, the last event of its thread, so scanning every
    /// thread's tail finds all of them without a separate registry
    /// (`spec.md` §4.5 step 3's re-attempt path, triggered here after any
    /// `Send` that could newly satisfy one).
    pub fn resolve_dangling(&mut self) -> Result<(), CoreError> {
        loop {
            let mut progressed = false;
            for idx in 0..self.current_execution.thread_count() {
                let thread = ThreadId(idx);
                let Some(request) = self.get_blocked_request(thread) else {
                    continue;
                };
                let response = core_structure::ops::retry_response(
                    &mut self.structure,
                    &mut self.current_execution,
                    &self.pinned_events,
                    &request,
                )
                .map_err(|e| CoreError::InvariantViolation(e.to_string()))?;
                if let Some(event) = response {
                    self.checker.check_event(&event, &self.structure);
                    progressed = true;
                }
            }
            if !progressed {
                break;
            }
        }
        Ok(())
    }

    pub fn add_object_allocation(&mut self, thread: ThreadId, handle: ObjectHandle) -> Result<Event, CoreError> {
        self.do_send(
            thread,
            |s, e, p, t| core_structure::ops::add_object_allocation(s, e, p, t, handle),
            true,
        )
    }

    pub fn add_write(
        &mut self,
        thread: ThreadId,
        location: Location,
        value: Value,
        exclusive: bool,
    ) -> Result<Event, CoreError> {
        self.do_send(
            thread,
            |s, e, p, t| core_structure::ops::add_write(s, e, p, t, location, value, exclusive),
            true,
        )
    }

    pub fn add_unlock(
        &mut self,
        thread: ThreadId,
        mutex: MutexHandle,
        reentry_depth: u32,
    ) -> Result<Event, CoreError> {
        self.do_send(
            thread,
            |s, e, p, t| core_structure::ops::add_unlock(s, e, p, t, mutex, reentry_depth),
            true,
        )
    }

    pub fn add_notify(&mut self, thread: ThreadId, mutex: MutexHandle, broadcast: bool) -> Result<Event, CoreError> {
        self.do_send(
            thread,
            |s, e, p, t| core_structure::ops::add_notify(s, e, p, t, mutex, broadcast),
            true,
        )
    }

    pub fn add_unpark(&mut self, thread: ThreadId, target: ThreadId) -> Result<Event, CoreError> {
        self.do_send(
            thread,
            |s, e, p, t| core_structure::ops::add_unpark(s, e, p, t, target),
            true,
        )
    }

    pub fn add_thread_fork(&mut self, thread: ThreadId, children: ThreadIdSet) -> Result<Event, CoreError> {
        self.do_send(
            thread,
            move |s, e, p, t| core_structure::ops::add_thread_fork(s, e, p, t, children.clone()),
            true,
        )
    }

    pub fn add_thread_finish(&mut self, thread: ThreadId, finishing: ThreadId) -> Result<Event, CoreError> {
        self.do_send(
            thread,
            move |s, e, p, t| core_structure::ops::add_thread_finish(s, e, p, t, finishing),
            true,
        )
    }

    pub fn add_read(
        &mut self,
        thread: ThreadId,
        location: Location,
        exclusive: bool,
    ) -> Result<(Event, Option<Event>), CoreError> {
        self.do_request(thread, move |s, e, p, t| {
            core_structure::ops::add_read(s, e, p, t, location, exclusive)
        })
    }

    pub fn add_lock(
        &mut self,
        thread: ThreadId,
        mutex: MutexHandle,
        reentry_depth: u32,
    ) -> Result<(Event, Option<Event>), CoreError> {
        self.do_request(thread, move |s, e, p, t| {
            core_structure::ops::add_lock(s, e, p, t, mutex, reentry_depth)
        })
    }

    pub fn add_wait(&mut self, thread: ThreadId, mutex: MutexHandle) -> Result<(Event, Option<Event>), CoreError> {
        self.do_request(thread, move |s, e, p, t| core_structure::ops::add_wait(s, e, p, t, mutex))
    }

    pub fn add_park(&mut self, thread: ThreadId) -> Result<(Event, Option<Event>), CoreError> {
        self.do_request(thread, |s, e, p, t| core_structure::ops::add_park(s, e, p, t))
    }

    pub fn add_thread_start(
        &mut self,
        thread: ThreadId,
        starting: ThreadId,
    ) -> Result<(Event, Option<Event>), CoreError> {
        self.do_request(thread, move |s, e, p, t| {
            core_structure::ops::add_thread_start(s, e, p, t, starting)
        })
    }

    pub fn add_thread_join(
        &mut self,
        thread: ThreadId,
        targets: ThreadIdSet,
    ) -> Result<(Event, Option<Event>), CoreError> {
        self.do_request(thread, move |s, e, p, t| {
            core_structure::ops::add_thread_join(s, e, p, t, targets.clone())
        })
    }
}
