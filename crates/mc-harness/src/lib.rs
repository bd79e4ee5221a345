//! Real-OS-thread turn-taking harness (the "instrumented runtime" `spec.md`
//! §5 describes the core as assuming) that drives
//! [`core_driver::ExplorationDriver`] through scripted, branching test
//! scenarios — one real OS thread per user thread.
//!
//! Only one user thread is ever actually inside the section that touches
//! the driver at a time; the rest spin on a [`parking_lot::Condvar`]
//! waiting for their turn — the core itself stays single-threaded and
//! lock-free (`spec.md` §5), and this crate supplies the turn-taking the
//! core assumes its caller provides. A thread whose next step is a blocked
//! request drops out of the turn rotation until some other thread's `Send`
//! resolves it, then picks back up right where it left off.
//!
//! This harness is a test fixture, not a complete model-checking
//! scheduler: it does not attempt every interleaving a real runtime
//! instrumentation would — `start_next_exploration`'s backtracking already
//! supplies that — it exists so [`mc-harness/tests`] can drive real
//! concurrent `ThreadHandle` calls across those explorations. If a
//! scripted `program` can genuinely deadlock under some schedule, this
//! harness will hang rather than detect it; none of the scenarios in
//! `tests/` do.

use std::collections::HashSet;
use std::thread;

use parking_lot::{Condvar, Mutex};

use core_driver::{ConsistencyModel, CoreError, ExplorationDriver, Inconsistency, MemoryInitializer};
use core_types::{Event, Location, MutexHandle, ObjectHandle, Payload, ThreadId, ThreadIdSet, Value};

struct Inner {
    driver: ExplorationDriver,
    active: Option<ThreadId>,
    finished: HashSet<ThreadId>,
}

/// Owns the driver and the turn-taking state shared by every user thread of
/// one scenario run.
pub struct Harness {
    user_threads: usize,
    inner: Mutex<Inner>,
    cv: Condvar,
}

/// Everything that went wrong setting up or driving one exploration.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Summary of an `explore` run across every exploration the driver handed
/// out.
#[derive(Debug)]
pub struct ExplorationOutcome {
    pub explorations_run: usize,
    pub inconsistency: Option<Inconsistency>,
}

impl Harness {
    pub fn new(user_threads: usize, model: ConsistencyModel, memory_initializer: Box<dyn MemoryInitializer>) -> Self {
        let driver = ExplorationDriver::new(user_threads, model, memory_initializer);
        Self {
            user_threads,
            inner: Mutex::new(Inner {
                driver,
                active: None,
                finished: HashSet::new(),
            }),
            cv: Condvar::new(),
        }
    }

    /// Runs `setup` on the main thread (typically object allocations, run
    /// once before any user thread forks) followed by `program(thread, _)`
    /// for every user thread `0..user_threads`, repeating for each
    /// exploration `start_next_exploration` hands out until none remain or
    /// an inconsistency is detected. For scenarios that need to inspect the
    /// outcome of every individual exploration (not just whether any of
    /// them was inconsistent), drive [`Harness::run_next`] directly instead.
    pub fn explore<S, P>(&self, setup: S, program: P) -> Result<ExplorationOutcome, HarnessError>
    where
        S: Fn(&ThreadHandle) + Sync,
        P: Fn(ThreadId, &ThreadHandle) + Sync,
    {
        let mut explorations_run = 0;
        while self.run_next(&setup, &program)? {
            explorations_run += 1;
            let inconsistency = self.inner.lock().driver.check_consistency();
            if inconsistency.is_some() {
                tracing::debug!(target: "harness.explore", explorations_run, "inconsistency found, stopping early");
                return Ok(ExplorationOutcome { explorations_run, inconsistency });
            }
        }
        Ok(ExplorationOutcome { explorations_run, inconsistency: None })
    }

    /// Runs one exploration end to end: `start_next_exploration`, then (if
    /// one was handed out) `setup` on the main thread, the fork, and
    /// `program(thread, _)` on a real OS thread per user thread. Returns
    /// `false` once the driver has nothing left to explore.
    pub fn run_next<S, P>(&self, setup: &S, program: &P) -> Result<bool, HarnessError>
    where
        S: Fn(&ThreadHandle) + Sync,
        P: Fn(ThreadId, &ThreadHandle) + Sync,
    {
        let should_run = {
            let mut inner = self.inner.lock();
            inner.driver.start_next_exploration()
        };
        if !should_run {
            return Ok(false);
        }
        self.run_one_exploration(setup, program)?;
        Ok(true)
    }

    /// The inconsistency recorded against the exploration most recently run
    /// by [`Harness::run_next`], if any.
    pub fn last_inconsistency(&self) -> Option<Inconsistency> {
        self.inner.lock().driver.check_consistency()
    }

    /// Read-only access to the driver backing this harness, for tests that
    /// need to inspect the structure or execution a scenario produced
    /// (e.g. checking a universally quantified invariant over every event)
    /// rather than just its consistency verdict.
    pub fn with_driver<R>(&self, f: impl FnOnce(&ExplorationDriver) -> R) -> R {
        f(&self.inner.lock().driver)
    }

    fn run_one_exploration<S, P>(&self, setup: &S, program: &P) -> Result<(), HarnessError>
    where
        S: Fn(&ThreadHandle) + Sync,
        P: Fn(ThreadId, &ThreadHandle) + Sync,
    {
        let main_thread = {
            let mut inner = self.inner.lock();
            inner.finished.clear();
            let main_thread = inner.driver.main_thread();
            inner.active = Some(main_thread);
            main_thread
        };

        let main_handle = ThreadHandle { harness: self, thread: main_thread };
        setup(&main_handle);

        {
            let mut inner = self.inner.lock();
            let targets = ThreadIdSet::from_iter((0..self.user_threads).map(ThreadId));
            inner.driver.add_thread_fork(main_thread, targets)?;
            inner.active = Some(ThreadId(0));
            self.cv.notify_all();
        }

        thread::scope(|scope| {
            for t in 0..self.user_threads {
                let thread = ThreadId(t);
                scope.spawn(move || {
                    let handle = ThreadHandle { harness: self, thread };
                    handle.start();
                    program(thread, &handle);
                    handle.finish();
                });
            }
        });
        Ok(())
    }

    /// Passes the turn to the next runnable user thread (ascending,
    /// round-robin from whoever just ran), skipping threads that have
    /// finished or are sitting on an unresolved blocked request. `None` if
    /// every thread is finished or blocked.
    fn hand_off(&self, inner: &mut Inner) {
        let n = self.user_threads;
        let start = inner.active.map(|t| t.index() + 1).unwrap_or(0);
        for offset in 0..n {
            let idx = (start + offset) % n;
            let candidate = ThreadId(idx);
            if inner.finished.contains(&candidate) {
                continue;
            }
            if inner.driver.get_blocked_request(candidate).is_some() {
                continue;
            }
            inner.active = Some(candidate);
            self.cv.notify_all();
            return;
        }
        inner.active = None;
        self.cv.notify_all();
    }
}

/// A handle a scenario's program body uses to perform one user thread's
/// operations. Every method blocks until it's this thread's turn, performs
/// the corresponding append operation, and hands the turn off again before
/// returning.
pub struct ThreadHandle<'h> {
    harness: &'h Harness,
    thread: ThreadId,
}

impl<'h> ThreadHandle<'h> {
    fn wait_turn(&self) -> parking_lot::MutexGuard<'h, Inner> {
        let mut guard = self.harness.inner.lock();
        while guard.active != Some(self.thread) {
            self.harness.cv.wait(&mut guard);
        }
        guard
    }

    fn start(&self) {
        let mut guard = self.wait_turn();
        let (_, response) = guard
            .driver
            .add_thread_start(self.thread, self.thread)
            .expect("ThreadFork for this thread already ran on the main thread");
        debug_assert!(response.is_some(), "ThreadStart always synchronizes with the ThreadFork naming it");
        self.harness.hand_off(&mut guard);
    }

    fn finish(&self) {
        let mut guard = self.wait_turn();
        guard
            .driver
            .add_thread_finish(self.thread, self.thread)
            .expect("ThreadFinish is a Send, never rejected by causality");
        guard.finished.insert(self.thread);
        self.harness.hand_off(&mut guard);
    }

    pub fn allocate(&self, handle: ObjectHandle) {
        let mut guard = self.wait_turn();
        guard
            .driver
            .add_object_allocation(self.thread, handle)
            .expect("ObjectAllocation is a Send, never rejected by causality");
        self.harness.hand_off(&mut guard);
    }

    pub fn write(&self, location: Location, value: Value, exclusive: bool) {
        let mut guard = self.wait_turn();
        guard
            .driver
            .add_write(self.thread, location, value, exclusive)
            .expect("Write is a Send, never rejected by causality");
        self.harness.hand_off(&mut guard);
    }

    pub fn read(&self, location: Location, exclusive: bool) -> Value {
        let event = self.blocking_request(|d, t| d.add_read(t, location, exclusive));
        match event.label.payload {
            Payload::Read { value: Some(value), .. } => value,
            _ => unreachable!("a synchronized Read response always carries a value"),
        }
    }

    pub fn lock(&self, mutex: MutexHandle, reentry_depth: u32) {
        self.blocking_request(|d, t| d.add_lock(t, mutex, reentry_depth));
    }

    /// Returns the actual unblocking response event (rather than discarding
    /// it like `lock`/`park`'s callers usually do) so a scenario can assert
    /// on `.dependencies` — e.g. that a `Wait` response really does depend
    /// on the `Notify` that woke it (`spec.md` §8 invariant 5).
    pub fn lock_event(&self, mutex: MutexHandle, reentry_depth: u32) -> Event {
        self.blocking_request(|d, t| d.add_lock(t, mutex, reentry_depth))
    }

    pub fn unlock(&self, mutex: MutexHandle, reentry_depth: u32) {
        let mut guard = self.wait_turn();
        guard
            .driver
            .add_unlock(self.thread, mutex, reentry_depth)
            .expect("Unlock is a Send, never rejected by causality");
        self.harness.hand_off(&mut guard);
    }

    /// Blocks until notified, returning the `Wait` response event so a
    /// caller can check which `Notify` it depends on. Mirrors the standard
    /// monitor-wait contract (`spec.md` §3's "wait-lock flag" on `Lock`/
    /// `Unlock`): releases the mutex the caller holds before blocking and
    /// reacquires it before returning, so a notifying thread can itself
    /// acquire the same mutex while this thread waits — without that
    /// release, `Lock(m); Wait(m); Unlock(m)` on one thread would forever
    /// shut out the `Lock(m); Notify(m); Unlock(m)` on another that is
    /// supposed to wake it (`spec.md` §8 S4).
    pub fn wait(&self, mutex: MutexHandle) -> Event {
        self.unlock(mutex, 1);
        let woken = self.blocking_request(|d, t| d.add_wait(t, mutex));
        self.lock(mutex, 1);
        woken
    }

    pub fn notify(&self, mutex: MutexHandle, broadcast: bool) -> Event {
        let mut guard = self.wait_turn();
        let event = guard
            .driver
            .add_notify(self.thread, mutex, broadcast)
            .expect("Notify is a Send, never rejected by causality");
        self.harness.hand_off(&mut guard);
        event
    }

    /// Blocks until a permit is available, returning the `Park` response
    /// event so a caller can check which `Unpark` it depends on.
    pub fn park(&self) -> Event {
        self.blocking_request(|d, t| d.add_park(t))
    }

    pub fn unpark(&self, target: ThreadId) -> Event {
        let mut guard = self.wait_turn();
        let event = guard
            .driver
            .add_unpark(self.thread, target)
            .expect("Unpark is a Send, never rejected by causality");
        self.harness.hand_off(&mut guard);
        event
    }

    /// Mints the request, hands the turn off, then — if nothing
    /// synchronized immediately — blocks this OS thread until some other
    /// thread's `Send` resolves it (`spec.md` §4.5's dangling-request
    /// path), waking on every turn hand-off to recheck.
    fn blocking_request(
        &self,
        call: impl Fn(&mut ExplorationDriver, ThreadId) -> Result<(Event, Option<Event>), CoreError>,
    ) -> Event {
        let mut guard = self.wait_turn();
        let (request, response) =
            call(&mut guard.driver, self.thread).expect("append never rejected mid-exploration");
        self.harness.hand_off(&mut guard);
        if let Some(event) = response {
            return event;
        }
        loop {
            self.harness.cv.wait(&mut guard);
            if let Some(event) = guard.driver.response_for(&request) {
                return event;
            }
        }
    }
}
