//! Public append operations (`spec.md` §4.5).
//!
//! Two primitives — [`add_send`] and [`add_request`] — cover every label
//! shape; the rest of this module is thin, typed convenience wrappers
//! around them so a caller builds a `Write` or a `Lock` request without
//! constructing a [`Label`]/[`Payload`] pair by hand.

use anyhow::{Context, Result};
use core_execution::{Execution, ExecutionFrontier};
use core_types::{
    Event, Kind, Label, Location, MutexHandle, ObjectHandle, Payload, ThreadId, ThreadIdSet, Value,
};

use crate::respond::add_response_events;
use crate::structure::EventStructure;

/// Appends a `Send`-kind event for `thread`, built from `payload`, directly
/// to both the structure and the current execution. Sends never block and
/// never need synchronization, so this is the terminal step — no follow-up
/// `addResponseEvents` call is needed.
pub fn add_send(
    structure: &mut EventStructure,
    execution: &mut Execution,
    pinned: &ExecutionFrontier,
    thread: ThreadId,
    payload: Payload,
) -> Result<Event> {
    let parent = execution.last_event(thread);
    let label = Label::new(Kind::Send, payload);
    let event = structure
        .create_event(thread, label, parent, vec![])
        .context("causality violation appending a Send")?;
    let frontier_snapshot = snapshot(structure, execution, &event);
    structure.persist(event.clone(), true, frontier_snapshot, pinned.clone());
    execution.add(&event)?;
    Ok(event)
}

/// Appends a `Request`-kind event for `thread` and immediately attempts to
/// synchronize it, returning the chosen response if one was found. A
/// request that finds none is left in the structure as a dangling, blocked
/// request — callers re-attempt it later via [`retry_response`].
pub fn add_request(
    structure: &mut EventStructure,
    execution: &mut Execution,
    pinned: &ExecutionFrontier,
    thread: ThreadId,
    payload: Payload,
) -> Result<(Event, Option<Event>)> {
    let parent = execution.last_event(thread);
    let label = Label::new(Kind::Request, payload);
    let request = structure
        .create_event(thread, label, parent, vec![])
        .context("causality violation appending a Request")?;
    let frontier_snapshot = snapshot(structure, execution, &request);
    structure.persist(request.clone(), true, frontier_snapshot, pinned.clone());
    execution.add(&request)?;
    let response = add_response_events(structure, execution, pinned, &request)?;
    Ok((request, response))
}

/// Re-attempts synchronization for a request that is still dangling —
/// called after a new candidate-producing `Send` (an `Unlock`, `Notify`,
/// `Unpark`, or `ThreadFinish`) might have unblocked it.
pub fn retry_response(
    structure: &mut EventStructure,
    execution: &mut Execution,
    pinned: &ExecutionFrontier,
    request: &Event,
) -> Result<Option<Event>> {
    add_response_events(structure, execution, pinned, request)
}

fn snapshot(structure: &EventStructure, execution: &Execution, event: &Event) -> ExecutionFrontier {
    let conflicts = structure.conflicts_for(event.thread, &event.label, event.parent, &event.dependencies);
    let mut snapshot = execution.clone();
    snapshot.cut_conflicts(&conflicts);
    snapshot.cut_dangling_request_events(structure);
    snapshot.frontier()
}

macro_rules! send_op {
    ($name:ident, $payload:expr $(, $arg:ident: $ty:ty)*) => {
        pub fn $name(
            structure: &mut EventStructure,
            execution: &mut Execution,
            pinned: &ExecutionFrontier,
            thread: ThreadId,
            $($arg: $ty),*
        ) -> Result<Event> {
            add_send(structure, execution, pinned, thread, $payload)
        }
    };
}

/// The root event: always hosted on the reserved *init* thread, but its
/// payload separately names the *main* thread (`spec.md` §3: "a run of `n`
/// user threads reserves two extra identifiers: the main thread ... and the
/// init thread (hosting the root event)" — two distinct ids, not one).
send_op!(
    add_initialization,
    Payload::Initialization { main_thread },
    main_thread: ThreadId
);
send_op!(add_object_allocation, Payload::ObjectAllocation { handle }, handle: ObjectHandle);
send_op!(add_thread_fork, Payload::ThreadFork { children: children.clone() }, children: ThreadIdSet);
send_op!(add_thread_finish, Payload::ThreadFinish { thread: finishing }, finishing: ThreadId);
send_op!(
    add_write,
    Payload::Write { location, value, exclusive },
    location: Location,
    value: Value,
    exclusive: bool
);
send_op!(
    add_notify,
    Payload::Notify { mutex, broadcast },
    mutex: MutexHandle,
    broadcast: bool
);
send_op!(add_unpark, Payload::Unpark { target }, target: ThreadId);

/// `Unlock` at reentry depth `> 1` is a no-op `Send` per `spec.md` §3; at
/// depth `1` it's still a plain `Send` (it's the matching `Lock` response
/// that synchronizes, not the unlock itself — see `core_sync::sync`).
pub fn add_unlock(
    structure: &mut EventStructure,
    execution: &mut Execution,
    pinned: &ExecutionFrontier,
    thread: ThreadId,
    mutex: MutexHandle,
    reentry_depth: u32,
) -> Result<Event> {
    add_send(structure, execution, pinned, thread, Payload::Unlock { mutex, reentry_depth })
}

macro_rules! request_op {
    ($name:ident, $payload:expr $(, $arg:ident: $ty:ty)*) => {
        pub fn $name(
            structure: &mut EventStructure,
            execution: &mut Execution,
            pinned: &ExecutionFrontier,
            thread: ThreadId,
            $($arg: $ty),*
        ) -> Result<(Event, Option<Event>)> {
            add_request(structure, execution, pinned, thread, $payload)
        }
    };
}

request_op!(
    add_read,
    Payload::Read { location, value: None, exclusive },
    location: Location,
    exclusive: bool
);
request_op!(add_lock, Payload::Lock { mutex, reentry_depth }, mutex: MutexHandle, reentry_depth: u32);
request_op!(add_wait, Payload::Wait { mutex }, mutex: MutexHandle);
request_op!(add_park, Payload::Park);
request_op!(
    add_thread_start,
    Payload::ThreadStart { thread: starting },
    starting: ThreadId
);
request_op!(
    add_thread_join,
    Payload::ThreadJoin { targets: targets.clone(), satisfied: ThreadIdSet::new() },
    targets: ThreadIdSet
);
