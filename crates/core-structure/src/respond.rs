//! Response synthesis: binary and barrier composition, dangling-request
//! adoption, and the frontier/pinned bookkeeping a freshly persisted
//! response needs (`spec.md` §4.3 step 3's snapshot rules, §4.4, §4.5).

use anyhow::Result;
use core_execution::{Execution, ExecutionFrontier};
use core_types::{Event, Kind, Label, Payload, SyncType, ThreadId};
use core_sync::BarrierStep;

use crate::candidates::{filter_read_candidates, raw_candidates};
use crate::structure::EventStructure;

/// Attempts to synthesize and choose a response for `req` (`spec.md` §4.4,
/// §4.5's dangling-adopt and synthesize steps — replay adoption is the
/// caller's concern, see `core-structure`'s crate docs).
///
/// On success, the chosen response has already been appended to `execution`
/// and marked visited in `structure`; every synthesized alternative (for a
/// `Binary` request) is persisted too, unvisited, as a future backtrack
/// point.
pub fn add_response_events(
    structure: &mut EventStructure,
    execution: &mut Execution,
    pinned: &ExecutionFrontier,
    req: &Event,
) -> Result<Option<Event>> {
    if let Some(Some(response_id)) = structure.dangling_response(req.id) {
        let response = structure.event(response_id).clone();
        execution.add(&response)?;
        structure.mark_visited(response.id);
        return Ok(Some(response));
    }

    match req.label.sync_type() {
        SyncType::Barrier => synthesize_barrier(structure, execution, pinned, req),
        SyncType::Binary => synthesize_binary(structure, execution, pinned, req),
        SyncType::None => Ok(None),
    }
}

fn synthesize_binary(
    structure: &mut EventStructure,
    execution: &mut Execution,
    pinned: &ExecutionFrontier,
    req: &Event,
) -> Result<Option<Event>> {
    let mut candidates = raw_candidates(structure, execution, pinned, req.id);

    if let Some(mutex) = core_sync::reentrant_lock_mutex(&req.label) {
        let allocation = structure.allocation_of(mutex);
        candidates.retain(|id| Some(*id) == allocation);
    } else if let Payload::Read { location, .. } = &req.label.payload {
        candidates = filter_read_candidates(structure, execution, req.thread, *location, candidates);
    }

    let mut responses = Vec::new();
    for &candidate_id in &candidates {
        let candidate = structure.event(candidate_id).clone();
        if core_sync::is_reentrant_unlock(&candidate.label) {
            continue;
        }
        if matches!(&candidate.label.payload, Payload::Unpark { .. })
            && !core_sync::park_target_matches(&candidate.label, req.thread)
        {
            continue;
        }
        // `sync` only knows about label shapes; reading a location nobody
        // has written to yet synchronizes with the `Initialization` event
        // instead of a `Write`, and needs the initializer's value for it.
        let response_label = match (&req.label.payload, &candidate.label.payload) {
            (Payload::Read { location, exclusive, .. }, Payload::Initialization { .. }) => Label::new(
                Kind::Response,
                Payload::Read {
                    location: *location,
                    value: Some(structure.initial_value(*location)),
                    exclusive: *exclusive,
                },
            ),
            _ => match core_sync::sync(&req.label, &candidate.label) {
                Some(label) => label,
                None => continue,
            },
        };
        let Some(event) = structure.create_event(req.thread, response_label, Some(req.id), vec![candidate_id])
        else {
            continue;
        };
        let frontier_snapshot = snapshot_frontier(structure, execution, &event);
        let pinned_next = snapshot_pinned(structure, pinned, &frontier_snapshot, &event);
        structure.persist(event.clone(), false, frontier_snapshot, pinned_next);
        responses.push(event);
    }

    finish(structure, execution, req, responses)
}

fn synthesize_barrier(
    structure: &mut EventStructure,
    execution: &mut Execution,
    pinned: &ExecutionFrontier,
    req: &Event,
) -> Result<Option<Event>> {
    let mut candidates = raw_candidates(structure, execution, pinned, req.id);
    candidates.sort_unstable();

    let mut accumulator = req.label.clone();
    let mut contributing = Vec::new();
    let mut complete_label = None;
    for candidate_id in candidates {
        let candidate_label = structure.event(candidate_id).label.clone();
        match core_sync::fold_join(&accumulator, &candidate_label) {
            BarrierStep::NoContribution => continue,
            BarrierStep::Pending(next) => {
                accumulator = next;
                contributing.push(candidate_id);
            }
            BarrierStep::Complete(next) => {
                contributing.push(candidate_id);
                complete_label = Some(next);
                break;
            }
        }
    }

    let Some(response_label) = complete_label else {
        structure.mark_dangling(req.id);
        return Ok(None);
    };
    let Some(event) = structure.create_event(req.thread, response_label, Some(req.id), contributing) else {
        return Ok(None);
    };
    let frontier_snapshot = snapshot_frontier(structure, execution, &event);
    let pinned_next = snapshot_pinned(structure, pinned, &frontier_snapshot, &event);
    structure.persist(event.clone(), true, frontier_snapshot, pinned_next);
    execution.add(&event)?;
    structure.mark_visited(event.id);
    structure.record_unblocking(req.id, event.id);
    Ok(Some(event))
}

fn finish(
    structure: &mut EventStructure,
    execution: &mut Execution,
    req: &Event,
    responses: Vec<Event>,
) -> Result<Option<Event>> {
    if responses.is_empty() {
        if req.label.is_blocking() {
            structure.mark_dangling(req.id);
        }
        return Ok(None);
    }
    // Ordered ascending by dependency id above (`raw_candidates` returns a
    // sorted set); the last one synthesized is both the highest-id
    // alternative and the one we choose now, per `spec.md` §4.5 step 4.
    let alternatives = responses.len() - 1;
    let chosen = responses.into_iter().last().expect("non-empty");
    tracing::trace!(
        target: "structure.sync",
        request = req.id,
        response = chosen.id,
        alternatives,
        "synchronized request"
    );
    execution.add(&chosen)?;
    structure.mark_visited(chosen.id);
    if req.label.is_blocking() {
        structure.record_unblocking(req.id, chosen.id);
    }
    Ok(Some(chosen))
}

/// The pre-append execution frontier with this response's conflicts cut and
/// dangling requests trimmed — the execution a future exploration resumes
/// into if it backtracks to this event (`spec.md` §4.3 step 3).
fn snapshot_frontier(structure: &EventStructure, execution: &Execution, event: &Event) -> ExecutionFrontier {
    let conflicts = structure.conflicts_for(event.thread, &event.label, event.parent, &event.dependencies);
    let mut snapshot = execution.clone();
    snapshot.cut_conflicts(&conflicts);
    snapshot.cut_dangling_request_events(structure);
    snapshot.frontier()
}

/// The pinned frontier this event's future exploration inherits: the
/// caller's current pinned set, with conflicts cut, the event's own causal
/// frontier merged in, dangling requests trimmed, and its own thread pinned
/// at itself (`spec.md` §4.3 step 3).
fn snapshot_pinned(
    structure: &EventStructure,
    pinned: &ExecutionFrontier,
    frontier_snapshot: &ExecutionFrontier,
    event: &Event,
) -> ExecutionFrontier {
    let conflicts = structure.conflicts_for(event.thread, &event.label, event.parent, &event.dependencies);
    let mut cut = Execution::from_frontier(pinned, structure);
    cut.cut_conflicts(&conflicts);
    let merged = union_latest(&cut.frontier(), frontier_snapshot, structure);
    let mut trimmed = Execution::from_frontier(&merged, structure);
    trimmed.cut_dangling_request_events(structure);
    let mut result = trimmed.frontier();
    result.set(event.thread, event.id);
    result
}

fn union_latest(a: &ExecutionFrontier, b: &ExecutionFrontier, store: &EventStructure) -> ExecutionFrontier {
    use core_execution::EventStore;
    let mut threads: Vec<ThreadId> = a.iter().map(|(t, _)| t).collect();
    for (t, _) in b.iter() {
        if !threads.contains(&t) {
            threads.push(t);
        }
    }
    let mut out = ExecutionFrontier::new();
    for t in threads {
        let from_a = a.get(t).map(|id| (id, store.event(id).thread_position));
        let from_b = b.get(t).map(|id| (id, store.event(id).thread_position));
        let chosen = match (from_a, from_b) {
            (Some((ida, pa)), Some((idb, pb))) => {
                if pa >= pb {
                    ida
                } else {
                    idb
                }
            }
            (Some((ida, _)), None) => ida,
            (None, Some((idb, _))) => idb,
            (None, None) => continue,
        };
        out.set(t, chosen);
    }
    out
}
