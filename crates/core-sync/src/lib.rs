//! The synchronization algebra: `syncable`/`sync` over labels, and the
//! barrier fold used for `ThreadJoin` (`spec.md` §4.1).
//!
//! `sync(a, b)` is commutative for binary labels (the caller need not know
//! which of `a`/`b` is the Request) and the barrier fold in [`fold_join`] is
//! associative: folding a set of `ThreadFinish` sends into a `ThreadJoin`
//! request in any order reaches the same `satisfied` set.
//!
//! One label shape — `Park`/`Unpark` — needs the issuing thread id to decide
//! a match (`Unpark { target }` must equal the requester's own thread), and
//! a bare `Label` carries no thread. Rather than thread that context through
//! every other label pair, [`sync`] treats `Park`/`Unpark` as shape-compatible
//! unconditionally and [`park_target_matches`] is the extra predicate callers
//! apply during candidate discovery (`core-structure`), the same way reentrant
//! lock/unlock candidates are restricted there rather than here.

use core_types::{Kind, Label, MutexHandle, Payload, ThreadId, ThreadIdSet};

/// `true` iff [`sync`] is defined for this (unordered) pair.
pub fn syncable(a: &Label, b: &Label) -> bool {
    sync(a, b).is_some()
}

/// Composes a Request and a Send into a Response, or returns `None` if the
/// pair doesn't match. Order of `a`/`b` doesn't matter.
pub fn sync(a: &Label, b: &Label) -> Option<Label> {
    let (req, snd) = as_request_and_send(a, b)?;
    let payload = match (&req.payload, &snd.payload) {
        (Payload::Read { location, exclusive, .. }, Payload::Write { location: wloc, value, .. })
            if location == wloc =>
        {
            Payload::Read {
                location: *location,
                value: Some(*value),
                exclusive: *exclusive,
            }
        }
        (Payload::ThreadStart { thread }, Payload::ThreadFork { children })
            if children.contains(*thread) =>
        {
            Payload::ThreadStart { thread: *thread }
        }
        (
            Payload::Lock { mutex, reentry_depth },
            Payload::ObjectAllocation { handle },
        ) if handle == mutex => Payload::Lock {
            mutex: *mutex,
            reentry_depth: *reentry_depth,
        },
        (
            Payload::Lock { mutex, reentry_depth },
            Payload::Unlock {
                mutex: umutex,
                reentry_depth: ulevel,
            },
        ) if umutex == mutex && *ulevel == 1 => Payload::Lock {
            mutex: *mutex,
            reentry_depth: *reentry_depth,
        },
        (Payload::Wait { mutex }, Payload::Notify { mutex: nmutex, .. }) if nmutex == mutex => {
            Payload::Wait { mutex: *mutex }
        }
        (Payload::Park, Payload::Unpark { .. }) => Payload::Park,
        _ => return None,
    };
    Some(Label::new(Kind::Response, payload))
}

/// Splits `(a, b)` into `(request, send)` if exactly one of the two is a
/// Request and the other a Send (`spec.md` §4.1 "Binary").
fn as_request_and_send<'a>(a: &'a Label, b: &'a Label) -> Option<(&'a Label, &'a Label)> {
    match (a.kind, b.kind) {
        (Kind::Request, Kind::Send) => Some((a, b)),
        (Kind::Send, Kind::Request) => Some((b, a)),
        _ => None,
    }
}

/// Whether an `Unpark` candidate actually targets `thread` — the one piece
/// of matching `sync` can't do itself because a bare `Label` has no thread.
pub fn park_target_matches(candidate: &Label, thread: ThreadId) -> bool {
    matches!(&candidate.payload, Payload::Unpark { target } if *target == thread)
}

/// Outcome of folding one more `ThreadFinish` send into a `ThreadJoin`
/// accumulator (`spec.md` §4.1 "Barrier", §4.4).
#[derive(Debug, Clone, PartialEq)]
pub enum BarrierStep {
    /// `finish` didn't name a target of this join, or that target already
    /// contributed; the accumulator is unchanged.
    NoContribution,
    /// `finish` named a target that hadn't contributed yet, but other
    /// targets still haven't finished.
    Pending(Label),
    /// `finish` named the last outstanding target — the barrier is complete
    /// and the Response below should actually be emitted.
    Complete(Label),
}

/// Folds one `ThreadFinish { thread }` send into a `ThreadJoin` accumulator.
///
/// `accumulator` is either the original `ThreadJoin` Request (`satisfied`
/// empty) or a previous [`BarrierStep::Pending`] result. Folding is
/// commutative in the contributing `finish` events because `satisfied` is a
/// set, not a sequence — the same final set is reached regardless of fold
/// order, which is what makes the barrier associative.
pub fn fold_join(accumulator: &Label, finish: &Label) -> BarrierStep {
    let (targets, satisfied) = match &accumulator.payload {
        Payload::ThreadJoin { targets, satisfied } => (targets, satisfied),
        _ => return BarrierStep::NoContribution,
    };
    let thread = match &finish.payload {
        Payload::ThreadFinish { thread } => *thread,
        _ => return BarrierStep::NoContribution,
    };
    if !targets.contains(thread) || satisfied.contains(thread) {
        return BarrierStep::NoContribution;
    }
    let mut next = satisfied.iter().collect::<Vec<_>>();
    next.push(thread);
    let next = ThreadIdSet::from_iter(next);
    if next.len() == targets.len() {
        BarrierStep::Complete(Label::new(
            Kind::Response,
            Payload::ThreadJoin {
                targets: targets.clone(),
                satisfied: next,
            },
        ))
    } else {
        BarrierStep::Pending(Label::new(
            Kind::Request,
            Payload::ThreadJoin {
                targets: targets.clone(),
                satisfied: next,
            },
        ))
    }
}

/// `true` for a reentrant `Lock` request (`reentry_depth > 1`) — such a
/// request only ever synchronizes with its mutex's `ObjectAllocation`
/// (`spec.md` §4.2, §4.4 "Reentry").
pub fn is_reentrant_lock_request(label: &Label) -> bool {
    matches!(&label.payload, Payload::Lock { reentry_depth, .. } if *reentry_depth > 1)
        && label.kind == Kind::Request
}

/// `true` for a reentrant `Unlock` (`reentry_depth > 1`) — it produces no
/// dependency and never unblocks anything (`spec.md` §4.2, §3 "Unlock").
pub fn is_reentrant_unlock(label: &Label) -> bool {
    matches!(&label.payload, Payload::Unlock { reentry_depth, .. } if *reentry_depth > 1)
}

/// The mutex a reentrant lock request must restrict its candidates to the
/// allocation of, if `label` is one.
pub fn reentrant_lock_mutex(label: &Label) -> Option<MutexHandle> {
    match &label.payload {
        Payload::Lock { mutex, reentry_depth } if *reentry_depth > 1 => Some(*mutex),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::{Location, ObjectHandle, Value};

    fn req(p: Payload) -> Label {
        Label::new(Kind::Request, p)
    }
    fn send(p: Payload) -> Label {
        Label::new(Kind::Send, p)
    }

    #[test]
    fn read_write_binary_sync_is_commutative() {
        let loc = Location { object: ObjectHandle(1), offset: 0 };
        let r = req(Payload::Read { location: loc, value: None, exclusive: false });
        let w = send(Payload::Write { location: loc, value: Value::Int(7), exclusive: false });
        let a = sync(&r, &w).unwrap();
        let b = sync(&w, &r).unwrap();
        assert_eq!(a, b);
        assert_eq!(
            a.payload,
            Payload::Read { location: loc, value: Some(Value::Int(7)), exclusive: false }
        );
    }

    #[test]
    fn read_write_mismatched_location_does_not_sync() {
        let loc0 = Location { object: ObjectHandle(1), offset: 0 };
        let loc1 = Location { object: ObjectHandle(1), offset: 1 };
        let r = req(Payload::Read { location: loc0, value: None, exclusive: false });
        let w = send(Payload::Write { location: loc1, value: Value::Int(1), exclusive: false });
        assert!(!syncable(&r, &w));
    }

    #[test]
    fn lock_syncs_with_allocation_or_unlock_but_not_reentrant_unlock() {
        let mutex = ObjectHandle(3);
        let lock = req(Payload::Lock { mutex, reentry_depth: 1 });
        let alloc = send(Payload::ObjectAllocation { handle: mutex });
        assert!(syncable(&lock, &alloc));

        let unlock = send(Payload::Unlock { mutex, reentry_depth: 1 });
        assert!(syncable(&lock, &unlock));

        let reentrant_unlock = send(Payload::Unlock { mutex, reentry_depth: 2 });
        assert!(!syncable(&lock, &reentrant_unlock));
    }

    #[test]
    fn wait_syncs_with_notify_on_same_mutex_regardless_of_broadcast() {
        let mutex = ObjectHandle(5);
        let wait = req(Payload::Wait { mutex });
        let notify_one = send(Payload::Notify { mutex, broadcast: false });
        let notify_all = send(Payload::Notify { mutex, broadcast: true });
        assert!(syncable(&wait, &notify_one));
        assert!(syncable(&wait, &notify_all));
    }

    #[test]
    fn park_unpark_shape_matches_target_checked_separately() {
        let t0 = ThreadId(0);
        let t1 = ThreadId(1);
        let park = req(Payload::Park);
        let unpark = send(Payload::Unpark { target: t0 });
        assert!(syncable(&park, &unpark));
        assert!(park_target_matches(&unpark, t0));
        assert!(!park_target_matches(&unpark, t1));
    }

    #[test]
    fn join_barrier_fold_is_order_independent() {
        let t0 = ThreadId(0);
        let t1 = ThreadId(1);
        let targets = ThreadIdSet::from_iter([t0, t1]);
        let join = req(Payload::ThreadJoin { targets: targets.clone(), satisfied: ThreadIdSet::new() });
        let f0 = send(Payload::ThreadFinish { thread: t0 });
        let f1 = send(Payload::ThreadFinish { thread: t1 });

        let order_a = {
            let step = fold_join(&join, &f0);
            let BarrierStep::Pending(acc) = step else { panic!("expected pending") };
            fold_join(&acc, &f1)
        };
        let order_b = {
            let step = fold_join(&join, &f1);
            let BarrierStep::Pending(acc) = step else { panic!("expected pending") };
            fold_join(&acc, &f0)
        };
        assert!(matches!(order_a, BarrierStep::Complete(_)));
        assert!(matches!(order_b, BarrierStep::Complete(_)));
    }

    #[test]
    fn join_barrier_ignores_unrelated_or_repeated_finish() {
        let t0 = ThreadId(0);
        let t2 = ThreadId(2);
        let targets = ThreadIdSet::single(t0);
        let join = req(Payload::ThreadJoin { targets, satisfied: ThreadIdSet::new() });
        let unrelated = send(Payload::ThreadFinish { thread: t2 });
        assert_eq!(fold_join(&join, &unrelated), BarrierStep::NoContribution);
    }

    #[test]
    fn reentrant_lock_and_unlock_detection() {
        let mutex = ObjectHandle(1);
        let outer = req(Payload::Lock { mutex, reentry_depth: 1 });
        let inner = req(Payload::Lock { mutex, reentry_depth: 2 });
        assert!(!is_reentrant_lock_request(&outer));
        assert!(is_reentrant_lock_request(&inner));
        assert_eq!(reentrant_lock_mutex(&inner), Some(mutex));

        let unlock_outer = Label::new(Kind::Send, Payload::Unlock { mutex, reentry_depth: 1 });
        let unlock_inner = Label::new(Kind::Send, Payload::Unlock { mutex, reentry_depth: 2 });
        assert!(!is_reentrant_unlock(&unlock_outer));
        assert!(is_reentrant_unlock(&unlock_inner));
    }
}
