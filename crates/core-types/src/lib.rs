//! Immutable event and label model (`spec.md` §3, §4.1).
//!
//! Everything here is data: closed enums and plain structs with no behavior
//! beyond classification helpers. The algorithms that build and interpret
//! these values live in `core-sync` (the synchronization algebra),
//! `core-execution` (causal closure over a set of events) and
//! `core-structure` (the backtrackable, append-only store).

mod event;
mod ids;
mod label;

pub use event::Event;
pub use ids::{Id, Location, ObjectHandle, ThreadId, ThreadIdSet};
pub use label::{Kind, Label, MutexHandle, Payload, SyncType, Value};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn main_and_init_thread_ids_follow_user_thread_count() {
        assert_eq!(ThreadId::main(2), ThreadId(2));
        assert_eq!(ThreadId::init(2), ThreadId(3));
    }

    #[test]
    fn read_request_has_no_value_but_response_does() {
        let loc = Location {
            object: ObjectHandle(1),
            offset: 0,
        };
        let req = Label::new(
            Kind::Request,
            Payload::Read {
                location: loc,
                value: None,
                exclusive: false,
            },
        );
        assert!(req.is_blocking());
        assert_eq!(req.sync_type(), SyncType::Binary);

        let resp = Label::new(
            Kind::Response,
            Payload::Read {
                location: loc,
                value: Some(Value::Int(42)),
                exclusive: false,
            },
        );
        assert!(!resp.is_blocking());
        assert_eq!(resp.sync_type(), SyncType::Binary);
    }

    #[test]
    fn join_is_a_barrier_others_are_binary_or_none() {
        let join = Label::new(
            Kind::Request,
            Payload::ThreadJoin {
                targets: ThreadIdSet::single(ThreadId(0)),
                satisfied: ThreadIdSet::new(),
            },
        );
        assert_eq!(join.sync_type(), SyncType::Barrier);

        let write = Label::new(
            Kind::Send,
            Payload::Write {
                location: Location {
                    object: ObjectHandle(0),
                    offset: 0,
                },
                value: Value::Int(1),
                exclusive: false,
            },
        );
        assert_eq!(write.sync_type(), SyncType::None);
    }

    #[test]
    fn reentry_detection() {
        let mutex = ObjectHandle(9);
        let outer = Label::new(
            Kind::Response,
            Payload::Lock {
                mutex,
                reentry_depth: 1,
            },
        );
        let inner = Label::new(
            Kind::Response,
            Payload::Lock {
                mutex,
                reentry_depth: 2,
            },
        );
        assert!(!outer.is_reentry());
        assert!(inner.is_reentry());
    }
}
