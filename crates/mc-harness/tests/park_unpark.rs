//! Scenario S5 — park/unpark.
//!
//! `T0: park()` blocks until given a permit; `T1: unpark(T0)` supplies
//! one. `spec.md` §8 calls out both orderings: if the `Unpark` already
//! precedes the `Park` in program start order, `Park` must return
//! immediately (permit already available); otherwise `Park` genuinely
//! blocks until the `Unpark` arrives. [`Harness`]'s turn-taking always
//! runs `T0` before `T1` right after the fork, so the harness-driven test
//! below only ever exercises the genuine-block ordering; the immediate-
//! return ordering is driven directly against
//! [`core_driver::ExplorationDriver`] instead, the same way
//! `broken_double_checked_locking.rs` drives one specific deliberately
//! chosen event order rather than exploring every schedule.
//!
//! Like `Wait`, a `Park` request has no `Initialization`-style fallback
//! and genuinely dangles when no permit is available yet;
//! `core_sync::park_target_matches` additionally requires the `Unpark` to
//! name this thread specifically, so a stray unpark aimed at the wrong
//! thread must never be the one it resolves against.

use std::sync::Mutex;

use core_driver::ConsistencyModel;
use core_structure::ConstantInitializer;
use core_types::{Id, Payload, ThreadId, ThreadIdSet, Value};
use mc_harness::Harness;

#[test]
fn a_blocked_park_depends_on_the_unpark_naming_it() {
    let harness = Harness::new(2, ConsistencyModel::SequentiallyConsistent, Box::new(ConstantInitializer(Value::Int(0))));

    let mut explorations = 0;
    loop {
        let unpark_id: Mutex<Option<Id>> = Mutex::new(None);
        let ran = harness
            .run_next(
                &|_main| {},
                &|thread, handle| {
                    if thread == ThreadId(0) {
                        let woken = handle.park();
                        assert!(matches!(woken.label.payload, Payload::Park), "unexpected payload: {:?}", woken.label.payload);
                        let expected = unpark_id.lock().unwrap().expect("unpark ran before this thread woke");
                        assert_eq!(woken.dependencies, vec![expected], "a Park response depends on exactly the Unpark naming it");
                    } else {
                        let unpark = handle.unpark(ThreadId(0));
                        assert!(matches!(unpark.label.payload, Payload::Unpark { target } if target == ThreadId(0)));
                        *unpark_id.lock().unwrap() = Some(unpark.id);
                    }
                },
            )
            .expect("append is never rejected mid-exploration");
        if !ran {
            break;
        }
        explorations += 1;
        assert_eq!(harness.last_inconsistency(), None);
    }

    assert!(explorations >= 1, "at least one exploration should have run");
}

#[test]
fn an_unpark_already_present_lets_park_return_immediately() {
    let mut driver = core_driver::ExplorationDriver::new(2, ConsistencyModel::SequentiallyConsistent, Box::new(ConstantInitializer(Value::Int(0))));
    assert!(driver.start_next_exploration(), "bootstrap exploration from the root");

    let main = driver.main_thread();
    let parker = ThreadId(0);
    let unparker = ThreadId(1);

    driver.add_thread_fork(main, ThreadIdSet::from_iter([parker, unparker])).unwrap();
    driver.add_thread_start(parker, parker).unwrap();
    driver.add_thread_start(unparker, unparker).unwrap();

    // The unpark runs first, in program start order, ahead of the park it
    // targets — a permit is already sitting there waiting.
    let unpark = driver.add_unpark(unparker, parker).unwrap();

    let (request, response) = driver.add_park(parker).unwrap();
    assert!(!driver.is_blocked_request(&request), "a permit is already available, Park must not dangle");
    let response = response.expect("Park resolves synchronously against the already-present Unpark");
    assert_eq!(
        response.dependencies,
        vec![unpark.id],
        "the immediate Park response still depends on the specific Unpark that supplied the permit"
    );
}
