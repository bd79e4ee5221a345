//! Scenario S2 — message passing.
//!
//! `T0: data = 42; flag = 1` publishes a value behind a flag; `T1: r_flag =
//! flag; r_data = data` reads it back. Sequential consistency forbids
//! observing the raised flag without the published data — every other
//! combination (including both reads seeing the pre-write defaults, or
//! `data` racing ahead of a stale `flag`) is a legitimate execution.

use std::collections::HashSet;
use std::sync::atomic::{AtomicI64, Ordering};

use core_driver::ConsistencyModel;
use core_structure::ConstantInitializer;
use core_types::{Location, ObjectHandle, ThreadId, Value};
use mc_harness::Harness;

#[test]
fn observing_the_flag_without_the_data_is_the_only_rejected_outcome() {
    let harness = Harness::new(2, ConsistencyModel::SequentiallyConsistent, Box::new(ConstantInitializer(Value::Int(0))));
    let object = ObjectHandle(1);
    let data = Location { object, offset: 0 };
    let flag = Location { object, offset: 1 };

    let observed_flag = AtomicI64::new(-1);
    let observed_data = AtomicI64::new(-1);
    let mut consistent_outcomes = HashSet::new();
    let mut rejected_torn_outcome = false;

    loop {
        observed_flag.store(-1, Ordering::SeqCst);
        observed_data.store(-1, Ordering::SeqCst);

        let ran = harness
            .run_next(
                &|main| main.allocate(object),
                &|thread, handle| {
                    if thread == ThreadId(0) {
                        handle.write(data, Value::Int(42), false);
                        handle.write(flag, Value::Int(1), false);
                    } else {
                        if let Value::Int(v) = handle.read(flag, false) {
                            observed_flag.store(v, Ordering::SeqCst);
                        }
                        if let Value::Int(v) = handle.read(data, false) {
                            observed_data.store(v, Ordering::SeqCst);
                        }
                    }
                },
            )
            .expect("append is never rejected mid-exploration");
        if !ran {
            break;
        }

        let outcome = (observed_flag.load(Ordering::SeqCst), observed_data.load(Ordering::SeqCst));
        match harness.last_inconsistency() {
            Some(_) => {
                assert_eq!(outcome, (1, 0), "only 'saw the flag but not the data' should ever be rejected");
                rejected_torn_outcome = true;
            }
            None => {
                consistent_outcomes.insert(outcome);
            }
        }
    }

    assert!(rejected_torn_outcome, "the (flag=1, data=0) outcome should have been explored and rejected");
    assert_eq!(consistent_outcomes, HashSet::from([(0, 0), (0, 42), (1, 42)]));
}
