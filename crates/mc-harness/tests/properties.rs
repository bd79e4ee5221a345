//! Universally quantified invariants from `spec.md` §8, checked with
//! `proptest` over randomly generated small programs rather than the
//! fixed scenarios in the other files here.

use std::collections::HashSet;

use core_driver::ConsistencyModel;
use core_execution::EventStore;
use core_structure::ConstantInitializer;
use core_types::{Location, ObjectHandle, Payload, Value};
use mc_harness::Harness;
use proptest::prelude::*;

#[derive(Debug, Clone, Copy)]
enum Op {
    Read { offset: u64 },
    Write { offset: u64, value: i64 },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u64..2).prop_map(|offset| Op::Read { offset }),
        (0u64..2, -3i64..3).prop_map(|(offset, value)| Op::Write { offset, value }),
    ]
}

fn program_strategy() -> impl Strategy<Value = (Vec<Op>, Vec<Op>)> {
    (
        prop::collection::vec(op_strategy(), 0..4),
        prop::collection::vec(op_strategy(), 0..4),
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Invariant 1: every event's parent is either absent or in the
    /// execution, and every one of its dependencies is in the execution.
    /// Invariant 2: if one event's causality clock strictly happens
    /// before another's, its id is strictly smaller. Invariant 6:
    /// `start_next_exploration` terminates (checked just by the loop
    /// below completing at all within the harness's own exploration
    /// budget).
    #[test]
    fn every_exploration_respects_parent_dependency_and_id_ordering((t0_ops, t1_ops) in program_strategy()) {
        let harness = Harness::new(2, ConsistencyModel::SequentiallyConsistent, Box::new(ConstantInitializer(Value::Int(0))));
        let object = ObjectHandle(1);

        let mut explorations = 0;
        while explorations < 256
            && harness
                .run_next(
                    &|main| main.allocate(object),
                    &|thread, handle| {
                        let ops = if thread == core_types::ThreadId(0) { &t0_ops } else { &t1_ops };
                        for op in ops {
                            match *op {
                                Op::Read { offset } => {
                                    handle.read(Location { object, offset }, false);
                                }
                                Op::Write { offset, value } => {
                                    handle.write(Location { object, offset }, Value::Int(value), false);
                                }
                            }
                        }
                    },
                )
                .expect("append is never rejected mid-exploration")
        {
            explorations += 1;

            harness.with_driver(|driver| {
                let execution = driver.execution();
                let structure = driver.structure();
                let present: HashSet<_> = execution.all_ids().collect();

                for &id in &present {
                    let event = structure.event(id);
                    if let Some(parent) = event.parent {
                        prop_assert!(present.contains(&parent), "event {id}'s parent {parent} missing from execution");
                    }
                    for &dep in &event.dependencies {
                        prop_assert!(present.contains(&dep), "event {id}'s dependency {dep} missing from execution");
                    }
                }

                for &a in &present {
                    for &b in &present {
                        if a == b {
                            continue;
                        }
                        let ea = structure.event(a);
                        let eb = structure.event(b);
                        if ea.causality_clock.lt(&eb.causality_clock) {
                            prop_assert!(a < b, "event {a} happens-before {b} but has the larger id");
                        }
                    }
                }
                Ok(())
            })?;
        }

        prop_assert!(explorations >= 1, "at least one exploration should have run");
    }

    /// Invariant 4: every consistent Read response reads from a Write (or
    /// the `Initialization` default) with no other write to the same
    /// location ordered strictly between it and the read in
    /// happens-before.
    #[test]
    fn every_read_observes_the_most_recent_hb_write_to_its_location((t0_ops, t1_ops) in program_strategy()) {
        let harness = Harness::new(2, ConsistencyModel::SequentiallyConsistent, Box::new(ConstantInitializer(Value::Int(0))));
        let object = ObjectHandle(1);

        let mut explorations = 0;
        while explorations < 256
            && harness
                .run_next(
                    &|main| main.allocate(object),
                    &|thread, handle| {
                        let ops = if thread == core_types::ThreadId(0) { &t0_ops } else { &t1_ops };
                        for op in ops {
                            match *op {
                                Op::Read { offset } => {
                                    handle.read(Location { object, offset }, false);
                                }
                                Op::Write { offset, value } => {
                                    handle.write(Location { object, offset }, Value::Int(value), false);
                                }
                            }
                        }
                    },
                )
                .expect("append is never rejected mid-exploration")
        {
            explorations += 1;
            if harness.last_inconsistency().is_some() {
                // A rejected execution carries no guarantee here — this
                // invariant is about consistent executions only.
                continue;
            }

            harness.with_driver(|driver| {
                let execution = driver.execution();
                let structure = driver.structure();
                let ids: Vec<_> = execution.all_ids().collect();

                for &id in &ids {
                    let event = structure.event(id);
                    let Payload::Read { location, .. } = event.label.payload else { continue };
                    if event.label.is_request() {
                        continue;
                    }
                    let &witness = event
                        .dependencies
                        .first()
                        .expect("a synchronized Read response has exactly one dependency");
                    let witness_event = structure.event(witness);
                    prop_assert!(
                        matches!(witness_event.label.payload, Payload::Write { location: l, .. } if l == location)
                            || matches!(witness_event.label.payload, Payload::Initialization { .. }),
                        "read {id} at {location:?} did not witness a write to that location or the initializer"
                    );

                    for &other in &ids {
                        if other == witness || other == id {
                            continue;
                        }
                        let other_event = structure.event(other);
                        let Payload::Write { location: other_loc, .. } = other_event.label.payload else { continue };
                        if other_loc != location {
                            continue;
                        }
                        let strictly_between = witness_event.causality_clock.lt(&other_event.causality_clock)
                            && other_event.causality_clock.lt(&event.causality_clock);
                        prop_assert!(!strictly_between, "write {other} to {location:?} lies between {witness} and read {id} in happens-before");
                    }
                }
                Ok(())
            })?;
        }
    }
}
