//! Scenario S6 — broken double-checked locking.
//!
//! The textbook broken-publication bug: a writer thread constructs an
//! object by writing its `field` then, separately, publishes a `ref` to
//! it; a reader thread checks `ref` and, seeing it non-null, reads
//! `field` assuming it must already be initialized. That assumption only
//! holds if the writer's two writes are forced into that order in
//! happens-before — nothing about per-location coherence requires it,
//! so an execution where the reader's `field` read lands before the
//! writer's `field` write is just as valid as one where it lands after.
//!
//! This is driven directly against [`core_driver::ExplorationDriver`]
//! rather than through [`mc_harness::Harness`]: the point is one specific,
//! deliberately chosen event order (ref published before field written),
//! not an exploration of every schedule, and a `Read` never dangles (see
//! `store_buffering.rs`'s module docs) so there's nothing to block on.
//!
//! The consistency checker has no inconsistency to report here — it only
//! enforces per-location coherence and atomicity, not cross-location
//! publication safety — which is exactly the point: this is a real bug a
//! sequentially-consistent-looking history does not catch.

use core_driver::ConsistencyModel;
use core_structure::MemoryInitializer;
use core_types::{Location, ObjectHandle, Payload, ThreadId, ThreadIdSet, Value};

struct DclInitializer {
    field: Location,
}

impl MemoryInitializer for DclInitializer {
    fn initial_value(&self, location: Location) -> Value {
        if location == self.field {
            Value::Int(0)
        } else {
            Value::Ref(None)
        }
    }
}

#[test]
fn reading_a_published_ref_does_not_guarantee_the_field_behind_it_is_initialized() {
    let holder = ObjectHandle(1);
    let target = ObjectHandle(2);
    let field = Location { object: target, offset: 0 };
    let reference = Location { object: holder, offset: 0 };

    let mut driver = core_driver::ExplorationDriver::new(
        2,
        ConsistencyModel::SequentiallyConsistent,
        Box::new(DclInitializer { field }),
    );
    assert!(driver.start_next_exploration(), "bootstrap exploration from the root");

    let main = driver.main_thread();
    let writer = ThreadId(0);
    let reader = ThreadId(1);

    driver.add_thread_fork(main, ThreadIdSet::from_iter([writer, reader])).unwrap();
    driver.add_thread_start(writer, writer).unwrap();
    driver.add_thread_start(reader, reader).unwrap();

    driver.add_object_allocation(writer, holder).unwrap();
    driver.add_object_allocation(writer, target).unwrap();

    // The writer publishes the reference before the field behind it is
    // written — the reordering this scenario is named for.
    driver.add_write(writer, reference, Value::Ref(Some(target)), false).unwrap();

    // The reader observes the freshly published reference...
    let (_, ref_response) = driver.add_read(reader, reference, false).unwrap();
    let ref_response = ref_response.expect("a Read never dangles, it falls back to Initialization");
    match ref_response.label.payload {
        Payload::Read { value: Some(Value::Ref(Some(obj))), .. } => assert_eq!(obj, target),
        other => panic!("expected the reader to observe the published reference, got {other:?}"),
    }

    // ...and, trusting it, reads the field behind it before the writer's
    // field write has actually happened. The only candidate at this point
    // in the execution is the initializer's default, not the writer's
    // eventual real write.
    let (_, field_response) = driver.add_read(reader, field, false).unwrap();
    let field_response = field_response.expect("falls back to Initialization");
    assert_eq!(
        field_response.label.payload,
        Payload::Read { location: field, value: Some(Value::Int(0)), exclusive: false },
        "the reader observes the uninitialized default despite having seen the published reference"
    );

    // The writer's field write only happens afterwards — too late to help.
    driver.add_write(writer, field, Value::Int(42), false).unwrap();

    assert_eq!(
        driver.check_consistency(),
        None,
        "per-location coherence has nothing to say about a cross-location publication race"
    );
}
