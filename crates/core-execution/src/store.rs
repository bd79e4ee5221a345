use core_types::{Event, Id};

/// Read-only access to the event structure's owning store, by id.
///
/// `Execution` and `ExecutionFrontier` are value-like, non-owning snapshots
/// (`spec.md` §3 "Ownership"): they carry ids, not `Event`s. Anything that
/// needs to inspect the event itself — conflict discovery, memory views,
/// consistency checking — goes back through an `EventStore`, which
/// `core-structure`'s append-only arena implements.
pub trait EventStore {
    fn event(&self, id: Id) -> &Event;
}

impl<T: EventStore + ?Sized> EventStore for &T {
    fn event(&self, id: Id) -> &Event {
        (**self).event(id)
    }
}
