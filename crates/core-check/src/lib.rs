//! Incremental consistency checkers (`spec.md` §4.7).
//!
//! Two independent checkers — [`atomicity::AtomicityChecker`] and
//! [`sequential::SequentialConsistencyChecker`] — each implement `reset`,
//! `check_event`, `check`. [`CompositeChecker`] composes them by
//! short-circuit aggregation in a fixed order (atomicity first, matching
//! the enumeration in `spec.md` §2) and makes `detected` idempotent for the
//! rest of an exploration, per `spec.md` §7's propagation policy.

mod atomicity;
mod sequential;

pub use atomicity::AtomicityChecker;
pub use sequential::{ConsistencyModel, SequentialConsistencyChecker};

use core_execution::EventStore;
use core_types::{Event, Id, Location};

/// The `Inconsistency` half of `spec.md` §7's error taxonomy: a rejected
/// execution, not a bug. Matchable so callers (the exploration driver) can
/// report *why* without parsing a message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Inconsistency {
    /// An exclusive read/write RMW pair at `location` had another write
    /// ordered between them in happens-before.
    #[error(
        "atomicity violated at {location}: write {other} observed between \
         exclusive read {read} and its paired write {write}"
    )]
    Atomicity {
        read: Id,
        write: Id,
        other: Id,
        location: Location,
    },
    /// No total order extending happens-before, modification order and
    /// reads-from exists — a coherence cycle was found through `event`.
    #[error("sequential consistency violated: coherence cycle through event {event}")]
    SequentialConsistency { event: Id },
}

/// Composes [`AtomicityChecker`] and [`SequentialConsistencyChecker`] with
/// short-circuit, idempotent aggregation (`spec.md` §4.7, §7).
pub struct CompositeChecker {
    atomicity: AtomicityChecker,
    sequential: SequentialConsistencyChecker,
    detected: Option<Inconsistency>,
}

impl CompositeChecker {
    pub fn new(model: ConsistencyModel) -> Self {
        Self {
            atomicity: AtomicityChecker::new(),
            sequential: SequentialConsistencyChecker::new(model),
            detected: None,
        }
    }

    /// Rebuilds both checkers' incremental state from `execution`, clearing
    /// any previously detected inconsistency (`spec.md` §4.6 "Reset checkers
    /// against the new execution").
    pub fn reset(&mut self, execution: &core_execution::Execution, store: &dyn EventStore) {
        self.detected = None;
        self.atomicity.reset(execution, store);
        self.sequential.reset(execution, store);
    }

    /// Checks one newly-appended event. Once an inconsistency is recorded it
    /// is returned for every subsequent call without re-running either
    /// checker (`spec.md` §7 "idempotent ... suppresses further checks").
    pub fn check_event(&mut self, event: &Event, store: &dyn EventStore) -> Option<Inconsistency> {
        if let Some(existing) = &self.detected {
            return Some(existing.clone());
        }
        let found = self
            .atomicity
            .check_event(event, store)
            .or_else(|| self.sequential.check_event(event, store));
        if let Some(inc) = &found {
            tracing::debug!(target: "check.composite", ?inc, "inconsistency detected");
            self.detected = Some(inc.clone());
        }
        found
    }

    /// Re-verifies the whole current execution (no new event), used once
    /// right after the exploration root is appended (`spec.md` §4.6).
    pub fn check(&mut self, store: &dyn EventStore) -> Option<Inconsistency> {
        if let Some(existing) = &self.detected {
            return Some(existing.clone());
        }
        let found = self
            .atomicity
            .check(store)
            .or_else(|| self.sequential.check(store));
        if let Some(inc) = &found {
            self.detected = Some(inc.clone());
        }
        found
    }

    pub fn detected(&self) -> Option<&Inconsistency> {
        self.detected.as_ref()
    }
}
