//! The exploration driver: `startNextExploration` / `replay` / `abort`
//! (`spec.md` §4.6) and the public append facade an instrumented runtime
//! drives (`spec.md` §4.5, §6).
//!
//! [`driver`] owns the lifecycle and the read-only queries; [`ops`] adds the
//! typed append operations (with replay adoption layered on top of
//! `core_structure::ops`); [`error`] is the small set of fatal driver errors.

mod driver;
mod error;
mod ops;

pub use driver::ExplorationDriver;
pub use error::CoreError;

pub use core_check::{ConsistencyModel, Inconsistency};
pub use core_structure::{ConstantInitializer, MemoryInitializer};
