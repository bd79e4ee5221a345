//! Causally-closed executions, their frontier snapshots, and the
//! memory-location views derived from them (`spec.md` §3, §4.2, §4.8).

mod execution;
mod frontier;
mod store;
mod views;

pub use execution::Execution;
pub use frontier::ExecutionFrontier;
pub use store::EventStore;
pub use views::{memory_view, racy_writes};
