//! The driver's half of `spec.md` §7's error taxonomy.
//!
//! `Inconsistency` (re-exported from `core_check`) and `CausalityViolation`
//! (the `Option<Event>` returned by `core_structure::EventStructure::create_event`)
//! are handled where they're produced. What's left for the driver to own is
//! the two *fatal* kinds: a broken internal invariant, or the replayer and
//! the runtime disagreeing about what happens next.

use core_types::{Id, ThreadId};

/// Fatal driver errors (`spec.md` §7: "`InvariantViolation` and
/// `ReplayDesync` are fatal: the exploration aborts and the error is
/// bubbled up to the surrounding runtime as a distinct invocation outcome").
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    /// An internal precondition of the data model failed — a program bug,
    /// not a property of the test under exploration.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
    /// The replayer's next scripted event doesn't match what the runtime
    /// just reported.
    #[error("replay desync on thread {thread}: expected event {expected:?}, runtime reported {reported}")]
    ReplayDesync {
        thread: ThreadId,
        expected: Option<Id>,
        reported: String,
    },
}
