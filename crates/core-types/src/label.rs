//! The closed label union and the per-label classification data
//! (`spec.md` §3 "Label", §4.1).

use crate::ids::{Location, ObjectHandle, ThreadId, ThreadIdSet};
use std::fmt;

/// A monitor is just an object; any allocated object can be locked/waited on.
pub type MutexHandle = ObjectHandle;

/// Whether a label is the blocking half of a split operation, the
/// unblocking half, or an operation that never blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Request,
    Response,
    Send,
}

/// How a label composes with others under the synchronization algebra
/// (`spec.md` §4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncType {
    /// Does not itself participate in synchronization (e.g. a plain Send
    /// with no corresponding Request, like `Write` or `ObjectAllocation`).
    None,
    /// Exactly one Request composes with exactly one Send.
    Binary,
    /// One Request composes with all Sends naming it, atomically.
    Barrier,
}

/// The value observed or written by a memory access. Kept as a small
/// closed union rather than a raw integer so the type itself documents
/// what a test program can store in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Value {
    Int(i64),
    Bool(bool),
    Ref(Option<ObjectHandle>),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{v}"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Ref(Some(h)) => write!(f, "{h}"),
            Value::Ref(None) => write!(f, "null"),
        }
    }
}

/// Variant-specific payload of a [`Label`]. Kept free of `kind` so the same
/// payload shape is shared by a Request and its Response (e.g. a `Read`
/// request carries no value yet; its response does).
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Root event: establishes initial memory contents and which thread is
    /// the main thread. Always a `Send`.
    Initialization { main_thread: ThreadId },
    /// An object (or array) is allocated. Always a `Send`; its own event
    /// doubles as the "lock is free" / "nothing written yet" anchor for
    /// everything that object later participates in.
    ObjectAllocation { handle: ObjectHandle },
    /// A thread spawns children. Always a `Send`.
    ThreadFork { children: ThreadIdSet },
    /// The first event of a spawned thread. Synchronizes (binary) with the
    /// `ThreadFork` that named it.
    ThreadStart { thread: ThreadId },
    /// A thread has run to completion. Always a `Send`.
    ThreadFinish { thread: ThreadId },
    /// Waits for every thread in `targets` to finish. Barrier: needs one
    /// `ThreadFinish` per target before the join response is produced.
    /// `satisfied` is the fold accumulator (`spec.md` §4.4): empty on the
    /// original Request, growing by one target per contributing
    /// `ThreadFinish` until it covers `targets`, at which point the barrier
    /// is complete and the Response is actually emitted.
    ThreadJoin {
        targets: ThreadIdSet,
        satisfied: ThreadIdSet,
    },
    /// A memory read. `value` is `None` on the Request, `Some` once
    /// synchronized into a Response.
    Read {
        location: Location,
        value: Option<Value>,
        exclusive: bool,
    },
    /// A memory write. Always a `Send`.
    Write {
        location: Location,
        value: Value,
        exclusive: bool,
    },
    /// Acquire a monitor. `reentry_depth` is `1` for a fresh acquisition and
    /// `> 1` when the same thread already holds the monitor.
    Lock {
        mutex: MutexHandle,
        reentry_depth: u32,
    },
    /// Release a monitor. A release at `reentry_depth > 1` is a no-op Send
    /// (no thread is unblocked by it).
    Unlock {
        mutex: MutexHandle,
        reentry_depth: u32,
    },
    /// Blocks until notified on `mutex`. Synchronizes with a `Notify` Send.
    Wait { mutex: MutexHandle },
    /// Wakes one (`broadcast = false`) or all (`broadcast = true`) waiters
    /// on `mutex`. Always a `Send`.
    Notify { mutex: MutexHandle, broadcast: bool },
    /// Blocks until a permit is available (via a preceding or matching
    /// `Unpark`).
    Park,
    /// Makes a permit available for `target`. Always a `Send`.
    Unpark { target: ThreadId },
}

impl Payload {
    pub fn sync_type(&self) -> SyncType {
        match self {
            Payload::ThreadJoin { .. } => SyncType::Barrier,
            Payload::ThreadStart { .. }
            | Payload::Read { .. }
            | Payload::Lock { .. }
            | Payload::Wait { .. }
            | Payload::Park => SyncType::Binary,
            Payload::Initialization { .. }
            | Payload::ObjectAllocation { .. }
            | Payload::ThreadFork { .. }
            | Payload::ThreadFinish { .. }
            | Payload::Write { .. }
            | Payload::Unlock { .. }
            | Payload::Notify { .. }
            | Payload::Unpark { .. } => SyncType::None,
        }
    }

    /// Operations that park a thread until a matching counterpart shows up.
    pub fn is_blocking(&self) -> bool {
        matches!(
            self,
            Payload::ThreadJoin { .. }
                | Payload::Read { .. }
                | Payload::Lock { .. }
                | Payload::Wait { .. }
                | Payload::Park
        )
    }

    /// Read-modify-write / exclusive accesses, relevant to the atomicity
    /// checker (`spec.md` §4.7).
    pub fn is_exclusive(&self) -> bool {
        matches!(
            self,
            Payload::Read { exclusive: true, .. } | Payload::Write { exclusive: true, .. }
        )
    }

    pub fn mutex(&self) -> Option<MutexHandle> {
        match self {
            Payload::Lock { mutex, .. }
            | Payload::Unlock { mutex, .. }
            | Payload::Wait { mutex }
            | Payload::Notify { mutex, .. } => Some(*mutex),
            _ => None,
        }
    }

    pub fn location(&self) -> Option<Location> {
        match self {
            Payload::Read { location, .. } | Payload::Write { location, .. } => Some(*location),
            _ => None,
        }
    }
}

/// A fully classified program event label (`spec.md` §3).
#[derive(Debug, Clone, PartialEq)]
pub struct Label {
    pub kind: Kind,
    pub payload: Payload,
}

impl Label {
    pub fn new(kind: Kind, payload: Payload) -> Self {
        Self { kind, payload }
    }

    pub fn is_request(&self) -> bool {
        self.kind == Kind::Request
    }

    pub fn is_response(&self) -> bool {
        self.kind == Kind::Response
    }

    pub fn is_send(&self) -> bool {
        self.kind == Kind::Send
    }

    pub fn is_blocking(&self) -> bool {
        self.kind == Kind::Request && self.payload.is_blocking()
    }

    pub fn is_exclusive(&self) -> bool {
        self.payload.is_exclusive()
    }

    pub fn sync_type(&self) -> SyncType {
        self.payload.sync_type()
    }

    /// `true` for a `Lock`/`Unlock` label carrying `reentry_depth > 1`.
    pub fn is_reentry(&self) -> bool {
        matches!(
            &self.payload,
            Payload::Lock { reentry_depth, .. } | Payload::Unlock { reentry_depth, .. }
            if *reentry_depth > 1
        )
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({:?})", self.payload, self.kind)
    }
}
