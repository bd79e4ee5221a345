use core_collections::DenseMap;
use core_types::{Id, ThreadId};

/// A per-thread "last included event" snapshot — the canonical cut
/// representation used for rewinds (`spec.md` §3 "Execution Frontier").
#[derive(Debug, Clone, Default)]
pub struct ExecutionFrontier {
    last: DenseMap<Id>,
}

impl ExecutionFrontier {
    pub fn new() -> Self {
        Self {
            last: DenseMap::new(),
        }
    }

    pub fn get(&self, thread: ThreadId) -> Option<Id> {
        self.last.get(thread.index()).copied()
    }

    pub fn set(&mut self, thread: ThreadId, id: Id) {
        self.last.set(thread.index(), id);
    }

    pub fn iter(&self) -> impl Iterator<Item = (ThreadId, Id)> + '_ {
        self.last.iter().map(|(i, &id)| (ThreadId(i), id))
    }

    pub fn is_empty(&self) -> bool {
        self.last.iter().next().is_none()
    }
}
