//! In-memory commit-graph store for tests and ephemeral sessions.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::Result;
use crate::node::{CommitId, CommitNodeInfo, ABSOLUTE_PAST};

use super::{validate_insert, CommitGraphStore, HistoryIter};

/// Map-backed store with the same contract as the file-backed one.
///
/// History walks follow the strict single-parent chain, exactly like the
/// file-backed walker: one parent link per commit, ending at the absolute
/// past or at the first unknown parent id.
#[derive(Debug, Default)]
pub struct MemoryStore {
    infos: FxHashMap<CommitId, CommitNodeInfo>,
    head: CommitId,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl CommitGraphStore for MemoryStore {
    fn begin_read(&self, commit_id: &str) -> Result<HistoryIter<'_>> {
        Ok(Box::new(MemoryWalker {
            infos: &self.infos,
            current: self.infos.get(commit_id).cloned(),
            visited: FxHashSet::default(),
        }))
    }

    fn read_all(&self) -> Result<Vec<CommitNodeInfo>> {
        Ok(self.infos.values().cloned().collect())
    }

    fn insert(&mut self, info: CommitNodeInfo) -> Result<()> {
        validate_insert(&info)?;
        // First copy wins, matching the file store's lookup order for
        // duplicated ids.
        self.infos.entry(info.commit_id.clone()).or_insert(info);
        Ok(())
    }

    fn set_head(&mut self, commit_id: &str) -> Result<()> {
        self.head = commit_id.to_string();
        Ok(())
    }

    fn get_head(&self) -> Result<CommitId> {
        Ok(self.head.clone())
    }
}

/// Chain walker over the in-memory store.
///
/// Parent links resolve by id at walk time, so a cycle could be fed in
/// through direct store inserts; the visited set bounds the walk to each
/// id once.
struct MemoryWalker<'a> {
    infos: &'a FxHashMap<CommitId, CommitNodeInfo>,
    current: Option<CommitNodeInfo>,
    visited: FxHashSet<CommitId>,
}

impl Iterator for MemoryWalker<'_> {
    type Item = Result<CommitNodeInfo>;

    fn next(&mut self) -> Option<Self::Item> {
        let info = self.current.take()?;
        self.visited.insert(info.commit_id.clone());
        if info.parent_id != ABSOLUTE_PAST && !self.visited.contains(&info.parent_id) {
            self.current = self.infos.get(&info.parent_id).cloned();
        }
        Some(Ok(info))
    }
}
