//! The commit-graph facade.

use std::path::Path;

use tracing::debug;

use crate::config::GraphConfig;
use crate::error::Result;
use crate::node::{CommitId, CommitNodeInfo, ABSOLUTE_PAST};
use crate::store::{CommitGraphStore, FileStore, HistoryIter, MemoryStore};

/// History of commit checkpoints, backed by any [`CommitGraphStore`].
///
/// The graph tracks a single mutable head cursor. [`step`](Self::step)
/// advances it while recording a derivation edge from the previous head;
/// [`jump`](Self::jump) moves it without recording one.
pub struct CommitGraph {
    store: Box<dyn CommitGraphStore>,
}

impl std::fmt::Debug for CommitGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommitGraph").finish_non_exhaustive()
    }
}

impl CommitGraph {
    /// Creates a graph over a fresh in-memory store.
    pub fn in_memory() -> Self {
        Self::with_store(Box::new(MemoryStore::new()))
    }

    /// Opens (or creates) a file-backed graph under `root` with the
    /// default configuration.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_config(root, GraphConfig::default())
    }

    /// Opens (or creates) a file-backed graph with an explicit
    /// configuration.
    pub fn open_with_config(root: impl AsRef<Path>, config: GraphConfig) -> Result<Self> {
        Ok(Self::with_store(Box::new(FileStore::open(root, config)?)))
    }

    /// Wraps an already-constructed backing store.
    pub fn with_store(store: Box<dyn CommitGraphStore>) -> Self {
        Self { store }
    }

    /// Current head commit id, or [`ABSOLUTE_PAST`] on a fresh graph.
    pub fn head(&self) -> Result<CommitId> {
        self.store.get_head()
    }

    /// Steps forward to `commit_id`, recording the current head as its
    /// parent, then moves the head.
    ///
    /// Stepping to the current head itself would self-parent the new
    /// node and is rejected with
    /// [`GraphError::InvalidArgument`](crate::error::GraphError).
    pub fn step(&mut self, commit_id: &str) -> Result<()> {
        let head = self.store.get_head()?;
        self.store.insert(CommitNodeInfo::new(commit_id, head))?;
        self.store.set_head(commit_id)?;
        debug!(commit_id, "commit_graph.step");
        Ok(())
    }

    /// Jumps to `commit_id` without recording a derivation edge from the
    /// current head.
    ///
    /// A never-seen commit is inserted as a root attached to
    /// [`ABSOLUTE_PAST`]; an existing one is left untouched. The head
    /// moves unconditionally.
    pub fn jump(&mut self, commit_id: &str) -> Result<()> {
        let known = self
            .store
            .begin_read(commit_id)?
            .next()
            .transpose()?
            .is_some();
        if !known {
            self.store
                .insert(CommitNodeInfo::new(commit_id, ABSOLUTE_PAST))?;
        }
        self.store.set_head(commit_id)?;
        debug!(commit_id, known, "commit_graph.jump");
        Ok(())
    }

    /// Lazily walks the ancestor chain starting at the head.
    pub fn iter_history(&self) -> Result<HistoryIter<'_>> {
        let head = self.store.get_head()?;
        self.store.begin_read(&head)
    }

    /// Lazily walks the ancestor chain starting at `commit_id`.
    pub fn iter_history_from(&self, commit_id: &str) -> Result<HistoryIter<'_>> {
        self.store.begin_read(commit_id)
    }

    /// Collects the ancestor chain of the head, newest first.
    pub fn list_history(&self) -> Result<Vec<CommitNodeInfo>> {
        self.iter_history()?.collect()
    }

    /// Collects the ancestor chain of `commit_id`, newest first.
    pub fn list_history_from(&self, commit_id: &str) -> Result<Vec<CommitNodeInfo>> {
        self.iter_history_from(commit_id)?.collect()
    }

    /// Returns every recorded commit, reachable from the head or not.
    pub fn list_all_history(&self) -> Result<Vec<CommitNodeInfo>> {
        self.store.read_all()
    }
}
