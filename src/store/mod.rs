//! Storage backends and the contract they share.
//!
//! Both the file-backed and the in-memory store implement
//! [`CommitGraphStore`]; the facade holds either behind a trait object
//! and never names a concrete backend.

mod file;
mod lock;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::error::{GraphError, Result};
use crate::node::{CommitId, CommitNodeInfo};

/// Lazy ancestor-chain iterator produced by [`CommitGraphStore::begin_read`].
///
/// Yields commit infos from the starting commit back toward the absolute
/// past; finite, and not restartable once exhausted.
pub type HistoryIter<'a> = Box<dyn Iterator<Item = Result<CommitNodeInfo>> + 'a>;

/// Contract shared by every commit-graph backend.
pub trait CommitGraphStore {
    /// Starts a backward walk at `commit_id`.
    ///
    /// An unknown commit id yields an empty iterator, not an error.
    fn begin_read(&self, commit_id: &str) -> Result<HistoryIter<'_>>;

    /// Returns every recorded commit info regardless of reachability.
    fn read_all(&self) -> Result<Vec<CommitNodeInfo>>;

    /// Records a new commit node.
    fn insert(&mut self, info: CommitNodeInfo) -> Result<()>;

    /// Persists `commit_id` as the current head.
    fn set_head(&mut self, commit_id: &str) -> Result<()>;

    /// Returns the current head, or [`crate::ABSOLUTE_PAST`] when none
    /// has been set.
    fn get_head(&self) -> Result<CommitId>;
}

/// Insert-time validation shared by all backends.
///
/// The empty id is reserved for the absolute past, and a self-parented
/// node would hand the walker a cycle.
pub(crate) fn validate_insert(info: &CommitNodeInfo) -> Result<()> {
    if info.commit_id.is_empty() {
        return Err(GraphError::InvalidArgument(
            "the empty commit id is reserved for the absolute past".into(),
        ));
    }
    if info.commit_id == info.parent_id {
        return Err(GraphError::InvalidArgument(format!(
            "commit {:?} cannot be its own parent",
            info.commit_id
        )));
    }
    Ok(())
}
