//! Embedded, append-friendly commit-graph storage.
//!
//! `cairn` records a history of commit checkpoints as parent-linked
//! chains, with fast point lookups and full-history walks from any
//! commit. New commits land in an unsorted tail block; when the tail
//! fills, it is merged into exponentially-sized, id-sorted block tiers,
//! the way an LSM tree spills its memtable. A file-backed store persists
//! everything under one directory and survives restarts; an in-memory
//! store offers the same contract for tests and ephemeral sessions.
//!
//! The engine is strictly single-writer: a file-backed store holds an
//! exclusive advisory lock on its directory for its whole lifetime, and
//! a second opener fails fast.
//!
//! ```no_run
//! use cairn::CommitGraph;
//!
//! # fn main() -> cairn::Result<()> {
//! let mut graph = CommitGraph::open("/tmp/my-graph")?;
//! graph.step("a")?;
//! graph.step("b")?;
//! let chain = graph.list_history()?; // [b, a]
//! # Ok(())
//! # }
//! ```

mod block;
pub mod config;
pub mod error;
mod graph;
mod node;
pub mod store;

pub use config::{GraphConfig, HeaderByteOrder};
pub use error::{GraphError, Result};
pub use graph::CommitGraph;
pub use node::{CommitId, CommitNodeInfo, ABSOLUTE_PAST};
pub use store::{CommitGraphStore, FileStore, HistoryIter, MemoryStore};
