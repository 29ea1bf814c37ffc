//! The unsorted, append-only tail block.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::trace;

use crate::config::GraphConfig;
use crate::error::{GraphError, Result};
use crate::node::{BlockPosition, CommitNode, TAIL_RANK};

const TAIL_FILE: &str = "commit_block_tail";

/// Durable append log for newly-inserted, not-yet-sorted nodes.
///
/// Bounded by `max_block_size(-1)`; once full, the store merges its
/// contents into the rank-0 sorted block and clears it.
#[derive(Debug)]
pub struct TailBlock {
    root: PathBuf,
    size: u32,
    config: GraphConfig,
}

impl TailBlock {
    /// Creates an empty tail block rooted at `root`.
    pub fn new(root: &Path, config: &GraphConfig) -> Self {
        Self::with_size(root, config, 0)
    }

    /// Restores a tail block whose size was read from store metadata.
    pub fn with_size(root: &Path, config: &GraphConfig, size: u32) -> Self {
        Self {
            root: root.to_path_buf(),
            size,
            config: *config,
        }
    }

    /// Number of records currently appended.
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Path of the backing file.
    pub fn file_path(&self) -> PathBuf {
        self.root.join(TAIL_FILE)
    }

    /// Reads the record at `position`.
    pub fn read(&self, position: BlockPosition) -> Result<CommitNode> {
        if position.rank != TAIL_RANK
            || position.offset < 0
            || position.offset as u32 >= self.size
        {
            return Err(GraphError::OutOfRange(format!(
                "({}, {}) does not address one of the {} tail records",
                position.rank, position.offset, self.size
            )));
        }
        let mut file = File::open(self.file_path())?;
        super::read_node_at(&mut file, position.offset, &self.config)
    }

    /// Returns all records in insertion order; empty when the backing
    /// file does not exist yet.
    pub fn read_all(&self) -> Result<Vec<CommitNode>> {
        match File::open(self.file_path()) {
            Ok(mut file) => super::read_nodes_sequential(&mut file, self.size, &self.config),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(err) => Err(err.into()),
        }
    }

    /// Linear scan from slot 0; returns the first record whose commit id
    /// matches.
    ///
    /// The tail is bounded by a small constant, so the scan is cheap, and
    /// starting at slot 0 means the earliest copy of a duplicated id wins.
    pub fn find_and_read(&self, commit_id: &str) -> Result<Option<CommitNode>> {
        let mut file = match File::open(self.file_path()) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let mut buf = vec![0u8; self.config.node_size];
        for _ in 0..self.size {
            file.read_exact(&mut buf)?;
            let node = CommitNode::deserialize(&buf, &self.config)?;
            if node.commit_id() == commit_id {
                return Ok(Some(node));
            }
        }
        Ok(None)
    }

    /// Assigns the node the next tail slot and persists it there.
    ///
    /// The write is positioned at `size * node_size` rather than blindly
    /// appended, so a stale file left behind by an interrupted compaction
    /// gets overwritten slot-by-slot instead of skewing record alignment.
    pub fn insert(&mut self, node: &mut CommitNode) -> Result<()> {
        node.position = BlockPosition::tail(self.size as i32);
        let bytes = node.serialize(&self.config)?;
        debug_assert_eq!(bytes.len(), self.config.node_size);
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .open(self.file_path())?;
        file.seek(SeekFrom::Start(
            u64::from(self.size) * self.config.node_size as u64,
        ))?;
        file.write_all(&bytes)?;
        self.size += 1;
        trace!(
            commit_id = node.commit_id(),
            offset = node.position.offset,
            "commit_graph.tail.insert"
        );
        Ok(())
    }

    /// Resets the block to empty and deletes the backing file.
    pub fn clear(&mut self) -> Result<()> {
        self.size = 0;
        match fs::remove_file(self.file_path()) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// Resets the in-memory size only; file removal is the caller's
    /// responsibility (deferred until after metadata publication).
    pub fn mark_cleared(&mut self) {
        self.size = 0;
    }
}
