//! Immutable, id-sorted, generation-stamped blocks.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::GraphConfig;
use crate::error::{GraphError, Result};
use crate::node::{BlockPosition, CommitNode, TAIL_RANK};

use super::TailBlock;

/// One capacity tier of the commit graph.
///
/// A sorted block is immutable between merges. Every merge produces a
/// brand-new block of the same rank with the generation bumped and a new
/// backing file; the superseded generation's file is deleted once the new
/// state has been published.
#[derive(Debug)]
pub struct SortedBlock {
    root: PathBuf,
    rank: i32,
    gen: u64,
    size: u32,
    config: GraphConfig,
}

impl SortedBlock {
    /// Creates an empty generation-0 block at `rank`.
    pub fn new(root: &Path, rank: i32, config: &GraphConfig) -> Self {
        Self::from_meta(root, rank, 0, 0, config)
    }

    /// Restores a block described by store metadata.
    pub fn from_meta(root: &Path, rank: i32, gen: u64, size: u32, config: &GraphConfig) -> Self {
        Self {
            root: root.to_path_buf(),
            rank,
            gen,
            size,
            config: *config,
        }
    }

    /// This block's tier.
    pub fn rank(&self) -> i32 {
        self.rank
    }

    /// Generation stamp, incremented by every merge.
    pub fn gen(&self) -> u64 {
        self.gen
    }

    /// Number of records in this generation.
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Path of this generation's backing file.
    pub fn file_path(&self) -> PathBuf {
        self.root
            .join(format!("commit_block_{}_{}", self.rank, self.gen))
    }

    /// Reads the record at `position`.
    pub fn read(&self, position: BlockPosition) -> Result<CommitNode> {
        if position.rank != self.rank || position.offset < 0 || position.offset as u32 >= self.size
        {
            return Err(GraphError::OutOfRange(format!(
                "({}, {}) does not address one of the {} records of rank {}",
                position.rank, position.offset, self.size, self.rank
            )));
        }
        let mut file = File::open(self.file_path())?;
        super::read_node_at(&mut file, position.offset, &self.config)
    }

    /// Returns all records in id order; empty when the backing file does
    /// not exist.
    pub fn read_all(&self) -> Result<Vec<CommitNode>> {
        match File::open(self.file_path()) {
            Ok(mut file) => super::read_nodes_sequential(&mut file, self.size, &self.config),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(err) => Err(err.into()),
        }
    }

    /// Binary search by commit id over the sorted file.
    ///
    /// Lower-bound search: among duplicate ids the lowest slot wins, which
    /// matches the tail block's first-match linear scan (the stable merge
    /// sort keeps insertion order among equals).
    pub fn find_and_read(&self, commit_id: &str) -> Result<Option<CommitNode>> {
        if self.size == 0 {
            return Ok(None);
        }
        let mut file = match File::open(self.file_path()) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let mut lo = 0u32;
        let mut hi = self.size;
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let node = super::read_node_at(&mut file, mid as i32, &self.config)?;
            if node.commit_id() < commit_id {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        if lo == self.size {
            return Ok(None);
        }
        let node = super::read_node_at(&mut file, lo as i32, &self.config)?;
        if node.commit_id() == commit_id {
            Ok(Some(node))
        } else {
            Ok(None)
        }
    }

    /// Merges another sorted block into this one, producing the next
    /// generation at this block's rank.
    pub fn merge(&self, other: &SortedBlock) -> Result<SortedBlock> {
        self.merge_nodes(other.read_all()?, other.rank)
    }

    /// Merges the tail block into this one.
    pub fn merge_tail(&self, tail: &TailBlock) -> Result<SortedBlock> {
        self.merge_nodes(tail.read_all()?, TAIL_RANK)
    }

    /// Core merge: concatenate both sides, sort stably by commit id,
    /// repair every parent position that pointed into either source
    /// block, then write the reindexed records as a new generation.
    fn merge_nodes(&self, other_nodes: Vec<CommitNode>, other_rank: i32) -> Result<SortedBlock> {
        let mut nodes = self.read_all()?;
        let self_len = nodes.len();
        nodes.extend(other_nodes);

        // Stable sort permutation by commit id; new_offsets maps an index
        // in the concatenated list to the record's slot after sorting.
        let mut order: Vec<usize> = (0..nodes.len()).collect();
        order.sort_by(|&a, &b| nodes[a].commit_id().cmp(nodes[b].commit_id()));
        let mut new_offsets = vec![0i32; nodes.len()];
        for (new, &old) in order.iter().enumerate() {
            new_offsets[old] = new as i32;
        }

        // Reordering breaks cross-references into the two source blocks;
        // translate those parent positions to the merged layout.
        for node in &mut nodes {
            let parent = node.parent_position;
            if parent.is_unset() {
                continue;
            }
            if parent.rank != self.rank && parent.rank != other_rank {
                continue;
            }
            let dangling = || {
                GraphError::Corruption(format!(
                    "dangling parent reference ({}, {}) while merging into rank {}",
                    parent.rank, parent.offset, self.rank
                ))
            };
            if parent.offset < 0 {
                return Err(dangling());
            }
            let base = if parent.rank == self.rank { 0 } else { self_len };
            let new_offset = new_offsets
                .get(base + parent.offset as usize)
                .copied()
                .ok_or_else(dangling)?;
            node.parent_position = BlockPosition::sorted(self.rank, new_offset);
        }

        let mut merged: Vec<CommitNode> = order.iter().map(|&old| nodes[old].clone()).collect();
        for (offset, node) in merged.iter_mut().enumerate() {
            node.position = BlockPosition::sorted(self.rank, offset as i32);
        }

        let new_block = SortedBlock::from_meta(
            &self.root,
            self.rank,
            self.gen + 1,
            merged.len() as u32,
            &self.config,
        );
        new_block.write_records(&merged)?;
        debug!(
            rank = new_block.rank,
            gen = new_block.gen,
            size = new_block.size,
            "commit_graph.block.merged"
        );
        Ok(new_block)
    }

    /// Writes this generation's file through a temp name and an atomic
    /// rename, so a crash mid-write never leaves a half-written live file.
    fn write_records(&self, nodes: &[CommitNode]) -> Result<()> {
        let final_path = self.file_path();
        let tmp_path = final_path.with_extension("tmp");
        {
            let mut file = File::create(&tmp_path)?;
            for node in nodes {
                file.write_all(&node.serialize(&self.config)?)?;
            }
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &final_path)?;
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

    /// Resets the in-memory size only, keeping the generation counter;
    /// file removal is deferred until after metadata publication.
    pub fn mark_cleared(&mut self) {
        self.size = 0;
    }
}
