//! File-backed commit-graph store.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use crate::block::{SortedBlock, TailBlock};
use crate::config::GraphConfig;
use crate::error::{GraphError, Result};
use crate::node::{BlockPosition, CommitId, CommitNode, CommitNodeInfo, ABSOLUTE_PAST, TAIL_RANK};

use super::lock::StoreLock;
use super::{validate_insert, CommitGraphStore, HistoryIter};

const META_FILE: &str = "meta.json";
const HEAD_FILE: &str = "head.json";

#[derive(Serialize, Deserialize)]
struct SortedBlockMeta {
    rank: i32,
    gen: u64,
    size: u32,
}

#[derive(Serialize, Deserialize)]
struct TailBlockMeta {
    size: u32,
}

#[derive(Serialize, Deserialize)]
struct StoreMeta {
    sorted_blocks: Vec<SortedBlockMeta>,
    tail_block: TailBlockMeta,
}

#[derive(Serialize, Deserialize)]
struct HeadMeta {
    commit_id: String,
}

/// Commit-graph store persisting under one root directory.
///
/// Owns the tail block, one sorted block per rank, the metadata and head
/// files, and an exclusive advisory lock on the directory. Metadata is
/// the single source of truth: every state change is published by an
/// atomic rename of `meta.json`, and files it does not reference are
/// swept away on the next open.
///
/// A store must be reopened with the same [`GraphConfig`] it was created
/// with; the record layout on disk is not self-describing.
#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
    config: GraphConfig,
    sorted_blocks: Vec<SortedBlock>,
    tail: TailBlock,
    _lock: StoreLock,
}

impl FileStore {
    /// Opens (or creates) the store rooted at `root`.
    pub fn open(root: impl AsRef<Path>, config: GraphConfig) -> Result<Self> {
        config.validate()?;
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        let lock = StoreLock::acquire(&root)?;

        let meta = match fs::read(root.join(META_FILE)) {
            Ok(bytes) => Some(serde_json::from_slice::<StoreMeta>(&bytes)?),
            Err(err) if err.kind() == io::ErrorKind::NotFound => None,
            Err(err) => return Err(err.into()),
        };
        let (sorted_blocks, tail) = match meta {
            Some(meta) => {
                let mut blocks = Vec::with_capacity(meta.sorted_blocks.len());
                for (index, descriptor) in meta.sorted_blocks.iter().enumerate() {
                    if descriptor.rank != index as i32 {
                        return Err(GraphError::Corruption(format!(
                            "metadata lists rank {} at index {index}",
                            descriptor.rank
                        )));
                    }
                    blocks.push(SortedBlock::from_meta(
                        &root,
                        descriptor.rank,
                        descriptor.gen,
                        descriptor.size,
                        &config,
                    ));
                }
                (
                    blocks,
                    TailBlock::with_size(&root, &config, meta.tail_block.size),
                )
            }
            None => (Vec::new(), TailBlock::new(&root, &config)),
        };

        let store = Self {
            root,
            config,
            sorted_blocks,
            tail,
            _lock: lock,
        };
        store.sweep_stale_files();
        debug!(
            root = %store.root.display(),
            ranks = store.sorted_blocks.len(),
            tail = store.tail.size(),
            "commit_graph.open"
        );
        Ok(store)
    }

    /// Root directory of this store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Removes block and temp files that metadata does not reference.
    ///
    /// A crash between merge publication steps leaves only such orphans;
    /// deleting them restores exactly the metadata-described state.
    fn sweep_stale_files(&self) {
        let mut live: FxHashSet<PathBuf> = FxHashSet::default();
        if self.tail.size() > 0 {
            live.insert(self.tail.file_path());
        }
        for block in &self.sorted_blocks {
            if block.size() > 0 {
                live.insert(block.file_path());
            }
        }

        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(err) => {
                warn!(error = %err, "commit_graph.recover.scan_failed");
                return;
            }
        };
        for entry in entries.flatten() {
            let path = entry.path();
            let name = entry.file_name();
            let name = name.to_string_lossy();
            let is_block = name.starts_with("commit_block");
            let is_tmp = name.ends_with(".tmp");
            if (!is_block && !is_tmp) || live.contains(&path) {
                continue;
            }
            match fs::remove_file(&path) {
                Ok(()) => warn!(file = %name, "commit_graph.recover.removed_stale_file"),
                Err(err) => {
                    warn!(error = %err, file = %name, "commit_graph.recover.remove_failed")
                }
            }
        }
    }

    /// Reads the node stored at `position`.
    fn read(&self, position: BlockPosition) -> Result<CommitNode> {
        if position.rank == TAIL_RANK {
            return self.tail.read(position);
        }
        if position.rank < 0 || position.rank as usize >= self.sorted_blocks.len() {
            return Err(GraphError::OutOfRange(format!(
                "rank {} outside the {} known sorted ranks",
                position.rank,
                self.sorted_blocks.len()
            )));
        }
        self.sorted_blocks[position.rank as usize].read(position)
    }

    /// Looks a commit up across all blocks: tail first, then sorted ranks
    /// ascending, assuming lookups skew toward recent commits.
    fn find_node(&self, commit_id: &str) -> Result<Option<CommitNode>> {
        if commit_id == ABSOLUTE_PAST {
            return Ok(None);
        }
        if let Some(node) = self.tail.find_and_read(commit_id)? {
            return Ok(Some(node));
        }
        for block in &self.sorted_blocks {
            if let Some(node) = block.find_and_read(commit_id)? {
                return Ok(Some(node));
            }
        }
        Ok(None)
    }

    fn ensure_rank(&mut self, rank: i32) {
        while self.sorted_blocks.len() <= rank as usize {
            let next_rank = self.sorted_blocks.len() as i32;
            self.sorted_blocks
                .push(SortedBlock::new(&self.root, next_rank, &self.config));
        }
    }

    /// Merges the full tail into rank 0, cascading upward while the
    /// result exceeds each rank's capacity ceiling, then publishes the
    /// new state.
    fn compact(&mut self) -> Result<()> {
        debug!(tail = self.tail.size(), "commit_graph.tail.flush");
        self.ensure_rank(0);
        let mut new_block = self.sorted_blocks[0].merge_tail(&self.tail)?;
        let mut rank = 0i32;
        while u64::from(new_block.size()) >= self.config.max_block_size(rank) {
            rank += 1;
            self.ensure_rank(rank);
            let next = self.sorted_blocks[rank as usize].merge(&new_block)?;
            // The intermediate block lost the cascade and was never
            // published; its file can go immediately.
            new_block.clear()?;
            new_block = next;
        }
        info!(
            rank,
            gen = new_block.gen(),
            size = new_block.size(),
            "commit_graph.merge.promoted"
        );

        // Collect superseded files, then publish metadata before touching
        // them: a crash on either side of the rename leaves only orphans.
        let mut superseded: Vec<PathBuf> = Vec::new();
        for block in &mut self.sorted_blocks[..=rank as usize] {
            if block.size() > 0 {
                superseded.push(block.file_path());
            }
            block.mark_cleared();
        }
        if self.tail.size() > 0 {
            superseded.push(self.tail.file_path());
        }
        self.tail.mark_cleared();
        self.sorted_blocks[rank as usize] = new_block;
        self.save_meta()?;

        for path in superseded {
            if let Err(err) = fs::remove_file(&path) {
                if err.kind() != io::ErrorKind::NotFound {
                    warn!(error = %err, file = %path.display(), "commit_graph.merge.cleanup_failed");
                }
            }
        }
        Ok(())
    }

    fn save_meta(&self) -> Result<()> {
        let meta = StoreMeta {
            sorted_blocks: self
                .sorted_blocks
                .iter()
                .map(|block| SortedBlockMeta {
                    rank: block.rank(),
                    gen: block.gen(),
                    size: block.size(),
                })
                .collect(),
            tail_block: TailBlockMeta {
                size: self.tail.size(),
            },
        };
        write_json_atomic(&self.root.join(META_FILE), &meta)
    }
}

impl CommitGraphStore for FileStore {
    fn begin_read(&self, commit_id: &str) -> Result<HistoryIter<'_>> {
        let start = self.find_node(commit_id)?;
        Ok(Box::new(HistoryWalker {
            store: self,
            current: start,
            failed: None,
        }))
    }

    fn read_all(&self) -> Result<Vec<CommitNodeInfo>> {
        let mut infos: Vec<CommitNodeInfo> = self
            .tail
            .read_all()?
            .into_iter()
            .map(CommitNode::into_info)
            .collect();
        for block in &self.sorted_blocks {
            infos.extend(block.read_all()?.into_iter().map(CommitNode::into_info));
        }
        Ok(infos)
    }

    fn insert(&mut self, info: CommitNodeInfo) -> Result<()> {
        validate_insert(&info)?;
        let mut node = CommitNode::new(info);
        if let Some(parent) = self.find_node(node.parent_id())? {
            node.parent_position = parent.position;
        }
        trace!(commit_id = node.commit_id(), "commit_graph.insert");
        self.tail.insert(&mut node)?;
        if u64::from(self.tail.size()) >= self.config.max_block_size(TAIL_RANK) {
            // Compaction publishes metadata itself, before deleting the
            // files it supersedes.
            self.compact()
        } else {
            self.save_meta()
        }
    }

    fn set_head(&mut self, commit_id: &str) -> Result<()> {
        write_json_atomic(
            &self.root.join(HEAD_FILE),
            &HeadMeta {
                commit_id: commit_id.to_string(),
            },
        )?;
        trace!(commit_id, "commit_graph.head.set");
        Ok(())
    }

    fn get_head(&self) -> Result<CommitId> {
        match fs::read(self.root.join(HEAD_FILE)) {
            Ok(bytes) => Ok(serde_json::from_slice::<HeadMeta>(&bytes)?.commit_id),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(ABSOLUTE_PAST.to_string()),
            Err(err) => Err(err.into()),
        }
    }
}

/// Backward walker over the file-backed store.
///
/// Follows one `parent_position` per node until the unset sentinel.
/// Cycles cannot arise from positions alone: a parent position always
/// references a node inserted earlier, and self-parenting is rejected at
/// insert time.
struct HistoryWalker<'a> {
    store: &'a FileStore,
    current: Option<CommitNode>,
    failed: Option<GraphError>,
}

impl Iterator for HistoryWalker<'_> {
    type Item = Result<CommitNodeInfo>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(err) = self.failed.take() {
            return Some(Err(err));
        }
        let node = self.current.take()?;
        if !node.parent_position.is_unset() {
            // Yield the current node now; a failed parent read surfaces
            // on the following call.
            match self.store.read(node.parent_position) {
                Ok(parent) => self.current = Some(parent),
                Err(err) => self.failed = Some(err),
            }
        }
        Some(Ok(node.into_info()))
    }
}

fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    let bytes = serde_json::to_vec(value)?;
    {
        let mut file = File::create(&tmp)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}
