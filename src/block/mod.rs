//! Tiered on-disk blocks of fixed-size commit records.
//!
//! The tail block is an unsorted append log for fresh inserts; sorted
//! blocks are immutable, id-ordered tiers produced by merging. Both store
//! one record per `node_size` slot, addressed as `offset * node_size`.

mod sorted;
mod tail;

pub use sorted::SortedBlock;
pub use tail::TailBlock;

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};

use crate::config::GraphConfig;
use crate::error::Result;
use crate::node::CommitNode;

/// Reads and decodes the record in slot `offset` of an open block file.
fn read_node_at(file: &mut File, offset: i32, config: &GraphConfig) -> Result<CommitNode> {
    let mut buf = vec![0u8; config.node_size];
    file.seek(SeekFrom::Start(offset as u64 * config.node_size as u64))?;
    file.read_exact(&mut buf)?;
    CommitNode::deserialize(&buf, config)
}

/// Reads the first `count` records of an open block file in slot order.
fn read_nodes_sequential(
    file: &mut File,
    count: u32,
    config: &GraphConfig,
) -> Result<Vec<CommitNode>> {
    file.seek(SeekFrom::Start(0))?;
    let mut nodes = Vec::with_capacity(count as usize);
    let mut buf = vec![0u8; config.node_size];
    for _ in 0..count {
        file.read_exact(&mut buf)?;
        nodes.push(CommitNode::deserialize(&buf, config)?);
    }
    Ok(nodes)
}
