//! Store configuration.

use crate::error::{GraphError, Result};
use crate::node::TAIL_RANK;

/// Byte order of the per-record length header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderByteOrder {
    /// Little-endian header (the default).
    Little,
    /// Big-endian header.
    Big,
}

/// Tuning knobs for a commit-graph store.
///
/// Every store instance carries its own configuration, so stores with
/// different tunings can coexist in one process. A file-backed store must
/// be reopened with the same configuration it was created with; the
/// record layout on disk is not self-describing beyond the length header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphConfig {
    /// Capacity of the tail block and baseline for rank 0.
    pub max_base_size: u32,
    /// Capacity multiplier per rank. Must be at least 2.
    pub mul_size: u32,
    /// Total size of one serialized record slot in bytes.
    pub node_size: usize,
    /// Width of the record length header in bytes.
    pub node_header_size: usize,
    /// Byte order of the record length header.
    pub header_byte_order: HeaderByteOrder,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            max_base_size: 128,
            mul_size: 2,
            node_size: 256,
            node_header_size: 1,
            header_byte_order: HeaderByteOrder::Little,
        }
    }
}

impl GraphConfig {
    /// Sets the tail-block capacity.
    pub fn max_base_size(mut self, size: u32) -> Self {
        self.max_base_size = size;
        self
    }

    /// Sets the per-rank capacity multiplier.
    pub fn mul_size(mut self, mul: u32) -> Self {
        self.mul_size = mul;
        self
    }

    /// Sets the record slot size in bytes.
    pub fn node_size(mut self, bytes: usize) -> Self {
        self.node_size = bytes;
        self
    }

    /// Sets the record length header width in bytes.
    pub fn node_header_size(mut self, bytes: usize) -> Self {
        self.node_header_size = bytes;
        self
    }

    /// Sets the record length header byte order.
    pub fn header_byte_order(mut self, order: HeaderByteOrder) -> Self {
        self.header_byte_order = order;
        self
    }

    /// Maximum payload bytes a record slot can hold.
    pub fn node_data_size(&self) -> usize {
        self.node_size - self.node_header_size
    }

    /// Capacity ceiling for the block at `rank`.
    ///
    /// Rank -1 is the tail block, whose ceiling is `max_base_size`; each
    /// sorted rank above it is `mul_size` times larger than the last.
    pub fn max_block_size(&self, rank: i32) -> u64 {
        debug_assert!(rank >= TAIL_RANK);
        u64::from(self.max_base_size) * u64::from(self.mul_size).pow((rank + 1) as u32)
    }

    /// Rejects configurations the engine cannot operate under.
    pub fn validate(&self) -> Result<()> {
        if self.max_base_size == 0 {
            return Err(GraphError::InvalidArgument(
                "max_base_size must be at least 1".into(),
            ));
        }
        if self.mul_size < 2 {
            return Err(GraphError::InvalidArgument(
                "mul_size must be at least 2 for the compaction cascade to terminate".into(),
            ));
        }
        if self.node_header_size == 0 || self.node_header_size > 8 {
            return Err(GraphError::InvalidArgument(format!(
                "node_header_size must be between 1 and 8 bytes, got {}",
                self.node_header_size
            )));
        }
        if self.node_size <= self.node_header_size {
            return Err(GraphError::InvalidArgument(format!(
                "node_size ({}) must exceed node_header_size ({})",
                self.node_size, self.node_header_size
            )));
        }
        // The header must be able to express every payload length up to
        // the budget, budget included.
        let header_bits = 8 * self.node_header_size as u32;
        if header_bits < 64 && (1u64 << header_bits) <= self.node_data_size() as u64 {
            return Err(GraphError::InvalidArgument(format!(
                "{}-byte header cannot encode payload lengths up to {}",
                self.node_header_size,
                self.node_data_size()
            )));
        }
        Ok(())
    }
}
