//! Commit nodes and their fixed-size record encoding.
//!
//! Every node serializes into exactly `node_size` bytes:
//! a length header, the payload, then zero padding. The fixed slot size
//! is what makes `offset * node_size` random access possible inside a
//! block file.

use crate::config::{GraphConfig, HeaderByteOrder};
use crate::error::{GraphError, Result};

/// Opaque identifier of one commit.
pub type CommitId = String;

/// Reserved id of the logical root; no node may carry it as its own id.
pub const ABSOLUTE_PAST: &str = "";

/// Rank denoting the tail block in a [`BlockPosition`].
pub const TAIL_RANK: i32 = -1;

const UNSET_RANK: i32 = -99;

/// Locator of a node's serialized form: `(rank, offset)`.
///
/// Rank -1 is the tail block, rank >= 0 the sorted block at that rank;
/// `offset` is the 0-based slot index within the block file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockPosition {
    /// Block tier, or a sentinel rank.
    pub rank: i32,
    /// Slot index within the block file.
    pub offset: i32,
}

impl BlockPosition {
    /// Sentinel for "not yet persisted" or "no parent".
    pub const UNSET: BlockPosition = BlockPosition {
        rank: UNSET_RANK,
        offset: UNSET_RANK,
    };

    /// Position of slot `offset` in the tail block.
    pub fn tail(offset: i32) -> Self {
        Self {
            rank: TAIL_RANK,
            offset,
        }
    }

    /// Position of slot `offset` in the sorted block at `rank`.
    pub fn sorted(rank: i32, offset: i32) -> Self {
        Self { rank, offset }
    }

    /// Whether this is the unset sentinel.
    pub fn is_unset(&self) -> bool {
        *self == Self::UNSET
    }

    fn write_to(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.rank.to_le_bytes());
        buf.extend_from_slice(&self.offset.to_le_bytes());
    }

    fn read_from(reader: &mut PayloadReader<'_>) -> Result<Self> {
        let rank = reader.take_i32()?;
        let offset = reader.take_i32()?;
        Ok(Self { rank, offset })
    }
}

/// The durable logical payload of one commit: its id and its parent's id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitNodeInfo {
    /// Id of this commit.
    pub commit_id: CommitId,
    /// Id of the parent commit, or [`ABSOLUTE_PAST`].
    pub parent_id: CommitId,
}

impl CommitNodeInfo {
    /// Creates an info record.
    pub fn new(commit_id: impl Into<CommitId>, parent_id: impl Into<CommitId>) -> Self {
        Self {
            commit_id: commit_id.into(),
            parent_id: parent_id.into(),
        }
    }
}

/// A commit record together with its own and its parent's block position.
///
/// Once written, `position` equals the slot the node occupies in its
/// block file; `parent_position` points at the slot holding the parent,
/// or is unset when the parent is [`ABSOLUTE_PAST`] or unknown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitNode {
    /// Logical payload.
    pub info: CommitNodeInfo,
    /// Where this node's serialized form lives.
    pub position: BlockPosition,
    /// Where the parent's serialized form lives.
    pub parent_position: BlockPosition,
}

impl CommitNode {
    /// Wraps an info record with unset positions.
    pub fn new(info: CommitNodeInfo) -> Self {
        Self {
            info,
            position: BlockPosition::UNSET,
            parent_position: BlockPosition::UNSET,
        }
    }

    /// This node's commit id.
    pub fn commit_id(&self) -> &str {
        &self.info.commit_id
    }

    /// This node's parent id.
    pub fn parent_id(&self) -> &str {
        &self.info.parent_id
    }

    /// Consumes the node, returning its logical payload.
    pub fn into_info(self) -> CommitNodeInfo {
        self.info
    }

    /// Serializes into exactly `config.node_size` bytes.
    ///
    /// Payload layout: two length-prefixed id strings, both positions,
    /// then a CRC32 over the preceding payload bytes. Fails with
    /// [`GraphError::RecordTooLarge`] when the payload exceeds the slot
    /// budget.
    pub fn serialize(&self, config: &GraphConfig) -> Result<Vec<u8>> {
        let budget = config.node_data_size();
        let mut payload = Vec::with_capacity(64);
        put_id(&mut payload, &self.info.commit_id)?;
        put_id(&mut payload, &self.info.parent_id)?;
        self.position.write_to(&mut payload);
        self.parent_position.write_to(&mut payload);
        let crc = crc32fast::hash(&payload);
        payload.extend_from_slice(&crc.to_le_bytes());

        if payload.len() > budget {
            return Err(GraphError::RecordTooLarge {
                len: payload.len(),
                max: budget,
            });
        }

        let mut record = Vec::with_capacity(config.node_size);
        write_header(&mut record, payload.len(), config);
        record.extend_from_slice(&payload);
        record.resize(config.node_size, 0);
        Ok(record)
    }

    /// Decodes one record slot.
    pub fn deserialize(buf: &[u8], config: &GraphConfig) -> Result<CommitNode> {
        if buf.len() < config.node_size {
            return Err(GraphError::Corruption(format!(
                "record truncated: {} bytes, expected {}",
                buf.len(),
                config.node_size
            )));
        }
        let header_size = config.node_header_size;
        let payload_len = read_header(buf, config);
        if payload_len > config.node_data_size() {
            return Err(GraphError::Corruption(format!(
                "record header claims {payload_len} payload bytes, budget is {}",
                config.node_data_size()
            )));
        }
        let payload = &buf[header_size..header_size + payload_len];
        if payload.len() < 4 {
            return Err(GraphError::Corruption(
                "record payload too short for checksum".into(),
            ));
        }
        let (body, crc_bytes) = payload.split_at(payload.len() - 4);
        let stored = u32::from_le_bytes(crc_bytes.try_into().expect("slice has exactly 4 bytes"));
        let computed = crc32fast::hash(body);
        if stored != computed {
            return Err(GraphError::Corruption(format!(
                "record checksum mismatch: computed {computed:08x}, stored {stored:08x}"
            )));
        }

        let mut reader = PayloadReader::new(body);
        let commit_id = reader.take_id()?;
        let parent_id = reader.take_id()?;
        let position = BlockPosition::read_from(&mut reader)?;
        let parent_position = BlockPosition::read_from(&mut reader)?;
        Ok(CommitNode {
            info: CommitNodeInfo {
                commit_id,
                parent_id,
            },
            position,
            parent_position,
        })
    }
}

fn put_id(buf: &mut Vec<u8>, id: &str) -> Result<()> {
    let len = id.len();
    if len > u16::MAX as usize {
        return Err(GraphError::InvalidArgument(format!(
            "commit id of {len} bytes exceeds the {} byte limit",
            u16::MAX
        )));
    }
    buf.extend_from_slice(&(len as u16).to_le_bytes());
    buf.extend_from_slice(id.as_bytes());
    Ok(())
}

fn write_header(buf: &mut Vec<u8>, payload_len: usize, config: &GraphConfig) {
    let width = config.node_header_size;
    match config.header_byte_order {
        HeaderByteOrder::Little => buf.extend_from_slice(&(payload_len as u64).to_le_bytes()[..width]),
        HeaderByteOrder::Big => buf.extend_from_slice(&(payload_len as u64).to_be_bytes()[8 - width..]),
    }
}

fn read_header(buf: &[u8], config: &GraphConfig) -> usize {
    let width = config.node_header_size;
    let mut scratch = [0u8; 8];
    match config.header_byte_order {
        HeaderByteOrder::Little => {
            scratch[..width].copy_from_slice(&buf[..width]);
            u64::from_le_bytes(scratch) as usize
        }
        HeaderByteOrder::Big => {
            scratch[8 - width..].copy_from_slice(&buf[..width]);
            u64::from_be_bytes(scratch) as usize
        }
    }
}

struct PayloadReader<'a> {
    buf: &'a [u8],
}

impl<'a> PayloadReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.buf.len() < n {
            return Err(GraphError::Corruption(format!(
                "record payload truncated: wanted {n} bytes, {} remain",
                self.buf.len()
            )));
        }
        let (head, rest) = self.buf.split_at(n);
        self.buf = rest;
        Ok(head)
    }

    fn take_i32(&mut self) -> Result<i32> {
        let bytes = self.take(4)?;
        Ok(i32::from_le_bytes(bytes.try_into().expect("slice has exactly 4 bytes")))
    }

    fn take_id(&mut self) -> Result<String> {
        let len_bytes = self.take(2)?;
        let len = u16::from_le_bytes(len_bytes.try_into().expect("slice has exactly 2 bytes"));
        let bytes = self.take(len as usize)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| GraphError::Corruption("commit id is not valid UTF-8".into()))
    }
}
