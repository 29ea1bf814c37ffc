//! Crate-wide error type and result alias.

use std::io;

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, GraphError>;

/// Errors surfaced by the commit-graph store.
///
/// Absence is never an error: lookups for unknown commits return `None`
/// or an empty iterator, and a missing metadata file on open reads as an
/// empty store.
#[derive(Debug, Error)]
pub enum GraphError {
    /// Underlying file I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// Metadata or head file could not be encoded or decoded.
    #[error("metadata error: {0}")]
    Metadata(#[from] serde_json::Error),
    /// A node's serialized payload exceeds the fixed record budget.
    ///
    /// Recovery requires a larger `node_size` or shorter commit ids.
    #[error("record payload of {len} bytes exceeds the {max}-byte budget")]
    RecordTooLarge {
        /// Serialized payload length in bytes.
        len: usize,
        /// Maximum payload bytes a record slot can hold.
        max: usize,
    },
    /// A block position referenced a rank or offset outside known bounds.
    #[error("position out of range: {0}")]
    OutOfRange(String),
    /// On-disk state failed validation (bad checksum, truncated record,
    /// undecodable payload, dangling merge reference).
    #[error("corruption detected: {0}")]
    Corruption(String),
    /// The caller supplied an argument the store rejects.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// The store directory is held by another process.
    #[error("store at {0} is locked by another process")]
    Locked(String),
}
