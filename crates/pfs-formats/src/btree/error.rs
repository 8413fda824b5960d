//! Error types for B-tree operations

use thiserror::Error;

/// Errors that can occur when reading or writing a TOC B-tree
#[derive(Debug, Error)]
pub enum BTreeError {
    /// A read ran past the end of the buffer
    #[error("unexpected end of data at bit {bit_position}")]
    UnexpectedEof {
        /// Absolute bit position of the failed read
        bit_position: usize,
    },

    /// Variable-length integer with an invalid length prefix
    #[error("invalid variable-length integer at offset {offset}")]
    InvalidVarInt {
        /// Byte offset of the first varint byte
        offset: usize,
    },

    /// Structural violation found while decoding pages or index blocks
    #[error("corrupt index at offset {offset}: {reason}")]
    CorruptIndex {
        /// Byte offset of the offending page or key
        offset: usize,
        /// What was wrong
        reason: String,
    },

    /// A single key cannot fit in an otherwise empty page
    #[error("key {ordinal} is too large for a page ({size} bytes)")]
    KeyTooLarge {
        /// Position of the key in the collection
        ordinal: usize,
        /// Encoded size of the key
        size: usize,
    },

    /// A header field cannot represent the serialized layout
    #[error("{field} overflow: {value} exceeds {limit}")]
    PageOverflow {
        /// Which field overflowed
        field: &'static str,
        /// Value that did not fit
        value: usize,
        /// Largest representable value
        limit: usize,
    },

    /// A key wrote a different number of bytes than it reported
    #[error("key size mismatch: reported {expected} bytes, wrote {actual}")]
    SizeMismatch {
        /// Size reported by the key
        expected: usize,
        /// Bytes actually written
        actual: usize,
    },

    /// Operation not supported for this key variant
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),

    /// Caller violated an operation's contract
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl BTreeError {
    pub(crate) fn corrupt(offset: usize, reason: impl Into<String>) -> Self {
        Self::CorruptIndex {
            offset,
            reason: reason.into(),
        }
    }
}

/// Result type for B-tree operations
pub type BTreeResult<T> = Result<T, BTreeError>;
