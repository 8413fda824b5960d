//! TOC error types

use thiserror::Error;

use crate::btree::BTreeError;

/// TOC-specific error type
#[derive(Debug, Error)]
pub enum TocError {
    /// Invalid TOC magic
    #[error("invalid TOC magic: expected 0x5B745162, got 0x{0:08X}")]
    InvalidMagic(u32),

    /// Entry tree count disagrees with the offset table
    #[error("entry tree count {count} does not match {offsets} offsets")]
    EntryCountMismatch {
        /// Count stored in the header
        count: u32,
        /// Offsets actually present
        offsets: usize,
    },

    /// Tree offset outside the buffer
    #[error("invalid tree offset: {0} is beyond data bounds")]
    InvalidTreeOffset(u32),

    /// Entry tree index outside the header table
    #[error("invalid entry tree index: {0}")]
    InvalidEntryTree(u32),

    /// Directory nesting exceeds the traversal limit
    #[error("directory nesting deeper than {limit} at {path}")]
    DirectoryTooDeep {
        /// Path reached when the limit was hit
        path: String,
        /// Depth limit
        limit: usize,
    },

    /// Path rejected by lookup or building
    #[error("invalid path {path:?}: {reason}")]
    InvalidPath {
        /// Offending path
        path: String,
        /// Why it was rejected
        reason: &'static str,
    },

    /// A file entry points at a string or file info that does not exist
    #[error("{pool} ordinal {ordinal} out of range")]
    OrdinalOutOfRange {
        /// Tree the ordinal refers to
        pool: &'static str,
        /// Missing ordinal
        ordinal: u32,
    },

    /// B-tree error
    #[error("B-tree error: {0}")]
    BTree(#[from] BTreeError),

    /// Binary parsing error
    #[error("binary parsing error: {0}")]
    BinRw(#[from] binrw::Error),

    /// UTF-8 conversion error
    #[error("UTF-8 conversion error: {0}")]
    Utf8(#[from] std::str::Utf8Error),
}

impl TocError {
    pub(crate) fn invalid_path(path: impl Into<String>, reason: &'static str) -> Self {
        Self::InvalidPath {
            path: path.into(),
            reason,
        }
    }
}

/// Result type for TOC operations
pub type TocResult<T> = Result<T, TocError>;
