//! Key contract shared by every B-tree variant

use std::cmp::Ordering;
use std::fmt;

use crate::btree::bitstream::{BitReader, BitWriter};
use crate::btree::error::BTreeResult;

/// Cross-tree counts threaded into key decoding and index finalization
///
/// A TOC stores several trees that reference each other by ordinal (file
/// entries point into the name and extension pools and at file infos). The
/// counts are supplied by whoever owns the sibling trees; `None` means the
/// count is unknown and is not checked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyContext {
    /// Number of strings in the name pool
    pub name_count: Option<u32>,
    /// Number of strings in the extension pool
    pub extension_count: Option<u32>,
    /// Number of file info records
    pub file_count: Option<u32>,
}

impl KeyContext {
    /// Context with nothing known about sibling trees
    pub const fn new() -> Self {
        Self {
            name_count: None,
            extension_count: None,
            file_count: None,
        }
    }

    /// Set the name pool size
    pub const fn with_name_count(mut self, count: u32) -> Self {
        self.name_count = Some(count);
        self
    }

    /// Set the extension pool size
    pub const fn with_extension_count(mut self, count: u32) -> Self {
        self.extension_count = Some(count);
        self
    }

    /// Set the file info count
    pub const fn with_file_count(mut self, count: u32) -> Self {
        self.file_count = Some(count);
        self
    }
}

/// A record stored in a TOC B-tree
///
/// Leaf pages hold the full [`serialize`](Self::serialize) form. Index
/// blocks hold `varint(index_ordinal) + serialize_index + varint(page)`.
/// Searches compare a query key directly against encoded payloads through
/// [`compare_payload`](Self::compare_payload) and
/// [`compare_index`](Self::compare_index), so no key object is built for
/// slots that are only compared.
pub trait BTreeKey: Clone + fmt::Debug + Sized {
    /// Decode a full key from a leaf payload
    fn deserialize(reader: &mut BitReader<'_>, ctx: &KeyContext) -> BTreeResult<Self>;

    /// Encode the full key
    fn serialize(&self, writer: &mut BitWriter) -> BTreeResult<()>;

    /// Encode the separator form stored in index entries
    fn serialize_index(&self, _writer: &mut BitWriter) -> BTreeResult<()> {
        Ok(())
    }

    /// Exact byte length of [`serialize`](Self::serialize)
    fn serialized_key_size(&self) -> usize;

    /// Exact byte length of [`serialize_index`](Self::serialize_index)
    fn serialized_index_size(&self) -> usize {
        0
    }

    /// Maximal key used as the upper bound of the last index entry
    fn last_index() -> Self;

    /// Shortest separator `s` with `self < s <= next`
    fn compare_get_diff(&self, next: &Self) -> BTreeResult<Self>;

    /// Tree order
    fn key_cmp(&self, other: &Self) -> Ordering;

    /// Identity written as the ordinal of an index entry whose page starts
    /// with this key
    fn index_ordinal(&self, collection_ordinal: u32) -> u32;

    /// Ordinal of the final index entry, bounding the whole key space
    fn sentinel_ordinal(keys: &[Self], ctx: &KeyContext) -> u32;

    /// Compare `self` against the leaf payload under the reader
    fn compare_payload(&self, reader: &mut BitReader<'_>) -> BTreeResult<Ordering>;

    /// Compare `self` against an index entry whose ordinal has already been
    /// read, consuming the entry's separator
    fn compare_index(&self, ordinal: u32, reader: &mut BitReader<'_>) -> BTreeResult<Ordering>;

    /// Step over an index entry's separator
    fn skip_index(_reader: &mut BitReader<'_>) -> BTreeResult<()> {
        Ok(())
    }

    /// Whether index bounds identify keys closely enough for a two-level
    /// search to reconstruct ordinals
    fn supports_index_search() -> bool {
        true
    }
}
