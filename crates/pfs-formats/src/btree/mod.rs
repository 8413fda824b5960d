//! Paged B-tree engine shared by every TOC tree
//!
//! A tree is a 6-byte header, a chain of leaf pages and, when there is more
//! than one page, a chain of index blocks. Every page and index block is at
//! most 4096 bytes and starts with a bit-packed table of 12-bit key offsets,
//! so a lookup touches one index block and one leaf page without decoding
//! the keys it skips.
//!
//! # Layout
//!
//! ```text
//! +--------------------+  offset 0
//! | tree header        |  index page count, first offset, page count
//! +--------------------+  offset 6
//! | leaf page 0        |
//! | leaf page 1        |  packed back to back
//! | ...                |
//! +--------------------+  first offset (multi-page trees)
//! | index block 0      |  one entry per leaf page, same page layout
//! | ...                |
//! +--------------------+
//! | zero padding       |  to a 4-byte boundary
//! +--------------------+
//! ```
//!
//! Keys are generic over [`BTreeKey`]; the engine is [`BTree`].

mod bitstream;
mod error;
mod header;
mod index_writer;
mod key;
mod keys;
mod search;
mod tree;
mod utils;

pub use bitstream::{BitReader, BitWriter};
pub use error::{BTreeError, BTreeResult};
pub use header::{PageHeader, TreeHeader};
pub use index_writer::{IndexBlocks, IndexWriter};
pub use key::{BTreeKey, KeyContext};
pub use keys::{EntryFlags, FileEntryKey, FileInfoFlags, FileInfoKey, StringKey};
pub use search::{SearchPolicy, SearchResult, search_with_comparison};
pub use tree::{BTree, IndexHit};
pub use utils::{page_header_size, prefixed_string_size, varint_size};

/// Maximum size of a leaf page or index block in bytes
pub const PAGE_SIZE: usize = 4096;

/// Size of the tree header in bytes
pub const TREE_HEADER_SIZE: usize = 6;

/// Largest key count the 11-bit page field holds
pub const MAX_KEYS_PER_PAGE: usize = 0x7FF;

/// Encoded trees are padded to a multiple of this many bytes
pub const TREE_ALIGNMENT: usize = 4;
