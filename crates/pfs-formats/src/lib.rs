//! B-tree index and table-of-contents codecs for packed file system volumes
//!
#![allow(clippy::cast_possible_truncation)] // Intentional for binary format parsing
#![allow(clippy::cast_lossless)] // Sometimes clearer than From
#![allow(clippy::uninlined_format_args)] // Backwards compatibility
#![allow(clippy::doc_markdown)] // Many format terms don't need backticks
#![allow(clippy::module_name_repetitions)] // Clear naming is preferred
#![allow(clippy::similar_names)] // Domain-specific naming patterns
#![allow(clippy::redundant_closure_for_method_calls)] // Iterator chains
#![allow(clippy::return_self_not_must_use)] // Builder patterns
#![allow(clippy::use_self)] // Type clarity
//! A packed file system volume keeps its table of contents as a set of
//! paged B-trees: string pools for names and extensions, a tree of file size
//! records and one tree per directory. This crate provides both directions
//! for every piece:
//!
//! - **B-tree engine** ([`btree`]): bit-level page codec, two-level search
//!   through index blocks, ordinal lookup, and full rebuild from a key
//!   collection with greedy 4096-byte page packing.
//! - **Key codecs** ([`btree::StringKey`], [`btree::FileInfoKey`],
//!   [`btree::FileEntryKey`]): per-variant payload, separator and index
//!   encodings.
//! - **TOC container** ([`toc`]): header parsing, tree accessors, path
//!   resolution, traversal and a builder.
//!
//! # Design Principles
//!
//! - **Borrowed Buffers**: trees decode from `&[u8]` at a base offset and
//!   never copy the input
//! - **Symmetric Operations**: anything that parses can be rebuilt
//! - **Static Dispatch**: the engine is generic over [`btree::BTreeKey`]
//!
//! # Example
//!
//! ```
//! use pfs_formats::btree::{BTree, KeyContext, StringKey};
//!
//! let keys = vec![StringKey::from("alpha"), StringKey::from("beta")];
//! let data = BTree::with_keys(keys, KeyContext::new()).serialize()?;
//!
//! let tree = BTree::<StringKey>::new(&data, 0, KeyContext::new());
//! let hit = tree.search_index_by_key(&StringKey::from("beta"))?;
//! assert_eq!(hit.map(|h| h.ordinal), Some(1));
//! # Ok::<(), pfs_formats::btree::BTreeError>(())
//! ```

#![warn(missing_docs)]

/// Paged B-tree engine and key codecs
///
/// Every tree in a TOC shares one on-disk layout: a 6-byte header, a chain
/// of leaf pages and an optional chain of index blocks, each page at most
/// 4096 bytes with a bit-packed offset table.
pub mod btree;

/// Table of contents built from B-trees
///
/// Parses and builds the container that ties the name pool, extension pool,
/// file info tree and per-directory entry trees together.
pub mod toc;
