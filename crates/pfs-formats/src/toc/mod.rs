//! Table of contents for a packed file system volume
//!
//! A TOC is a small header followed by B-trees that reference each other by
//! ordinal:
//!
//! - **Name pool**: sorted [`StringKey`] tree of every file and directory
//!   name, without extensions.
//! - **Extension pool**: sorted [`StringKey`] tree of extensions. The empty
//!   extension is always ordinal 0 and is what directories carry.
//! - **File info tree**: one [`FileInfoKey`] per file, ordered by file index.
//! - **Entry trees**: one [`FileEntryKey`] tree per directory, ordered by
//!   (name, extension). Tree 0 is the root. Directory entries link to a child
//!   entry tree, file entries link to a file index.
//!
//! The TOC operates on decrypted, decompressed bytes and borrows them: tree
//! accessors return engines over the same buffer.

mod builder;
mod error;
mod header;
mod utils;

pub use builder::TocBuilder;
pub use error::{TocError, TocResult};
pub use header::{TOC_HEADER_BASE_SIZE, TOC_MAGIC, TocHeader};

use std::io::Cursor;

use binrw::BinRead;
use tracing::{debug, trace};

use crate::btree::{
    BTree, BTreeKey, FileEntryKey, FileInfoKey, KeyContext, StringKey, TREE_HEADER_SIZE,
};
use crate::toc::utils::{join_component, path_components, split_component};

/// Directory nesting limit for traversal
///
/// Entry trees link to each other by index, so a corrupt TOC can form a
/// cycle. Traversal stops with [`TocError::DirectoryTooDeep`] past this depth.
pub const MAX_DIRECTORY_DEPTH: usize = 64;

/// A file reached by [`Toc::walk`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocFile {
    /// Slash-separated path from the root
    pub path: String,
    /// Size and segment record
    pub info: FileInfoKey,
}

/// A parsed table of contents over a borrowed buffer
#[derive(Debug, Clone)]
pub struct Toc<'a> {
    data: &'a [u8],
    header: TocHeader,
    context: KeyContext,
}

/// Fully decoded pools used during a walk
struct Pools {
    names: Vec<StringKey>,
    extensions: Vec<StringKey>,
    infos: Vec<FileInfoKey>,
}

impl Pools {
    fn name(&self, ordinal: u32) -> TocResult<&str> {
        pool_string(&self.names, "name", ordinal)
    }

    fn extension(&self, ordinal: u32) -> TocResult<&str> {
        pool_string(&self.extensions, "extension", ordinal)
    }

    fn info(&self, file_index: u32) -> TocResult<&FileInfoKey> {
        self.infos
            .binary_search_by_key(&file_index, |info| info.file_index)
            .map(|position| &self.infos[position])
            .map_err(|_| TocError::OrdinalOutOfRange {
                pool: "file info",
                ordinal: file_index,
            })
    }
}

fn pool_string<'p>(pool: &'p [StringKey], label: &'static str, ordinal: u32) -> TocResult<&'p str> {
    let key = pool
        .get(ordinal as usize)
        .ok_or(TocError::OrdinalOutOfRange {
            pool: label,
            ordinal,
        })?;
    Ok(std::str::from_utf8(key.as_bytes())?)
}

impl<'a> Toc<'a> {
    /// Parse a TOC from plaintext bytes
    ///
    /// Validates the header and every tree offset, then derives the
    /// [`KeyContext`] from the pool and file info key counts.
    pub fn parse(data: &'a [u8]) -> TocResult<Self> {
        let mut cursor = Cursor::new(data);
        let header = TocHeader::read(&mut cursor)?;
        header.validate()?;

        for offset in header.tree_offsets() {
            let start = offset as usize;
            if start < header.size() || start + TREE_HEADER_SIZE > data.len() {
                return Err(TocError::InvalidTreeOffset(offset));
            }
        }

        let mut toc = Self {
            data,
            header,
            context: KeyContext::new(),
        };
        let name_count = count_u32(toc.name_tree().key_count()?, "name")?;
        let extension_count = count_u32(toc.extension_tree().key_count()?, "extension")?;
        let file_count = count_u32(toc.file_info_tree().key_count()?, "file info")?;
        toc.context = KeyContext::new()
            .with_name_count(name_count)
            .with_extension_count(extension_count)
            .with_file_count(file_count);

        debug!(
            names = name_count,
            extensions = extension_count,
            files = file_count,
            directories = toc.header.entry_tree_count,
            "parsed TOC"
        );
        Ok(toc)
    }

    /// Parsed header
    pub fn header(&self) -> &TocHeader {
        &self.header
    }

    /// Underlying buffer
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Pool sizes used to validate file entries
    pub fn context(&self) -> KeyContext {
        self.context
    }

    /// Name pool tree
    pub fn name_tree(&self) -> BTree<'a, StringKey> {
        BTree::new(self.data, self.header.name_tree_offset as usize, self.context)
    }

    /// Extension pool tree
    pub fn extension_tree(&self) -> BTree<'a, StringKey> {
        BTree::new(
            self.data,
            self.header.extension_tree_offset as usize,
            self.context,
        )
    }

    /// File info tree
    pub fn file_info_tree(&self) -> BTree<'a, FileInfoKey> {
        BTree::new(
            self.data,
            self.header.file_info_tree_offset as usize,
            self.context,
        )
    }

    /// Number of directory entry trees
    pub fn entry_tree_count(&self) -> u32 {
        self.header.entry_tree_count
    }

    /// Entry tree of directory `index`; 0 is the root
    pub fn entry_tree(&self, index: u32) -> TocResult<BTree<'a, FileEntryKey>> {
        let offset = self
            .header
            .entry_tree_offsets
            .get(index as usize)
            .ok_or(TocError::InvalidEntryTree(index))?;
        Ok(BTree::new(self.data, *offset as usize, self.context))
    }

    /// Name pool string at `ordinal`
    pub fn name(&self, ordinal: u32) -> TocResult<StringKey> {
        self.name_tree()
            .find_by_ordinal(ordinal as usize)?
            .ok_or(TocError::OrdinalOutOfRange {
                pool: "name",
                ordinal,
            })
    }

    /// Extension pool string at `ordinal`
    pub fn extension(&self, ordinal: u32) -> TocResult<StringKey> {
        self.extension_tree()
            .find_by_ordinal(ordinal as usize)?
            .ok_or(TocError::OrdinalOutOfRange {
                pool: "extension",
                ordinal,
            })
    }

    /// Every file reachable from the root, depth first in entry order
    pub fn walk(&self) -> TocResult<Vec<TocFile>> {
        let mut files = Vec::new();
        if self.header.entry_tree_count == 0 {
            return Ok(files);
        }

        let pools = Pools {
            names: load_keys(self.name_tree())?,
            extensions: load_keys(self.extension_tree())?,
            infos: load_keys(self.file_info_tree())?,
        };
        self.walk_directory(&pools, 0, "", 0, &mut files)?;
        Ok(files)
    }

    fn walk_directory(
        &self,
        pools: &Pools,
        tree_index: u32,
        prefix: &str,
        depth: usize,
        files: &mut Vec<TocFile>,
    ) -> TocResult<()> {
        if depth > MAX_DIRECTORY_DEPTH {
            return Err(TocError::DirectoryTooDeep {
                path: prefix.to_string(),
                limit: MAX_DIRECTORY_DEPTH,
            });
        }

        let entries = load_keys(self.entry_tree(tree_index)?)?;
        trace!(tree = tree_index, entries = entries.len(), prefix, "walking directory");

        for entry in entries {
            let name = pools.name(entry.name_index)?;
            if entry.is_directory() {
                let path = format!("{prefix}{name}/");
                self.walk_directory(pools, entry.link_index, &path, depth + 1, files)?;
            } else {
                let extension = pools.extension(entry.extension_index)?;
                files.push(TocFile {
                    path: format!("{prefix}{}", join_component(name, extension)),
                    info: pools.info(entry.link_index)?.clone(),
                });
            }
        }
        Ok(())
    }

    /// Resolve a slash-separated path to its file info
    ///
    /// Returns `Ok(None)` when any component is missing, or when the path
    /// names a directory.
    pub fn find_file(&self, path: &str) -> TocResult<Option<FileInfoKey>> {
        let components = path_components(path);
        let Some((file_name, directories)) = components.split_last() else {
            return Err(TocError::invalid_path(path, "empty path"));
        };
        if directories.len() > MAX_DIRECTORY_DEPTH {
            return Err(TocError::DirectoryTooDeep {
                path: path.to_string(),
                limit: MAX_DIRECTORY_DEPTH,
            });
        }

        let names = self.name_tree();
        let mut tree_index = 0;
        for directory in directories {
            let Some(name) = names.search_index_by_key(&StringKey::from(*directory))? else {
                return Ok(None);
            };
            let query = FileEntryKey::directory(count_u32(name.ordinal, "name")?, 0);
            match self.find_entry(tree_index, &query)? {
                Some(entry) if entry.is_directory() => tree_index = entry.link_index,
                _ => return Ok(None),
            }
        }

        let (stem, extension) = split_component(file_name);
        let Some(name) = names.search_index_by_key(&StringKey::from(stem))? else {
            return Ok(None);
        };
        let Some(extension) = self
            .extension_tree()
            .search_index_by_key(&StringKey::from(extension))?
        else {
            return Ok(None);
        };
        let query = FileEntryKey::file(
            count_u32(name.ordinal, "name")?,
            count_u32(extension.ordinal, "extension")?,
            0,
        );
        let entry = match self.find_entry(tree_index, &query)? {
            Some(entry) if !entry.is_directory() => entry,
            _ => return Ok(None),
        };

        let info = self
            .file_info_tree()
            .search_index_by_key(&FileInfoKey::with_index(entry.link_index))?
            .ok_or(TocError::OrdinalOutOfRange {
                pool: "file info",
                ordinal: entry.link_index,
            })?;
        Ok(Some(info.key))
    }

    /// Find an entry by (name, extension) in one directory
    ///
    /// Entry trees bound index entries by name only, so a name shared by a
    /// file and several extensions can straddle a page boundary. The tree is
    /// loaded and searched in tree order instead.
    fn find_entry(&self, tree_index: u32, query: &FileEntryKey) -> TocResult<Option<FileEntryKey>> {
        let entries = load_keys(self.entry_tree(tree_index)?)?;
        Ok(entries
            .binary_search_by(|entry| entry.key_cmp(query))
            .ok()
            .map(|position| entries[position]))
    }
}

fn load_keys<K: BTreeKey>(mut tree: BTree<'_, K>) -> TocResult<Vec<K>> {
    tree.load()?;
    Ok(tree.into_keys())
}

fn count_u32(value: usize, pool: &'static str) -> TocResult<u32> {
    u32::try_from(value).map_err(|_| TocError::OrdinalOutOfRange {
        pool,
        ordinal: u32::MAX,
    })
}
