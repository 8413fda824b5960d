//! TOC builder for creating tables of contents

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::io::Cursor;

use binrw::BinWrite;
use tracing::debug;

use crate::btree::{BTree, BTreeKey, FileEntryKey, FileInfoKey, KeyContext, StringKey};
use crate::toc::MAX_DIRECTORY_DEPTH;
use crate::toc::error::{TocError, TocResult};
use crate::toc::header::TocHeader;
use crate::toc::utils::{path_components, split_component};

/// In-memory directory used while laying out entry trees
#[derive(Debug, Default)]
struct Directory {
    directories: BTreeMap<String, Directory>,
    files: BTreeMap<String, FileInfoKey>,
}

impl Directory {
    fn insert(&mut self, path: &str, info: &FileInfoKey) -> TocResult<()> {
        let components = path_components(path);
        let Some((file_name, parents)) = components.split_last() else {
            return Err(TocError::invalid_path(path, "empty path"));
        };
        if parents.len() > MAX_DIRECTORY_DEPTH {
            return Err(TocError::DirectoryTooDeep {
                path: path.to_string(),
                limit: MAX_DIRECTORY_DEPTH,
            });
        }

        let mut current = self;
        for parent in parents {
            if current.files.contains_key(*parent) {
                return Err(TocError::invalid_path(path, "directory shadows a file"));
            }
            current = current.directories.entry((*parent).to_string()).or_default();
        }

        if current.directories.contains_key(*file_name) {
            return Err(TocError::invalid_path(path, "file shadows a directory"));
        }
        if current
            .files
            .insert((*file_name).to_string(), info.clone())
            .is_some()
        {
            return Err(TocError::invalid_path(path, "duplicate file"));
        }
        Ok(())
    }

    fn collect_strings(&self, names: &mut BTreeSet<String>, extensions: &mut BTreeSet<String>) {
        for (name, child) in &self.directories {
            names.insert(name.clone());
            child.collect_strings(names, extensions);
        }
        for file_name in self.files.keys() {
            let (stem, extension) = split_component(file_name);
            names.insert(stem.to_string());
            extensions.insert(extension.to_string());
        }
    }
}

/// Sorted string pool with ordinal lookup
struct Pool {
    ordinals: BTreeMap<String, u32>,
    missing: &'static str,
}

impl Pool {
    fn new(strings: BTreeSet<String>, missing: &'static str) -> Self {
        Self {
            ordinals: strings.into_iter().zip(0..).collect(),
            missing,
        }
    }

    fn ordinal(&self, value: &str) -> TocResult<u32> {
        self.ordinals
            .get(value)
            .copied()
            .ok_or_else(|| TocError::invalid_path(value, self.missing))
    }

    fn len(&self) -> u32 {
        self.ordinals.len() as u32
    }

    fn keys(&self) -> Vec<StringKey> {
        self.ordinals.keys().map(|s| StringKey::from(s.as_str())).collect()
    }
}

/// Builder for creating TOC files
///
/// Paths are slash-separated. The builder assigns file indices itself,
/// densely from zero in breadth-first directory order, so the `file_index`
/// of the records passed to [`add_file`](Self::add_file) is ignored.
#[derive(Debug, Default)]
pub struct TocBuilder {
    files: Vec<(String, FileInfoKey)>,
}

impl TocBuilder {
    /// Create a new TOC builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file to the TOC
    pub fn add_file(&mut self, path: impl Into<String>, info: FileInfoKey) {
        self.files.push((path.into(), info));
    }

    /// Number of files added so far
    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Build the TOC
    pub fn build(&self) -> TocResult<Vec<u8>> {
        let mut root = Directory::default();
        for (path, info) in &self.files {
            root.insert(path, info)?;
        }

        let mut names = BTreeSet::new();
        // Directories carry extension 0, which must be the empty string.
        let mut extensions = BTreeSet::from([String::new()]);
        root.collect_strings(&mut names, &mut extensions);
        let names = Pool::new(names, "component missing from the name pool");
        let extensions = Pool::new(extensions, "extension missing from the extension pool");

        let (entry_trees, infos) = Self::lay_out(&root, &names, &extensions, self.file_count())?;

        let file_count = infos.len() as u32;
        let context = KeyContext::new()
            .with_name_count(names.len())
            .with_extension_count(extensions.len())
            .with_file_count(file_count);

        let mut trees = vec![
            BTree::with_keys(names.keys(), context).serialize()?,
            BTree::with_keys(extensions.keys(), context).serialize()?,
            BTree::with_keys(infos, context).serialize()?,
        ];
        for entries in entry_trees {
            trees.push(BTree::with_keys(entries, context).serialize()?);
        }

        let entry_tree_count = trees.len() - 3;
        let mut offsets = Vec::with_capacity(trees.len());
        let mut offset = TocHeader::size_for(entry_tree_count);
        for tree in &trees {
            offsets.push(u32::try_from(offset).map_err(|_| TocError::InvalidTreeOffset(u32::MAX))?);
            offset += tree.len();
        }

        let header = TocHeader::new(offsets[0], offsets[1], offsets[2], offsets[3..].to_vec());
        let mut cursor = Cursor::new(Vec::with_capacity(offset));
        header.write(&mut cursor)?;
        let mut data = cursor.into_inner();
        for tree in &trees {
            data.extend_from_slice(tree);
        }

        debug!(
            files = file_count,
            names = names.len(),
            extensions = extensions.len(),
            directories = entry_tree_count,
            bytes = data.len(),
            "built TOC"
        );
        Ok(data)
    }

    /// Number directories breadth first and files in entry order
    ///
    /// Returns one sorted entry list per directory and the file info records
    /// in file index order.
    fn lay_out(
        root: &Directory,
        names: &Pool,
        extensions: &Pool,
        file_count: usize,
    ) -> TocResult<(Vec<Vec<FileEntryKey>>, Vec<FileInfoKey>)> {
        let mut entry_trees = Vec::new();
        let mut infos = Vec::with_capacity(file_count);
        let mut queue = VecDeque::from([root]);
        let mut next_tree = 1u32;

        while let Some(directory) = queue.pop_front() {
            let mut entries: Vec<(FileEntryKey, Option<&FileInfoKey>)> = Vec::new();
            for (name, child) in &directory.directories {
                entries.push((FileEntryKey::directory(names.ordinal(name)?, next_tree), None));
                next_tree += 1;
                queue.push_back(child);
            }
            for (file_name, info) in &directory.files {
                let (stem, extension) = split_component(file_name);
                let key = FileEntryKey::file(names.ordinal(stem)?, extensions.ordinal(extension)?, 0);
                entries.push((key, Some(info)));
            }
            entries.sort_by(|a, b| a.0.key_cmp(&b.0));

            let mut keys = Vec::with_capacity(entries.len());
            for (mut key, info) in entries {
                if let Some(info) = info {
                    let file_index = infos.len() as u32;
                    key.link_index = file_index;
                    infos.push(FileInfoKey {
                        file_index,
                        ..info.clone()
                    });
                }
                keys.push(key);
            }
            entry_trees.push(keys);
        }
        Ok((entry_trees, infos))
    }
}
