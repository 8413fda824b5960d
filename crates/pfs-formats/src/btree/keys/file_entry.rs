//! Directory entries: one record per file or subdirectory

use std::cmp::Ordering;

use crate::btree::bitstream::{BitReader, BitWriter};
use crate::btree::error::{BTreeError, BTreeResult};
use crate::btree::key::{BTreeKey, KeyContext};
use crate::btree::utils::varint_size;

/// Entry kind flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct EntryFlags(pub u8);

impl EntryFlags {
    /// Entry is a file
    pub const FILE: u8 = 0x00;

    /// Entry is a directory; the link is a child entry tree
    pub const DIRECTORY: u8 = 0x01;

    /// Check if flag is set
    pub const fn has(&self, flag: u8) -> bool {
        (self.0 & flag) != 0
    }
}

/// A named entry inside one directory's tree
///
/// Layout: flags byte, varint name index, varint extension index (files
/// only), varint link index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FileEntryKey {
    /// Entry kind
    pub flags: EntryFlags,
    /// Index into the name pool
    pub name_index: u32,
    /// Index into the extension pool (0 for directories)
    pub extension_index: u32,
    /// Child entry tree for directories, file index for files
    pub link_index: u32,
}

impl FileEntryKey {
    /// Create a file entry
    pub const fn file(name_index: u32, extension_index: u32, file_index: u32) -> Self {
        Self {
            flags: EntryFlags(EntryFlags::FILE),
            name_index,
            extension_index,
            link_index: file_index,
        }
    }

    /// Create a directory entry pointing at a child entry tree
    pub const fn directory(name_index: u32, tree_index: u32) -> Self {
        Self {
            flags: EntryFlags(EntryFlags::DIRECTORY),
            name_index,
            extension_index: 0,
            link_index: tree_index,
        }
    }

    /// Whether this entry is a directory
    pub const fn is_directory(&self) -> bool {
        self.flags.has(EntryFlags::DIRECTORY)
    }
}

fn check_range(
    value: u32,
    limit: Option<u32>,
    what: &str,
    offset: usize,
) -> BTreeResult<()> {
    match limit {
        Some(limit) if value >= limit => Err(BTreeError::corrupt(
            offset,
            format!("{what} {value} outside pool of {limit}"),
        )),
        _ => Ok(()),
    }
}

impl BTreeKey for FileEntryKey {
    fn deserialize(reader: &mut BitReader<'_>, ctx: &KeyContext) -> BTreeResult<Self> {
        let offset = reader.byte_position();
        let flags = EntryFlags(reader.read_byte()?);
        let name_index = reader.read_varint()?;
        check_range(name_index, ctx.name_count, "name index", offset)?;

        let extension_index = if flags.has(EntryFlags::DIRECTORY) {
            0
        } else {
            let index = reader.read_varint()?;
            check_range(index, ctx.extension_count, "extension index", offset)?;
            index
        };

        let link_index = reader.read_varint()?;
        if !flags.has(EntryFlags::DIRECTORY) {
            check_range(link_index, ctx.file_count, "file index", offset)?;
        }

        Ok(Self {
            flags,
            name_index,
            extension_index,
            link_index,
        })
    }

    fn serialize(&self, writer: &mut BitWriter) -> BTreeResult<()> {
        writer.write_byte(self.flags.0)?;
        writer.write_varint(self.name_index)?;
        if !self.is_directory() {
            writer.write_varint(self.extension_index)?;
        }
        writer.write_varint(self.link_index)
    }

    fn serialized_key_size(&self) -> usize {
        let mut size = 1 + varint_size(self.name_index) + varint_size(self.link_index);
        if !self.is_directory() {
            size += varint_size(self.extension_index);
        }
        size
    }

    fn last_index() -> Self {
        Self::directory(u32::MAX, 0)
    }

    fn compare_get_diff(&self, next: &Self) -> BTreeResult<Self> {
        Ok(*next)
    }

    fn key_cmp(&self, other: &Self) -> Ordering {
        self.name_index
            .cmp(&other.name_index)
            .then(self.extension_index.cmp(&other.extension_index))
    }

    fn index_ordinal(&self, _collection_ordinal: u32) -> u32 {
        self.name_index
    }

    fn sentinel_ordinal(keys: &[Self], ctx: &KeyContext) -> u32 {
        let past_last = keys
            .last()
            .map_or(0, |key| key.name_index.saturating_add(1));
        ctx.name_count.map_or(past_last, |count| count.max(past_last))
    }

    fn compare_payload(&self, reader: &mut BitReader<'_>) -> BTreeResult<Ordering> {
        let flags = EntryFlags(reader.read_byte()?);
        let name_index = reader.read_varint()?;
        let ord = self.name_index.cmp(&name_index);
        if ord != Ordering::Equal {
            return Ok(ord);
        }
        let extension_index = if flags.has(EntryFlags::DIRECTORY) {
            0
        } else {
            reader.read_varint()?
        };
        Ok(self.extension_index.cmp(&extension_index))
    }

    fn compare_index(&self, ordinal: u32, _reader: &mut BitReader<'_>) -> BTreeResult<Ordering> {
        Ok(self.name_index.cmp(&ordinal))
    }

    // Pages are bounded by name index alone, so a name repeated across a
    // page boundary has no unique bracketing entry.
    fn supports_index_search() -> bool {
        false
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    fn encode(key: &FileEntryKey) -> Vec<u8> {
        let mut writer = BitWriter::new();
        key.serialize(&mut writer).unwrap();
        writer.into_inner()
    }

    #[test]
    fn test_file_layout() {
        let key = FileEntryKey::file(3, 1, 200);
        let data = encode(&key);
        assert_eq!(data, vec![0x00, 0x03, 0x01, 0x80, 0xC8]);
        assert_eq!(data.len(), key.serialized_key_size());

        let mut reader = BitReader::new(&data);
        let parsed = FileEntryKey::deserialize(&mut reader, &KeyContext::new()).unwrap();
        assert_eq!(parsed, key);
    }

    #[test]
    fn test_directory_omits_extension() {
        let key = FileEntryKey::directory(7, 2);
        let data = encode(&key);
        assert_eq!(data, vec![0x01, 0x07, 0x02]);

        let mut reader = BitReader::new(&data);
        let parsed = FileEntryKey::deserialize(&mut reader, &KeyContext::new()).unwrap();
        assert!(parsed.is_directory());
        assert_eq!(parsed, key);
    }

    #[test]
    fn test_context_rejects_out_of_range_name() {
        let data = encode(&FileEntryKey::file(10, 0, 0));
        let ctx = KeyContext::new().with_name_count(10);
        let mut reader = BitReader::new(&data);
        assert!(matches!(
            FileEntryKey::deserialize(&mut reader, &ctx),
            Err(BTreeError::CorruptIndex { offset: 0, .. })
        ));
    }

    #[test]
    fn test_context_rejects_out_of_range_file() {
        let data = encode(&FileEntryKey::file(0, 0, 4));
        let ctx = KeyContext::new().with_file_count(4);
        let mut reader = BitReader::new(&data);
        assert!(FileEntryKey::deserialize(&mut reader, &ctx).is_err());
    }

    #[test]
    fn test_compare_payload_breaks_name_ties_on_extension() {
        let data = encode(&FileEntryKey::file(5, 2, 0));
        let cmp_with = |key: FileEntryKey| {
            let mut reader = BitReader::new(&data);
            key.compare_payload(&mut reader).unwrap()
        };
        assert_eq!(cmp_with(FileEntryKey::file(4, 9, 0)), Ordering::Less);
        assert_eq!(cmp_with(FileEntryKey::file(5, 1, 0)), Ordering::Less);
        assert_eq!(cmp_with(FileEntryKey::file(5, 2, 99)), Ordering::Equal);
        assert_eq!(cmp_with(FileEntryKey::file(5, 3, 0)), Ordering::Greater);
    }

    #[test]
    fn test_sentinel_uses_name_pool_size() {
        let keys = vec![FileEntryKey::file(1, 0, 0), FileEntryKey::file(4, 0, 1)];
        assert_eq!(FileEntryKey::sentinel_ordinal(&keys, &KeyContext::new()), 5);
        let ctx = KeyContext::new().with_name_count(40);
        assert_eq!(FileEntryKey::sentinel_ordinal(&keys, &ctx), 40);
    }
}
