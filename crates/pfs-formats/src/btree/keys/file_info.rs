//! File info records: sizes and storage location of each packed file

use std::cmp::Ordering;
use std::fmt;

use crate::btree::bitstream::{BitReader, BitWriter};
use crate::btree::error::BTreeResult;
use crate::btree::key::{BTreeKey, KeyContext};
use crate::btree::utils::varint_size;

/// Storage flags of a packed file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FileInfoFlags(pub u8);

impl FileInfoFlags {
    /// Stored as-is
    pub const NONE: u8 = 0x00;

    /// Stored deflate-compressed; the uncompressed size is recorded
    pub const COMPRESSED: u8 = 0x01;

    /// Stored encrypted with the volume's per-file cipher
    pub const ENCRYPTED: u8 = 0x02;

    /// Create flags from a raw value
    pub const fn new(value: u8) -> Self {
        Self(value)
    }

    /// Check if flag is set
    pub const fn has(&self, flag: u8) -> bool {
        (self.0 & flag) != 0
    }

    /// Set flag
    pub fn set(&mut self, flag: u8) {
        self.0 |= flag;
    }

    /// Clear flag
    pub fn clear(&mut self, flag: u8) {
        self.0 &= !flag;
    }

    /// Whether the compressed flag is set
    pub const fn is_compressed(&self) -> bool {
        self.has(Self::COMPRESSED)
    }
}

impl fmt::Display for FileInfoFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02x}", self.0)
    }
}

/// Location and sizes of one packed file, keyed by file index
///
/// Layout: flags byte, varint file index, varint compressed size, varint
/// uncompressed size (compressed files only), varint segment index.
#[derive(Debug, Clone, Default)]
pub struct FileInfoKey {
    /// Compression and encryption flags
    pub flags: FileInfoFlags,
    /// File index referenced by file entries
    pub file_index: u32,
    /// Size as stored in the volume
    pub compressed_size: u32,
    /// Size after decompression (equals `compressed_size` when stored raw)
    pub uncompressed_size: u32,
    /// Segment (sector) holding the file data
    pub segment_index: u32,
    /// Buffer offset this key was decoded from; stale after a rebuild
    pub key_offset: usize,
}

impl FileInfoKey {
    /// Create an uncompressed file record
    pub fn new(file_index: u32, size: u32, segment_index: u32) -> Self {
        Self {
            flags: FileInfoFlags::default(),
            file_index,
            compressed_size: size,
            uncompressed_size: size,
            segment_index,
            key_offset: 0,
        }
    }

    /// Create a compressed file record
    pub fn compressed(
        file_index: u32,
        compressed_size: u32,
        uncompressed_size: u32,
        segment_index: u32,
    ) -> Self {
        Self {
            flags: FileInfoFlags::new(FileInfoFlags::COMPRESSED),
            file_index,
            compressed_size,
            uncompressed_size,
            segment_index,
            key_offset: 0,
        }
    }

    /// Query key for a lookup by file index
    pub fn with_index(file_index: u32) -> Self {
        Self {
            file_index,
            ..Self::default()
        }
    }
}

// key_offset is transient and does not take part in equality
impl PartialEq for FileInfoKey {
    fn eq(&self, other: &Self) -> bool {
        self.flags == other.flags
            && self.file_index == other.file_index
            && self.compressed_size == other.compressed_size
            && self.uncompressed_size == other.uncompressed_size
            && self.segment_index == other.segment_index
    }
}

impl Eq for FileInfoKey {}

impl BTreeKey for FileInfoKey {
    fn deserialize(reader: &mut BitReader<'_>, _ctx: &KeyContext) -> BTreeResult<Self> {
        let key_offset = reader.byte_position();
        let flags = FileInfoFlags::new(reader.read_byte()?);
        let file_index = reader.read_varint()?;
        let compressed_size = reader.read_varint()?;
        let uncompressed_size = if flags.is_compressed() {
            reader.read_varint()?
        } else {
            compressed_size
        };
        let segment_index = reader.read_varint()?;

        Ok(Self {
            flags,
            file_index,
            compressed_size,
            uncompressed_size,
            segment_index,
            key_offset,
        })
    }

    fn serialize(&self, writer: &mut BitWriter) -> BTreeResult<()> {
        writer.write_byte(self.flags.0)?;
        writer.write_varint(self.file_index)?;
        writer.write_varint(self.compressed_size)?;
        if self.flags.is_compressed() {
            writer.write_varint(self.uncompressed_size)?;
        }
        writer.write_varint(self.segment_index)
    }

    fn serialized_key_size(&self) -> usize {
        let mut size = 1
            + varint_size(self.file_index)
            + varint_size(self.compressed_size)
            + varint_size(self.segment_index);
        if self.flags.is_compressed() {
            size += varint_size(self.uncompressed_size);
        }
        size
    }

    fn last_index() -> Self {
        Self::with_index(u32::MAX)
    }

    fn compare_get_diff(&self, next: &Self) -> BTreeResult<Self> {
        // File indices compare as integers; the index entry ordinal is enough.
        Ok(next.clone())
    }

    fn key_cmp(&self, other: &Self) -> Ordering {
        self.file_index.cmp(&other.file_index)
    }

    fn index_ordinal(&self, _collection_ordinal: u32) -> u32 {
        self.file_index
    }

    fn sentinel_ordinal(keys: &[Self], _ctx: &KeyContext) -> u32 {
        keys.last()
            .map_or(0, |key| key.file_index.saturating_add(1))
    }

    fn compare_payload(&self, reader: &mut BitReader<'_>) -> BTreeResult<Ordering> {
        reader.read_byte()?;
        let file_index = reader.read_varint()?;
        Ok(self.file_index.cmp(&file_index))
    }

    fn compare_index(&self, ordinal: u32, _reader: &mut BitReader<'_>) -> BTreeResult<Ordering> {
        Ok(self.file_index.cmp(&ordinal))
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    fn round_trip(key: &FileInfoKey) -> (FileInfoKey, Vec<u8>) {
        let mut writer = BitWriter::new();
        key.serialize(&mut writer).unwrap();
        let data = writer.into_inner();
        let mut reader = BitReader::new(&data);
        let parsed = FileInfoKey::deserialize(&mut reader, &KeyContext::new()).unwrap();
        assert_eq!(reader.byte_position(), data.len());
        (parsed, data)
    }

    #[test]
    fn test_uncompressed_layout() {
        let key = FileInfoKey::new(5, 0x1234, 7);
        let (parsed, data) = round_trip(&key);
        assert_eq!(data, vec![0x00, 0x05, 0x92, 0x34, 0x07]);
        assert_eq!(data.len(), key.serialized_key_size());
        assert_eq!(parsed, key);
        assert_eq!(parsed.uncompressed_size, 0x1234);
    }

    #[test]
    fn test_compressed_layout() {
        let key = FileInfoKey::compressed(300, 100, 4000, 1);
        let (parsed, data) = round_trip(&key);
        assert_eq!(data.len(), key.serialized_key_size());
        assert_eq!(data.len(), 1 + 2 + 1 + 2 + 1);
        assert_eq!(parsed, key);
    }

    #[test]
    fn test_unknown_flag_bits_preserved() {
        let mut key = FileInfoKey::new(1, 2, 3);
        key.flags = FileInfoFlags::new(0x82);
        let (parsed, _) = round_trip(&key);
        assert_eq!(parsed.flags.0, 0x82);
        assert!(parsed.flags.has(FileInfoFlags::ENCRYPTED));
        assert!(!parsed.flags.is_compressed());
    }

    #[test]
    fn test_key_offset_ignored_by_equality() {
        let mut a = FileInfoKey::new(9, 10, 11);
        let b = a.clone();
        a.key_offset = 1234;
        assert_eq!(a, b);
    }

    #[test]
    fn test_compare_payload_reads_index_only() {
        let key = FileInfoKey::compressed(42, 1, 2, 3);
        let mut writer = BitWriter::new();
        key.serialize(&mut writer).unwrap();
        let data = writer.into_inner();

        for (query, expected) in [(41, Ordering::Less), (42, Ordering::Equal), (43, Ordering::Greater)] {
            let mut reader = BitReader::new(&data);
            let ord = FileInfoKey::with_index(query)
                .compare_payload(&mut reader)
                .unwrap();
            assert_eq!(ord, expected);
        }
    }

    #[test]
    fn test_sentinel_is_max_plus_one() {
        let keys = vec![FileInfoKey::new(5, 1, 0), FileInfoKey::new(100, 1, 0)];
        assert_eq!(FileInfoKey::sentinel_ordinal(&keys, &KeyContext::new()), 101);
        assert_eq!(FileInfoKey::sentinel_ordinal(&[], &KeyContext::new()), 0);
    }

    #[test]
    fn test_separator_passes_next_through() {
        let a = FileInfoKey::new(1, 1, 1);
        let b = FileInfoKey::new(2, 5, 6);
        assert_eq!(a.compare_get_diff(&b).unwrap(), b);
        assert_eq!(b.serialized_index_size(), 0);
    }
}
