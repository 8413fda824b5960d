//! TOC header structures and parsing

use binrw::{BinRead, BinWrite};

use crate::toc::error::{TocError, TocResult};

/// TOC magic, big-endian
pub const TOC_MAGIC: u32 = 0x5B74_5162;

/// Size of the fixed part of the header
pub const TOC_HEADER_BASE_SIZE: usize = 20;

/// TOC header (20 bytes plus 4 per entry tree)
///
/// All offsets are absolute byte offsets into the TOC buffer. Entry tree 0
/// is the root directory.
#[derive(Debug, Clone, PartialEq, Eq, BinRead, BinWrite)]
#[br(big)]
#[bw(big)]
pub struct TocHeader {
    /// Magic: 0x5B745162
    pub magic: u32,

    /// Name pool tree offset
    pub name_tree_offset: u32,

    /// Extension pool tree offset
    pub extension_tree_offset: u32,

    /// File info tree offset
    pub file_info_tree_offset: u32,

    /// Number of directory entry trees
    pub entry_tree_count: u32,

    /// Entry tree offsets, indexed by tree number
    #[br(count = entry_tree_count)]
    pub entry_tree_offsets: Vec<u32>,
}

impl TocHeader {
    /// Create a header for the given tree offsets
    pub fn new(
        name_tree_offset: u32,
        extension_tree_offset: u32,
        file_info_tree_offset: u32,
        entry_tree_offsets: Vec<u32>,
    ) -> Self {
        Self {
            magic: TOC_MAGIC,
            name_tree_offset,
            extension_tree_offset,
            file_info_tree_offset,
            entry_tree_count: entry_tree_offsets.len() as u32,
            entry_tree_offsets,
        }
    }

    /// Encoded size in bytes
    pub fn size(&self) -> usize {
        Self::size_for(self.entry_tree_offsets.len())
    }

    /// Encoded size of a header with `entry_trees` entry tree offsets
    pub const fn size_for(entry_trees: usize) -> usize {
        TOC_HEADER_BASE_SIZE + entry_trees * 4
    }

    /// Check magic and internal consistency
    pub fn validate(&self) -> TocResult<()> {
        if self.magic != TOC_MAGIC {
            return Err(TocError::InvalidMagic(self.magic));
        }
        if self.entry_tree_count as usize != self.entry_tree_offsets.len() {
            return Err(TocError::EntryCountMismatch {
                count: self.entry_tree_count,
                offsets: self.entry_tree_offsets.len(),
            });
        }
        Ok(())
    }

    /// Every tree offset, fixed trees first
    pub(crate) fn tree_offsets(&self) -> impl Iterator<Item = u32> + '_ {
        [
            self.name_tree_offset,
            self.extension_tree_offset,
            self.file_info_tree_offset,
        ]
        .into_iter()
        .chain(self.entry_tree_offsets.iter().copied())
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_header_layout() {
        let header = TocHeader::new(28, 40, 52, vec![64, 80]);
        let mut cursor = Cursor::new(Vec::new());
        header.write(&mut cursor).unwrap();
        let data = cursor.into_inner();

        assert_eq!(data.len(), header.size());
        assert_eq!(&data[..4], &[0x5B, 0x74, 0x51, 0x62]);
        assert_eq!(&data[16..20], &[0, 0, 0, 2]);
        assert_eq!(&data[20..], &[0, 0, 0, 64, 0, 0, 0, 80]);

        let parsed = TocHeader::read(&mut Cursor::new(&data)).unwrap();
        assert_eq!(parsed, header);
        parsed.validate().unwrap();
    }

    #[test]
    fn test_bad_magic_rejected() {
        let mut header = TocHeader::new(20, 20, 20, Vec::new());
        header.magic = 0x1234_5678;
        assert!(matches!(
            header.validate(),
            Err(TocError::InvalidMagic(0x1234_5678))
        ));
    }

    #[test]
    fn test_truncated_offset_table() {
        let header = TocHeader::new(28, 40, 52, vec![64, 80]);
        let mut cursor = Cursor::new(Vec::new());
        header.write(&mut cursor).unwrap();
        let data = cursor.into_inner();
        assert!(TocHeader::read(&mut Cursor::new(&data[..24])).is_err());
    }
}
