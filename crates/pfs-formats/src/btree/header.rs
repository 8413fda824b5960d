//! Tree and page headers

use crate::btree::bitstream::{BitReader, BitWriter};
use crate::btree::error::{BTreeError, BTreeResult};
use crate::btree::utils::page_header_size;
use crate::btree::{MAX_KEYS_PER_PAGE, PAGE_SIZE, TREE_HEADER_SIZE};

/// Tree header (6 bytes, big-endian bit fields)
///
/// ```text
/// 8 bits   index page count
/// 24 bits  offset of the first index block, or 6 for a single-page tree
/// 16 bits  page count
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TreeHeader {
    /// Number of chained index pages
    pub index_page_count: u8,
    /// Tree-relative offset of the index, or of the sole page
    pub first_offset: u32,
    /// Number of leaf pages
    pub page_count: u16,
}

impl TreeHeader {
    /// Read the header of the tree starting at byte `base`
    pub fn read(reader: &mut BitReader<'_>, base: usize) -> BTreeResult<Self> {
        reader.seek_to_byte(base);
        let index_page_count = reader.read_byte()?;
        let first_offset = reader.read_bits(24)?;
        let page_count = reader.read_bits(16)? as u16;
        Ok(Self {
            index_page_count,
            first_offset,
            page_count,
        })
    }

    /// Write the header at the start of a tree buffer
    pub fn write(&self, writer: &mut BitWriter) -> BTreeResult<()> {
        writer.seek_to_byte(0);
        writer.write_byte(self.index_page_count)?;
        writer.write_bits(24, self.first_offset)?;
        writer.write_bits(16, u32::from(self.page_count))
    }

    /// Whether lookups go through an index chain
    pub fn has_index(&self) -> bool {
        self.page_count > 1
    }

    /// Tree-relative offset of the first leaf page
    pub const fn first_page_offset() -> usize {
        TREE_HEADER_SIZE
    }
}

/// Header of a leaf page or index block
///
/// ```text
/// 1 bit          more than one key
/// 11 bits        key count n
/// 12 bits * n    page-relative key offsets
/// 12 bits        page-relative offset one past the last key
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageHeader {
    /// Absolute byte offset of the page
    pub start: usize,
    /// The "more than one key" flag as stored
    pub multiple_keys: bool,
    /// Number of keys
    pub key_count: u16,
    /// Page-relative offset one past the last key payload
    pub next_offset: u16,
}

impl PageHeader {
    /// Read the header of the page starting at byte `start`
    pub fn read(reader: &mut BitReader<'_>, start: usize) -> BTreeResult<Self> {
        reader.seek_to_byte(start);
        let multiple_keys = reader.read_bool_bit()?;
        let key_count = reader.read_bits(11)? as u16;
        reader.seek_to_bit(start * 8 + 12 + 12 * usize::from(key_count));
        let next_offset = reader.read_bits(12)? as u16;

        let header = Self {
            start,
            multiple_keys,
            key_count,
            next_offset,
        };
        if key_count > 0 && usize::from(next_offset) <= header.size() {
            return Err(BTreeError::corrupt(
                start,
                format!("next-page offset {next_offset} inside the offset table"),
            ));
        }
        Ok(header)
    }

    /// Size of the header and offset table in bytes
    pub fn size(&self) -> usize {
        page_header_size(usize::from(self.key_count))
    }

    /// Absolute byte offset of the page that follows
    pub fn next_page(&self) -> usize {
        self.start + usize::from(self.next_offset)
    }

    /// Page-relative offset of the payload in `slot`
    pub fn key_offset(&self, reader: &mut BitReader<'_>, slot: usize) -> BTreeResult<usize> {
        if slot >= usize::from(self.key_count) {
            return Err(BTreeError::InvalidArgument(format!(
                "slot {slot} beyond page key count {}",
                self.key_count
            )));
        }
        reader.seek_to_bit(self.start * 8 + 12 + 12 * slot);
        let offset = reader.read_bits(12)? as usize;
        if offset < self.size() || offset >= usize::from(self.next_offset) {
            return Err(BTreeError::corrupt(
                self.start,
                format!(
                    "key offset {offset} of slot {slot} outside payload {}..{}",
                    self.size(),
                    self.next_offset
                ),
            ));
        }
        Ok(offset)
    }
}

/// Write a page header for payloads of the given sizes, byte-aligned
pub(crate) fn write_page_header(writer: &mut BitWriter, sizes: &[usize]) -> BTreeResult<()> {
    let count = sizes.len();
    if count > MAX_KEYS_PER_PAGE {
        return Err(BTreeError::PageOverflow {
            field: "page key count",
            value: count,
            limit: MAX_KEYS_PER_PAGE,
        });
    }

    writer.write_bool_bit(count > 1)?;
    writer.write_bits(11, count as u32)?;

    let mut running = page_header_size(count);
    for &size in sizes {
        writer.write_bits(12, running as u32)?;
        running += size;
        if running >= PAGE_SIZE {
            return Err(BTreeError::PageOverflow {
                field: "page size",
                value: running,
                limit: PAGE_SIZE - 1,
            });
        }
    }
    writer.write_bits(12, running as u32)?;
    writer.align_to_byte();
    Ok(())
}
