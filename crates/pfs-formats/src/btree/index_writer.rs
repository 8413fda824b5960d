//! Secondary index accumulated while leaf pages are emitted

use tracing::trace;

use crate::btree::PAGE_SIZE;
use crate::btree::bitstream::BitWriter;
use crate::btree::error::{BTreeError, BTreeResult};
use crate::btree::header::write_page_header;
use crate::btree::key::BTreeKey;
use crate::btree::utils::{page_header_size, varint_size};

/// One index entry: the exclusive upper bound of a leaf page
#[derive(Debug, Clone)]
struct IndexEntry<K> {
    ordinal: u32,
    separator: K,
    page_offset: u32,
}

impl<K: BTreeKey> IndexEntry<K> {
    fn size(&self) -> usize {
        varint_size(self.ordinal)
            + self.separator.serialized_index_size()
            + varint_size(self.page_offset)
    }

    fn write(&self, writer: &mut BitWriter) -> BTreeResult<()> {
        writer.write_varint(self.ordinal)?;
        self.separator.serialize_index(writer)?;
        writer.write_varint(self.page_offset)
    }
}

/// Index blocks ready to be appended after the leaf pages
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexBlocks {
    /// Chained blocks, back to back
    pub data: Vec<u8>,
    /// Number of blocks in `data`
    pub block_count: usize,
}

/// Packs index entries into 4096-byte blocks with the leaf page layout
///
/// Entries are `varint(ordinal) + separator + varint(page offset)`. The
/// entry for page `i` carries the identity of the first key of page `i + 1`,
/// so a query belongs to the first entry whose bound exceeds it. The final
/// entry, added by [`finalize`](Self::finalize), bounds the whole tree.
#[derive(Debug)]
pub struct IndexWriter<K> {
    pending: Vec<IndexEntry<K>>,
    pending_bytes: usize,
    output: BitWriter,
    block_count: usize,
}

impl<K: BTreeKey> Default for IndexWriter<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: BTreeKey> IndexWriter<K> {
    /// Create an empty index writer
    pub fn new() -> Self {
        Self {
            pending: Vec::new(),
            pending_bytes: 0,
            output: BitWriter::new(),
            block_count: 0,
        }
    }

    /// Record the bound of the page at `page_offset`
    ///
    /// Starts a new block first when the entry would not fit in the current
    /// one.
    pub fn add_index(&mut self, ordinal: u32, page_offset: u32, separator: K) -> BTreeResult<()> {
        let entry = IndexEntry {
            ordinal,
            separator,
            page_offset,
        };
        let size = entry.size();

        if page_header_size(self.pending.len() + 1) + self.pending_bytes + size >= PAGE_SIZE {
            if self.pending.is_empty() {
                return Err(BTreeError::KeyTooLarge {
                    ordinal: ordinal as usize,
                    size,
                });
            }
            self.flush()?;
            if page_header_size(1) + size >= PAGE_SIZE {
                return Err(BTreeError::KeyTooLarge {
                    ordinal: ordinal as usize,
                    size,
                });
            }
        }

        self.pending_bytes += size;
        self.pending.push(entry);
        Ok(())
    }

    /// Append the terminal entry bounding the key space and close the block
    pub fn finalize(
        &mut self,
        page_offset: u32,
        sentinel_ordinal: u32,
        sentinel_key: K,
    ) -> BTreeResult<()> {
        self.add_index(sentinel_ordinal, page_offset, sentinel_key)?;
        self.flush()
    }

    /// Number of blocks completed so far
    pub fn block_count(&self) -> usize {
        self.block_count
    }

    /// Close any pending block and return the encoded chain
    pub fn finish(mut self) -> BTreeResult<IndexBlocks> {
        self.flush()?;
        Ok(IndexBlocks {
            data: self.output.into_inner(),
            block_count: self.block_count,
        })
    }

    fn flush(&mut self) -> BTreeResult<()> {
        if self.pending.is_empty() {
            return Ok(());
        }

        let sizes: Vec<usize> = self.pending.iter().map(IndexEntry::size).collect();
        let block_start = self.output.byte_position();
        write_page_header(&mut self.output, &sizes)?;

        for (entry, &expected) in self.pending.iter().zip(&sizes) {
            let start = self.output.byte_position();
            entry.write(&mut self.output)?;
            let actual = self.output.byte_position() - start;
            if actual != expected {
                return Err(BTreeError::SizeMismatch { expected, actual });
            }
        }

        trace!(
            block = self.block_count,
            entries = self.pending.len(),
            bytes = self.output.byte_position() - block_start,
            "flushed index block"
        );

        self.pending.clear();
        self.pending_bytes = 0;
        self.block_count += 1;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::btree::bitstream::BitReader;
    use crate::btree::header::PageHeader;
    use crate::btree::keys::{FileInfoKey, StringKey};

    #[test]
    fn test_single_block_layout() {
        let mut writer = IndexWriter::new();
        writer.add_index(3, 6, FileInfoKey::with_index(3)).unwrap();
        writer.finalize(200, 10, FileInfoKey::last_index()).unwrap();
        let blocks = writer.finish().unwrap();
        assert_eq!(blocks.block_count, 1);

        let mut reader = BitReader::new(&blocks.data);
        let page = PageHeader::read(&mut reader, 0).unwrap();
        assert_eq!(page.key_count, 2);
        assert!(page.multiple_keys);

        let offset = page.key_offset(&mut reader, 0).unwrap();
        reader.seek_to_byte(offset);
        assert_eq!(reader.read_varint().unwrap(), 3);
        assert_eq!(reader.read_varint().unwrap(), 6);

        let offset = page.key_offset(&mut reader, 1).unwrap();
        reader.seek_to_byte(offset);
        assert_eq!(reader.read_varint().unwrap(), 10);
        assert_eq!(reader.read_varint().unwrap(), 200);
        assert_eq!(reader.byte_position(), usize::from(page.next_offset));
    }

    #[test]
    fn test_string_separators_are_stored() {
        let mut writer = IndexWriter::new();
        writer.add_index(1, 6, StringKey::from("b")).unwrap();
        writer.finalize(50, 2, StringKey::last_index()).unwrap();
        let blocks = writer.finish().unwrap();

        let mut reader = BitReader::new(&blocks.data);
        let page = PageHeader::read(&mut reader, 0).unwrap();
        let offset = page.key_offset(&mut reader, 0).unwrap();
        reader.seek_to_byte(offset);
        assert_eq!(reader.read_varint().unwrap(), 1);
        assert_eq!(reader.read_prefixed_string().unwrap(), b"b");
        assert_eq!(reader.read_varint().unwrap(), 6);
    }

    #[test]
    fn test_entries_spill_into_chained_blocks() {
        let mut writer = IndexWriter::new();
        for i in 0..1500u32 {
            let name = format!("separator-{i:06}");
            writer
                .add_index(i, 6 + i * 100, StringKey::from(name.as_str()))
                .unwrap();
        }
        let flushed = writer.block_count();
        assert!(flushed >= 1);
        writer
            .finalize(6 + 1500 * 100, 1501, StringKey::last_index())
            .unwrap();
        let total = writer.block_count();
        assert!(total > flushed);
        let blocks = writer.finish().unwrap();
        assert_eq!(blocks.block_count, total);

        // Walk the chain: every block fits the page budget and entries add up.
        let mut reader = BitReader::new(&blocks.data);
        let mut start = 0;
        let mut entries = 0;
        for _ in 0..blocks.block_count {
            let page = PageHeader::read(&mut reader, start).unwrap();
            assert!(usize::from(page.next_offset) < PAGE_SIZE);
            entries += usize::from(page.key_count);
            start = page.next_page();
        }
        assert_eq!(entries, 1501);
        assert_eq!(start, blocks.data.len());
    }

    #[test]
    fn test_oversized_separator_rejected() {
        let mut writer = IndexWriter::new();
        let huge = StringKey::new(vec![b'x'; PAGE_SIZE]);
        assert!(matches!(
            writer.add_index(0, 6, huge),
            Err(BTreeError::KeyTooLarge { .. })
        ));
    }
}
