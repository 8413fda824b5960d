//! B-tree engine: page-chain decode, lookups and full rebuild

use std::cmp::Ordering;

use tracing::{debug, trace, warn};

use crate::btree::bitstream::{BitReader, BitWriter};
use crate::btree::error::{BTreeError, BTreeResult};
use crate::btree::header::{PageHeader, TreeHeader, write_page_header};
use crate::btree::index_writer::IndexWriter;
use crate::btree::key::{BTreeKey, KeyContext};
use crate::btree::search::{SearchPolicy, search_with_comparison};
use crate::btree::utils::page_header_size;
use crate::btree::{MAX_KEYS_PER_PAGE, PAGE_SIZE, TREE_ALIGNMENT, TREE_HEADER_SIZE};

/// Bytes held back per candidate key for its 12-bit offset slot
const OFFSET_SLOT_MARGIN: usize = 2;

/// Result of a two-level key search
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexHit<K> {
    /// Ordinal reconstructed from the bracketing index bound
    pub ordinal: usize,
    /// The decoded key
    pub key: K,
}

/// A TOC B-tree over a borrowed buffer
///
/// The engine never copies the buffer it reads from. `load` decodes every
/// page into the key collection; callers may then edit the collection and
/// `serialize` it into a fresh buffer. Lookups read directly from the
/// borrowed buffer and are unaffected by edits to the collection.
#[derive(Debug, Clone)]
pub struct BTree<'a, K> {
    buffer: &'a [u8],
    base: usize,
    context: KeyContext,
    keys: Vec<K>,
}

impl<'a, K: BTreeKey> BTree<'a, K> {
    /// Create an engine over the tree starting at `base` in `buffer`
    pub fn new(buffer: &'a [u8], base: usize, context: KeyContext) -> Self {
        Self {
            buffer,
            base,
            context,
            keys: Vec::new(),
        }
    }

    /// Create an engine for a new tree that has no encoded form yet
    pub fn with_keys(keys: Vec<K>, context: KeyContext) -> Self {
        Self {
            buffer: &[],
            base: 0,
            context,
            keys,
        }
    }

    /// Offset of the tree within its buffer
    pub fn base(&self) -> usize {
        self.base
    }

    /// Context used for decoding and index finalization
    pub fn context(&self) -> &KeyContext {
        &self.context
    }

    /// Key collection in tree order
    pub fn keys(&self) -> &[K] {
        &self.keys
    }

    /// Mutable key collection; call [`sort_keys`](Self::sort_keys) after
    /// edits that break the order
    pub fn keys_mut(&mut self) -> &mut Vec<K> {
        &mut self.keys
    }

    /// Append a key
    pub fn push(&mut self, key: K) {
        self.keys.push(key);
    }

    /// Take the key collection
    pub fn into_keys(self) -> Vec<K> {
        self.keys
    }

    /// Number of keys in the collection
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether the collection is empty
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Restore tree order after edits
    pub fn sort_keys(&mut self) {
        self.keys.sort_by(K::key_cmp);
    }

    /// Read the tree header from the buffer
    pub fn header(&self) -> BTreeResult<TreeHeader> {
        let mut reader = BitReader::new(self.buffer);
        TreeHeader::read(&mut reader, self.base)
    }

    /// Headers of every leaf page, in chain order
    pub fn page_headers(&self) -> BTreeResult<Vec<PageHeader>> {
        let mut reader = BitReader::new(self.buffer);
        let header = TreeHeader::read(&mut reader, self.base)?;
        let mut pages = Vec::with_capacity(usize::from(header.page_count));
        let mut page_start = self.base + TreeHeader::first_page_offset();
        for _ in 0..header.page_count {
            let page = PageHeader::read(&mut reader, page_start)?;
            page_start = page.next_page();
            pages.push(page);
        }
        Ok(pages)
    }

    /// Total key count, summed from page headers without decoding keys
    pub fn key_count(&self) -> BTreeResult<usize> {
        Ok(self
            .page_headers()?
            .iter()
            .map(|page| usize::from(page.key_count))
            .sum())
    }

    /// Decode every page into the key collection
    pub fn load(&mut self) -> BTreeResult<()> {
        let mut reader = BitReader::new(self.buffer);
        let header = TreeHeader::read(&mut reader, self.base)?;
        if header.has_index() && header.index_page_count == 0 {
            return Err(BTreeError::corrupt(
                self.base,
                format!("{} pages but no index", header.page_count),
            ));
        }

        self.keys.clear();
        let mut page_start = self.base + TreeHeader::first_page_offset();
        for page_number in 0..header.page_count {
            let page = PageHeader::read(&mut reader, page_start)?;
            if page.multiple_keys && page.key_count == 0 {
                // Seen in shipped volumes; treated as an empty page.
                warn!(page = page_number, offset = page_start, "empty page flagged as multi-key");
            }

            for slot in 0..usize::from(page.key_count) {
                let offset = page.key_offset(&mut reader, slot)?;
                reader.seek_to_byte(page_start + offset);
                let key = K::deserialize(&mut reader, &self.context)?;
                if reader.bit_position() > page.next_page() * 8 {
                    return Err(BTreeError::corrupt(
                        page_start,
                        format!("key in slot {slot} runs past the page end"),
                    ));
                }
                self.keys.push(key);
            }
            page_start = page.next_page();
        }

        debug!(
            base = self.base,
            pages = header.page_count,
            index_pages = header.index_page_count,
            keys = self.keys.len(),
            "loaded tree"
        );
        Ok(())
    }

    /// Decode the key at `ordinal` by walking the page chain
    pub fn find_by_ordinal(&self, ordinal: usize) -> BTreeResult<Option<K>> {
        let mut reader = BitReader::new(self.buffer);
        let header = TreeHeader::read(&mut reader, self.base)?;

        let mut remaining = ordinal;
        let mut page_start = self.base + TreeHeader::first_page_offset();
        for _ in 0..header.page_count {
            let page = PageHeader::read(&mut reader, page_start)?;
            let count = usize::from(page.key_count);
            if remaining < count {
                let offset = page.key_offset(&mut reader, remaining)?;
                reader.seek_to_byte(page_start + offset);
                return K::deserialize(&mut reader, &self.context).map(Some);
            }
            remaining -= count;
            page_start = page.next_page();
        }
        Ok(None)
    }

    /// Look up a key through the index chain and its leaf page
    ///
    /// The returned ordinal is `max_index - upper_bound + lower_bound`: the
    /// bracketing entry's bound, minus the leaf's key count, plus the slot.
    /// For string pools the bound is a key count, so this is the tree
    /// ordinal. For file infos it is the file index bound, which equals the
    /// tree ordinal when file indices are dense from zero. File entry trees
    /// bound pages by name index only and return
    /// [`BTreeError::Unsupported`]; look their keys up in the loaded
    /// collection instead.
    pub fn search_index_by_key(&self, key: &K) -> BTreeResult<Option<IndexHit<K>>> {
        if !K::supports_index_search() {
            return Err(BTreeError::Unsupported("search_index_by_key"));
        }
        let mut reader = BitReader::new(self.buffer);
        let header = TreeHeader::read(&mut reader, self.base)?;

        let (leaf_start, max_index) = if header.has_index() {
            match self.descend_index(&mut reader, &header, key)? {
                Some(found) => found,
                None => return Ok(None),
            }
        } else {
            let page = PageHeader::read(&mut reader, self.base + TreeHeader::first_page_offset())?;
            (page.start, usize::from(page.key_count))
        };

        let leaf = PageHeader::read(&mut reader, leaf_start)?;
        let found = search_with_comparison(&mut reader, &leaf, SearchPolicy::EqualTo, |r| {
            key.compare_payload(r)
        })?;
        let Some(result) = found.filter(|result| result.exact) else {
            return Ok(None);
        };

        reader.seek_to_byte(result.payload_offset);
        let decoded = K::deserialize(&mut reader, &self.context)?;
        let ordinal = (max_index + result.slot)
            .checked_sub(result.upper_bound)
            .ok_or_else(|| {
                BTreeError::corrupt(
                    leaf_start,
                    format!(
                        "index bound {max_index} below page key count {}",
                        result.upper_bound
                    ),
                )
            })?;

        Ok(Some(IndexHit {
            ordinal,
            key: decoded,
        }))
    }

    /// Generic lookup by arbitrary key; no variant defines it
    pub fn search_by_key(&self, _key: &K) -> BTreeResult<IndexHit<K>> {
        Err(BTreeError::Unsupported("search_by_key"))
    }

    /// Walk the index blocks to the leaf page bracketing `key`
    ///
    /// Returns the leaf's absolute offset and the bound of its index entry.
    fn descend_index(
        &self,
        reader: &mut BitReader<'a>,
        header: &TreeHeader,
        key: &K,
    ) -> BTreeResult<Option<(usize, usize)>> {
        let mut block_start = self.base + header.first_offset as usize;
        for block_number in 0..header.index_page_count {
            let block = PageHeader::read(reader, block_start)?;
            let found = search_with_comparison(reader, &block, SearchPolicy::LessThan, |r| {
                let ordinal = r.read_varint()?;
                key.compare_index(ordinal, r)
            })?;

            if let Some(result) = found {
                reader.seek_to_byte(result.payload_offset);
                let max_index = reader.read_varint()?;
                K::skip_index(reader)?;
                let page_offset = reader.read_varint()? as usize;
                trace!(
                    block = block_number,
                    slot = result.slot,
                    max_index,
                    page_offset,
                    "descended index"
                );
                return Ok(Some((self.base + page_offset, max_index as usize)));
            }
            block_start = block.next_page();
        }
        Ok(None)
    }

    /// Rebuild the tree from the key collection
    ///
    /// The collection must already be in tree order. Returns the encoded
    /// tree, starting with its header, padded to a 4-byte boundary. Offsets
    /// recorded in previously decoded keys do not apply to the new buffer.
    /// Keys that sort at or above [`BTreeKey::last_index`] are rejected,
    /// since the final index entry could not bound them.
    pub fn serialize(&self) -> BTreeResult<Vec<u8>> {
        let last = K::last_index();
        if let Some(ordinal) = self
            .keys
            .iter()
            .position(|key| key.key_cmp(&last) != Ordering::Less)
        {
            return Err(BTreeError::InvalidArgument(format!(
                "key {ordinal} does not sort below the index sentinel"
            )));
        }

        let mut writer = BitWriter::new();
        writer.seek_to_byte(TREE_HEADER_SIZE);

        let mut index = IndexWriter::new();
        let mut page_count = 0usize;
        let mut last_page_offset;
        let mut start = 0;

        loop {
            let end = self.pack_page(start)?;
            let page_offset = writer.byte_position();
            Self::write_page(&mut writer, &self.keys[start..end])?;
            page_count += 1;
            last_page_offset = page_offset;

            if end >= self.keys.len() {
                break;
            }

            let separator = self.keys[end - 1].compare_get_diff(&self.keys[end])?;
            index.add_index(
                self.keys[end].index_ordinal(to_u32(end, "key ordinal")?),
                to_u32(page_offset, "page offset")?,
                separator,
            )?;
            start = end;
        }

        let (first_offset, index_blocks) = if page_count > 1 {
            let index_offset = writer.byte_position();
            index.finalize(
                to_u32(last_page_offset, "page offset")?,
                K::sentinel_ordinal(&self.keys, &self.context),
                K::last_index(),
            )?;
            let blocks = index.finish()?;
            writer.write_bytes(&blocks.data)?;
            (index_offset, blocks.block_count)
        } else {
            (TREE_HEADER_SIZE, 0)
        };

        writer.align_to(TREE_ALIGNMENT);

        let header = TreeHeader {
            index_page_count: check_limit(index_blocks, u8::MAX as usize, "index page count")?
                as u8,
            first_offset: check_limit(first_offset, 0xFF_FFFF, "index offset")? as u32,
            page_count: check_limit(page_count, u16::MAX as usize, "page count")? as u16,
        };
        header.write(&mut writer)?;

        debug!(
            keys = self.keys.len(),
            pages = page_count,
            index_pages = index_blocks,
            bytes = writer.len(),
            "serialized tree"
        );
        Ok(writer.into_inner())
    }

    /// Greedily choose the keys of the page starting at `start`
    fn pack_page(&self, start: usize) -> BTreeResult<usize> {
        let mut payload = 0;
        let mut end = start;

        while let Some(key) = self.keys.get(end) {
            let count = end - start;
            let size = key.serialized_key_size();
            let full = count == MAX_KEYS_PER_PAGE
                || page_header_size(count) + payload + size + OFFSET_SLOT_MARGIN >= PAGE_SIZE;
            if full {
                if count == 0 {
                    return Err(BTreeError::KeyTooLarge { ordinal: end, size });
                }
                break;
            }
            payload += size;
            end += 1;
        }
        Ok(end)
    }

    fn write_page(writer: &mut BitWriter, keys: &[K]) -> BTreeResult<()> {
        let sizes: Vec<usize> = keys.iter().map(K::serialized_key_size).collect();
        write_page_header(writer, &sizes)?;

        for (key, &expected) in keys.iter().zip(&sizes) {
            let start = writer.byte_position();
            key.serialize(writer)?;
            let actual = writer.byte_position() - start;
            if actual != expected {
                return Err(BTreeError::SizeMismatch { expected, actual });
            }
        }
        Ok(())
    }
}

fn check_limit(value: usize, limit: usize, field: &'static str) -> BTreeResult<usize> {
    if value > limit {
        return Err(BTreeError::PageOverflow {
            field,
            value,
            limit,
        });
    }
    Ok(value)
}

fn to_u32(value: usize, field: &'static str) -> BTreeResult<u32> {
    u32::try_from(value).map_err(|_| BTreeError::PageOverflow {
        field,
        value,
        limit: u32::MAX as usize,
    })
}
