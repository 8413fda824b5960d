//! Bit-level cursors over TOC buffers
//!
//! Bits are consumed most-significant first within each byte, so a field
//! wider than eight bits reads as big-endian. Page headers use 1-, 11- and
//! 12-bit fields; key payloads and index entries are byte-aligned and built
//! from varints and length-prefixed strings.

use bitvec::field::BitField;
use bitvec::order::Msb0;
use bitvec::slice::BitSlice;
use bitvec::vec::BitVec;
use bitvec::view::BitView;

use crate::btree::error::{BTreeError, BTreeResult};
use crate::btree::utils::varint_size;

const fn low_mask(bits: u32) -> u32 {
    if bits >= 32 {
        u32::MAX
    } else {
        (1u32 << bits) - 1
    }
}

fn check_width(count: u32) -> BTreeResult<()> {
    if !(1..=32).contains(&count) {
        return Err(BTreeError::InvalidArgument(format!(
            "bit field width {count} outside 1..=32"
        )));
    }
    Ok(())
}

/// Positionable reader over a borrowed byte buffer
#[derive(Debug, Clone)]
pub struct BitReader<'a> {
    data: &'a [u8],
    bits: &'a BitSlice<u8, Msb0>,
    position: usize,
}

impl<'a> BitReader<'a> {
    /// Create a reader positioned at bit 0
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            bits: data.view_bits::<Msb0>(),
            position: 0,
        }
    }

    /// Underlying buffer
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Absolute bit position
    pub fn bit_position(&self) -> usize {
        self.position
    }

    /// Byte containing the current bit position
    pub fn byte_position(&self) -> usize {
        self.position / 8
    }

    /// Move to an absolute bit position
    pub fn seek_to_bit(&mut self, bit: usize) {
        self.position = bit;
    }

    /// Move to the start of an absolute byte offset
    pub fn seek_to_byte(&mut self, byte: usize) {
        self.position = byte * 8;
    }

    /// Skip forward to the next byte boundary
    pub fn align_to_byte(&mut self) {
        self.position = self.position.div_ceil(8) * 8;
    }

    fn ensure_bits(&self, count: usize) -> BTreeResult<()> {
        if self.position + count > self.bits.len() {
            return Err(BTreeError::UnexpectedEof {
                bit_position: self.position,
            });
        }
        Ok(())
    }

    /// Read an unsigned field of `count` bits (1..=32)
    pub fn read_bits(&mut self, count: u32) -> BTreeResult<u32> {
        check_width(count)?;
        let end = self.position + count as usize;
        self.ensure_bits(count as usize)?;
        let value = self.bits[self.position..end].load_be::<u32>();
        self.position = end;
        Ok(value)
    }

    /// Read a single bit as a boolean
    pub fn read_bool_bit(&mut self) -> BTreeResult<bool> {
        self.ensure_bits(1)?;
        let bit = self.bits[self.position];
        self.position += 1;
        Ok(bit)
    }

    /// Read eight bits
    pub fn read_byte(&mut self) -> BTreeResult<u8> {
        Ok(self.read_bits(8)? as u8)
    }

    /// Look at the next byte without consuming it
    pub fn peek_byte(&self) -> Option<u8> {
        if self.position % 8 != 0 {
            return None;
        }
        self.data.get(self.position / 8).copied()
    }

    /// Borrow `len` bytes from a byte-aligned position
    pub fn read_bytes(&mut self, len: usize) -> BTreeResult<&'a [u8]> {
        if self.position % 8 != 0 {
            return Err(BTreeError::Unsupported("unaligned byte slice read"));
        }
        self.ensure_bits(len * 8)?;
        let start = self.position / 8;
        self.position += len * 8;
        Ok(&self.data[start..start + len])
    }

    /// Read a variable-length integer
    ///
    /// The number of leading one bits in the first byte is the number of
    /// continuation bytes.
    pub fn read_varint(&mut self) -> BTreeResult<u32> {
        let offset = self.byte_position();
        let first = self.read_byte()?;
        if first > 0xF0 {
            return Err(BTreeError::InvalidVarInt { offset });
        }

        let mut mask: u64 = 0x80;
        let mut value = u64::from(first);
        while value & mask != 0 {
            value = ((value - mask) << 8) | u64::from(self.read_byte()?);
            mask <<= 7;
        }
        u32::try_from(value).map_err(|_| BTreeError::InvalidVarInt { offset })
    }

    /// Read a varint length followed by that many raw bytes
    pub fn read_prefixed_string(&mut self) -> BTreeResult<&'a [u8]> {
        let len = self.read_varint()? as usize;
        self.read_bytes(len)
    }
}

/// Positionable writer over an owned, growable buffer
///
/// Writes overwrite existing bits, which is how headers are backpatched
/// after the body has been laid out. The buffer always holds whole bytes.
#[derive(Debug, Clone, Default)]
pub struct BitWriter {
    bits: BitVec<u8, Msb0>,
    position: usize,
}

impl BitWriter {
    /// Create an empty writer
    pub fn new() -> Self {
        Self::default()
    }

    /// Absolute bit position
    pub fn bit_position(&self) -> usize {
        self.position
    }

    /// Byte containing the current bit position
    pub fn byte_position(&self) -> usize {
        self.position / 8
    }

    /// Bytes written so far (including padding)
    pub fn len(&self) -> usize {
        self.bits.len() / 8
    }

    /// Whether nothing has been written yet
    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    /// Move to an absolute bit position
    pub fn seek_to_bit(&mut self, bit: usize) {
        self.position = bit;
    }

    /// Move to the start of an absolute byte offset
    pub fn seek_to_byte(&mut self, byte: usize) {
        self.position = byte * 8;
    }

    fn grow_to(&mut self, bytes: usize) {
        if self.bits.len() < bytes * 8 {
            self.bits.resize(bytes * 8, false);
        }
    }

    /// Skip forward to the next byte boundary, zero-filling
    pub fn align_to_byte(&mut self) {
        self.position = self.position.div_ceil(8) * 8;
        self.grow_to(self.position / 8);
    }

    /// Zero-pad up to the next multiple of `alignment` bytes
    pub fn align_to(&mut self, alignment: usize) {
        self.align_to_byte();
        let target = (self.position / 8).next_multiple_of(alignment);
        self.grow_to(target);
        self.position = target * 8;
    }

    /// Write the low `count` bits of `value` (1..=32)
    pub fn write_bits(&mut self, count: u32, value: u32) -> BTreeResult<()> {
        check_width(count)?;
        if value & !low_mask(count) != 0 {
            return Err(BTreeError::InvalidArgument(format!(
                "value {value} does not fit in {count} bits"
            )));
        }
        let end = self.position + count as usize;
        self.grow_to(end.div_ceil(8));
        self.bits[self.position..end].store_be(value);
        self.position = end;
        Ok(())
    }

    /// Write a single bit
    pub fn write_bool_bit(&mut self, value: bool) -> BTreeResult<()> {
        self.grow_to((self.position + 1).div_ceil(8));
        self.bits.set(self.position, value);
        self.position += 1;
        Ok(())
    }

    /// Write eight bits
    pub fn write_byte(&mut self, value: u8) -> BTreeResult<()> {
        self.write_bits(8, u32::from(value))
    }

    /// Write raw bytes
    pub fn write_bytes(&mut self, bytes: &[u8]) -> BTreeResult<()> {
        if self.position % 8 != 0 {
            for &byte in bytes {
                self.write_byte(byte)?;
            }
            return Ok(());
        }
        let start = self.position / 8;
        let end = start + bytes.len();
        self.grow_to(end);
        self.bits.as_raw_mut_slice()[start..end].copy_from_slice(bytes);
        self.position = end * 8;
        Ok(())
    }

    /// Write a variable-length integer in its shortest form
    pub fn write_varint(&mut self, value: u32) -> BTreeResult<()> {
        let [b0, b1, b2, b3] = value.to_be_bytes();
        match varint_size(value) {
            1 => self.write_byte(b3),
            2 => self.write_bytes(&[b2 | 0x80, b3]),
            3 => self.write_bytes(&[b1 | 0xC0, b2, b3]),
            4 => self.write_bytes(&[b0 | 0xE0, b1, b2, b3]),
            _ => self.write_bytes(&[0xF0, b0, b1, b2, b3]),
        }
    }

    /// Write a varint length followed by the raw bytes
    pub fn write_prefixed_string(&mut self, bytes: &[u8]) -> BTreeResult<()> {
        let len = u32::try_from(bytes.len()).map_err(|_| {
            BTreeError::InvalidArgument(format!("string of {} bytes is too long", bytes.len()))
        })?;
        self.write_varint(len)?;
        self.write_bytes(bytes)
    }

    /// Borrow the written bytes
    pub fn as_slice(&self) -> &[u8] {
        self.bits.as_raw_slice()
    }

    /// Consume the writer, returning the buffer
    pub fn into_inner(self) -> Vec<u8> {
        self.bits.into_vec()
    }
}
