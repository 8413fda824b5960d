//! Size helpers shared by the page and index packers

/// Number of bytes needed to hold `bits` bits
pub const fn bytes_for_bits(bits: usize) -> usize {
    bits.div_ceil(8)
}

/// Encoded length of a variable-length integer
///
/// The encoder always picks the shortest form, so this is also the exact
/// number of bytes [`BitWriter::write_varint`](super::BitWriter::write_varint)
/// emits.
pub const fn varint_size(value: u32) -> usize {
    if value <= 0x7F {
        1
    } else if value <= 0x3FFF {
        2
    } else if value <= 0x001F_FFFF {
        3
    } else if value <= 0x0FFF_FFFF {
        4
    } else {
        5
    }
}

/// Encoded length of a varint-prefixed byte string
pub const fn prefixed_string_size(len: usize) -> usize {
    // Lengths beyond u32 are rejected by the writer; saturate the estimate.
    let prefix = if len > u32::MAX as usize {
        5
    } else {
        varint_size(len as u32)
    };
    prefix + len
}

/// Size of a page header holding `count` offsets plus the next-page offset
pub const fn page_header_size(count: usize) -> usize {
    bytes_for_bits(count * 12 + 24)
}
