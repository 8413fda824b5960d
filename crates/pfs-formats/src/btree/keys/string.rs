//! Interned strings for the name and extension pools

use std::cmp::Ordering;
use std::fmt;

use crate::btree::bitstream::{BitReader, BitWriter};
use crate::btree::error::{BTreeError, BTreeResult};
use crate::btree::key::{BTreeKey, KeyContext};
use crate::btree::utils::prefixed_string_size;

const SENTINEL_BYTE: u8 = 0xFF;

/// Escaped sentinel in index payloads: zero length, then 0xFF
const SENTINEL_INDEX_SIZE: usize = 2;

/// A string pool entry, ordered by bytes with length as the tie-break
///
/// The ordinal of a string in its pool tree is the index that file entries
/// store.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct StringKey {
    value: Vec<u8>,
}

/// Separator read back from an index entry
enum IndexValue<'a> {
    Bytes(&'a [u8]),
    Sentinel,
}

impl StringKey {
    /// Create a key from raw bytes
    pub fn new(value: impl Into<Vec<u8>>) -> Self {
        Self {
            value: value.into(),
        }
    }

    /// The maximal string, greater than any UTF-8 name
    pub fn sentinel() -> Self {
        Self::new(vec![SENTINEL_BYTE])
    }

    /// Whether this is the maximal sentinel
    pub fn is_sentinel(&self) -> bool {
        self.value == [SENTINEL_BYTE]
    }

    /// Raw bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.value
    }

    /// Value as UTF-8, if valid
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.value).ok()
    }

    fn read_index_value<'a>(reader: &mut BitReader<'a>) -> BTreeResult<IndexValue<'a>> {
        let len = reader.read_varint()? as usize;
        if len == 0 && reader.peek_byte() == Some(SENTINEL_BYTE) {
            reader.read_byte()?;
            return Ok(IndexValue::Sentinel);
        }
        Ok(IndexValue::Bytes(reader.read_bytes(len)?))
    }
}

impl From<&str> for StringKey {
    fn from(value: &str) -> Self {
        Self::new(value.as_bytes())
    }
}

impl From<String> for StringKey {
    fn from(value: String) -> Self {
        Self::new(value.into_bytes())
    }
}

impl fmt::Display for StringKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_str() {
            Some(s) => f.write_str(s),
            None => write!(f, "0x{}", hex::encode(&self.value)),
        }
    }
}

impl BTreeKey for StringKey {
    fn deserialize(reader: &mut BitReader<'_>, _ctx: &KeyContext) -> BTreeResult<Self> {
        Ok(Self::new(reader.read_prefixed_string()?))
    }

    fn serialize(&self, writer: &mut BitWriter) -> BTreeResult<()> {
        writer.write_prefixed_string(&self.value)
    }

    fn serialize_index(&self, writer: &mut BitWriter) -> BTreeResult<()> {
        if self.is_sentinel() {
            return writer.write_bytes(&[0, SENTINEL_BYTE]);
        }
        writer.write_prefixed_string(&self.value)
    }

    fn serialized_key_size(&self) -> usize {
        prefixed_string_size(self.value.len())
    }

    fn serialized_index_size(&self) -> usize {
        if self.is_sentinel() {
            SENTINEL_INDEX_SIZE
        } else {
            prefixed_string_size(self.value.len())
        }
    }

    fn last_index() -> Self {
        Self::sentinel()
    }

    fn compare_get_diff(&self, next: &Self) -> BTreeResult<Self> {
        match self.value.cmp(&next.value) {
            Ordering::Less => {}
            Ordering::Equal => {
                return Err(BTreeError::InvalidArgument(format!(
                    "cannot separate duplicate string keys {self}"
                )));
            }
            Ordering::Greater => {
                return Err(BTreeError::InvalidArgument(format!(
                    "string keys out of order: {self} > {next}"
                )));
            }
        }

        // next is strictly greater, so it is longer than the common prefix
        let common = self
            .value
            .iter()
            .zip(&next.value)
            .take_while(|(a, b)| a == b)
            .count();
        Ok(Self::new(&next.value[..=common]))
    }

    fn key_cmp(&self, other: &Self) -> Ordering {
        self.value.cmp(&other.value)
    }

    fn index_ordinal(&self, collection_ordinal: u32) -> u32 {
        collection_ordinal
    }

    fn sentinel_ordinal(keys: &[Self], _ctx: &KeyContext) -> u32 {
        u32::try_from(keys.len()).unwrap_or(u32::MAX)
    }

    fn compare_payload(&self, reader: &mut BitReader<'_>) -> BTreeResult<Ordering> {
        let value = reader.read_prefixed_string()?;
        Ok(self.value.as_slice().cmp(value))
    }

    fn compare_index(&self, _ordinal: u32, reader: &mut BitReader<'_>) -> BTreeResult<Ordering> {
        match Self::read_index_value(reader)? {
            IndexValue::Sentinel if self.is_sentinel() => Ok(Ordering::Equal),
            IndexValue::Sentinel => Ok(Ordering::Less),
            IndexValue::Bytes(bytes) => Ok(self.value.as_slice().cmp(bytes)),
        }
    }

    fn skip_index(reader: &mut BitReader<'_>) -> BTreeResult<()> {
        Self::read_index_value(reader).map(|_| ())
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    fn diff(a: &str, b: &str) -> String {
        StringKey::from(a)
            .compare_get_diff(&StringKey::from(b))
            .unwrap()
            .to_string()
    }

    #[test]
    fn test_order_uses_length_as_tie_break() {
        let mut keys = vec![
            StringKey::from("ab"),
            StringKey::from("a"),
            StringKey::from("b"),
            StringKey::from("aa"),
        ];
        keys.sort_by(StringKey::key_cmp);
        let names: Vec<String> = keys.iter().map(ToString::to_string).collect();
        assert_eq!(names, ["a", "aa", "ab", "b"]);
    }

    #[test]
    fn test_separator_first_difference() {
        assert_eq!(diff("apple", "apricot"), "apr");
        assert_eq!(diff("car", "cat"), "cat");
        assert_eq!(diff("a", "b"), "b");
    }

    #[test]
    fn test_separator_prefix_case() {
        assert_eq!(diff("car", "cars"), "cars");
        assert_eq!(diff("", "x"), "x");
        assert_eq!(diff("ab", "abcdef"), "abc");
    }

    #[test]
    fn test_separator_rejects_equal_and_reversed() {
        let a = StringKey::from("same");
        assert!(matches!(
            a.compare_get_diff(&a.clone()),
            Err(BTreeError::InvalidArgument(_))
        ));
        assert!(matches!(
            StringKey::from("b").compare_get_diff(&StringKey::from("a")),
            Err(BTreeError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_sentinel_index_escape() {
        let mut writer = BitWriter::new();
        StringKey::sentinel().serialize_index(&mut writer).unwrap();
        StringKey::from("zz").serialize_index(&mut writer).unwrap();
        writer.write_varint(7).unwrap();
        let data = writer.into_inner();
        assert_eq!(&data[..2], &[0x00, 0xFF]);
        assert_eq!(StringKey::sentinel().serialized_index_size(), 2);

        let mut reader = BitReader::new(&data);
        assert_eq!(
            StringKey::from("zz").compare_index(0, &mut reader).unwrap(),
            Ordering::Less
        );
        assert_eq!(
            StringKey::from("zz").compare_index(0, &mut reader).unwrap(),
            Ordering::Equal
        );
        assert_eq!(reader.read_varint().unwrap(), 7);
    }

    #[test]
    fn test_empty_separator_is_not_sentinel() {
        let mut writer = BitWriter::new();
        StringKey::from("").serialize_index(&mut writer).unwrap();
        writer.write_varint(3).unwrap();
        let data = writer.into_inner();

        let mut reader = BitReader::new(&data);
        StringKey::skip_index(&mut reader).unwrap();
        assert_eq!(reader.read_varint().unwrap(), 3);
    }

    #[test]
    fn test_display_non_utf8() {
        assert_eq!(StringKey::sentinel().to_string(), "0xff");
        assert_eq!(StringKey::from("bgm").to_string(), "bgm");
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn separator_is_shortest_between(
                a in prop::collection::vec(any::<u8>(), 0..12),
                b in prop::collection::vec(any::<u8>(), 0..12),
            ) {
                prop_assume!(a != b);
                let (low, high) = if a < b { (a, b) } else { (b, a) };
                let low = StringKey::new(low);
                let high = StringKey::new(high);

                let sep = low.compare_get_diff(&high).unwrap();
                prop_assert!(low < sep);
                prop_assert!(sep <= high);

                // The one-shorter prefix of the separator no longer clears `low`.
                let shorter = StringKey::new(&sep.as_bytes()[..sep.as_bytes().len() - 1]);
                prop_assert!(shorter <= low);
            }
        }
    }
}
