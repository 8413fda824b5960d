//! Binary search over the offset table of one page

use std::cmp::Ordering;

use crate::btree::bitstream::BitReader;
use crate::btree::error::BTreeResult;
use crate::btree::header::PageHeader;

/// How comparator results steer the search
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchPolicy {
    /// Find the first slot whose value is strictly greater than the query.
    /// Used to descend index blocks, whose entries are exclusive upper
    /// bounds of the pages they point at.
    LessThan,
    /// Find the slot equal to the query, or failing that the first slot
    /// greater than it. Used inside leaf pages.
    EqualTo,
}

/// Outcome of a page search
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchResult {
    /// Slot within the page (the lower bound of the search)
    pub slot: usize,
    /// Key count of the page
    pub upper_bound: usize,
    /// Whether the comparator reported equality at `slot`
    pub exact: bool,
    /// Absolute byte offset of the slot's payload
    pub payload_offset: usize,
}

/// Binary search a page with a caller-supplied comparator
///
/// The comparator is positioned at a slot's payload and returns
/// `query.cmp(payload)`, decoding only as much as it needs. Returns `None`
/// when the search converges past the last slot.
pub fn search_with_comparison<'a, F>(
    reader: &mut BitReader<'a>,
    page: &PageHeader,
    policy: SearchPolicy,
    mut compare: F,
) -> BTreeResult<Option<SearchResult>>
where
    F: FnMut(&mut BitReader<'a>) -> BTreeResult<Ordering>,
{
    let upper_bound = usize::from(page.key_count);
    let mut low = 0;
    let mut high = upper_bound;

    while low < high {
        let mid = low + (high - low) / 2;
        let payload_offset = page.start + page.key_offset(reader, mid)?;
        reader.seek_to_byte(payload_offset);
        let ord = compare(reader)?;

        match (policy, ord) {
            (SearchPolicy::EqualTo, Ordering::Equal) => {
                return Ok(Some(SearchResult {
                    slot: mid,
                    upper_bound,
                    exact: true,
                    payload_offset,
                }));
            }
            (_, Ordering::Less) => high = mid,
            (_, _) => low = mid + 1,
        }
    }

    if low >= upper_bound {
        return Ok(None);
    }
    let payload_offset = page.start + page.key_offset(reader, low)?;
    Ok(Some(SearchResult {
        slot: low,
        upper_bound,
        exact: false,
        payload_offset,
    }))
}
