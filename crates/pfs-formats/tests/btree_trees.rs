#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]
//! Integration tests for building and reading standalone B-trees
//!
//! Trees are built through the public engine, then decoded back through a
//! fresh engine over the encoded bytes, as a reader of a volume would.

use pfs_formats::btree::{
    BTree, BTreeError, BTreeKey, FileEntryKey, FileInfoKey, KeyContext, PAGE_SIZE, StringKey,
};
use pretty_assertions::assert_eq;

fn string_pool(count: usize) -> Vec<StringKey> {
    let mut keys: Vec<StringKey> = (0..count)
        .map(|i| StringKey::from(format!("textures/terrain/tile_{:04}_{}", i, i % 7).as_str()))
        .collect();
    keys.sort_by(StringKey::key_cmp);
    keys
}

fn build<K: BTreeKey>(keys: Vec<K>, ctx: KeyContext) -> Vec<u8> {
    BTree::with_keys(keys, ctx)
        .serialize()
        .unwrap_or_else(|e| panic!("serialize failed: {e}"))
}

#[test]
fn file_info_single_page() {
    let data = build(
        vec![
            FileInfoKey::new(5, 10, 0),
            FileInfoKey::new(9, 20, 0),
            FileInfoKey::new(100, 30, 0),
        ],
        KeyContext::new(),
    );

    let mut tree = BTree::<FileInfoKey>::new(&data, 0, KeyContext::new());
    let header = tree.header().unwrap();
    assert_eq!(header.page_count, 1);
    assert_eq!(header.first_offset, 6);
    assert_eq!(header.index_page_count, 0);

    tree.load().unwrap();
    let indices: Vec<u32> = tree.keys().iter().map(|k| k.file_index).collect();
    assert_eq!(indices, vec![5, 9, 100]);
}

#[test]
fn string_pool_index_chain() {
    let keys = string_pool(2000);
    let data = build(keys.clone(), KeyContext::new());
    assert_eq!(data.len() % 4, 0);

    let tree = BTree::<StringKey>::new(&data, 0, KeyContext::new());
    let header = tree.header().unwrap();
    assert!(header.page_count >= 2, "expected multiple pages");
    assert!(header.index_page_count >= 1, "expected an index");
    assert!(header.first_offset as usize > 6);

    for (ordinal, key) in keys.iter().enumerate() {
        let hit = tree
            .search_index_by_key(key)
            .unwrap()
            .unwrap_or_else(|| panic!("{key} not found"));
        assert_eq!(hit.ordinal, ordinal, "ordinal of {key}");
    }
}

#[test]
fn load_serialize_round_trip_preserves_bytes() {
    let keys = string_pool(3000);
    let first = build(keys, KeyContext::new());

    let mut tree = BTree::<StringKey>::new(&first, 0, KeyContext::new());
    tree.load().unwrap();
    let second = tree.serialize().unwrap();
    assert_eq!(first, second);
}

#[test]
fn find_by_ordinal_matches_load_order() {
    let keys = string_pool(2500);
    let data = build(keys, KeyContext::new());

    let mut tree = BTree::<StringKey>::new(&data, 0, KeyContext::new());
    tree.load().unwrap();
    let loaded = tree.keys().to_vec();
    for ordinal in (0..loaded.len()).step_by(97) {
        assert_eq!(
            tree.find_by_ordinal(ordinal).unwrap().as_ref(),
            Some(&loaded[ordinal])
        );
    }
}

#[test]
fn pages_stay_within_page_size() {
    let long_names: Vec<StringKey> = {
        let mut keys: Vec<StringKey> = (0..400)
            .map(|i| StringKey::new(format!("{i:05}{}", "x".repeat(200 + i % 150)).into_bytes()))
            .collect();
        keys.sort_by(StringKey::key_cmp);
        keys
    };
    let data = build(long_names.clone(), KeyContext::new());
    let tree = BTree::<StringKey>::new(&data, 0, KeyContext::new());

    let pages = tree.page_headers().unwrap();
    assert!(pages.len() > 10);
    for page in &pages {
        assert!(usize::from(page.next_offset) < PAGE_SIZE);
    }
    assert_eq!(tree.key_count().unwrap(), long_names.len());
}

#[test]
fn dense_file_infos_resolve_through_index() {
    let keys: Vec<FileInfoKey> = (0..5000)
        .map(|i| FileInfoKey::compressed(i, i * 3 + 1, i * 5 + 2, i / 16))
        .collect();
    let data = build(keys.clone(), KeyContext::new());
    let tree = BTree::<FileInfoKey>::new(&data, 0, KeyContext::new());
    assert!(tree.header().unwrap().has_index());

    for key in keys.iter().step_by(13) {
        let hit = tree
            .search_index_by_key(&FileInfoKey::with_index(key.file_index))
            .unwrap()
            .unwrap();
        assert_eq!(hit.ordinal, key.file_index as usize);
        assert_eq!(&hit.key, key);
    }
}

#[test]
fn file_entries_validate_against_context() {
    let entries = vec![FileEntryKey::directory(0, 1), FileEntryKey::file(2, 1, 0)];
    let data = build(entries.clone(), KeyContext::new());

    let ctx = KeyContext::new()
        .with_name_count(3)
        .with_extension_count(2)
        .with_file_count(1);
    let mut tree = BTree::<FileEntryKey>::new(&data, 0, ctx);
    tree.load().unwrap();
    assert_eq!(tree.keys(), entries.as_slice());

    let strict = KeyContext::new().with_name_count(2);
    let mut tree = BTree::<FileEntryKey>::new(&data, 0, strict);
    assert!(matches!(tree.load(), Err(BTreeError::CorruptIndex { .. })));
}

#[test]
fn oversized_key_fails_rebuild() {
    let keys = vec![StringKey::new(vec![b'a'; PAGE_SIZE])];
    assert!(matches!(
        BTree::with_keys(keys, KeyContext::new()).serialize(),
        Err(BTreeError::KeyTooLarge { ordinal: 0, .. })
    ));
}
