#![allow(clippy::expect_used, clippy::panic)]

//! Dump the trees and files of a plaintext TOC.
//!
//! Usage:
//!   RUST_LOG=pfs_formats=debug cargo run --example dump_toc -p pfs-formats -- <toc.bin>
//!
//! Without an argument a small demo TOC is built and dumped instead.

use pfs_formats::btree::{BTreeKey, FileInfoKey, TreeHeader};
use pfs_formats::toc::{Toc, TocBuilder};
use tracing_subscriber::EnvFilter;

fn demo_toc() -> Vec<u8> {
    let mut builder = TocBuilder::new();
    for i in 0..300 {
        builder.add_file(
            format!("data/model/unit_{i:03}.mdl"),
            FileInfoKey::compressed(0, 512 + i, 2048 + i * 4, i / 8),
        );
    }
    builder.add_file("data/sound/title.ogg", FileInfoKey::new(0, 90_000, 40));
    builder.add_file("boot.ini", FileInfoKey::new(0, 128, 41));
    builder.build().expect("failed to build demo TOC")
}

fn describe(label: &str, header: &TreeHeader, keys: usize) {
    println!(
        "{label:<12} pages={:>4} index_pages={:>2} first_offset={:>7} keys={keys}",
        header.page_count, header.index_page_count, header.first_offset,
    );
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let data = match std::env::args().nth(1) {
        Some(path) => std::fs::read(&path).unwrap_or_else(|e| panic!("failed to read {path}: {e}")),
        None => demo_toc(),
    };
    let toc = Toc::parse(&data).expect("failed to parse TOC");

    println!("=== Trees ===");
    let names = toc.name_tree();
    describe(
        "names",
        &names.header().expect("name tree header"),
        names.key_count().expect("name count"),
    );
    let extensions = toc.extension_tree();
    describe(
        "extensions",
        &extensions.header().expect("extension tree header"),
        extensions.key_count().expect("extension count"),
    );
    let infos = toc.file_info_tree();
    describe(
        "file infos",
        &infos.header().expect("file info tree header"),
        infos.key_count().expect("file info count"),
    );
    for index in 0..toc.entry_tree_count() {
        let tree = toc.entry_tree(index).expect("entry tree");
        describe(
            &format!("dir #{index}"),
            &tree.header().expect("entry tree header"),
            tree.key_count().expect("entry count"),
        );
    }

    println!("\n=== Files ===");
    let files = toc.walk().expect("failed to walk TOC");
    for file in files.iter().take(20) {
        let info = &file.info;
        println!(
            "{:>6} flags={} size={:>8}/{:<8} segment={:>5}  {}",
            info.file_index,
            info.flags,
            info.compressed_size,
            info.uncompressed_size,
            info.segment_index,
            file.path,
        );
    }
    if files.len() > 20 {
        println!("... and {} more", files.len() - 20);
    }

    // Every walked path must resolve through the index to the same record.
    let mut pass = 0u32;
    let mut fail = 0u32;
    for file in &files {
        match toc.find_file(&file.path) {
            Ok(Some(info)) if info == file.info => pass += 1,
            _ => fail += 1,
        }
    }
    println!("\nLookup check: {pass} passed, {fail} failed");

    // Rebuilding the name pool from its own keys must reproduce it exactly.
    let mut names = toc.name_tree();
    names.load().expect("failed to load name pool");
    let sorted = names.keys().windows(2).all(|w| w[0].key_cmp(&w[1]).is_lt());
    let rebuilt = names.serialize().expect("failed to rebuild name pool");
    let original = &data[toc.header().name_tree_offset as usize..][..rebuilt.len()];
    println!(
        "Name pool: sorted={sorted} rebuild_identical={}",
        rebuilt == original
    );
}
