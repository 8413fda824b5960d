#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]
//! Integration tests for building, parsing and resolving whole TOCs

use pfs_formats::btree::FileInfoKey;
use pfs_formats::toc::{Toc, TocBuilder, TocError};
use pretty_assertions::assert_eq;

fn volume_paths() -> Vec<String> {
    let mut paths = Vec::new();
    for zone in 0..12 {
        for tile in 0..150 {
            paths.push(format!("maps/zone{zone:02}/tile_{zone:02}_{tile:03}.map"));
        }
        paths.push(format!("maps/zone{zone:02}/zone.ini"));
    }
    paths.push("sound/bgm/title.ogg".to_string());
    paths.push("readme".to_string());
    paths
}

fn build_volume() -> (Vec<String>, Vec<u8>) {
    let paths = volume_paths();
    let mut builder = TocBuilder::new();
    for (i, path) in paths.iter().enumerate() {
        let size = i as u32 * 10 + 1;
        builder.add_file(path.as_str(), FileInfoKey::compressed(0, size, size * 2, i as u32));
    }
    let data = builder.build().unwrap_or_else(|e| panic!("build failed: {e}"));
    (paths, data)
}

#[test]
fn toc_walk_returns_every_path() {
    let (paths, data) = build_volume();
    let toc = Toc::parse(&data).unwrap();

    let mut walked: Vec<String> = toc.walk().unwrap().into_iter().map(|f| f.path).collect();
    walked.sort();
    let mut expected = paths;
    expected.sort();
    assert_eq!(walked, expected);
}

#[test]
fn toc_name_pool_needs_index() {
    let (_, data) = build_volume();
    let toc = Toc::parse(&data).unwrap();
    let header = toc.name_tree().header().unwrap();
    assert!(header.page_count >= 2, "name pool should span pages");
    assert!(header.index_page_count >= 1);
    assert!(toc.file_info_tree().header().unwrap().has_index());
}

#[test]
fn toc_find_every_file() {
    let (paths, data) = build_volume();
    let toc = Toc::parse(&data).unwrap();

    for (i, path) in paths.iter().enumerate() {
        let info = toc
            .find_file(path)
            .unwrap()
            .unwrap_or_else(|| panic!("{path} not found"));
        assert_eq!(info.compressed_size, i as u32 * 10 + 1, "{path}");
        assert_eq!(info.segment_index, i as u32, "{path}");
    }
}

#[test]
fn toc_find_agrees_with_walk() {
    let (_, data) = build_volume();
    let toc = Toc::parse(&data).unwrap();
    for file in toc.walk().unwrap().iter().step_by(41) {
        assert_eq!(toc.find_file(&file.path).unwrap().as_ref(), Some(&file.info));
    }
}

#[test]
fn toc_missing_paths() {
    let (_, data) = build_volume();
    let toc = Toc::parse(&data).unwrap();
    for path in [
        "maps/zone00/tile_00_150.map",
        "maps/zone00/tile_01_000.map",
        "maps/zone12/zone.ini",
        "maps/zone00",
        "sound/bgm/title.wav",
        "readme/more",
    ] {
        assert_eq!(toc.find_file(path).unwrap(), None, "{path}");
    }
}

#[test]
fn toc_corrupt_magic() {
    let (_, mut data) = build_volume();
    data[0] ^= 0xFF;
    assert!(matches!(Toc::parse(&data), Err(TocError::InvalidMagic(_))));
}

#[test]
fn toc_truncated_header() {
    let (_, data) = build_volume();
    assert!(matches!(Toc::parse(&data[..10]), Err(TocError::BinRw(_))));
}
