//! Key variants stored in TOC trees
//!
//! - **String pool**: [`StringKey`], used for both the name and extension
//!   pools. Ordinals into these pools are what file entries store.
//! - **File info**: [`FileInfoKey`], one size and segment record per file.
//! - **File entry**: [`FileEntryKey`], one record per name in a directory.

mod file_entry;
mod file_info;
mod string;

pub use file_entry::{EntryFlags, FileEntryKey};
pub use file_info::{FileInfoFlags, FileInfoKey};
pub use string::StringKey;
