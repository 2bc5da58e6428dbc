//! Backup packs: portable, checksummed archives of one game and its snapshots
//!
//! A pack is two nested zips. The outer one is stored uncompressed and holds
//! exactly two entries:
//!
//! ```text
//! data      inner archive (deflate, level 9)
//! checksum  CRC32 of `data` as a decimal string
//! ```
//!
//! The inner archive holds the ROM under the game's name, the optional
//! save RAM as `<name>.sav`, `manifest.json`, and for each snapshot its state
//! at `snapshots/<hash>.ss` and its cover at `snapshots/<hash>.jpg`.
//!
//! The checksum is verified before anything inside `data` is read.

mod archive;
mod export;
mod import;
mod manifest;

#[cfg(test)]
mod tests;

pub use archive::{ArchiveEntry, ArchiveReader, Packing, crc32, write_archive};
pub use export::{SnapshotSelection, encode_pack, export_pack};
pub use import::{ImportReport, PackContents, PackSnapshot, decode_pack, import_pack};
pub use manifest::{Manifest, ManifestSnapshot};

use retroshell_shared::ids::sanitize_entry_name;

pub const DATA_ENTRY: &str = "data";
pub const CHECKSUM_ENTRY: &str = "checksum";
pub const MANIFEST_ENTRY: &str = "manifest.json";

/// Inner path of the ROM for a game called `name`.
pub fn rom_entry(name: &str) -> String {
    sanitize_entry_name(name)
}

fn sav_entry(name: &str) -> String {
    format!("{}.sav", rom_entry(name))
}

fn snapshot_data_entry(hash: &str) -> String {
    format!("snapshots/{}.ss", hash)
}

fn snapshot_cover_entry(hash: &str) -> String {
    format!("snapshots/{}.jpg", hash)
}
