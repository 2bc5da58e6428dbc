use tracing::{debug, info};

use retroshell_shared::hash::{content_hash, is_content_hash};
use retroshell_shared::{Game, NewSnapshot};

use super::archive::{ArchiveReader, crc32};
use super::manifest::Manifest;
use super::{
    CHECKSUM_ENTRY, DATA_ENTRY, MANIFEST_ENTRY, rom_entry, sav_entry, snapshot_cover_entry,
    snapshot_data_entry,
};
use crate::emulator::MetadataSource;
use crate::error::BackupError;
use crate::store::{ALL_TABLES, SessionStore, transact};

/// Verified contents of a pack.
#[derive(Debug, Clone)]
pub struct PackContents {
    pub manifest: Manifest,
    pub rom: Vec<u8>,
    pub sav: Option<Vec<u8>>,
    pub snapshots: Vec<PackSnapshot>,
}

#[derive(Debug, Clone)]
pub struct PackSnapshot {
    pub name: String,
    pub time: i64,
    pub hash: String,
    pub data: Vec<u8>,
    pub cover: Vec<u8>,
}

/// Outcome of [`import_pack`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportReport {
    pub game_id: String,
    pub name: String,
    /// False when the game was already in the library
    pub game_created: bool,
    pub snapshots_imported: usize,
    /// Snapshots whose hash was already stored for the game
    pub snapshots_skipped: usize,
}

fn corrupt(msg: impl Into<String>) -> BackupError {
    BackupError::CorruptArchive(msg.into())
}

/// Check the outer checksum and return the inner archive bytes.
fn verified_data(bytes: &[u8]) -> Result<Vec<u8>, BackupError> {
    let mut outer = ArchiveReader::open(bytes, "pack")?;
    let data = outer.require(DATA_ENTRY)?;
    let checksum = outer.require(CHECKSUM_ENTRY)?;

    let expected: u32 = std::str::from_utf8(&checksum)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .ok_or_else(|| corrupt("checksum entry is not a number"))?;
    let actual = crc32(&data);
    if actual != expected {
        return Err(corrupt(format!(
            "checksum mismatch (stored {}, computed {})",
            expected, actual
        )));
    }
    Ok(data)
}

/// Verify a pack and read everything in it.
///
/// Nothing inside `data` is parsed until its checksum matches. The ROM and
/// every snapshot must hash to the identifiers the manifest gives them.
pub fn decode_pack(bytes: &[u8]) -> Result<PackContents, BackupError> {
    let data = verified_data(bytes)?;
    let mut inner = ArchiveReader::open(&data, "data")?;

    let manifest: Manifest = serde_json::from_slice(&inner.require(MANIFEST_ENTRY)?)?;
    if !is_content_hash(&manifest.id) {
        return Err(corrupt(format!("manifest id {:?} is not a hash", manifest.id)));
    }

    let rom = inner.require(&rom_entry(&manifest.name))?;
    if content_hash(&rom) != manifest.id {
        return Err(corrupt("ROM does not match the manifest id"));
    }
    let sav = inner.read(&sav_entry(&manifest.name))?;

    let mut snapshots = Vec::with_capacity(manifest.snapshots.len());
    for entry in &manifest.snapshots {
        if !is_content_hash(&entry.hash) {
            return Err(corrupt(format!("snapshot hash {:?} is not a hash", entry.hash)));
        }
        let data = inner.require(&snapshot_data_entry(&entry.hash))?;
        if content_hash(&data) != entry.hash {
            return Err(corrupt(format!("snapshot {} does not match its hash", entry.hash)));
        }
        let cover = inner
            .read(&snapshot_cover_entry(&entry.hash))?
            .unwrap_or_default();
        snapshots.push(PackSnapshot {
            name: entry.name.clone(),
            time: entry.time,
            hash: entry.hash.clone(),
            data,
            cover,
        });
    }

    Ok(PackContents {
        manifest,
        rom,
        sav,
        snapshots,
    })
}

/// Import a pack into `store`.
///
/// An existing game row is left untouched, and snapshots whose hash is
/// already stored for the game are skipped, so importing the same pack twice
/// changes nothing the second time. All rows are written in one transaction.
pub fn import_pack<S, M>(
    store: &mut S,
    metadata: &M,
    jpeg_quality: u8,
    bytes: &[u8],
) -> Result<ImportReport, BackupError>
where
    S: SessionStore + ?Sized,
    M: MetadataSource + ?Sized,
{
    let contents = decode_pack(bytes)?;
    let meta = metadata.extract_metadata(&contents.rom, jpeg_quality)?;

    let name = if meta.name.trim().is_empty() {
        contents.manifest.name.clone()
    } else {
        meta.name
    };
    let game_id = contents.manifest.id.clone();

    let mut game = Game::new(contents.rom, name.clone(), meta.cover);
    game.sav = contents.sav;
    let snapshots = contents.snapshots;

    let report = transact(store, ALL_TABLES, |tx| {
        let game_created = tx.insert_game(game)?;

        let mut known = tx.snapshot_hashes(&game_id)?;
        let mut fresh = Vec::new();
        let mut skipped = 0;
        for s in snapshots {
            if !known.insert(s.hash.clone()) {
                debug!("Skipping snapshot {}, already stored", s.hash);
                skipped += 1;
                continue;
            }
            fresh.push(NewSnapshot::new(&game_id, s.name, s.time, s.data, s.cover));
        }
        let imported = tx.insert_snapshots(fresh)?.len();

        Ok(ImportReport {
            game_id: game_id.clone(),
            name: name.clone(),
            game_created,
            snapshots_imported: imported,
            snapshots_skipped: skipped,
        })
    })?;

    info!(
        "Imported {} ({} new snapshots, {} skipped, game {})",
        report.name,
        report.snapshots_imported,
        report.snapshots_skipped,
        if report.game_created { "added" } else { "existing" }
    );
    Ok(report)
}
