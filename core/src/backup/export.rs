use tracing::info;

use retroshell_shared::{Game, Snapshot};

use super::archive::{ArchiveEntry, Packing, crc32, write_archive};
use super::manifest::{Manifest, ManifestSnapshot};
use super::{
    CHECKSUM_ENTRY, DATA_ENTRY, MANIFEST_ENTRY, rom_entry, sav_entry, snapshot_cover_entry,
    snapshot_data_entry,
};
use crate::error::BackupError;
use crate::store::Tables;

/// Which snapshots of a game go into a pack.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SnapshotSelection {
    #[default]
    All,
    /// Only snapshots with these content hashes
    Only(Vec<String>),
}

/// Build a pack from a game and the snapshots to include.
pub fn encode_pack(game: &Game, snapshots: &[Snapshot]) -> Result<Vec<u8>, BackupError> {
    let manifest = Manifest {
        name: game.name.clone(),
        id: game.id.clone(),
        snapshots: snapshots
            .iter()
            .map(|s| ManifestSnapshot {
                name: s.name.clone(),
                time: s.time,
                hash: s.hash.clone(),
            })
            .collect(),
    };

    let mut entries = vec![(rom_entry(&game.name), ArchiveEntry::Bytes(game.rom.clone()))];
    if let Some(sav) = &game.sav {
        entries.push((sav_entry(&game.name), ArchiveEntry::Bytes(sav.clone())));
    }
    for snapshot in snapshots {
        entries.push((
            snapshot_data_entry(&snapshot.hash),
            ArchiveEntry::Bytes(snapshot.data.clone()),
        ));
        entries.push((
            snapshot_cover_entry(&snapshot.hash),
            ArchiveEntry::Bytes(snapshot.cover.clone()),
        ));
    }
    entries.push((
        MANIFEST_ENTRY.to_string(),
        ArchiveEntry::Json(serde_json::to_value(&manifest)?),
    ));

    let inner = write_archive(entries, Packing::Deflated)?;
    let checksum = crc32(&inner);
    write_archive(
        vec![
            (DATA_ENTRY.to_string(), ArchiveEntry::Bytes(inner)),
            (
                CHECKSUM_ENTRY.to_string(),
                ArchiveEntry::Text(checksum.to_string()),
            ),
        ],
        Packing::Stored,
    )
}

/// Export a stored game and the selected snapshots.
pub fn export_pack<T: Tables + ?Sized>(
    tables: &T,
    game_id: &str,
    selection: &SnapshotSelection,
) -> Result<Vec<u8>, BackupError> {
    let game = tables
        .get_game(game_id)?
        .ok_or_else(|| BackupError::GameNotFound(game_id.to_string()))?;
    let stored = tables.snapshots_for_game(game_id)?;

    let snapshots = match selection {
        SnapshotSelection::All => stored,
        SnapshotSelection::Only(hashes) => {
            if let Some(missing) = hashes.iter().find(|h| !stored.iter().any(|s| &s.hash == *h)) {
                return Err(BackupError::MissingEntry(format!(
                    "snapshot {} of game {}",
                    missing, game_id
                )));
            }
            stored
                .into_iter()
                .filter(|s| hashes.contains(&s.hash))
                .collect()
        }
    };

    let pack = encode_pack(&game, &snapshots)?;
    info!(
        "Exported {} with {} snapshots ({} bytes)",
        game.name,
        snapshots.len(),
        pack.len()
    );
    Ok(pack)
}
