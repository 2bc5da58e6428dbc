use retroshell_shared::{Game, NewSnapshot, content_hash};

use super::*;
use crate::error::BackupError;
use crate::store::{MemoryStore, Tables};
use crate::test_utils::{FAKE_COVER, FakeCoreFactory};

const QUALITY: u8 = 75;

fn library_with_game(rom: &[u8], snapshots: &[&[u8]]) -> (MemoryStore, Game) {
    let mut store = MemoryStore::new();
    let mut game = Game::new(rom.to_vec(), "Hero Quest", b"cover".to_vec());
    game.sav = Some(vec![0xAB; 16]);
    store.insert_game(game.clone()).unwrap();
    for (i, data) in snapshots.iter().enumerate() {
        store
            .insert_snapshot(NewSnapshot::new(
                &game.id,
                format!("slot {}", i),
                1_000 + i as i64,
                data.to_vec(),
                vec![0xFF, 0xD8, i as u8],
            ))
            .unwrap();
    }
    (store, game)
}

fn outer_entries(pack: &[u8]) -> (Vec<u8>, String) {
    let mut outer = ArchiveReader::open(pack, "pack").unwrap();
    let data = outer.require(DATA_ENTRY).unwrap();
    let checksum = String::from_utf8(outer.require(CHECKSUM_ENTRY).unwrap()).unwrap();
    (data, checksum)
}

fn rewrap(data: Vec<u8>, checksum: String) -> Vec<u8> {
    write_archive(
        vec![
            (DATA_ENTRY.to_string(), ArchiveEntry::Bytes(data)),
            (CHECKSUM_ENTRY.to_string(), ArchiveEntry::Text(checksum)),
        ],
        Packing::Stored,
    )
    .unwrap()
}

#[test]
fn checksum_matches_data_entry() {
    let (store, game) = library_with_game(b"Hero Quest rom", &[b"state-1"]);
    let pack = export_pack(&store, &game.id, &SnapshotSelection::All).unwrap();

    let (data, checksum) = outer_entries(&pack);
    assert_eq!(checksum, crc32(&data).to_string());
}

#[test]
fn inner_layout() {
    let (store, game) = library_with_game(b"Hero Quest rom", &[b"state-1"]);
    let pack = export_pack(&store, &game.id, &SnapshotSelection::All).unwrap();
    let (data, _) = outer_entries(&pack);

    let hash = content_hash(b"state-1");
    let mut inner = ArchiveReader::open(&data, "data").unwrap();
    assert_eq!(inner.require("Hero Quest").unwrap(), b"Hero Quest rom");
    assert_eq!(inner.require("Hero Quest.sav").unwrap(), vec![0xAB; 16]);
    assert_eq!(
        inner.require(&format!("snapshots/{}.ss", hash)).unwrap(),
        b"state-1"
    );
    assert_eq!(
        inner.require(&format!("snapshots/{}.jpg", hash)).unwrap(),
        vec![0xFF, 0xD8, 0]
    );

    let manifest: Manifest =
        serde_json::from_slice(&inner.require(MANIFEST_ENTRY).unwrap()).unwrap();
    assert_eq!(manifest.name, "Hero Quest");
    assert_eq!(manifest.id, game.id);
    assert_eq!(
        manifest.snapshots,
        vec![ManifestSnapshot {
            name: "slot 0".into(),
            time: 1_000,
            hash,
        }]
    );
}

#[test]
fn any_flipped_data_byte_is_corrupt() {
    let (store, game) = library_with_game(b"Hero Quest rom", &[b"state-1"]);
    let pack = export_pack(&store, &game.id, &SnapshotSelection::All).unwrap();
    let (data, checksum) = outer_entries(&pack);

    for index in [0, data.len() / 2, data.len() - 1] {
        let mut tampered = data.clone();
        tampered[index] ^= 0x01;
        let pack = rewrap(tampered, checksum.clone());

        let mut target = MemoryStore::new();
        let result = import_pack(&mut target, &FakeCoreFactory::new(), QUALITY, &pack);
        assert!(
            matches!(result, Err(BackupError::CorruptArchive(_))),
            "byte {} flipped: {:?}",
            index,
            result
        );
        assert!(target.all_games().unwrap().is_empty());
    }
}

#[test]
fn flipped_byte_in_raw_pack_is_corrupt() {
    let (store, game) = library_with_game(b"Hero Quest rom", &[b"state-1"]);
    let mut pack = export_pack(&store, &game.id, &SnapshotSelection::All).unwrap();
    let (data, _) = outer_entries(&pack);

    // The outer archive is stored, so `data` appears verbatim
    let start = pack
        .windows(data.len())
        .position(|w| w == data.as_slice())
        .unwrap();
    pack[start + data.len() / 3] ^= 0x80;

    let result = decode_pack(&pack);
    assert!(matches!(result, Err(BackupError::CorruptArchive(_))));
}

#[test]
fn unreadable_checksum_is_corrupt() {
    let (store, game) = library_with_game(b"Hero Quest rom", &[]);
    let pack = export_pack(&store, &game.id, &SnapshotSelection::All).unwrap();
    let (data, _) = outer_entries(&pack);

    let result = decode_pack(&rewrap(data, "not-a-crc".into()));
    assert!(matches!(result, Err(BackupError::CorruptArchive(_))));
}

#[test]
fn missing_checksum_entry() {
    let pack = write_archive(
        vec![(DATA_ENTRY.to_string(), ArchiveEntry::Bytes(vec![1, 2, 3]))],
        Packing::Stored,
    )
    .unwrap();
    assert!(matches!(
        decode_pack(&pack),
        Err(BackupError::MissingEntry(_))
    ));
}

#[test]
fn manifest_must_match_rom() {
    let rom = b"Hero Quest rom".to_vec();
    let manifest = Manifest {
        name: "Hero Quest".into(),
        id: content_hash(b"some other rom"),
        snapshots: Vec::new(),
    };
    let inner = write_archive(
        vec![
            ("Hero Quest".into(), ArchiveEntry::Bytes(rom)),
            (
                MANIFEST_ENTRY.into(),
                ArchiveEntry::Json(serde_json::to_value(&manifest).unwrap()),
            ),
        ],
        Packing::Deflated,
    )
    .unwrap();
    let checksum = crc32(&inner).to_string();

    let result = decode_pack(&rewrap(inner, checksum));
    assert!(matches!(result, Err(BackupError::CorruptArchive(_))));
}

#[test]
fn export_then_import_into_fresh_store_is_idempotent() {
    let (store, game) = library_with_game(b"Hero Quest rom", &[b"state-1"]);
    let h = game.id.clone();
    let h1 = content_hash(b"state-1");
    let pack = export_pack(&store, &h, &SnapshotSelection::All).unwrap();

    let factory = FakeCoreFactory::new();
    let mut fresh = MemoryStore::new();

    let report = import_pack(&mut fresh, &factory, QUALITY, &pack).unwrap();
    assert_eq!(
        report,
        ImportReport {
            game_id: h.clone(),
            name: "Hero Quest rom".into(),
            game_created: true,
            snapshots_imported: 1,
            snapshots_skipped: 0,
        }
    );

    let games = fresh.all_games().unwrap();
    assert_eq!(games.len(), 1);
    assert_eq!(games[0].id, h);
    assert_eq!(games[0].cover, FAKE_COVER);
    assert_eq!(games[0].sav, Some(vec![0xAB; 16]));
    let snaps = fresh.snapshots_for_game(&h).unwrap();
    assert_eq!(snaps.len(), 1);
    assert_eq!(snaps[0].hash, h1);
    assert_eq!(snaps[0].game_id, h);
    assert_eq!(snaps[0].name, "slot 0");

    let again = import_pack(&mut fresh, &factory, QUALITY, &pack).unwrap();
    assert!(!again.game_created);
    assert_eq!(again.snapshots_imported, 0);
    assert_eq!(again.snapshots_skipped, 1);
    assert_eq!(fresh.all_games().unwrap().len(), 1);
    assert_eq!(fresh.snapshots_for_game(&h).unwrap().len(), 1);
}

#[test]
fn import_adds_only_unknown_snapshots() {
    let (store, game) = library_with_game(b"Hero Quest rom", &[b"state-1", b"state-2"]);
    let first = export_pack(
        &store,
        &game.id,
        &SnapshotSelection::Only(vec![content_hash(b"state-1")]),
    )
    .unwrap();
    let both = export_pack(&store, &game.id, &SnapshotSelection::All).unwrap();

    let factory = FakeCoreFactory::new();
    let mut target = MemoryStore::new();
    import_pack(&mut target, &factory, QUALITY, &first).unwrap();
    let report = import_pack(&mut target, &factory, QUALITY, &both).unwrap();

    assert_eq!(report.snapshots_imported, 1);
    assert_eq!(report.snapshots_skipped, 1);
    let hashes = target.snapshot_hashes(&game.id).unwrap();
    assert!(hashes.contains(&content_hash(b"state-2")));
    assert_eq!(hashes.len(), 2);
}

#[test]
fn unknown_snapshot_selection() {
    let (store, game) = library_with_game(b"Hero Quest rom", &[b"state-1"]);
    let result = export_pack(
        &store,
        &game.id,
        &SnapshotSelection::Only(vec![content_hash(b"nope")]),
    );
    assert!(matches!(result, Err(BackupError::MissingEntry(_))));
}

#[test]
fn unknown_game() {
    let store = MemoryStore::new();
    let result = export_pack(&store, "missing", &SnapshotSelection::All);
    assert!(matches!(result, Err(BackupError::GameNotFound(_))));
}

#[test]
fn rejected_rom_writes_nothing() {
    let (store, game) = library_with_game(b"BAD rom", &[b"state-1"]);
    let pack = export_pack(&store, &game.id, &SnapshotSelection::All).unwrap();

    let mut target = MemoryStore::new();
    let result = import_pack(&mut target, &FakeCoreFactory::new(), QUALITY, &pack);
    assert!(matches!(result, Err(BackupError::Core(_))));
    assert!(target.all_games().unwrap().is_empty());
}

#[test]
fn unsafe_names_are_sanitized() {
    let mut store = MemoryStore::new();
    let game = Game::new(b"Dual rom".to_vec(), "Disk 1/2", Vec::new());
    store.insert_game(game.clone()).unwrap();

    let pack = export_pack(&store, &game.id, &SnapshotSelection::All).unwrap();
    let contents = decode_pack(&pack).unwrap();
    assert_eq!(contents.manifest.name, "Disk 1/2");
    assert_eq!(contents.rom, b"Dual rom");
    assert!(contents.sav.is_none());

    let (data, _) = outer_entries(&pack);
    let mut inner = ArchiveReader::open(&data, "data").unwrap();
    assert!(inner.read("Disk 1_2").unwrap().is_some());
}
