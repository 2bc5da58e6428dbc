//! Library records persisted by the session store.

use bitcode::{Decode, Encode};

use crate::hash::content_hash;

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// A cartridge in the library.
///
/// `id` is the content hash of `rom`, so adding the same ROM twice resolves
/// to the same row.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct Game {
    pub id: String,
    pub rom: Vec<u8>,
    /// Battery-backed cartridge RAM, written back after each play session
    pub sav: Option<Vec<u8>>,
    /// JPEG cover image (may be empty when the core could not render one)
    pub cover: Vec<u8>,
    pub name: String,
    pub create_time: i64,
    pub last_play_time: Option<i64>,
}

impl Game {
    /// Build a new record, deriving the id from the ROM bytes.
    pub fn new(rom: Vec<u8>, name: impl Into<String>, cover: Vec<u8>) -> Self {
        Self {
            id: content_hash(&rom),
            rom,
            sav: None,
            cover,
            name: name.into(),
            create_time: now_millis(),
            last_play_time: None,
        }
    }

    /// Apply a partial update in place.
    pub fn merge(&mut self, update: GameUpdate) {
        if let Some(name) = update.name {
            self.name = name;
        }
        if let Some(sav) = update.sav {
            self.sav = sav;
        }
        if let Some(cover) = update.cover {
            self.cover = cover;
        }
        if let Some(time) = update.last_play_time {
            self.last_play_time = Some(time);
        }
    }
}

/// Partial update for a [`Game`] row. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GameUpdate {
    pub name: Option<String>,
    /// `Some(None)` clears the save RAM
    pub sav: Option<Option<Vec<u8>>>,
    pub cover: Option<Vec<u8>>,
    pub last_play_time: Option<i64>,
}

/// A stored save state. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct Snapshot {
    /// Auto-increment row id assigned by the store
    pub id: u64,
    pub game_id: String,
    pub name: String,
    pub time: i64,
    pub data: Vec<u8>,
    pub cover: Vec<u8>,
    /// Content hash of `data`
    pub hash: String,
}

/// A snapshot that has not been assigned a row id yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSnapshot {
    pub game_id: String,
    pub name: String,
    pub time: i64,
    pub data: Vec<u8>,
    pub cover: Vec<u8>,
    pub hash: String,
}

impl NewSnapshot {
    /// Build a snapshot record, hashing the state bytes.
    pub fn new(
        game_id: impl Into<String>,
        name: impl Into<String>,
        time: i64,
        data: Vec<u8>,
        cover: Vec<u8>,
    ) -> Self {
        let hash = content_hash(&data);
        Self {
            game_id: game_id.into(),
            name: name.into(),
            time,
            data,
            cover,
            hash,
        }
    }

    /// Attach a row id.
    pub fn with_id(self, id: u64) -> Snapshot {
        Snapshot {
            id,
            game_id: self.game_id,
            name: self.name,
            time: self.time,
            data: self.data,
            cover: self.cover,
            hash: self.hash,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn game_id_is_rom_hash() {
        let a = Game::new(vec![1, 2, 3], "a", Vec::new());
        let b = Game::new(vec![1, 2, 3], "b", Vec::new());
        assert_eq!(a.id, b.id);
        assert_eq!(a.id, content_hash(&[1, 2, 3]));
    }

    #[test]
    fn merge_only_touches_given_fields() {
        let mut game = Game::new(vec![9], "Old", vec![0xFF]);
        game.sav = Some(vec![1]);

        game.merge(GameUpdate {
            last_play_time: Some(42),
            ..Default::default()
        });
        assert_eq!(game.name, "Old");
        assert_eq!(game.sav, Some(vec![1]));
        assert_eq!(game.last_play_time, Some(42));

        game.merge(GameUpdate {
            sav: Some(None),
            name: Some("New".into()),
            ..Default::default()
        });
        assert_eq!(game.sav, None);
        assert_eq!(game.name, "New");
    }

    #[test]
    fn new_snapshot_hashes_data() {
        let snap = NewSnapshot::new("g", "slot", 1, vec![4, 5], Vec::new());
        assert_eq!(snap.hash, content_hash(&[4, 5]));
        let stored = snap.with_id(7);
        assert_eq!(stored.id, 7);
        assert_eq!(stored.game_id, "g");
    }
}
