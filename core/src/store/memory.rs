//! In-memory tables with an undo journal

use std::collections::BTreeMap;

use bitcode::{Decode, Encode};
use tracing::debug;

use retroshell_shared::{Game, GameUpdate, NewSnapshot, Snapshot};

use super::{SessionStore, Table, Tables, TransactionFn};
use crate::error::StoreError;

/// Table contents shared by the memory and file stores.
#[derive(Debug, Clone)]
pub(super) struct Db {
    games: BTreeMap<String, Game>,
    snapshots: BTreeMap<u64, Snapshot>,
    next_snapshot_id: u64,
}

impl Default for Db {
    fn default() -> Self {
        Self {
            games: BTreeMap::new(),
            snapshots: BTreeMap::new(),
            next_snapshot_id: 1,
        }
    }
}

/// Flat form of [`Db`] written to disk.
#[derive(Encode, Decode)]
pub(super) struct DbImage {
    games: Vec<Game>,
    snapshots: Vec<Snapshot>,
    next_snapshot_id: u64,
}

impl Db {
    pub fn to_image(&self) -> DbImage {
        DbImage {
            games: self.games.values().cloned().collect(),
            snapshots: self.snapshots.values().cloned().collect(),
            next_snapshot_id: self.next_snapshot_id,
        }
    }

    /// Rebuild from an image, checking the rows are consistent.
    pub fn from_image(image: DbImage) -> Result<Self, StoreError> {
        let mut db = Db::default();
        for game in image.games {
            if db.games.insert(game.id.clone(), game).is_some() {
                return Err(StoreError::Decode("duplicate game id".to_string()));
            }
        }
        for snapshot in image.snapshots {
            if !db.games.contains_key(&snapshot.game_id) {
                return Err(StoreError::Decode(format!(
                    "snapshot {} references a missing game",
                    snapshot.id
                )));
            }
            if db.snapshots.insert(snapshot.id, snapshot).is_some() {
                return Err(StoreError::Decode("duplicate snapshot id".to_string()));
            }
        }
        let max_id = db.snapshots.keys().next_back().copied().unwrap_or(0);
        db.next_snapshot_id = image.next_snapshot_id.max(max_id + 1);
        Ok(db)
    }

    pub fn get_game(&self, id: &str) -> Option<Game> {
        self.games.get(id).cloned()
    }

    pub fn all_games(&self) -> Vec<Game> {
        self.games.values().cloned().collect()
    }

    pub fn get_snapshot(&self, id: u64) -> Option<Snapshot> {
        self.snapshots.get(&id).cloned()
    }

    pub fn snapshots_for_game(&self, game_id: &str) -> Vec<Snapshot> {
        self.snapshots
            .values()
            .filter(|s| s.game_id == game_id)
            .cloned()
            .collect()
    }

    /// Undo journal entries, newest last.
    pub fn rollback(&mut self, journal: Vec<Undo>) {
        for undo in journal.into_iter().rev() {
            match undo {
                Undo::GameInserted(id) => {
                    self.games.remove(&id);
                }
                Undo::GameChanged(game) | Undo::GameDeleted(game) => {
                    self.games.insert(game.id.clone(), game);
                }
                Undo::SnapshotInserted { id, next_id } => {
                    self.snapshots.remove(&id);
                    self.next_snapshot_id = next_id;
                }
                Undo::SnapshotDeleted(snapshot) => {
                    self.snapshots.insert(snapshot.id, snapshot);
                }
            }
        }
    }
}

/// How to reverse one change.
pub(super) enum Undo {
    GameInserted(String),
    GameChanged(Game),
    GameDeleted(Game),
    SnapshotInserted { id: u64, next_id: u64 },
    SnapshotDeleted(Snapshot),
}

/// Journaled, optionally scoped view of a [`Db`].
pub(super) struct TableView<'a> {
    db: &'a mut Db,
    scope: Option<&'a [Table]>,
    journal: Vec<Undo>,
}

impl<'a> TableView<'a> {
    fn new(db: &'a mut Db, scope: Option<&'a [Table]>) -> Self {
        Self {
            db,
            scope,
            journal: Vec::new(),
        }
    }

    fn check(&self, table: Table) -> Result<(), StoreError> {
        match self.scope {
            Some(scope) if !scope.contains(&table) => Err(StoreError::Constraint(format!(
                "{:?} table is outside the transaction",
                table
            ))),
            _ => Ok(()),
        }
    }
}

impl Tables for TableView<'_> {
    fn get_game(&self, id: &str) -> Result<Option<Game>, StoreError> {
        Ok(self.db.get_game(id))
    }

    fn all_games(&self) -> Result<Vec<Game>, StoreError> {
        Ok(self.db.all_games())
    }

    fn insert_game(&mut self, game: Game) -> Result<bool, StoreError> {
        self.check(Table::Games)?;
        if self.db.games.contains_key(&game.id) {
            return Ok(false);
        }
        self.journal.push(Undo::GameInserted(game.id.clone()));
        self.db.games.insert(game.id.clone(), game);
        Ok(true)
    }

    fn update_game(&mut self, id: &str, update: GameUpdate) -> Result<(), StoreError> {
        self.check(Table::Games)?;
        let game = self
            .db
            .games
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(format!("game {}", id)))?;
        self.journal.push(Undo::GameChanged(game.clone()));
        game.merge(update);
        Ok(())
    }

    fn delete_game(&mut self, id: &str) -> Result<bool, StoreError> {
        self.check(Table::Games)?;
        let orphans = self.db.snapshots.values().filter(|s| s.game_id == id).count();
        if orphans > 0 {
            return Err(StoreError::Constraint(format!(
                "game {} still has {} snapshots",
                id, orphans
            )));
        }
        match self.db.games.remove(id) {
            Some(game) => {
                self.journal.push(Undo::GameDeleted(game));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn get_snapshot(&self, id: u64) -> Result<Option<Snapshot>, StoreError> {
        Ok(self.db.get_snapshot(id))
    }

    fn snapshots_for_game(&self, game_id: &str) -> Result<Vec<Snapshot>, StoreError> {
        Ok(self.db.snapshots_for_game(game_id))
    }

    fn insert_snapshot(&mut self, snapshot: NewSnapshot) -> Result<u64, StoreError> {
        self.check(Table::Snapshots)?;
        if !self.db.games.contains_key(&snapshot.game_id) {
            return Err(StoreError::Constraint(format!(
                "snapshot references missing game {}",
                snapshot.game_id
            )));
        }
        let duplicate = self
            .db
            .snapshots
            .values()
            .any(|s| s.game_id == snapshot.game_id && s.hash == snapshot.hash);
        if duplicate {
            return Err(StoreError::Constraint(format!(
                "snapshot {} already stored for game {}",
                snapshot.hash, snapshot.game_id
            )));
        }

        let id = self.db.next_snapshot_id;
        self.journal.push(Undo::SnapshotInserted { id, next_id: id });
        self.db.next_snapshot_id += 1;
        self.db.snapshots.insert(id, snapshot.with_id(id));
        Ok(id)
    }

    fn delete_snapshot(&mut self, id: u64) -> Result<bool, StoreError> {
        self.check(Table::Snapshots)?;
        match self.db.snapshots.remove(&id) {
            Some(snapshot) => {
                self.journal.push(Undo::SnapshotDeleted(snapshot));
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Run `op` against `db`, then `commit`. Any failure undoes every change.
pub(super) fn run<T>(
    db: &mut Db,
    scope: Option<&[Table]>,
    op: impl FnOnce(&mut dyn Tables) -> Result<T, StoreError>,
    commit: impl FnOnce(&Db) -> Result<(), StoreError>,
) -> Result<T, StoreError> {
    let mut view = TableView::new(db, scope);
    let tables: &mut dyn Tables = &mut view;
    let result = op(tables);
    let journal = std::mem::take(&mut view.journal);
    drop(view);

    let result = result.and_then(|value| {
        if journal.is_empty() {
            return Ok(value);
        }
        commit(db).map(|()| value)
    });
    if result.is_err() && !journal.is_empty() {
        debug!("Rolling back {} store changes", journal.len());
        db.rollback(journal);
    }
    result
}

/// Tables held in memory only.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    db: Db,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn write<T>(
        &mut self,
        op: impl FnOnce(&mut dyn Tables) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        run(&mut self.db, None, op, |_| Ok(()))
    }
}

impl Tables for MemoryStore {
    fn get_game(&self, id: &str) -> Result<Option<Game>, StoreError> {
        Ok(self.db.get_game(id))
    }

    fn all_games(&self) -> Result<Vec<Game>, StoreError> {
        Ok(self.db.all_games())
    }

    fn insert_game(&mut self, game: Game) -> Result<bool, StoreError> {
        self.write(|t| t.insert_game(game))
    }

    fn update_game(&mut self, id: &str, update: GameUpdate) -> Result<(), StoreError> {
        self.write(|t| t.update_game(id, update))
    }

    fn delete_game(&mut self, id: &str) -> Result<bool, StoreError> {
        self.write(|t| t.delete_game(id))
    }

    fn get_snapshot(&self, id: u64) -> Result<Option<Snapshot>, StoreError> {
        Ok(self.db.get_snapshot(id))
    }

    fn snapshots_for_game(&self, game_id: &str) -> Result<Vec<Snapshot>, StoreError> {
        Ok(self.db.snapshots_for_game(game_id))
    }

    fn insert_snapshot(&mut self, snapshot: NewSnapshot) -> Result<u64, StoreError> {
        self.write(|t| t.insert_snapshot(snapshot))
    }

    // Bulk insert is all-or-nothing
    fn insert_snapshots(&mut self, snapshots: Vec<NewSnapshot>) -> Result<Vec<u64>, StoreError> {
        self.write(|t| t.insert_snapshots(snapshots))
    }

    fn delete_snapshot(&mut self, id: u64) -> Result<bool, StoreError> {
        self.write(|t| t.delete_snapshot(id))
    }
}

impl SessionStore for MemoryStore {
    fn transaction(&mut self, tables: &[Table], f: &mut TransactionFn<'_>) -> Result<(), StoreError> {
        run(&mut self.db, Some(tables), f, |_| Ok(()))
    }
}
