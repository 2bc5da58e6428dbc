//! Game and snapshot tables
//!
//! [`Tables`] is the row-level contract; [`SessionStore`] adds all-or-nothing
//! transactions across both tables. Two implementations are provided: an
//! in-memory store for tests and tools, and a file-backed store for the
//! library on disk.

mod file;
mod memory;

pub use file::{FileStore, STORE_MAGIC, STORE_VERSION};
pub use memory::MemoryStore;

use retroshell_shared::{Game, GameUpdate, NewSnapshot, Snapshot};

use crate::error::StoreError;

/// Table names, used to declare the scope of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Games,
    Snapshots,
}

/// Row operations on the `games` and `snapshots` tables.
pub trait Tables {
    fn get_game(&self, id: &str) -> Result<Option<Game>, StoreError>;

    fn all_games(&self) -> Result<Vec<Game>, StoreError>;

    /// Insert a game. Returns `false` and changes nothing if the id exists.
    fn insert_game(&mut self, game: Game) -> Result<bool, StoreError>;

    /// Merge `update` into an existing game.
    fn update_game(&mut self, id: &str, update: GameUpdate) -> Result<(), StoreError>;

    /// Delete a game that has no snapshots left. Returns `false` if it did not exist.
    fn delete_game(&mut self, id: &str) -> Result<bool, StoreError>;

    fn get_snapshot(&self, id: u64) -> Result<Option<Snapshot>, StoreError>;

    /// Snapshots of one game, oldest first.
    fn snapshots_for_game(&self, game_id: &str) -> Result<Vec<Snapshot>, StoreError>;

    /// Insert a snapshot and return its new id.
    ///
    /// Fails with [`StoreError::Constraint`] if the game does not exist or
    /// already has a snapshot with the same hash.
    fn insert_snapshot(&mut self, snapshot: NewSnapshot) -> Result<u64, StoreError>;

    fn insert_snapshots(&mut self, snapshots: Vec<NewSnapshot>) -> Result<Vec<u64>, StoreError> {
        snapshots
            .into_iter()
            .map(|s| self.insert_snapshot(s))
            .collect()
    }

    /// Returns `false` if the snapshot did not exist.
    fn delete_snapshot(&mut self, id: u64) -> Result<bool, StoreError>;

    /// Hashes of every snapshot stored for a game.
    fn snapshot_hashes(&self, game_id: &str) -> Result<hashbrown::HashSet<String>, StoreError> {
        Ok(self
            .snapshots_for_game(game_id)?
            .into_iter()
            .map(|s| s.hash)
            .collect())
    }
}

/// Transaction body. Returning `Err` rolls back everything it did.
pub type TransactionFn<'f> = dyn FnMut(&mut dyn Tables) -> Result<(), StoreError> + 'f;

/// Durable storage for the library.
pub trait SessionStore: Tables {
    /// Run `f` with exclusive access to `tables`, atomically.
    ///
    /// Touching a table outside `tables` inside `f` is a constraint error.
    fn transaction(&mut self, tables: &[Table], f: &mut TransactionFn<'_>) -> Result<(), StoreError>;
}

/// Run a transaction that produces a value.
pub fn transact<S, T>(
    store: &mut S,
    tables: &[Table],
    f: impl FnOnce(&mut dyn Tables) -> Result<T, StoreError>,
) -> Result<T, StoreError>
where
    S: SessionStore + ?Sized,
{
    let mut f = Some(f);
    let mut output = None;
    store.transaction(tables, &mut |tx| {
        let f = f
            .take()
            .ok_or_else(|| StoreError::Aborted("transaction body ran twice".to_string()))?;
        output = Some(f(tx)?);
        Ok(())
    })?;
    output.ok_or_else(|| StoreError::Aborted("transaction body did not run".to_string()))
}

/// Both tables, for operations that span games and their snapshots.
pub const ALL_TABLES: &[Table] = &[Table::Games, Table::Snapshots];
