//! Library tables persisted to a single file

use std::ffi::OsString;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use retroshell_shared::{Game, GameUpdate, NewSnapshot, Snapshot};

use super::memory::{Db, DbImage, run};
use super::{SessionStore, Table, Tables, TransactionFn};
use crate::error::StoreError;

pub const STORE_MAGIC: [u8; 4] = *b"RSDB";
pub const STORE_VERSION: u32 = 1;

const HEADER_LEN: usize = 8;

/// Tables kept in memory and rewritten to disk after every change.
///
/// Layout: `RSDB`, a little-endian `u32` version, then the bitcode-encoded
/// tables. Writes go to `<file>.tmp` first and are renamed over the old file,
/// so a crash leaves either the previous or the new contents.
pub struct FileStore {
    path: PathBuf,
    db: Db,
}

impl FileStore {
    /// Open the store at `path`. A missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let mut file = match fs::File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No store at {}, starting empty", path.display());
                return Ok(Self {
                    path,
                    db: Db::default(),
                });
            }
            Err(e) => return Err(e.into()),
        };

        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;
        let db = decode(&bytes)?;
        info!("Opened library store {}", path.display());
        Ok(Self { path, db })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write<T>(
        &mut self,
        op: impl FnOnce(&mut dyn Tables) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let path = &self.path;
        run(&mut self.db, None, op, |db| flush(path, db))
    }
}

fn decode(bytes: &[u8]) -> Result<Db, StoreError> {
    if bytes.len() < HEADER_LEN {
        return Err(StoreError::Decode("file is too short".to_string()));
    }
    let (header, body) = bytes.split_at(HEADER_LEN);
    if header[..4] != STORE_MAGIC {
        return Err(StoreError::Decode("bad magic".to_string()));
    }
    let mut version = [0u8; 4];
    version.copy_from_slice(&header[4..]);
    let version = u32::from_le_bytes(version);
    if version != STORE_VERSION {
        return Err(StoreError::Decode(format!(
            "unsupported version {} (expected {})",
            version, STORE_VERSION
        )));
    }

    let image: DbImage =
        bitcode::decode(body).map_err(|e| StoreError::Decode(e.to_string()))?;
    Db::from_image(image)
}

fn encode(db: &Db) -> Vec<u8> {
    let body = bitcode::encode(&db.to_image());
    let mut out = Vec::with_capacity(HEADER_LEN + body.len());
    out.extend_from_slice(&STORE_MAGIC);
    out.extend_from_slice(&STORE_VERSION.to_le_bytes());
    out.extend_from_slice(&body);
    out
}

fn flush(path: &Path, db: &Db) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let tmp_path = match path.file_name() {
        Some(name) => {
            let mut tmp_name = OsString::from(name);
            tmp_name.push(".tmp");
            path.with_file_name(tmp_name)
        }
        None => {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "store path has no file name",
            )
            .into());
        }
    };

    {
        let mut f = fs::File::create(&tmp_path)?;
        f.write_all(&encode(db))?;
        f.sync_all()?;
    }

    #[cfg(windows)]
    {
        if path.exists() {
            // Windows rename fails if destination exists.
            fs::remove_file(path)?;
        }
    }

    fs::rename(&tmp_path, path)?;
    Ok(())
}

impl Tables for FileStore {
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

    fn insert_snapshots(&mut self, snapshots: Vec<NewSnapshot>) -> Result<Vec<u64>, StoreError> {
        self.write(|t| t.insert_snapshots(snapshots))
    }

    fn delete_snapshot(&mut self, id: u64) -> Result<bool, StoreError> {
        self.write(|t| t.delete_snapshot(id))
    }
}

impl SessionStore for FileStore {
    fn transaction(&mut self, tables: &[Table], f: &mut TransactionFn<'_>) -> Result<(), StoreError> {
        let path = &self.path;
        run(&mut self.db, Some(tables), f, |db| flush(path, db))
    }
}
