//! Library operations that only need the store
//!
//! Used by [`SessionRuntime`](crate::runtime::SessionRuntime) and directly by
//! tools that manage the library without running a core.

use std::cmp::Reverse;

use tracing::info;

use retroshell_shared::{Game, content_hash};

use crate::emulator::MetadataSource;
use crate::error::RuntimeError;
use crate::store::{ALL_TABLES, SessionStore, Tables, transact};

const UNTITLED: &str = "Untitled";

/// Add a ROM to the library.
///
/// The name comes from the ROM's metadata, then `name_hint`. Adding a ROM
/// that is already stored changes nothing; the stored row is returned with
/// `false`.
pub fn add_rom<S, M>(
    store: &mut S,
    metadata: &M,
    jpeg_quality: u8,
    rom: Vec<u8>,
    name_hint: Option<&str>,
) -> Result<(Game, bool), RuntimeError>
where
    S: SessionStore + ?Sized,
    M: MetadataSource + ?Sized,
{
    if let Some(existing) = store.get_game(&content_hash(&rom))? {
        info!("{} is already in the library", existing.name);
        return Ok((existing, false));
    }

    let meta = metadata.extract_metadata(&rom, jpeg_quality)?;
    let name = [meta.name.as_str(), name_hint.unwrap_or_default()]
        .into_iter()
        .map(str::trim)
        .find(|n| !n.is_empty())
        .unwrap_or(UNTITLED)
        .to_string();

    let game = Game::new(rom, name, meta.cover);
    let created = store.insert_game(game.clone())?;
    info!("Added {} ({})", game.name, game.id);
    Ok((game, created))
}

/// Delete a game and all of its snapshots in one transaction.
///
/// Returns `false` if the game did not exist.
pub fn delete_game<S: SessionStore + ?Sized>(
    store: &mut S,
    game_id: &str,
) -> Result<bool, RuntimeError> {
    let deleted = transact(store, ALL_TABLES, |tx| {
        for snapshot in tx.snapshots_for_game(game_id)? {
            tx.delete_snapshot(snapshot.id)?;
        }
        tx.delete_game(game_id)
    })?;
    if deleted {
        info!("Deleted game {}", game_id);
    }
    Ok(deleted)
}

/// Games, most recently played first; never-played games by newest added.
pub fn list_games<T: Tables + ?Sized>(store: &T) -> Result<Vec<Game>, RuntimeError> {
    let mut games = store.all_games()?;
    games.sort_by_key(|g| (Reverse(g.last_play_time), Reverse(g.create_time)));
    Ok(games)
}
