//! Library commands - add, list and delete games

use std::fs;
use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::Args;
use retroshell_core::Tables;
use retroshell_core::catalog;
use retroshell_core::emulator::InesProbe;
use retroshell_shared::Game;

use crate::Context;

/// Arguments for the add command
#[derive(Args)]
pub struct AddArgs {
    /// ROM file (.nes)
    pub rom: PathBuf,

    /// Display name (defaults to the file name)
    #[arg(long)]
    pub name: Option<String>,
}

/// Arguments for the delete command
#[derive(Args)]
pub struct DeleteArgs {
    /// Game id (content hash of the ROM), or a unique prefix of it
    pub game_id: String,
}

pub fn add(ctx: &Context, args: AddArgs) -> Result<()> {
    let rom = fs::read(&args.rom)
        .with_context(|| format!("Failed to read ROM: {}", args.rom.display()))?;
    let hint = args.name.or_else(|| {
        args.rom
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
    });

    let mut store = ctx.open_store()?;
    let (game, created) = catalog::add_rom(
        &mut store,
        &InesProbe,
        ctx.config.library.cover_quality(),
        rom,
        hint.as_deref(),
    )
    .with_context(|| format!("Failed to add {}", args.rom.display()))?;

    if created {
        println!("Added {} ({})", game.name, game.id);
    } else {
        println!("Already in library: {} ({})", game.name, game.id);
    }
    Ok(())
}

pub fn list(ctx: &Context) -> Result<()> {
    let store = ctx.open_store()?;
    let games = catalog::list_games(&store)?;
    if games.is_empty() {
        println!("Library is empty");
        return Ok(());
    }

    for game in &games {
        let snapshots = store.snapshots_for_game(&game.id)?.len();
        println!(
            "{}  {}  [{} snapshots, last played {}]",
            short_id(&game.id),
            game.name,
            snapshots,
            format_time(game.last_play_time)
        );
    }
    Ok(())
}

pub fn delete(ctx: &Context, args: DeleteArgs) -> Result<()> {
    let mut store = ctx.open_store()?;
    let game = resolve_game(&catalog::list_games(&store)?, &args.game_id)?;
    catalog::delete_game(&mut store, &game.id)?;
    println!("Deleted {} ({})", game.name, game.id);
    Ok(())
}

/// Find the one game whose id starts with `query`.
pub fn resolve_game(games: &[Game], query: &str) -> Result<Game> {
    let mut matches = games.iter().filter(|g| g.id.starts_with(query));
    let Some(first) = matches.next() else {
        anyhow::bail!("No game matches '{}'", query);
    };
    if matches.next().is_some() {
        anyhow::bail!("'{}' matches more than one game; use a longer id", query);
    }
    Ok(first.clone())
}

fn short_id(id: &str) -> &str {
    id.get(..12).unwrap_or(id)
}

fn format_time(millis: Option<i64>) -> String {
    millis
        .and_then(chrono::DateTime::<chrono::Utc>::from_timestamp_millis)
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "never".to_string())
}
