//! Retroshell CLI - Manage the retroshell game library
//!
//! # Commands
//!
//! - `retroshell add <rom>` - Add a ROM to the library
//! - `retroshell list` - List games, most recently played first
//! - `retroshell export <game-id> -o <file>` - Write a backup pack
//! - `retroshell import <file>` - Import a backup pack
//! - `retroshell verify <file>` - Check a backup pack without importing it
//! - `retroshell delete <game-id>` - Delete a game and its snapshots
//! - `retroshell config` - Print the effective configuration
//!
//! `--store <path>` points any command at another library file.

mod library;
mod pack;

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use retroshell_core::config::{self, Config};
use retroshell_core::store::FileStore;

/// Retroshell CLI - Manage the retroshell game library
#[derive(Parser)]
#[command(name = "retroshell")]
#[command(about = "Manage the retroshell game library and backup packs")]
#[command(version)]
struct Cli {
    /// Library store file (defaults to the platform data directory)
    #[arg(long, global = true, value_name = "PATH")]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a ROM to the library
    Add(library::AddArgs),

    /// List games in the library
    List,

    /// Export a game and its snapshots as a backup pack
    Export(pack::ExportArgs),

    /// Import a backup pack into the library
    Import(pack::ImportArgs),

    /// Check a backup pack's integrity without importing it
    Verify(pack::VerifyArgs),

    /// Delete a game and all of its snapshots
    Delete(library::DeleteArgs),

    /// Print the effective configuration as TOML
    Config,
}

/// Settings shared by every command.
pub struct Context {
    pub config: Config,
    pub store_path: Option<PathBuf>,
}

impl Context {
    pub fn open_store(&self) -> Result<FileStore> {
        let path = self
            .store_path
            .clone()
            .context("No store path; pass --store or set library.store_path")?;
        FileStore::open(&path).with_context(|| format!("Failed to open store {}", path.display()))
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = config::load();
    let store_path = cli.store.or_else(|| config.library.store_path());
    let ctx = Context { config, store_path };

    match cli.command {
        Commands::Add(args) => library::add(&ctx, args),
        Commands::List => library::list(&ctx),
        Commands::Export(args) => pack::export(&ctx, args),
        Commands::Import(args) => pack::import(&ctx, args),
        Commands::Verify(args) => pack::verify(args),
        Commands::Delete(args) => library::delete(&ctx, args),
        Commands::Config => {
            print!("{}", config::to_toml(&ctx.config)?);
            Ok(())
        }
    }
}
