//! Backup pack commands - export, import and verify

use std::fs;
use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::Args;
use retroshell_core::backup::{SnapshotSelection, decode_pack, export_pack, import_pack};
use retroshell_core::catalog;
use retroshell_core::emulator::InesProbe;

use crate::Context;
use crate::library::resolve_game;

/// Arguments for the export command
#[derive(Args)]
pub struct ExportArgs {
    /// Game id (content hash of the ROM), or a unique prefix of it
    pub game_id: String,

    /// Output file
    #[arg(short, long)]
    pub output: PathBuf,

    /// Only include the snapshot with this hash (repeatable; default: all)
    #[arg(long = "snapshot", value_name = "HASH")]
    pub snapshots: Vec<String>,
}

/// Arguments for the import command
#[derive(Args)]
pub struct ImportArgs {
    /// Backup pack to import
    pub file: PathBuf,
}

/// Arguments for the verify command
#[derive(Args)]
pub struct VerifyArgs {
    /// Backup pack to check
    pub file: PathBuf,
}

pub fn export(ctx: &Context, args: ExportArgs) -> Result<()> {
    let store = ctx.open_store()?;
    let game = resolve_game(&catalog::list_games(&store)?, &args.game_id)?;

    let selection = if args.snapshots.is_empty() {
        SnapshotSelection::All
    } else {
        SnapshotSelection::Only(args.snapshots)
    };
    let pack = export_pack(&store, &game.id, &selection)
        .with_context(|| format!("Failed to export {}", game.name))?;

    fs::write(&args.output, &pack)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;
    println!(
        "Exported {} to {} ({} bytes)",
        game.name,
        args.output.display(),
        pack.len()
    );
    Ok(())
}

pub fn import(ctx: &Context, args: ImportArgs) -> Result<()> {
    let bytes = fs::read(&args.file)
        .with_context(|| format!("Failed to read {}", args.file.display()))?;

    let mut store = ctx.open_store()?;
    let report = import_pack(
        &mut store,
        &InesProbe,
        ctx.config.library.cover_quality(),
        &bytes,
    )
    .with_context(|| format!("Failed to import {}", args.file.display()))?;

    let game = if report.game_created {
        "added"
    } else {
        "already present"
    };
    println!(
        "{} ({}): game {}, {} snapshots imported, {} already present",
        report.name, report.game_id, game, report.snapshots_imported, report.snapshots_skipped
    );
    Ok(())
}

pub fn verify(args: VerifyArgs) -> Result<()> {
    let bytes = fs::read(&args.file)
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    let contents = decode_pack(&bytes)
        .with_context(|| format!("{} is not a valid backup pack", args.file.display()))?;

    println!("OK: {}", args.file.display());
    println!("  Game:      {} ({})", contents.manifest.name, contents.manifest.id);
    println!("  ROM:       {} bytes", contents.rom.len());
    match &contents.sav {
        Some(sav) => println!("  Save RAM:  {} bytes", sav.len()),
        None => println!("  Save RAM:  none"),
    }
    println!("  Snapshots: {}", contents.snapshots.len());
    for snapshot in &contents.snapshots {
        println!("    {}  {}", snapshot.hash, snapshot.name);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use retroshell_core::Tables;
    use retroshell_core::config::Config;

    use super::*;
    use crate::library::{AddArgs, add};

    fn context(dir: &std::path::Path, name: &str) -> Context {
        Context {
            config: Config::default(),
            store_path: Some(dir.join(name)),
        }
    }

    #[test]
    fn add_export_verify_import() {
        let dir = tempfile::tempdir().unwrap();
        let rom_path = dir.path().join("cart.nes");
        let mut rom = b"NES\x1a".to_vec();
        rom.extend_from_slice(&[0x11; 32]);
        fs::write(&rom_path, &rom).unwrap();

        let source = context(dir.path(), "source.rsdb");
        add(
            &source,
            AddArgs {
                rom: rom_path,
                name: None,
            },
        )
        .unwrap();
        let game = catalog::list_games(&source.open_store().unwrap()).unwrap()[0].clone();
        assert_eq!(game.name, "cart");

        let pack_path = dir.path().join("cart.pack");
        export(
            &source,
            ExportArgs {
                game_id: game.id[..10].to_string(),
                output: pack_path.clone(),
                snapshots: Vec::new(),
            },
        )
        .unwrap();
        verify(VerifyArgs {
            file: pack_path.clone(),
        })
        .unwrap();

        let target = context(dir.path(), "target.rsdb");
        import(&target, ImportArgs { file: pack_path }).unwrap();
        let store = target.open_store().unwrap();
        let imported = store.get_game(&game.id).unwrap().unwrap();
        assert_eq!(imported.rom, rom);
        assert_eq!(imported.name, "cart");
    }

    #[test]
    fn verify_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("junk.pack");
        fs::write(&path, b"junk").unwrap();
        assert!(verify(VerifyArgs { file: path }).is_err());
    }
}
