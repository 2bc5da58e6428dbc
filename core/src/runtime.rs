//! Session runtime context
//!
//! [`SessionRuntime`] ties one [`EmulatorSession`] to the library store. An
//! application creates one at startup and passes it to whatever needs to
//! launch games or manage snapshots; tests build as many isolated ones as
//! they like.

use std::sync::Arc;

use tracing::{info, warn};

use retroshell_shared::{Game, GameUpdate, NewSnapshot, content_hash, now_millis};

use crate::audio::AudioContext;
use crate::backup::{ImportReport, SnapshotSelection, export_pack, import_pack};
use crate::catalog;
use crate::config::Config;
use crate::cover::encode_cover;
use crate::emulator::{CoreFactory, RenderTarget};
use crate::error::RuntimeError;
use crate::session::EmulatorSession;
use crate::store::SessionStore;

pub struct SessionRuntime<S: SessionStore> {
    config: Config,
    factory: Arc<dyn CoreFactory>,
    session: EmulatorSession,
    store: S,
    /// Game whose core is installed
    current: Option<String>,
}

impl<S: SessionStore> SessionRuntime<S> {
    pub fn new(config: Config, factory: Arc<dyn CoreFactory>, audio: AudioContext, store: S) -> Self {
        let session = EmulatorSession::new(
            factory.clone(),
            audio,
            config.audio.clone(),
            config.pacer.clone(),
        );
        Self {
            config,
            factory,
            session,
            store,
            current: None,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn session(&self) -> &EmulatorSession {
        &self.session
    }

    /// Direct access for play/pause, input and mute.
    pub fn session_mut(&mut self) -> &mut EmulatorSession {
        &mut self.session
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn current_game(&self) -> Option<&str> {
        self.current.as_deref()
    }

    fn quality(&self) -> u8 {
        self.config.library.cover_quality()
    }

    /// Install a stored game and start playing it.
    ///
    /// Whatever was playing before is ended first, so its save RAM is kept.
    pub fn launch(&mut self, game_id: &str, render_target: RenderTarget) -> Result<(), RuntimeError> {
        let game = self
            .store
            .get_game(game_id)?
            .ok_or_else(|| RuntimeError::GameNotFound(game_id.to_string()))?;
        self.end_play()?;

        self.session
            .install(game.rom, render_target, game.sav, None)?;
        self.current = Some(game.id.clone());

        let started = self.session.play().map_err(RuntimeError::from).and_then(|()| {
            self.store
                .update_game(
                    &game.id,
                    GameUpdate {
                        last_play_time: Some(now_millis()),
                        ..Default::default()
                    },
                )
                .map_err(RuntimeError::from)
        });
        if let Err(e) = started {
            self.session.uninstall();
            self.current = None;
            return Err(e);
        }
        info!("Launched {}", game.name);
        Ok(())
    }

    /// Write the running game's save RAM back to the library and uninstall.
    ///
    /// Does nothing when no game is installed. The core is released even if
    /// saving fails.
    pub fn end_play(&mut self) -> Result<(), RuntimeError> {
        let Some(game_id) = self.current.take() else {
            self.session.uninstall();
            return Ok(());
        };

        let saved = self
            .session
            .pause()
            .and_then(|()| self.session.create_sav())
            .map_err(RuntimeError::from)
            .and_then(|sav| {
                self.store
                    .update_game(
                        &game_id,
                        GameUpdate {
                            sav: sav.map(Some),
                            last_play_time: Some(now_millis()),
                            ..Default::default()
                        },
                    )
                    .map_err(RuntimeError::from)
            });
        self.session.uninstall();
        if let Err(e) = &saved {
            warn!("Could not save {}: {}", game_id, e);
        }
        saved
    }

    /// Store the running game's state with a cover of the current frame.
    ///
    /// Returns `None` when an identical state is already stored for the game.
    pub fn save_snapshot(&mut self, name: &str) -> Result<Option<u64>, RuntimeError> {
        let game_id = self.current.clone().ok_or(RuntimeError::NotPlaying)?;
        let data = self.session.take_snapshot()?;

        let hash = content_hash(&data);
        if self.store.snapshot_hashes(&game_id)?.contains(&hash) {
            info!("Snapshot {} is already stored", hash);
            return Ok(None);
        }

        let cover = match self.session.capture_frame()? {
            Some(frame) => match encode_cover(&frame, self.quality()) {
                Ok(Some(jpeg)) => jpeg,
                Ok(None) => Vec::new(),
                Err(e) => {
                    warn!("Could not encode snapshot cover: {}", e);
                    Vec::new()
                }
            },
            None => Vec::new(),
        };

        let id = self.store.insert_snapshot(NewSnapshot::new(
            game_id,
            name,
            now_millis(),
            data,
            cover,
        ))?;
        info!("Saved snapshot {} ({})", id, name);
        Ok(Some(id))
    }

    /// Restore a stored snapshot of the running game.
    pub fn load_snapshot(&mut self, id: u64) -> Result<(), RuntimeError> {
        let game_id = self.current.as_deref().ok_or(RuntimeError::NotPlaying)?;
        let snapshot = self
            .store
            .get_snapshot(id)?
            .ok_or(RuntimeError::SnapshotNotFound(id))?;
        if snapshot.game_id != game_id {
            return Err(RuntimeError::SnapshotMismatch {
                snapshot: id,
                game_id: snapshot.game_id,
            });
        }
        self.session.restore_snapshot(&snapshot.data)?;
        Ok(())
    }

    pub fn export(&self, game_id: &str, selection: &SnapshotSelection) -> Result<Vec<u8>, RuntimeError> {
        Ok(export_pack(&self.store, game_id, selection)?)
    }

    pub fn import(&mut self, pack: &[u8]) -> Result<ImportReport, RuntimeError> {
        let quality = self.quality();
        Ok(import_pack(&mut self.store, self.factory.as_ref(), quality, pack)?)
    }

    pub fn add_rom(&mut self, rom: Vec<u8>, name_hint: Option<&str>) -> Result<Game, RuntimeError> {
        let quality = self.quality();
        let (game, _) =
            catalog::add_rom(&mut self.store, self.factory.as_ref(), quality, rom, name_hint)?;
        Ok(game)
    }

    /// Delete a game and its snapshots. A game that is being played is refused.
    pub fn delete_game(&mut self, game_id: &str) -> Result<bool, RuntimeError> {
        if self.current.as_deref() == Some(game_id) {
            return Err(RuntimeError::GameInUse(game_id.to_string()));
        }
        catalog::delete_game(&mut self.store, game_id)
    }

    pub fn list_games(&self) -> Result<Vec<Game>, RuntimeError> {
        catalog::list_games(&self.store)
    }
}
