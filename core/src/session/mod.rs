//! Emulator session state machine
//!
//! ```text
//! Uninstalled --install--> Installed --play--> Playing <--pause/play--> Paused
//!      ^                                                        |
//!      +--------------------------uninstall--------------------+
//! ```
//!
//! The session owns at most one core instance (on the core worker thread),
//! one audio bridge, and the worker's frame pacer. It is driven from the
//! control thread; status is shared with the worker so a failing frame can
//! drop the session back to `Paused` on its own.

mod keys;

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use tracing::{debug, info, warn};

use retroshell_shared::constants::FALLBACK_SAMPLE_RATE;
use retroshell_shared::{Button, KeyMask};

use crate::audio::{
    AudioBridgeStats, AudioContext, AudioNode, GainStage, audio_bridge, volume_to_gain,
};
use crate::config::{AudioConfig, PacerConfig};
use crate::emulator::{CoreFactory, CoreInit, Frame, RenderTarget};
use crate::error::{AudioError, SessionError};
use crate::handshake::{CancelToken, Signal, handshake};
use crate::input::{InputSource, KeySink};
use crate::pacer::FramePacer;
use crate::worker::{Command, WorkerHandle};

use keys::SourceKeys;

/// Lifecycle state of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionStatus {
    Uninstalled = 0,
    Installed = 1,
    Paused = 2,
    Playing = 3,
}

impl SessionStatus {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => SessionStatus::Installed,
            2 => SessionStatus::Paused,
            3 => SessionStatus::Playing,
            _ => SessionStatus::Uninstalled,
        }
    }

    /// Whether a core instance exists in this state.
    pub fn has_core(self) -> bool {
        self != SessionStatus::Uninstalled
    }
}

/// Session status readable and writable from both the control and worker threads.
#[derive(Debug, Clone)]
pub(crate) struct SharedStatus(Arc<AtomicU8>);

impl SharedStatus {
    fn new(status: SessionStatus) -> Self {
        Self(Arc::new(AtomicU8::new(status as u8)))
    }

    pub fn load(&self) -> SessionStatus {
        SessionStatus::from_u8(self.0.load(Ordering::Acquire))
    }

    fn store(&self, status: SessionStatus) {
        self.0.store(status as u8, Ordering::Release);
    }

    /// Move `from -> to` only if the status is still `from`.
    pub fn transition(&self, from: SessionStatus, to: SessionStatus) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// Resources that exist only while a core is installed.
struct LiveCore {
    worker: WorkerHandle,
    audio_node: Option<Box<dyn AudioNode>>,
    audio_stats: AudioBridgeStats,
    render_target: RenderTarget,
}

impl LiveCore {
    fn teardown(mut self) {
        // Freeing the core also closes the audio sink it owns
        self.worker.shutdown();
        if let Some(mut node) = self.audio_node.take() {
            node.disconnect();
        }
    }
}

/// One emulation session. Lives for the whole application; only the core
/// and audio resources are created and destroyed per install.
pub struct EmulatorSession {
    factory: Arc<dyn CoreFactory>,
    audio: AudioContext,
    audio_config: AudioConfig,
    pacer_config: PacerConfig,
    status: SharedStatus,
    muted: bool,
    volume: u8,
    gain: GainStage,
    keys: SourceKeys,
    cancel: CancelToken,
    live: Option<LiveCore>,
}

impl EmulatorSession {
    pub fn new(
        factory: Arc<dyn CoreFactory>,
        audio: AudioContext,
        audio_config: AudioConfig,
        pacer_config: PacerConfig,
    ) -> Self {
        let volume = audio_config.volume();
        Self {
            factory,
            audio,
            muted: audio_config.muted,
            volume,
            gain: GainStage::from_volume(volume),
            audio_config,
            pacer_config,
            status: SharedStatus::new(SessionStatus::Uninstalled),
            keys: SourceKeys::default(),
            cancel: CancelToken::new(),
            live: None,
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.status.load()
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn volume(&self) -> u8 {
        self.volume
    }

    /// Mask last forwarded to the core.
    pub fn key_state(&self) -> KeyMask {
        self.keys.combined()
    }

    /// Token that aborts an in-flight `install` when cancelled from another thread.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Health counters of the current audio bridge.
    pub fn audio_stats(&self) -> Option<AudioBridgeStats> {
        self.live.as_ref().map(|live| live.audio_stats.clone())
    }

    /// Render target of the installed core.
    pub fn render_target(&self) -> Option<&RenderTarget> {
        self.live.as_ref().map(|live| &live.render_target)
    }

    /// Create a core for `rom` and connect it to audio and `render_target`.
    ///
    /// Fails with [`SessionError::AlreadyInstalled`] if a core exists. A
    /// missing audio device is not an error; the session runs silent.
    pub fn install(
        &mut self,
        rom: Vec<u8>,
        render_target: RenderTarget,
        sav: Option<Vec<u8>>,
        debug_render_target: Option<RenderTarget>,
    ) -> Result<(), SessionError> {
        if self.live.is_some() {
            return Err(SessionError::AlreadyInstalled);
        }
        self.cancel.reset();
        let timeout = self.audio_config.handshake_timeout();

        // Audio first: the core must only get the sink once samples are pulled
        let backend = self.audio.backend();
        let sample_rate = backend
            .as_ref()
            .map(|b| b.sample_rate())
            .unwrap_or(FALLBACK_SAMPLE_RATE);
        let (audio_sink, renderer) = audio_bridge(
            self.audio_config.buffer_samples(sample_rate),
            self.gain.clone(),
        );
        let audio_stats = audio_sink.stats();

        let mut audio_node = None;
        if let Some(backend) = backend {
            let (ready, waiter) = handshake("audio callback");
            match backend.connect(renderer, ready) {
                Ok(node) => audio_node = Some(node),
                Err(AudioError::DeviceUnavailable(e)) => {
                    warn!("Audio device unavailable: {}. Continuing without audio.", e);
                }
                Err(e) => return Err(e.into()),
            }
            if let Some(node) = audio_node.as_mut()
                && let Err(e) = waiter.wait(timeout, &self.cancel)
            {
                node.disconnect();
                return Err(e.into());
            }
        }

        // Core worker next: wait for it before dispatching the payload
        let fail = |worker: Option<WorkerHandle>, audio_node: Option<Box<dyn AudioNode>>| {
            if let Some(mut worker) = worker {
                worker.shutdown();
            }
            if let Some(mut node) = audio_node {
                node.disconnect();
            }
        };
        let (worker, ready) = match WorkerHandle::spawn(
            self.factory.clone(),
            FramePacer::from_config(&self.pacer_config),
            self.status.clone(),
        ) {
            Ok(spawned) => spawned,
            Err(e) => {
                fail(None, audio_node);
                return Err(e);
            }
        };
        if let Err(e) = ready.wait(timeout, &self.cancel) {
            fail(Some(worker), audio_node);
            return Err(e.into());
        }

        let init = CoreInit {
            rom,
            sav,
            sample_rate,
            render_target: render_target.clone(),
            debug_render_target,
            audio_sink,
        };
        let muted = self.muted;
        let created = worker.request(
            "core instance",
            |reply| Command::Install(Box::new(init), muted, reply),
            timeout,
            &self.cancel,
        );
        match created {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                fail(Some(worker), audio_node);
                return Err(e.into());
            }
            Err(e) => {
                fail(Some(worker), audio_node);
                return Err(e);
            }
        }

        self.keys = SourceKeys::default();
        self.status.store(SessionStatus::Installed);
        self.live = Some(LiveCore {
            worker,
            audio_node,
            audio_stats,
            render_target,
        });
        info!(
            "Session installed ({}Hz audio{})",
            sample_rate,
            if self.muted { ", muted" } else { "" }
        );
        Ok(())
    }

    /// Tear down the core and audio. Safe to call in any state, any number of times.
    pub fn uninstall(&mut self) {
        let Some(live) = self.live.take() else {
            self.status.store(SessionStatus::Uninstalled);
            return;
        };
        if self.status.load() == SessionStatus::Playing {
            stop_frames(
                &mut self.keys,
                &self.status,
                &live.worker,
                self.audio_config.handshake_timeout(),
            );
        }
        live.teardown();
        self.keys = SourceKeys::default();
        self.status.store(SessionStatus::Uninstalled);
        info!("Session uninstalled");
    }

    /// Start advancing frames. No-op if already playing.
    pub fn play(&mut self) -> Result<(), SessionError> {
        let live = self.live.as_ref().ok_or(SessionError::NotInstalled)?;
        if self.status.load() == SessionStatus::Playing {
            return Ok(());
        }
        self.status.store(SessionStatus::Playing);
        if let Err(e) = live.worker.send(Command::Play) {
            self.status.store(SessionStatus::Paused);
            return Err(e);
        }
        info!("Session playing");
        Ok(())
    }

    /// Stop advancing frames. No-op unless playing or freshly installed.
    ///
    /// Returns once the worker has confirmed no further frame will run.
    pub fn pause(&mut self) -> Result<(), SessionError> {
        let Some(live) = self.live.as_ref() else {
            return Ok(());
        };
        match self.status.load() {
            SessionStatus::Playing => {
                stop_frames(
                    &mut self.keys,
                    &self.status,
                    &live.worker,
                    self.audio_config.handshake_timeout(),
                );
            }
            SessionStatus::Installed => {}
            _ => return Ok(()),
        }
        self.status.store(SessionStatus::Paused);
        info!("Session paused");
        Ok(())
    }

    /// Forward a combined key mask to the core if playing.
    fn forward_keys(&mut self, update: impl FnOnce(&mut SourceKeys) -> Option<KeyMask>) {
        if self.status.load() != SessionStatus::Playing {
            debug!("Key change dropped while not playing");
            return;
        }
        let Some(live) = self.live.as_ref() else {
            return;
        };
        if let Some(mask) = update(&mut self.keys)
            && let Err(e) = live.worker.send(Command::KeyState(mask))
        {
            warn!("Key state not delivered: {}", e);
        }
    }

    /// Send a command to the worker and wait for its reply.
    fn request<T>(
        &self,
        what: &'static str,
        command: impl FnOnce(Signal<T>) -> Command,
    ) -> Result<T, SessionError> {
        let live = self.live.as_ref().ok_or(SessionError::NotInstalled)?;
        live.worker.request(
            what,
            command,
            self.audio_config.handshake_timeout(),
            &CancelToken::new(),
        )
    }

    /// Serialized machine state.
    pub fn take_snapshot(&mut self) -> Result<Vec<u8>, SessionError> {
        Ok(self.request("snapshot", Command::TakeSnapshot)??)
    }

    /// Load machine state produced by [`take_snapshot`](Self::take_snapshot).
    ///
    /// Rejected bytes surface as [`CoreError::InvalidSnapshot`](crate::error::CoreError)
    /// and leave the session in its current state.
    pub fn restore_snapshot(&mut self, data: &[u8]) -> Result<(), SessionError> {
        let data = data.to_vec();
        Ok(self.request("snapshot restore", |reply| {
            Command::RestoreSnapshot(data, reply)
        })??)
    }

    /// Battery-backed cartridge RAM, if the cartridge has any.
    pub fn create_sav(&mut self) -> Result<Option<Vec<u8>>, SessionError> {
        self.request("save RAM", Command::SuspendCartridge)
    }

    /// Copy of the last frame the core presented.
    pub fn capture_frame(&mut self) -> Result<Option<Frame>, SessionError> {
        self.request("frame capture", Command::Capture)
    }

    /// Set mute, or toggle it when `muted` is `None`. Returns the new value.
    ///
    /// Kept across installs. If a core exists, returns once it has the value.
    pub fn mute(&mut self, muted: Option<bool>) -> bool {
        self.muted = muted.unwrap_or(!self.muted);
        let value = self.muted;
        if self.live.is_some()
            && let Err(e) = self.request("mute", |ack| Command::Mute(value, ack))
        {
            warn!("Mute not delivered: {}", e);
        }
        debug!("Muted: {}", self.muted);
        self.muted
    }

    /// Output volume 0-100, applied at the device.
    pub fn set_volume(&mut self, volume: u8) {
        self.volume = volume.min(retroshell_shared::constants::MAX_VOLUME);
        self.gain.set(volume_to_gain(self.volume));
    }
}

/// Release held keys and stop the frame loop synchronously.
fn stop_frames(
    keys: &mut SourceKeys,
    status: &SharedStatus,
    worker: &WorkerHandle,
    timeout: Duration,
) {
    // Controls are live, not buffered: nothing stays held across a pause
    if keys.release_all().is_some()
        && let Err(e) = worker.send(Command::KeyState(KeyMask::empty()))
    {
        debug!("Key release not delivered: {}", e);
    }
    // Stop the worker from starting new frames before waiting for the ack
    status.transition(SessionStatus::Playing, SessionStatus::Paused);
    if let Err(e) = worker.request("pause", Command::Pause, timeout, &CancelToken::new()) {
        warn!("Core worker did not acknowledge pause: {}", e);
    }
}

impl KeySink for EmulatorSession {
    fn change_key(&mut self, source: InputSource, button: Button, pressed: bool) {
        self.forward_keys(|keys| keys.change_key(source, button, pressed));
    }

    fn change_key_state(&mut self, source: InputSource, mask: KeyMask) {
        self.forward_keys(|keys| keys.change_key_state(source, mask));
    }
}

impl Drop for EmulatorSession {
    fn drop(&mut self) {
        self.uninstall();
    }
}
