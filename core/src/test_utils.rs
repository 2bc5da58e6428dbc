//! Test doubles for the emulation core and the audio device

use std::sync::{Arc, Mutex, MutexGuard};

use retroshell_shared::KeyMask;

use crate::audio::{AudioBackend, AudioNode, AudioRenderer, AudioSink};
use crate::emulator::{
    CoreFactory, CoreHandle, CoreInit, MetadataSource, RenderTarget, RomMetadata,
};
use crate::error::{AudioError, CoreError};
use crate::handshake::Signal;

/// Everything the fake core saw, shared between the factory and its cores.
#[derive(Debug, Default)]
pub struct FakeCoreLog {
    pub created: usize,
    pub freed: usize,
    pub frames: u64,
    pub sample_rate: Option<u32>,
    pub rom: Vec<u8>,
    pub sav: Option<Vec<u8>>,
    pub key_states: Vec<KeyMask>,
    pub mutes: Vec<bool>,
    pub restored: Vec<Vec<u8>>,
}

/// Failure injection for the fake core.
#[derive(Debug, Default, Clone)]
pub struct FakeBehavior {
    /// `create` fails with this error
    pub fail_create: Option<CoreError>,
    /// `run_frame` fails once this many frames have run
    pub fail_after_frames: Option<u64>,
    /// `run_frame` panics once this many frames have run
    pub panic_after_frames: Option<u64>,
}

/// Scripted core factory that records every call.
///
/// ROMs starting with `BAD` are rejected. Metadata names are the ROM's
/// first printable bytes, and the cover is a fixed marker.
#[derive(Clone, Default)]
pub struct FakeCoreFactory {
    log: Arc<Mutex<FakeCoreLog>>,
    behavior: Arc<Mutex<FakeBehavior>>,
}

pub const FAKE_COVER: &[u8] = b"\xFF\xD8fake-cover\xFF\xD9";
const SNAPSHOT_MAGIC: &[u8] = b"SNAP";

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl FakeCoreFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&self) -> MutexGuard<'_, FakeCoreLog> {
        lock(&self.log)
    }

    pub fn set_behavior(&self, behavior: FakeBehavior) {
        *lock(&self.behavior) = behavior;
    }
}

impl MetadataSource for FakeCoreFactory {
    fn extract_metadata(&self, rom: &[u8], _jpeg_quality: u8) -> Result<RomMetadata, CoreError> {
        if rom.starts_with(b"BAD") {
            return Err(CoreError::InvalidRom("fake core rejects BAD roms".into()));
        }
        let name: String = rom
            .iter()
            .take_while(|b| b.is_ascii_alphanumeric() || **b == b' ')
            .map(|b| *b as char)
            .collect();
        Ok(RomMetadata {
            name,
            cover: FAKE_COVER.to_vec(),
        })
    }
}

impl CoreFactory for FakeCoreFactory {
    fn create(&self, init: CoreInit) -> Result<Box<dyn CoreHandle>, CoreError> {
        let behavior = lock(&self.behavior).clone();
        if let Some(e) = behavior.fail_create {
            return Err(e);
        }
        if init.rom.starts_with(b"BAD") {
            return Err(CoreError::InvalidRom("fake core rejects BAD roms".into()));
        }

        let mut log = lock(&self.log);
        log.created += 1;
        log.sample_rate = Some(init.sample_rate);
        log.rom = init.rom.clone();
        log.sav = init.sav.clone();
        drop(log);

        Ok(Box::new(FakeCore {
            log: self.log.clone(),
            fail_after_frames: behavior.fail_after_frames,
            panic_after_frames: behavior.panic_after_frames,
            frames: 0,
            sav: init.sav,
            render_target: init.render_target,
            audio_sink: init.audio_sink,
        }))
    }
}

struct FakeCore {
    log: Arc<Mutex<FakeCoreLog>>,
    fail_after_frames: Option<u64>,
    panic_after_frames: Option<u64>,
    frames: u64,
    sav: Option<Vec<u8>>,
    render_target: RenderTarget,
    audio_sink: AudioSink,
}

impl CoreHandle for FakeCore {
    fn run_frame(&mut self) -> Result<(), CoreError> {
        if self.fail_after_frames == Some(self.frames) {
            return Err(CoreError::Internal("scripted frame failure".into()));
        }
        if self.panic_after_frames == Some(self.frames) {
            panic!("scripted frame panic");
        }
        self.frames += 1;
        lock(&self.log).frames = self.frames;

        let shade = (self.frames % 256) as u8;
        self.render_target.present(2, 2, &[shade; 16]);
        self.audio_sink.push_interleaved(&[0.25, -0.25, 0.5, -0.5]);
        Ok(())
    }

    fn change_key_state(&mut self, mask: KeyMask) {
        lock(&self.log).key_states.push(mask);
    }

    fn take_snapshot(&mut self) -> Result<Vec<u8>, CoreError> {
        let mut data = SNAPSHOT_MAGIC.to_vec();
        data.extend_from_slice(&self.frames.to_le_bytes());
        Ok(data)
    }

    fn restore_snapshot(&mut self, data: &[u8]) -> Result<(), CoreError> {
        let frames = data
            .strip_prefix(SNAPSHOT_MAGIC)
            .and_then(|rest| <[u8; 8]>::try_from(rest).ok())
            .map(u64::from_le_bytes)
            .ok_or_else(|| CoreError::InvalidSnapshot("not a fake snapshot".into()))?;
        self.frames = frames;
        lock(&self.log).restored.push(data.to_vec());
        Ok(())
    }

    fn suspend_cartridge(&mut self) -> Option<Vec<u8>> {
        let mut sav = self.sav.clone().unwrap_or_default();
        sav.extend_from_slice(&self.frames.to_le_bytes());
        Some(sav)
    }

    fn mute(&mut self, muted: bool) {
        lock(&self.log).mutes.push(muted);
    }
}

impl Drop for FakeCore {
    fn drop(&mut self) {
        lock(&self.log).freed += 1;
    }
}

/// State shared between a [`ManualAudioBackend`] and the test.
#[derive(Default)]
pub struct ManualAudioState {
    pub connects: usize,
    pub disconnects: usize,
    /// Renderer of the most recent node
    pub renderer: Option<AudioRenderer>,
    /// Pending readiness signal when the backend does not fire automatically
    pub ready: Option<Signal<()>>,
}

/// Audio backend driven by the test instead of a device clock.
#[derive(Clone)]
pub struct ManualAudioBackend {
    pub state: Arc<Mutex<ManualAudioState>>,
    sample_rate: u32,
    /// Signal readiness as soon as a node connects
    auto_ready: bool,
}

impl ManualAudioBackend {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            state: Arc::default(),
            sample_rate,
            auto_ready: true,
        }
    }

    /// Backend whose callback never fires on its own.
    pub fn stalled(sample_rate: u32) -> Self {
        Self {
            auto_ready: false,
            ..Self::new(sample_rate)
        }
    }

    pub fn state(&self) -> MutexGuard<'_, ManualAudioState> {
        lock(&self.state)
    }
}

impl AudioBackend for ManualAudioBackend {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn connect(
        &mut self,
        renderer: AudioRenderer,
        ready: Signal<()>,
    ) -> Result<Box<dyn AudioNode>, AudioError> {
        let mut state = lock(&self.state);
        state.connects += 1;
        state.renderer = Some(renderer);
        if self.auto_ready {
            ready.send(());
        } else {
            state.ready = Some(ready);
        }
        Ok(Box::new(ManualNode {
            state: self.state.clone(),
            connected: true,
        }))
    }
}

struct ManualNode {
    state: Arc<Mutex<ManualAudioState>>,
    connected: bool,
}

impl AudioNode for ManualNode {
    fn disconnect(&mut self) {
        if std::mem::take(&mut self.connected) {
            lock(&self.state).disconnects += 1;
        }
    }
}

impl Drop for ManualNode {
    fn drop(&mut self) {
        self.disconnect();
    }
}
