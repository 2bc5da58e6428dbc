//! Emulation core capability interface
//!
//! The emulation core (CPU/PPU/APU) lives outside this crate. The runtime
//! only talks to it through the traits in this module, which keeps the
//! session, the pacer and the backup codec independent of any particular
//! core implementation.

use std::sync::{Arc, Mutex, MutexGuard};

use retroshell_shared::KeyMask;

use crate::audio::AudioSink;
use crate::error::CoreError;

/// Metadata extracted from a ROM without starting a session.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RomMetadata {
    /// Display name embedded in the ROM, empty if it has none
    pub name: String,
    /// JPEG cover (typically the title screen), empty if unavailable
    pub cover: Vec<u8>,
}

/// Read ROM metadata.
///
/// Split from [`CoreFactory`] so tools that only import and export packs can
/// work without a full core.
pub trait MetadataSource: Send + Sync {
    /// Extract name and cover art, encoding the cover at `jpeg_quality` (0-100).
    fn extract_metadata(&self, rom: &[u8], jpeg_quality: u8) -> Result<RomMetadata, CoreError>;
}

/// Everything the core needs to create an instance.
pub struct CoreInit {
    pub rom: Vec<u8>,
    pub sav: Option<Vec<u8>>,
    pub sample_rate: u32,
    pub render_target: RenderTarget,
    pub debug_render_target: Option<RenderTarget>,
    /// Writable end of the audio bridge
    pub audio_sink: AudioSink,
}

/// Creates core instances.
///
/// Instances are created on the core worker thread and never leave it, so
/// only the factory has to be shareable across threads.
pub trait CoreFactory: MetadataSource {
    fn create(&self, init: CoreInit) -> Result<Box<dyn CoreHandle>, CoreError>;
}

/// A live core instance bound to one ROM and one render target.
///
/// Dropping the handle frees the instance.
pub trait CoreHandle {
    /// Advance exactly one frame, rendering to the render target and pushing
    /// samples to the audio sink.
    fn run_frame(&mut self) -> Result<(), CoreError>;

    fn change_key_state(&mut self, mask: KeyMask);

    fn take_snapshot(&mut self) -> Result<Vec<u8>, CoreError>;

    fn restore_snapshot(&mut self, data: &[u8]) -> Result<(), CoreError>;

    /// Battery-backed cartridge RAM, if the cartridge has any.
    fn suspend_cartridge(&mut self) -> Option<Vec<u8>>;

    fn mute(&mut self, muted: bool);
}

/// One presented frame.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    /// Tightly packed RGBA8 pixels
    pub rgba: Vec<u8>,
    /// Number of frames presented so far
    pub sequence: u64,
}

/// Shared frame surface.
///
/// The core writes into it from the worker thread; the presentation layer
/// and snapshot cover capture read from it. Clones share the same surface.
#[derive(Debug, Clone, Default)]
pub struct RenderTarget {
    inner: Arc<Mutex<Frame>>,
}

impl RenderTarget {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Frame> {
        self.inner.lock().unwrap_or_else(|e| {
            tracing::warn!("Render target mutex poisoned; continuing");
            e.into_inner()
        })
    }

    /// Replace the current frame.
    pub fn present(&self, width: u32, height: u32, rgba: &[u8]) {
        let mut frame = self.lock();
        frame.width = width;
        frame.height = height;
        frame.rgba.clear();
        frame.rgba.extend_from_slice(rgba);
        frame.sequence += 1;
    }

    /// Copy of the most recent frame, or `None` before the first present.
    pub fn capture(&self) -> Option<Frame> {
        let frame = self.lock();
        (frame.sequence > 0).then(|| frame.clone())
    }

    /// Number of frames presented so far.
    pub fn sequence(&self) -> u64 {
        self.lock().sequence
    }
}

/// iNES header magic.
const INES_MAGIC: [u8; 4] = *b"NES\x1A";

/// Metadata source for iNES files that needs no core.
///
/// iNES headers carry no title and no artwork, so only the header is
/// validated and the metadata comes back empty.
#[derive(Debug, Clone, Copy, Default)]
pub struct InesProbe;

impl InesProbe {
    /// Check if bytes start with a complete iNES header.
    pub fn can_load(bytes: &[u8]) -> bool {
        bytes.len() >= 16 && bytes[..4] == INES_MAGIC
    }
}

impl MetadataSource for InesProbe {
    fn extract_metadata(&self, rom: &[u8], _jpeg_quality: u8) -> Result<RomMetadata, CoreError> {
        if !Self::can_load(rom) {
            return Err(CoreError::InvalidRom("missing iNES header".into()));
        }
        Ok(RomMetadata::default())
    }
}
