//! Audio output
//!
//! Architecture:
//! - The audio output device is opened lazily, once, and reused across
//!   install/uninstall cycles ([`AudioContext`])
//! - Each install creates a fresh [`audio_bridge`] and connects its renderer
//!   to the device as a per-session node; uninstall disconnects it
//! - The gain stage applies the session volume inside the device callback
//!
//! Audio specs:
//! - Device-native sample rate (the core is told which)
//! - Stereo interleaved `f32` between core and device

mod bridge;
mod output;

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use tracing::{info, warn};

use crate::error::AudioError;
use crate::handshake::Signal;

pub use bridge::{AudioBridgeStats, AudioRenderer, AudioSink, RenderStatus, audio_bridge};
pub use output::{CpalBackend, CpalNode};

/// Volume multiplier shared between the session and the device callback.
#[derive(Debug, Clone)]
pub struct GainStage(Arc<AtomicU32>);

impl GainStage {
    pub fn new(gain: f32) -> Self {
        Self(Arc::new(AtomicU32::new(gain.to_bits())))
    }

    /// Gain for a 0-100 volume value.
    pub fn from_volume(volume: u8) -> Self {
        Self::new(volume_to_gain(volume))
    }

    pub fn get(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    pub fn set(&self, gain: f32) {
        self.0.store(gain.to_bits(), Ordering::Relaxed);
    }
}

/// Map a 0-100 volume to a linear gain.
pub fn volume_to_gain(volume: u8) -> f32 {
    f32::from(volume.min(retroshell_shared::constants::MAX_VOLUME)) / 100.0
}

/// A per-session output node. Dropping or disconnecting it stops rendering.
pub trait AudioNode {
    fn disconnect(&mut self);
}

/// An opened audio output device.
pub trait AudioBackend {
    /// Device sample rate in Hz.
    fn sample_rate(&self) -> u32;

    /// Attach a renderer as a new output node.
    ///
    /// `ready` must be signalled from the first device callback, so the
    /// caller knows samples are actually being pulled before it hands the
    /// writable end of the bridge to the core.
    fn connect(
        &mut self,
        renderer: AudioRenderer,
        ready: Signal<()>,
    ) -> Result<Box<dyn AudioNode>, AudioError>;
}

/// Opens the output device on first use.
pub type BackendOpener = Box<dyn FnMut() -> Result<Box<dyn AudioBackend>, AudioError>>;

/// Process-wide audio output context.
///
/// Device acquisition is comparatively expensive, so the backend is opened
/// once and kept for the lifetime of the context; only nodes are created
/// and destroyed per session.
pub struct AudioContext {
    opener: BackendOpener,
    backend: Option<Box<dyn AudioBackend>>,
}

impl AudioContext {
    pub fn new(opener: BackendOpener) -> Self {
        Self {
            opener,
            backend: None,
        }
    }

    /// Context backed by the default cpal output device.
    pub fn cpal() -> Self {
        Self::new(Box::new(|| {
            CpalBackend::open().map(|b| Box::new(b) as Box<dyn AudioBackend>)
        }))
    }

    /// Context that never has a device; sessions run silent.
    pub fn disabled() -> Self {
        Self::new(Box::new(|| {
            Err(AudioError::DeviceUnavailable("audio disabled".into()))
        }))
    }

    /// The opened backend, opening it first if needed.
    ///
    /// Returns `None` when no device is available. Opening is retried on the
    /// next call, so a device plugged in later is picked up by the next install.
    pub fn backend(&mut self) -> Option<&mut (dyn AudioBackend + 'static)> {
        if self.backend.is_none() {
            match (self.opener)() {
                Ok(backend) => {
                    info!("Audio device opened at {}Hz", backend.sample_rate());
                    self.backend = Some(backend);
                }
                Err(e) => {
                    warn!("{}. Continuing without audio.", e);
                    return None;
                }
            }
        }
        self.backend.as_deref_mut()
    }

    pub fn is_open(&self) -> bool {
        self.backend.is_some()
    }
}
