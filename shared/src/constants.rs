//! Centralized constants for the retroshell runtime.

/// Native frame rate of the emulated console (NTSC).
pub const NATIVE_FRAME_RATE: f64 = 60.0988;

/// Audio sample rate requested when no device is available.
pub const FALLBACK_SAMPLE_RATE: u32 = 44_100;

/// Stereo output: samples are carried as interleaved left/right pairs.
pub const AUDIO_CHANNELS: usize = 2;

/// Default JPEG quality for snapshot and game covers.
pub const DEFAULT_COVER_QUALITY: u8 = 75;

/// Highest accepted volume value.
pub const MAX_VOLUME: u8 = 100;
