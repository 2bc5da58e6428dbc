//! Configuration management (config.toml)
//!
//! Settings are stored in TOML format in the platform-specific config directory.
//! Every field has a default, so partial or older files still load.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use retroshell_shared::constants::{DEFAULT_COVER_QUALITY, MAX_VOLUME, NATIVE_FRAME_RATE};

use crate::input::InputConfig;

/// File name of the library store inside the data directory.
pub const STORE_FILE_NAME: &str = "library.rsdb";

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub pacer: PacerConfig,
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub library: LibraryConfig,
}

/// Audio configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Output volume (default: 80, range: 0-100)
    #[serde(default = "default_volume")]
    pub volume: u8,
    /// Start sessions muted (default: false)
    #[serde(default)]
    pub muted: bool,
    /// Sample buffer between core and device, in milliseconds (default: 150)
    #[serde(default = "default_buffer_ms")]
    pub buffer_ms: u32,
    /// How long install waits for the audio callback and the core worker (default: 2000)
    #[serde(default = "default_handshake_timeout_ms")]
    pub handshake_timeout_ms: u64,
}

/// Frame pacing configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PacerConfig {
    /// Target frame rate in Hz (default: NTSC 60.0988)
    #[serde(default = "default_frame_rate")]
    pub frame_rate: f64,
    /// Most frames of lateness recovered by shortening the next wait (default: 1.0)
    #[serde(default = "default_max_catch_up_frames")]
    pub max_catch_up_frames: f64,
}

/// Library and persistence configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryConfig {
    /// JPEG quality for covers (default: 75, range: 0-100)
    #[serde(default = "default_cover_quality")]
    pub cover_jpeg_quality: u8,
    /// Store file location. Defaults to the platform data directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_path: Option<PathBuf>,
}

fn default_volume() -> u8 {
    80
}
fn default_buffer_ms() -> u32 {
    150
}
fn default_handshake_timeout_ms() -> u64 {
    2000
}
fn default_frame_rate() -> f64 {
    NATIVE_FRAME_RATE
}
fn default_max_catch_up_frames() -> f64 {
    1.0
}
fn default_cover_quality() -> u8 {
    DEFAULT_COVER_QUALITY
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            volume: default_volume(),
            muted: false,
            buffer_ms: default_buffer_ms(),
            handshake_timeout_ms: default_handshake_timeout_ms(),
        }
    }
}

impl AudioConfig {
    /// Volume clamped to the valid range.
    pub fn volume(&self) -> u8 {
        self.volume.min(MAX_VOLUME)
    }

    pub fn handshake_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.handshake_timeout_ms)
    }

    /// Ring capacity in interleaved stereo samples for `sample_rate`.
    pub fn buffer_samples(&self, sample_rate: u32) -> usize {
        let frames = u64::from(sample_rate) * u64::from(self.buffer_ms.max(1)) / 1000;
        (frames.max(1) as usize) * retroshell_shared::constants::AUDIO_CHANNELS
    }
}

impl Default for PacerConfig {
    fn default() -> Self {
        Self {
            frame_rate: default_frame_rate(),
            max_catch_up_frames: default_max_catch_up_frames(),
        }
    }
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            cover_jpeg_quality: default_cover_quality(),
            store_path: None,
        }
    }
}

impl LibraryConfig {
    /// JPEG quality clamped to 1-100.
    pub fn cover_quality(&self) -> u8 {
        self.cover_jpeg_quality.clamp(1, 100)
    }

    /// Effective store location: the configured path, else the data directory.
    pub fn store_path(&self) -> Option<PathBuf> {
        self.store_path
            .clone()
            .or_else(|| data_dir().map(|dir| dir.join(STORE_FILE_NAME)))
    }
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("io.retroshell", "", "Retroshell")
}

/// Returns the platform-specific configuration directory.
///
/// On Windows: `%APPDATA%\Retroshell\config`
/// On macOS: `~/Library/Application Support/io.retroshell.Retroshell`
/// On Linux: `~/.config/Retroshell`
///
/// Returns `None` if the home directory cannot be determined.
pub fn config_dir() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().to_path_buf())
}

/// Returns the platform-specific data directory where the library lives.
pub fn data_dir() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.data_dir().to_path_buf())
}

/// Loads the configuration from the platform configuration directory.
///
/// Returns default values if the file doesn't exist or cannot be parsed.
pub fn load() -> Config {
    match config_dir() {
        Some(dir) => load_from(&dir.join("config.toml")),
        None => Config::default(),
    }
}

/// Loads the configuration from a specific file, falling back to defaults.
pub fn load_from(path: &Path) -> Config {
    let Ok(content) = std::fs::read_to_string(path) else {
        return Config::default();
    };
    match toml::from_str(&content) {
        Ok(config) => config,
        Err(e) => {
            warn!("Ignoring unreadable config {}: {}", path.display(), e);
            Config::default()
        }
    }
}

/// Saves the configuration to the platform configuration directory.
///
/// Creates the directory if it doesn't exist.
pub fn save(config: &Config) -> std::io::Result<()> {
    match config_dir() {
        Some(dir) => save_to(config, &dir.join("config.toml")),
        None => Ok(()),
    }
}

/// Saves the configuration to a specific file.
pub fn save_to(config: &Config, path: &Path) -> std::io::Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let content = to_toml(config)?;
    std::fs::write(path, content)
}

/// Render the configuration as TOML.
pub fn to_toml(config: &Config) -> std::io::Result<String> {
    toml::to_string_pretty(config).map_err(std::io::Error::other)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.audio.volume, 80);
        assert!(!config.audio.muted);
        assert_eq!(config.audio.buffer_ms, 150);
        assert!((config.pacer.frame_rate - 60.0988).abs() < 1e-9);
        assert_eq!(config.pacer.max_catch_up_frames, 1.0);
        assert!(config.input.gamepad);
        assert_eq!(config.library.cover_jpeg_quality, 75);
    }

    #[test]
    fn test_config_deserialize_empty() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_config_deserialize_partial_audio() {
        let toml_str = r#"
[audio]
volume = 30
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.audio.volume, 30);
        assert_eq!(config.audio.buffer_ms, 150);
        assert_eq!(config.pacer, PacerConfig::default());
    }

    #[test]
    fn test_config_serialize_roundtrip() {
        let mut config = Config::default();
        config.audio.muted = true;
        config.pacer.max_catch_up_frames = 0.5;
        config.library.store_path = Some(PathBuf::from("/tmp/lib.rsdb"));

        let toml_str = to_toml(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_volume_and_quality_are_clamped() {
        let audio = AudioConfig {
            volume: 200,
            ..Default::default()
        };
        assert_eq!(audio.volume(), 100);

        let library = LibraryConfig {
            cover_jpeg_quality: 0,
            store_path: None,
        };
        assert_eq!(library.cover_quality(), 1);
    }

    #[test]
    fn test_buffer_samples_is_stereo() {
        let audio = AudioConfig::default();
        assert_eq!(audio.buffer_samples(48_000), 7200 * 2);
        assert_eq!(audio.buffer_samples(0), 2);
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.audio.volume = 55;
        save_to(&config, &path).unwrap();

        assert_eq!(load_from(&path).audio.volume, 55);
    }

    #[test]
    fn test_load_falls_back_on_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "audio = [not toml").unwrap();
        assert_eq!(load_from(&path), Config::default());
        assert_eq!(load_from(&dir.path().join("missing.toml")), Config::default());
    }
}
