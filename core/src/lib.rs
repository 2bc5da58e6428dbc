//! Retroshell Core - Session runtime for a packaged emulation core
//!
//! This crate hosts an external emulation core inside an interactive
//! application: it runs the core on its own thread, paces frames against
//! wall-clock time, streams samples to the audio device, merges input
//! devices into the core's key mask, and keeps the game library.
//!
//! # Architecture
//!
//! - [`EmulatorSession`] - Install/play/pause/uninstall state machine
//! - [`FramePacer`] - Self-rescheduling frame timer with drift correction
//! - [`audio`] - Lock-free bridge from the core thread to the device callback
//! - [`input`] - Keyboard, gamepad and on-screen button sources
//! - [`backup`] - Checksummed backup packs with content-hash dedup
//! - [`store`] - Game and snapshot tables
//! - [`SessionRuntime`] - Session plus store, the library operations

pub mod audio;
pub mod backup;
pub mod catalog;
pub mod config;
pub mod cover;
pub mod emulator;
pub mod error;
pub mod handshake;
pub mod input;
pub mod pacer;
pub mod runtime;
pub mod session;
pub mod store;
#[cfg(test)]
pub mod test_utils;
mod worker;

// Re-export the main entry points
pub use config::Config;
pub use emulator::{
    CoreFactory, CoreHandle, CoreInit, Frame, InesProbe, MetadataSource, RenderTarget, RomMetadata,
};
pub use error::{
    AudioError, BackupError, CoreError, HandshakeError, RuntimeError, SessionError, StoreError,
};
pub use input::{InputAggregator, InputSource, KeySink};
pub use pacer::FramePacer;
pub use runtime::SessionRuntime;
pub use session::{EmulatorSession, SessionStatus};
pub use store::{FileStore, MemoryStore, SessionStore, Tables};

// Re-export shared types for convenience
pub use retroshell_shared::{Button, Game, GameUpdate, KeyMask, NewSnapshot, Snapshot};
