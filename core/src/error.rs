//! Error types for the session runtime, stores and backup packs

use thiserror::Error;

/// Errors reported by the emulation core across the capability boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// The ROM could not be parsed (wrong file, unsupported mapper, ...)
    #[error("Invalid ROM: {0}")]
    InvalidRom(String),
    /// Snapshot bytes were rejected by the core
    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(String),
    /// Fault inside the core itself
    #[error("Core fault: {0}")]
    Internal(String),
}

impl CoreError {
    /// Whether the user can fix this by choosing a different file.
    pub fn is_user_correctable(&self) -> bool {
        matches!(self, Self::InvalidRom(_) | Self::InvalidSnapshot(_))
    }
}

/// Errors from one-shot readiness handshakes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandshakeError {
    #[error("Timed out waiting for {what}")]
    Timeout { what: &'static str },
    #[error("Cancelled while waiting for {what}")]
    Cancelled { what: &'static str },
}

/// Audio output errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AudioError {
    /// No usable output device. Handled by skipping audio.
    #[error("Audio device unavailable: {0}")]
    DeviceUnavailable(String),
    #[error("Audio stream error: {0}")]
    Stream(String),
    #[error("Unsupported sample format: {0}")]
    UnsupportedFormat(String),
}

/// Errors returned by [`EmulatorSession`](crate::session::EmulatorSession) operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("No core is installed")]
    NotInstalled,
    #[error("A core is already installed; uninstall it first")]
    AlreadyInstalled,
    #[error(transparent)]
    Handshake(#[from] HandshakeError),
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error(transparent)]
    Audio(#[from] AudioError),
    /// The core worker thread went away without answering
    #[error("Core worker stopped responding")]
    WorkerGone,
}

/// Errors from the session store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// A uniqueness or foreign-key rule was violated
    #[error("Constraint violated: {0}")]
    Constraint(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Store I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Store file is unreadable: {0}")]
    Decode(String),
    /// A transaction body bailed out; everything it did was rolled back
    #[error("Transaction aborted: {0}")]
    Aborted(String),
}

/// Errors from exporting or importing a backup pack.
#[derive(Error, Debug)]
pub enum BackupError {
    /// Outer checksum mismatch, or inner content that contradicts itself
    #[error("Corrupt archive: {0}")]
    CorruptArchive(String),
    #[error("Archive entry missing: {0}")]
    MissingEntry(String),
    #[error("Invalid manifest: {0}")]
    Manifest(#[from] serde_json::Error),
    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Game not found: {0}")]
    GameNotFound(String),
}

/// Errors from library operations that combine the session and the store.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Backup(#[from] BackupError),
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error("Game not found: {0}")]
    GameNotFound(String),
    #[error("Snapshot not found: {0}")]
    SnapshotNotFound(u64),
    /// The snapshot was taken with a different ROM than the one running
    #[error("Snapshot {snapshot} belongs to game {game_id}")]
    SnapshotMismatch { snapshot: u64, game_id: String },
    #[error("Game {0} is being played")]
    GameInUse(String),
    #[error("No game is being played")]
    NotPlaying,
}
