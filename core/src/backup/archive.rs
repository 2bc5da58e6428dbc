//! Zip helpers shared by export and import

use std::io::{Cursor, Read, Write};

use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::BackupError;

/// Payload of one archive entry, resolved to bytes when the archive is written.
#[derive(Debug, Clone, PartialEq)]
pub enum ArchiveEntry {
    Text(String),
    Bytes(Vec<u8>),
    Json(serde_json::Value),
}

impl ArchiveEntry {
    fn into_bytes(self) -> Result<Vec<u8>, BackupError> {
        match self {
            Self::Text(text) => Ok(text.into_bytes()),
            Self::Bytes(bytes) => Ok(bytes),
            Self::Json(value) => Ok(serde_json::to_vec_pretty(&value)?),
        }
    }
}

/// How entries are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Packing {
    /// No compression (outer archive)
    Stored,
    /// Deflate at maximum level (inner archive)
    Deflated,
}

impl Packing {
    fn options(self) -> SimpleFileOptions {
        match self {
            Self::Stored => {
                SimpleFileOptions::default().compression_method(CompressionMethod::Stored)
            }
            Self::Deflated => SimpleFileOptions::default()
                .compression_method(CompressionMethod::Deflated)
                .compression_level(Some(9)),
        }
    }
}

/// Write `entries` in order into a new in-memory zip.
pub fn write_archive(
    entries: Vec<(String, ArchiveEntry)>,
    packing: Packing,
) -> Result<Vec<u8>, BackupError> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = packing.options();
    for (name, entry) in entries {
        writer.start_file(name, options)?;
        writer.write_all(&entry.into_bytes()?)?;
    }
    Ok(writer.finish()?.into_inner())
}

/// Read-only view of an in-memory zip.
///
/// Structural damage and per-entry CRC failures are reported as
/// [`BackupError::CorruptArchive`].
pub struct ArchiveReader<'a> {
    archive: ZipArchive<Cursor<&'a [u8]>>,
    what: &'static str,
}

impl<'a> ArchiveReader<'a> {
    pub fn open(bytes: &'a [u8], what: &'static str) -> Result<Self, BackupError> {
        let archive = ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| BackupError::CorruptArchive(format!("{}: {}", what, e)))?;
        Ok(Self { archive, what })
    }

    /// Entry contents, or `None` when the archive has no such entry.
    pub fn read(&mut self, name: &str) -> Result<Option<Vec<u8>>, BackupError> {
        let mut entry = match self.archive.by_name(name) {
            Ok(entry) => entry,
            Err(ZipError::FileNotFound) => return Ok(None),
            Err(e) => {
                return Err(BackupError::CorruptArchive(format!(
                    "{} entry {}: {}",
                    self.what, name, e
                )));
            }
        };
        let mut data = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut data).map_err(|e| {
            BackupError::CorruptArchive(format!("{} entry {}: {}", self.what, name, e))
        })?;
        Ok(Some(data))
    }

    pub fn require(&mut self, name: &str) -> Result<Vec<u8>, BackupError> {
        self.read(name)?
            .ok_or_else(|| BackupError::MissingEntry(format!("{} entry {}", self.what, name)))
    }
}

/// CRC32 (IEEE) of `bytes`.
pub fn crc32(bytes: &[u8]) -> u32 {
    let mut crc = flate2::Crc::new();
    crc.update(bytes);
    crc.sum()
}
