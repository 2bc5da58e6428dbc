use serde::{Deserialize, Serialize};

/// `manifest.json` of the inner archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Display name; also the entry path of the ROM
    pub name: String,
    /// Content hash of the ROM
    pub id: String,
    #[serde(default)]
    pub snapshots: Vec<ManifestSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestSnapshot {
    pub name: String,
    pub time: i64,
    pub hash: String,
}
