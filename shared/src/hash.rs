//! Content hashing.
//!
//! Game ids are the hash of the ROM bytes and snapshot hashes are the hash of
//! the state bytes, so identical content always maps to the same identifier.

use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 of `bytes` (64 lowercase characters).
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Returns true if `s` looks like a value produced by [`content_hash`].
pub fn is_content_hash(s: &str) -> bool {
    s.len() == 64 && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}
