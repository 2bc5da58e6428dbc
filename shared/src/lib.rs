//! Shared types for the retroshell emulator runtime.
//!
//! Plain data used by the session runtime, the stores and the CLI:
//! library records, the controller wire bitmask and content hashing.

pub mod buttons;
pub mod constants;
pub mod hash;
pub mod ids;
pub mod records;

pub use buttons::{Button, KeyMask};
pub use hash::content_hash;
pub use ids::is_safe_entry_name;
pub use records::{Game, GameUpdate, NewSnapshot, Snapshot, now_millis};
