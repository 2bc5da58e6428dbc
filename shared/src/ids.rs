//! Helpers for validating names used as archive entry paths.

/// Returns true if a game name is safe to use as a single archive entry path.
///
/// Rules:
/// - Must be non-empty and not "." or ".."
/// - Must not contain path separators ('/' or '\\')
/// - Must not contain control characters or NUL
/// - Must not collide with the reserved `manifest.json` entry
pub fn is_safe_entry_name(name: &str) -> bool {
    if name.is_empty() || name == "." || name == ".." || name == "manifest.json" {
        return false;
    }

    for c in name.chars() {
        if c == '/' || c == '\\' || c == '\0' {
            return false;
        }
        if c.is_control() {
            return false;
        }
    }

    true
}

/// Replace characters that would make `name` unusable as an entry path.
///
/// Falls back to `"game"` when nothing usable is left.
pub fn sanitize_entry_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c == '/' || c == '\\' || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();
    let cleaned = cleaned.trim().to_string();

    if is_safe_entry_name(&cleaned) {
        cleaned
    } else {
        "game".to_string()
    }
}
