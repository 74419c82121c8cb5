//! Core type definitions used throughout the codebase

use uuid::Uuid;

/// Simulated turn counter
pub type Turn = u64;

/// Unix timestamp in milliseconds
pub type Timestamp = i64;

/// Fallback id for names that sanitize to nothing
pub const FALLBACK_STAT_ID: &str = "stat";

/// Normalize a stat identifier
///
/// Lower-cases, maps whitespace to `_` and drops anything outside
/// `[a-z0-9_-]`. Names that sanitize to nothing become [`FALLBACK_STAT_ID`].
pub fn sanitize_stat_id(raw: &str) -> String {
    let id: String = raw
        .trim()
        .chars()
        .filter_map(|c| {
            if c.is_whitespace() {
                Some('_')
            } else {
                let c = c.to_ascii_lowercase();
                (c.is_ascii_alphanumeric() || c == '_' || c == '-').then_some(c)
            }
        })
        .collect();

    if id.is_empty() {
        FALLBACK_STAT_ID.to_string()
    } else {
        id
    }
}

/// Current wall-clock time in Unix milliseconds
pub fn now_millis() -> Timestamp {
    chrono::Utc::now().timestamp_millis()
}

/// Generate a unique id with a readable prefix (e.g. `mod_3f2a...`)
pub fn generate_id(prefix: &str) -> String {
    format!("{}_{}", prefix, Uuid::new_v4().simple())
}
