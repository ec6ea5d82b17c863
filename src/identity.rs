//! Stable record identity used for deduplication.
//!
//! A native track id from the page is authoritative. Without one, the id is
//! a base64 fingerprint of title, difficulty, play time and achievement,
//! with `=`, `+` and `/` dropped so it stays safe as a JSON key or file name.
//! The fingerprint matches the ids in stores written by earlier tooling.
//!
//! Two plays of the same chart in the same minute with the same achievement
//! share a fingerprint and dedupe into one record.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::models::PlayRecord;

pub const TRACK_PREFIX: &str = "track_";
pub const COMBO_PREFIX: &str = "combo_";

/// Identity of a record. Pure and total.
pub fn identify(record: &PlayRecord) -> String {
    if !record.track_id.is_empty() {
        return format!("{}{}", TRACK_PREFIX, record.track_id);
    }
    combo_identity(
        &record.title,
        record.difficulty.as_str(),
        &record.played_at,
        &record.percentage,
    )
}

/// Fingerprint of the business fields, used when no track id is known.
pub fn combo_identity(title: &str, difficulty: &str, played_at: &str, percentage: &str) -> String {
    let key = format!("{}_{}_{}_{}", title, difficulty, played_at, percentage);
    let encoded: String = STANDARD
        .encode(key.as_bytes())
        .chars()
        .filter(|c| !matches!(c, '=' | '+' | '/'))
        .collect();
    format!("{}{}", COMBO_PREFIX, encoded)
}
