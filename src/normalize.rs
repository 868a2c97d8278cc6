//! Text and identifier normalization shared by the duplicate detector and dispatcher.

use crate::types::RegistrationRecord;
use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

static CANONICAL_UUID_V4: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^[0-9a-f]{8}-[0-9a-f]{4}-4[0-9a-f]{3}-[89ab][0-9a-f]{3}-[0-9a-f]{12}$")
        .expect("static regex")
});

/// Uppercase, accent-stripped, whitespace-collapsed form used for matching.
///
/// `"  José  da Silva "` and `"JOSE DA SILVA"` compare equal after this.
pub fn normalize_for_match(value: &str) -> String {
    let stripped: String = value.nfd().filter(|c| !is_combining_mark(*c)).collect();
    stripped
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

pub fn is_canonical_uuid(id: &str) -> bool {
    CANONICAL_UUID_V4.is_match(id)
}

/// Replace a non-canonical id with a fresh v4 UUID. Returns true if it changed.
pub fn ensure_canonical_id(record: &mut RegistrationRecord) -> bool {
    if is_canonical_uuid(&record.id) {
        return false;
    }
    let fresh = uuid::Uuid::new_v4().to_string();
    tracing::debug!("[NORM] regenerated id {} -> {}", record.id, fresh);
    record.id = fresh;
    true
}

/// First and last name, uppercased. `"Ricardo de Castro Grangeiro"` -> `"RICARDO GRANGEIRO"`.
pub fn format_submitted_by(full_name: &str) -> String {
    let parts: Vec<&str> = full_name.split_whitespace().collect();
    match parts.as_slice() {
        [] => String::new(),
        [only] => only.to_uppercase(),
        [first, .., last] => format!("{} {}", first, last).to_uppercase(),
    }
}
