//! Utility functions for clocks and identifiers

use chrono::Utc;
use uuid7::uuid7;

/// Current wall clock time in milliseconds since the unix epoch.
pub fn now_ms() -> u64 {
    // clamp pre-epoch clocks to zero rather than wrapping
    Utc::now().timestamp_millis().max(0) as u64
}

// activity entries are keyed `evt-<ms>-<suffix>`, the suffix is the tail of a uuid7
pub fn new_event_id(created_at_ms: u64) -> String {
    let id = uuid7().to_string();
    let suffix: String = id.chars().rev().filter(|c| *c != '-').take(6).collect();
    format!("evt-{created_at_ms}-{suffix}")
}

/// Key for a freshly added request line.
pub fn new_line_key() -> String {
    format!("ln-{}", uuid7())
}

/// Trims a department id and treats the empty string as absent.
pub fn normalize_dept_id(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
