//! Hashing, time and text helpers shared by the stores.

use chrono::{Local, NaiveDate};
use sha2::{Digest, Sha256};

/// Timestamp layout used for every persisted record.
///
/// Lexicographic order of strings in this layout equals chronological order,
/// which temporal retrieval relies on.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Compute SHA-256 hash of content and return as hex string
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

/// Current local time as an ISO-8601 string with microseconds.
pub fn now_iso() -> String {
    Local::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}

/// Current local time as an ISO-8601 string, second precision.
pub fn now_iso_seconds() -> String {
    Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// `HH:MM` slice of an ISO-8601 timestamp, empty when the string is too short.
pub fn hour_minute(timestamp: &str) -> &str {
    timestamp.get(11..16).unwrap_or("")
}

/// Inclusive bounds covering one calendar day: `(00:00:00, 23:59:59)`.
pub fn day_bounds(day: NaiveDate) -> (String, String) {
    (
        format!("{}T00:00:00", day.format("%Y-%m-%d")),
        format!("{}T23:59:59", day.format("%Y-%m-%d")),
    )
}

/// First `max_chars` characters of `text`, never splitting a code point.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

/// Count occurrences and order by descending frequency.
///
/// Ties keep first-encountered order, so the first element is the most common
/// item with the earliest first appearance.
pub fn most_common<'a, I>(items: I) -> Vec<(String, usize)>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut counts: Vec<(String, usize)> = Vec::new();
    for item in items {
        match counts.iter_mut().find(|(seen, _)| seen == item) {
            Some((_, count)) => *count += 1,
            None => counts.push((item.to_string(), 1)),
        }
    }
    // stable sort preserves first-seen order among equal counts
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
}
