//! Shared utility functions used across multiple modules.

use chrono::NaiveDate;

/// Current Unix timestamp in milliseconds.
pub fn unix_ms_now() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Today's date in UTC.
///
/// Streak day arithmetic is done in UTC so two devices syncing the same
/// account agree on day boundaries.
pub fn today_utc() -> NaiveDate {
    chrono::Utc::now().date_naive()
}

/// Normalize a habit name by trimming whitespace.
///
/// Returns `None` when the trimmed value is empty.
pub fn normalize_name(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
