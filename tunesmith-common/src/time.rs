//! Timestamp utilities

use chrono::{DateTime, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Convert milliseconds to duration
pub fn millis_to_duration(millis: u64) -> std::time::Duration {
    std::time::Duration::from_millis(millis)
}

/// Whether `earlier` lies more than `max_age` before `now`
pub fn is_older_than(earlier: DateTime<Utc>, now: DateTime<Utc>, max_age: std::time::Duration) -> bool {
    match chrono::Duration::from_std(max_age) {
        Ok(max_age) => now.signed_duration_since(earlier) >= max_age,
        Err(_) => false,
    }
}
