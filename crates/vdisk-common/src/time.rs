use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Local};

/// Current unix time in whole seconds.
pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Current unix time as the f64 second count stored in inodes and journal
/// entries.
pub fn unix_now_f64() -> f64 {
    unix_now() as f64
}

/// Renders a stored f64 second count as a local `YYYY-MM-DD HH:MM:SS`
/// timestamp for reports and the journal viewer.
pub fn format_unix(seconds: f64) -> String {
    DateTime::from_timestamp(seconds as i64, 0)
        .map(|utc| {
            utc.with_timezone(&Local)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string()
        })
        .unwrap_or_else(|| "-".to_string())
}
