//! Small helpers shared across modules.

use chrono::{DateTime, Utc};

/// Current UTC time in seconds since UNIX_EPOCH.
pub fn get_utc_timestamp() -> u64 {
    Utc::now().timestamp().max(0) as u64
}

/// Render a timestamp from [`get_utc_timestamp`] for display.
pub fn format_timestamp(secs: u64) -> String {
    i64::try_from(secs)
        .ok()
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| secs.to_string())
}
