//! Display helpers for byte counts, durations and timestamps.

use chrono::NaiveDateTime;

const SIZE_UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];

/// Formats a byte count using binary multiples, e.g. `"1.5 MB"`.
pub fn format_size(bytes: u64) -> String {
    let mut value = bytes as f64;
    for unit in SIZE_UNITS {
        if value < 1024.0 {
            return format!("{:.1} {}", value, unit);
        }
        value /= 1024.0;
    }
    format!("{:.1} TB", value)
}

/// Formats a duration in seconds as `"850ms"`, `"12.3s"` or `"2m 5s"`.
pub fn format_duration(seconds: f64) -> String {
    let seconds = if seconds.is_finite() && seconds > 0.0 {
        seconds
    } else {
        0.0
    };

    if seconds < 1.0 {
        format!("{:.0}ms", seconds * 1000.0)
    } else if seconds < 60.0 {
        format!("{:.1}s", seconds)
    } else {
        let minutes = (seconds / 60.0).floor() as u64;
        let rest = seconds - (minutes as f64) * 60.0;
        format!("{}m {:.0}s", minutes, rest)
    }
}

/// Remaining time for a queue row; `-` while no estimate exists.
pub fn format_remaining(seconds: Option<f64>) -> String {
    match seconds {
        Some(s) => format_duration(s),
        None => "-".to_string(),
    }
}

pub fn format_timestamp(at: &NaiveDateTime) -> String {
    at.format("%Y-%m-%d %H:%M").to_string()
}
