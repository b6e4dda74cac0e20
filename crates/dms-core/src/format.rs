//! Display helpers shared by the command-line output and the terminal UI.

use chrono::{DateTime, Utc};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Largest unit plus the next one when it is non-zero: `2h 5m`,
/// `3d`, `5m 3s`, `45s`.
pub fn format_elapsed(millis: i64) -> String {
    let seconds = millis.max(0) / 1000;
    let minutes = seconds / 60;
    let hours = minutes / 60;
    let days = hours / 24;

    let (major, major_unit, minor, minor_unit) = if days > 0 {
        (days, 'd', hours % 24, 'h')
    } else if hours > 0 {
        (hours, 'h', minutes % 60, 'm')
    } else if minutes > 0 {
        (minutes, 'm', seconds % 60, 's')
    } else {
        return format!("{seconds}s");
    };

    if minor > 0 {
        format!("{major}{major_unit} {minor}{minor_unit}")
    } else {
        format!("{major}{major_unit}")
    }
}

pub fn format_timestamp(at: Option<&DateTime<Utc>>) -> String {
    match at {
        Some(at) => at.format(TIMESTAMP_FORMAT).to_string(),
        None => "-".to_string(),
    }
}

/// Short label for an identifier: the last `:` segment, then the part after
/// the last `/` within it.
pub fn label_from_arn(arn: &str) -> &str {
    let tail = arn.rsplit(':').next().unwrap_or(arn);
    tail.rsplit('/').next().unwrap_or(tail)
}

/// Truncates to `max` characters, ending in `...` when shortened.
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    if max <= 3 {
        return text.chars().take(max).collect();
    }
    let mut out: String = text.chars().take(max - 3).collect();
    out.push_str("...");
    out
}
