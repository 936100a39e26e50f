// src/export.rs
//! Plain-text rendering of history snapshots
//!
//! Each entry renders as an optional header line (pin marker plus a relative
//! time label), the raw text, and a separator rule. The relative label is
//! evaluated against the instant passed in by the caller, so renders are
//! deterministic under test and always fresh in live use.

use chrono::{DateTime, Utc};

use crate::core::item::{now_unix, HistoryItem};

/// Prefix shown in front of pinned entries.
pub const PIN_MARKER: &str = "⭐ ";

/// Longest preview line produced for list views, in characters.
pub const PREVIEW_MAX_CHARS: usize = 140;

const SEPARATOR_WIDTH: usize = 40;

/// Render the snapshot against the current instant.
pub fn export_to_text(items: &[HistoryItem]) -> String {
    export_to_text_at(items, now_unix())
}

/// Render the snapshot against a fixed reference instant.
///
/// The output always ends with exactly one newline; an empty history renders
/// as a single newline.
pub fn export_to_text_at(items: &[HistoryItem], now: f64) -> String {
    let separator = "-".repeat(SEPARATOR_WIDTH);
    let mut lines: Vec<String> = Vec::new();
    for item in items {
        let pin = if item.pinned { PIN_MARKER } else { "" };
        let when = format_time_ago(item.ts, now);
        let header = format!("{pin}{when}");
        let header = header.trim();
        if !header.is_empty() {
            lines.push(header.to_string());
        }
        lines.push(item.text.clone());
        lines.push(separator.clone());
    }
    let body = lines.join("\n");
    format!("{}\n", body.trim_end())
}

/// Human label for how long ago `ts` was, relative to `now` (both unix
/// seconds, rendered on the UTC calendar).
///
/// Buckets: seconds, then minutes, then "Today HH:MM" for the same calendar
/// day, "Yesterday HH:MM" for the previous one, and an absolute date beyond
/// that. Negative ages clamp to zero; unrepresentable instants yield an
/// empty label.
pub fn format_time_ago(ts: f64, now: f64) -> String {
    let Some(then) = datetime_from_unix(ts) else {
        return String::new();
    };
    let Some(reference) = datetime_from_unix(now) else {
        return String::new();
    };

    let secs = ((now - ts) as i64).max(0);
    if secs < 60 {
        return format!("{secs}s ago");
    }
    let mins = secs / 60;
    if mins < 60 {
        return format!("{mins} min ago");
    }
    if then.date_naive() == reference.date_naive() {
        return format!("Today {}", then.format("%H:%M"));
    }
    if reference.date_naive().pred_opt() == Some(then.date_naive()) {
        return format!("Yesterday {}", then.format("%H:%M"));
    }
    then.format("%Y-%m-%d %H:%M").to_string()
}

/// One-line preview of an entry for list views: first line, a count of the
/// hidden ones, capped at [`PREVIEW_MAX_CHARS`] characters.
pub fn preview_line(text: &str) -> String {
    let mut lines = text.lines();
    let first = lines.next().unwrap_or(text);
    let extra = lines.count();

    let preview = if extra > 0 {
        format!("{first}  (＋{extra} lines)")
    } else {
        first.to_string()
    };
    let preview = preview.trim();
    if preview.chars().count() > PREVIEW_MAX_CHARS {
        let mut clipped: String = preview.chars().take(PREVIEW_MAX_CHARS).collect();
        clipped.push('…');
        clipped
    } else {
        preview.to_string()
    }
}

fn datetime_from_unix(ts: f64) -> Option<DateTime<Utc>> {
    if !ts.is_finite() {
        return None;
    }
    let secs = ts.floor();
    let nanos = ((ts - secs) * 1e9) as u32;
    DateTime::from_timestamp(secs as i64, nanos.min(999_999_999))
}
