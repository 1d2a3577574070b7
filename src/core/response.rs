//! Outbound message text utilities
//!
//! Chunking, truncation, and the human-readable time formatting used in
//! reminder confirmations and list output.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.2.0

use chrono::{DateTime, Datelike, FixedOffset, Utc};

/// Conservative per-message length limit for chat transports.
pub const MESSAGE_LIMIT: usize = 1600;

/// Chunk text into transport-sized pieces (UTF-8 safe, line-aware).
///
/// Prefers splitting at newlines; falls back to character-boundary splits
/// for single lines longer than `max_size`.
pub fn chunk_text(text: &str, max_size: usize) -> Vec<String> {
    if text.len() <= max_size {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();

    for line in text.lines() {
        if current.len() + line.len() + 1 > max_size {
            if !current.is_empty() {
                chunks.push(current.trim_end().to_string());
                current = String::new();
            }
            if line.len() + 1 > max_size {
                chunks.extend(chunk_long_line(line, max_size));
                continue;
            }
        }
        current.push_str(line);
        current.push('\n');
    }
    if !current.is_empty() {
        chunks.push(current.trim_end().to_string());
    }
    chunks
}

/// Split one long line at UTF-8 character boundaries.
fn chunk_long_line(line: &str, max_size: usize) -> Vec<String> {
    let mut result = Vec::new();
    let mut current = String::new();

    for ch in line.chars() {
        if current.len() + ch.len_utf8() > max_size && !current.is_empty() {
            result.push(current);
            current = String::new();
        }
        current.push(ch);
    }
    if !current.is_empty() {
        result.push(current);
    }
    result
}

/// Chunk text for outbound chat messages.
pub fn chunk_for_message(text: &str) -> Vec<String> {
    chunk_text(text, MESSAGE_LIMIT)
}

/// Truncate text to the message limit, adding an ellipsis if needed.
pub fn truncate_for_message(text: &str) -> String {
    if text.len() <= MESSAGE_LIMIT {
        return text.to_string();
    }
    let mut end = MESSAGE_LIMIT - 3;
    while !text.is_char_boundary(end) && end > 0 {
        end -= 1;
    }
    format!("{}...", &text[..end])
}

/// Format a duration in seconds into a human-readable string.
pub fn format_duration(seconds: i64) -> String {
    if seconds < 60 {
        format!("{} second{}", seconds, plural(seconds))
    } else if seconds < 3600 {
        let mins = seconds / 60;
        format!("{} minute{}", mins, plural(mins))
    } else if seconds < 86400 {
        let hours = seconds / 3600;
        let mins = (seconds % 3600) / 60;
        if mins > 0 {
            format!("{} hour{} {} minute{}", hours, plural(hours), mins, plural(mins))
        } else {
            format!("{} hour{}", hours, plural(hours))
        }
    } else {
        let days = seconds / 86400;
        let hours = (seconds % 86400) / 3600;
        if hours > 0 {
            format!("{} day{} {} hour{}", days, plural(days), hours, plural(hours))
        } else {
            format!("{} day{}", days, plural(days))
        }
    }
}

fn plural(n: i64) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

/// Format an absolute due time for the owner's timezone.
///
/// Same-day and next-day times are shortened to "today"/"tomorrow".
pub fn format_due_time(due: DateTime<Utc>, now: DateTime<Utc>, tz: FixedOffset) -> String {
    let local = due.with_timezone(&tz);
    let local_now = now.with_timezone(&tz);

    let date_part = if local.date_naive() == local_now.date_naive() {
        "today".to_string()
    } else if Some(local.date_naive()) == local_now.date_naive().succ_opt() {
        "tomorrow".to_string()
    } else {
        format!("{:04}-{:02}-{:02}", local.year(), local.month(), local.day())
    };

    format!("{} at {}", date_part, local.format("%H:%M"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_short_text_no_chunk() {
        assert_eq!(chunk_text("hello", 100), vec!["hello"]);
    }

    #[test]
    fn test_chunk_splits_at_lines() {
        let text = "line one\nline two\nline three";
        let chunks = chunk_text(text, 12);
        assert!(chunks.len() >= 2);
        for chunk in &chunks {
            assert!(chunk.len() <= 12);
        }
    }

    #[test]
    fn test_chunk_long_single_line() {
        let text = "a".repeat(50);
        let chunks = chunk_text(&text, 20);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), 20);
    }

    #[test]
    fn test_chunk_utf8_safe() {
        let text = "ação é paçoca ".repeat(20);
        for chunk in chunk_text(&text, 30) {
            assert!(chunk.len() <= 30);
            // would panic on a broken boundary
            let _ = chunk.chars().count();
        }
    }

    #[test]
    fn test_truncate_for_message() {
        let text = "x".repeat(MESSAGE_LIMIT + 100);
        let truncated = truncate_for_message(&text);
        assert_eq!(truncated.len(), MESSAGE_LIMIT);
        assert!(truncated.ends_with("..."));
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(30), "30 seconds");
        assert_eq!(format_duration(1), "1 second");
        assert_eq!(format_duration(60), "1 minute");
        assert_eq!(format_duration(120), "2 minutes");
        assert_eq!(format_duration(3600), "1 hour");
        assert_eq!(format_duration(3660), "1 hour 1 minute");
        assert_eq!(format_duration(86400), "1 day");
        assert_eq!(format_duration(90000), "1 day 1 hour");
    }

    #[test]
    fn test_format_due_time_today_and_tomorrow() {
        let tz = FixedOffset::east_opt(0).unwrap();
        let now = Utc.with_ymd_and_hms(2025, 6, 10, 8, 0, 0).unwrap();

        let later = Utc.with_ymd_and_hms(2025, 6, 10, 14, 30, 0).unwrap();
        assert_eq!(format_due_time(later, now, tz), "today at 14:30");

        let tomorrow = Utc.with_ymd_and_hms(2025, 6, 11, 9, 0, 0).unwrap();
        assert_eq!(format_due_time(tomorrow, now, tz), "tomorrow at 09:00");

        let far = Utc.with_ymd_and_hms(2025, 7, 1, 9, 0, 0).unwrap();
        assert_eq!(format_due_time(far, now, tz), "2025-07-01 at 09:00");
    }

    #[test]
    fn test_format_due_time_offset_shifts_date() {
        // 23:30 UTC is already "tomorrow" in a +03:00 zone
        let tz = FixedOffset::east_opt(3 * 3600).unwrap();
        let now = Utc.with_ymd_and_hms(2025, 6, 10, 12, 0, 0).unwrap();
        let due = Utc.with_ymd_and_hms(2025, 6, 10, 23, 30, 0).unwrap();
        assert_eq!(format_due_time(due, now, tz), "tomorrow at 02:30");
    }
}
