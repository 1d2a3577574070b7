//! Due-time expression resolution
//!
//! Turns expressions like "in 10 minutes", "tomorrow at 9am", or "2025-06-12
//! 14:00" into absolute UTC timestamps, resolved against the message's
//! received time and the owner's configured timezone. Ambiguous or
//! past-resolving expressions are reported as issues, never clamped to "now".
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.2.0

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, TimeZone, Utc, Weekday};
use regex::Regex;
use std::ops::Range;
use std::sync::OnceLock;
use thiserror::Error;

use crate::features::reminders::Recurrence;

/// Why a due-time expression could not be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DueTimeIssue {
    /// No interpretable time, or more than one plausible reading.
    #[error("the time expression is ambiguous")]
    Ambiguous,
    /// The expression resolves to a moment at or before the message.
    #[error("the time has already passed")]
    InPast,
}

/// A due time found inside free text, with the span it occupied.
#[derive(Debug, Clone, PartialEq)]
pub struct FoundDueTime {
    pub due: DateTime<Utc>,
    pub span: Range<usize>,
}

fn in_relative_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\bin\s+(\d+)\s*(seconds?|secs?|minutes?|mins?|hours?|hrs?|days?|weeks?|s|m|h|d|w)\b",
        )
        .unwrap()
    })
}

fn in_article_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bin\s+an?\s+(second|minute|hour|day|week)\b").unwrap())
}

fn compact_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bin\s+((?:\d+[smhdw])+)\b").unwrap())
}

fn tomorrow_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\btomorrow\b(?:\s+at\s+(\d{1,2})(?::(\d{2}))?\s*(am|pm)?)?").unwrap()
    })
}

fn today_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\btoday\s+at\s+(\d{1,2})(?::(\d{2}))?\s*(am|pm)?").unwrap()
    })
}

fn weekday_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\b(?:on\s+)?(monday|tuesday|wednesday|thursday|friday|saturday|sunday)\b(?:\s+at\s+(\d{1,2})(?::(\d{2}))?\s*(am|pm)?)?",
        )
        .unwrap()
    })
}

fn at_time_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bat\s+(\d{1,2})(?::(\d{2}))?\s*(am|pm)?\b").unwrap())
}

fn absolute_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b(\d{4})-(\d{2})-(\d{2})[ T](\d{1,2}):(\d{2})\b").unwrap()
    })
}

fn recurrence_count_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\bevery\s+(\d+)\s+(minutes?|hours?|days?|weeks?)\b").unwrap()
    })
}

fn recurrence_unit_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\bevery\s+(minute|hour|day|week|morning|evening|night)\b|\b(hourly|daily|weekly)\b")
            .unwrap()
    })
}

/// Find the first due-time expression in `text` and resolve it.
///
/// `Ok(None)` means no time expression was present at all; `Err` means an
/// expression was found but could not be turned into a valid future time.
pub fn find_due_time(
    text: &str,
    received_at: DateTime<Utc>,
    tz: FixedOffset,
) -> Result<Option<FoundDueTime>, DueTimeIssue> {
    if let Some(caps) = absolute_re().captures(text) {
        let m = caps.get(0).ok_or(DueTimeIssue::Ambiguous)?;
        let due = resolve_absolute(m.as_str(), received_at, tz)?;
        return Ok(Some(FoundDueTime { due, span: m.range() }));
    }

    if let Some(caps) = in_relative_re().captures(text) {
        let m = caps.get(0).ok_or(DueTimeIssue::Ambiguous)?;
        let amount: i64 = caps[1].parse().map_err(|_| DueTimeIssue::Ambiguous)?;
        let seconds = amount * unit_seconds(&caps[2]).ok_or(DueTimeIssue::Ambiguous)?;
        let due = strictly_future(received_at + Duration::seconds(seconds), received_at)?;
        return Ok(Some(FoundDueTime { due, span: m.range() }));
    }

    if let Some(caps) = in_article_re().captures(text) {
        let m = caps.get(0).ok_or(DueTimeIssue::Ambiguous)?;
        let seconds = unit_seconds(&caps[1]).ok_or(DueTimeIssue::Ambiguous)?;
        let due = strictly_future(received_at + Duration::seconds(seconds), received_at)?;
        return Ok(Some(FoundDueTime { due, span: m.range() }));
    }

    if let Some(caps) = compact_re().captures(text) {
        let m = caps.get(0).ok_or(DueTimeIssue::Ambiguous)?;
        let seconds = parse_compact_duration(&caps[1]).ok_or(DueTimeIssue::Ambiguous)?;
        let due = strictly_future(received_at + Duration::seconds(seconds), received_at)?;
        return Ok(Some(FoundDueTime { due, span: m.range() }));
    }

    if let Some(caps) = tomorrow_re().captures(text) {
        let m = caps.get(0).ok_or(DueTimeIssue::Ambiguous)?;
        let (hour, minute) = match caps.get(1) {
            Some(_) => parse_clock(&caps[1], caps.get(2).map(|c| c.as_str()), caps.get(3).map(|c| c.as_str()))?,
            // bare "tomorrow" defaults to morning
            None => (9, 0),
        };
        let local_now = received_at.with_timezone(&tz);
        let date = local_now.date_naive() + Duration::days(1);
        let due = local_to_utc(date, hour, minute, tz)?;
        return Ok(Some(FoundDueTime {
            due: strictly_future(due, received_at)?,
            span: m.range(),
        }));
    }

    if let Some(caps) = today_re().captures(text) {
        let m = caps.get(0).ok_or(DueTimeIssue::Ambiguous)?;
        let (hour, minute) =
            parse_clock(&caps[1], caps.get(2).map(|c| c.as_str()), caps.get(3).map(|c| c.as_str()))?;
        let local_now = received_at.with_timezone(&tz);
        let due = local_to_utc(local_now.date_naive(), hour, minute, tz)?;
        return Ok(Some(FoundDueTime {
            due: strictly_future(due, received_at)?,
            span: m.range(),
        }));
    }

    if let Some(caps) = weekday_re().captures(text) {
        let m = caps.get(0).ok_or(DueTimeIssue::Ambiguous)?;
        let target = parse_weekday(&caps[1]).ok_or(DueTimeIssue::Ambiguous)?;
        let (hour, minute) = match caps.get(2) {
            Some(_) => parse_clock(&caps[2], caps.get(3).map(|c| c.as_str()), caps.get(4).map(|c| c.as_str()))?,
            None => (9, 0),
        };
        let local_now = received_at.with_timezone(&tz);
        let ahead = i64::from(
            (target.num_days_from_monday() + 7 - local_now.weekday().num_days_from_monday()) % 7,
        );
        let mut due = local_to_utc(local_now.date_naive() + Duration::days(ahead), hour, minute, tz)?;
        if due <= received_at {
            due = local_to_utc(
                local_now.date_naive() + Duration::days(ahead + 7),
                hour,
                minute,
                tz,
            )?;
        }
        return Ok(Some(FoundDueTime {
            due: strictly_future(due, received_at)?,
            span: m.range(),
        }));
    }

    if let Some(caps) = at_time_re().captures(text) {
        let m = caps.get(0).ok_or(DueTimeIssue::Ambiguous)?;
        let (hour, minute) =
            parse_clock(&caps[1], caps.get(2).map(|c| c.as_str()), caps.get(3).map(|c| c.as_str()))?;
        let local_now = received_at.with_timezone(&tz);
        // next occurrence of that wall-clock time
        let mut due = local_to_utc(local_now.date_naive(), hour, minute, tz)?;
        if due <= received_at {
            due = local_to_utc(local_now.date_naive() + Duration::days(1), hour, minute, tz)?;
        }
        return Ok(Some(FoundDueTime { due, span: m.range() }));
    }

    Ok(None)
}

/// Resolve a standalone phrase (e.g. produced by the language model) into an
/// absolute future time.
pub fn resolve_due_phrase(
    phrase: &str,
    received_at: DateTime<Utc>,
    tz: FixedOffset,
) -> Result<DateTime<Utc>, DueTimeIssue> {
    match find_due_time(phrase, received_at, tz)? {
        Some(found) => Ok(found.due),
        None => Err(DueTimeIssue::Ambiguous),
    }
}

/// Resolve an absolute `YYYY-MM-DD HH:MM` expression in the owner's timezone.
pub fn resolve_absolute(
    raw: &str,
    received_at: DateTime<Utc>,
    tz: FixedOffset,
) -> Result<DateTime<Utc>, DueTimeIssue> {
    let caps = absolute_re()
        .captures(raw.trim())
        .ok_or(DueTimeIssue::Ambiguous)?;
    let year: i32 = caps[1].parse().map_err(|_| DueTimeIssue::Ambiguous)?;
    let month: u32 = caps[2].parse().map_err(|_| DueTimeIssue::Ambiguous)?;
    let day: u32 = caps[3].parse().map_err(|_| DueTimeIssue::Ambiguous)?;
    let hour: u32 = caps[4].parse().map_err(|_| DueTimeIssue::Ambiguous)?;
    let minute: u32 = caps[5].parse().map_err(|_| DueTimeIssue::Ambiguous)?;

    let date = NaiveDate::from_ymd_opt(year, month, day).ok_or(DueTimeIssue::Ambiguous)?;
    let due = local_to_utc(date, hour, minute, tz)?;
    strictly_future(due, received_at)
}

/// Parse a compact duration like `30m`, `2h`, or `1h30m` into seconds.
pub fn parse_compact_duration(raw: &str) -> Option<i64> {
    let raw = raw.trim().to_lowercase();
    let mut total_seconds: i64 = 0;
    let mut current_number = String::new();

    for c in raw.chars() {
        if c.is_ascii_digit() {
            current_number.push(c);
        } else if !current_number.is_empty() {
            let value: i64 = current_number.parse().ok()?;
            current_number.clear();
            total_seconds += value * unit_seconds(&c.to_string())?;
        } else {
            return None;
        }
    }

    if total_seconds > 0 && current_number.is_empty() {
        Some(total_seconds)
    } else {
        None
    }
}

/// Find a recurrence expression like "every day" or "every 2 hours".
pub fn find_recurrence(text: &str) -> Option<(Recurrence, Range<usize>)> {
    if let Some(caps) = recurrence_count_re().captures(text) {
        let m = caps.get(0)?;
        let count: i64 = caps[1].parse().ok()?;
        let seconds = count.checked_mul(unit_seconds(&caps[2])?)?;
        return Recurrence::from_seconds(seconds).map(|r| (r, m.range()));
    }
    if let Some(caps) = recurrence_unit_re().captures(text) {
        let m = caps.get(0)?;
        let unit = caps
            .get(1)
            .or_else(|| caps.get(2))
            .map(|c| c.as_str().to_lowercase())?;
        let seconds = match unit.as_str() {
            "minute" => 60,
            "hour" | "hourly" => 3600,
            "day" | "daily" | "morning" | "evening" | "night" => 86400,
            "week" | "weekly" => 604800,
            _ => return None,
        };
        return Recurrence::from_seconds(seconds).map(|r| (r, m.range()));
    }
    None
}

fn unit_seconds(unit: &str) -> Option<i64> {
    match unit.to_lowercase().as_str() {
        "s" | "sec" | "secs" | "second" | "seconds" => Some(1),
        "m" | "min" | "mins" | "minute" | "minutes" => Some(60),
        "h" | "hr" | "hrs" | "hour" | "hours" => Some(3600),
        "d" | "day" | "days" => Some(86400),
        "w" | "week" | "weeks" => Some(604800),
        _ => None,
    }
}

fn parse_clock(
    hour_raw: &str,
    minute_raw: Option<&str>,
    meridiem: Option<&str>,
) -> Result<(u32, u32), DueTimeIssue> {
    let hour: u32 = hour_raw.parse().map_err(|_| DueTimeIssue::Ambiguous)?;
    let minute: u32 = minute_raw
        .unwrap_or("0")
        .parse()
        .map_err(|_| DueTimeIssue::Ambiguous)?;
    if minute > 59 {
        return Err(DueTimeIssue::Ambiguous);
    }

    let hour = match meridiem.map(|m| m.to_lowercase()) {
        Some(m) if m == "am" => match hour {
            12 => 0,
            1..=11 => hour,
            _ => return Err(DueTimeIssue::Ambiguous),
        },
        Some(m) if m == "pm" => match hour {
            12 => 12,
            1..=11 => hour + 12,
            _ => return Err(DueTimeIssue::Ambiguous),
        },
        _ => {
            if hour > 23 {
                return Err(DueTimeIssue::Ambiguous);
            }
            hour
        }
    };
    Ok((hour, minute))
}

fn parse_weekday(raw: &str) -> Option<Weekday> {
    match raw.to_lowercase().as_str() {
        "monday" => Some(Weekday::Mon),
        "tuesday" => Some(Weekday::Tue),
        "wednesday" => Some(Weekday::Wed),
        "thursday" => Some(Weekday::Thu),
        "friday" => Some(Weekday::Fri),
        "saturday" => Some(Weekday::Sat),
        "sunday" => Some(Weekday::Sun),
        _ => None,
    }
}

fn local_to_utc(
    date: NaiveDate,
    hour: u32,
    minute: u32,
    tz: FixedOffset,
) -> Result<DateTime<Utc>, DueTimeIssue> {
    let naive = date
        .and_hms_opt(hour, minute, 0)
        .ok_or(DueTimeIssue::Ambiguous)?;
    tz.from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or(DueTimeIssue::Ambiguous)
}

fn strictly_future(
    due: DateTime<Utc>,
    received_at: DateTime<Utc>,
) -> Result<DateTime<Utc>, DueTimeIssue> {
    if due > received_at {
        Ok(due)
    } else {
        Err(DueTimeIssue::InPast)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 2025-06-10 is a Tuesday.
    fn received() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 10, 12, 0, 0).unwrap()
    }

    fn utc_tz() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    fn resolve(text: &str) -> Result<DateTime<Utc>, DueTimeIssue> {
        resolve_due_phrase(text, received(), utc_tz())
    }

    #[test]
    fn test_in_minutes_is_exact() {
        let due = resolve("in 5 minutes").unwrap();
        assert_eq!(due, received() + Duration::minutes(5));
    }

    #[test]
    fn test_in_unit_variants() {
        assert_eq!(resolve("in 10 min").unwrap(), received() + Duration::minutes(10));
        assert_eq!(resolve("in 2 hours").unwrap(), received() + Duration::hours(2));
        assert_eq!(resolve("in 3 days").unwrap(), received() + Duration::days(3));
        assert_eq!(resolve("in an hour").unwrap(), received() + Duration::hours(1));
        assert_eq!(resolve("in a minute").unwrap(), received() + Duration::minutes(1));
    }

    #[test]
    fn test_compact_duration() {
        assert_eq!(parse_compact_duration("30s"), Some(30));
        assert_eq!(parse_compact_duration("30m"), Some(1800));
        assert_eq!(parse_compact_duration("2h"), Some(7200));
        assert_eq!(parse_compact_duration("1d"), Some(86400));
        assert_eq!(parse_compact_duration("1w"), Some(604800));
        assert_eq!(parse_compact_duration("1h30m"), Some(5400));
        assert_eq!(parse_compact_duration("invalid"), None);
        assert_eq!(parse_compact_duration(""), None);
        assert_eq!(parse_compact_duration("90"), None);
    }

    #[test]
    fn test_in_compact_form() {
        assert_eq!(resolve("in 1h30m").unwrap(), received() + Duration::minutes(90));
    }

    #[test]
    fn test_tomorrow_defaults_to_morning() {
        let due = resolve("tomorrow").unwrap();
        assert_eq!(due, Utc.with_ymd_and_hms(2025, 6, 11, 9, 0, 0).unwrap());
    }

    #[test]
    fn test_tomorrow_at_time() {
        assert_eq!(
            resolve("tomorrow at 9am").unwrap(),
            Utc.with_ymd_and_hms(2025, 6, 11, 9, 0, 0).unwrap()
        );
        assert_eq!(
            resolve("tomorrow at 21:15").unwrap(),
            Utc.with_ymd_and_hms(2025, 6, 11, 21, 15, 0).unwrap()
        );
        assert_eq!(
            resolve("tomorrow at 12pm").unwrap(),
            Utc.with_ymd_and_hms(2025, 6, 11, 12, 0, 0).unwrap()
        );
        assert_eq!(
            resolve("tomorrow at 12am").unwrap(),
            Utc.with_ymd_and_hms(2025, 6, 11, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_today_at_future_time() {
        assert_eq!(
            resolve("today at 5pm").unwrap(),
            Utc.with_ymd_and_hms(2025, 6, 10, 17, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_today_at_past_time_is_rejected() {
        assert_eq!(resolve("today at 8am"), Err(DueTimeIssue::InPast));
    }

    #[test]
    fn test_bare_at_time_rolls_to_next_occurrence() {
        // 10am already passed at noon; next occurrence is tomorrow
        assert_eq!(
            resolve("at 10am").unwrap(),
            Utc.with_ymd_and_hms(2025, 6, 11, 10, 0, 0).unwrap()
        );
        assert_eq!(
            resolve("at 14:30").unwrap(),
            Utc.with_ymd_and_hms(2025, 6, 10, 14, 30, 0).unwrap()
        );
    }

    #[test]
    fn test_weekday_resolution() {
        // Friday after Tuesday noon
        assert_eq!(
            resolve("on friday at 3pm").unwrap(),
            Utc.with_ymd_and_hms(2025, 6, 13, 15, 0, 0).unwrap()
        );
        // "tuesday" on a Tuesday noon with a default 9am time rolls a week
        assert_eq!(
            resolve("on tuesday").unwrap(),
            Utc.with_ymd_and_hms(2025, 6, 17, 9, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_absolute_expression() {
        assert_eq!(
            resolve("2025-06-12 14:00").unwrap(),
            Utc.with_ymd_and_hms(2025, 6, 12, 14, 0, 0).unwrap()
        );
        assert_eq!(resolve("2025-06-01 14:00"), Err(DueTimeIssue::InPast));
    }

    #[test]
    fn test_timezone_offset_applies() {
        let tz = FixedOffset::west_opt(3 * 3600).unwrap();
        let due = resolve_due_phrase("tomorrow at 9am", received(), tz).unwrap();
        // 09:00 at UTC-3 is 12:00 UTC
        assert_eq!(due, Utc.with_ymd_and_hms(2025, 6, 11, 12, 0, 0).unwrap());
    }

    #[test]
    fn test_unresolvable_is_ambiguous() {
        assert_eq!(resolve("sometime"), Err(DueTimeIssue::Ambiguous));
        assert_eq!(resolve("whenever you can"), Err(DueTimeIssue::Ambiguous));
    }

    #[test]
    fn test_invalid_clock_is_ambiguous() {
        assert_eq!(resolve("tomorrow at 25:00"), Err(DueTimeIssue::Ambiguous));
        assert_eq!(resolve("tomorrow at 13pm"), Err(DueTimeIssue::Ambiguous));
    }

    #[test]
    fn test_find_due_time_reports_span() {
        let text = "call mom in 10 minutes please";
        let found = find_due_time(text, received(), utc_tz()).unwrap().unwrap();
        assert_eq!(&text[found.span.clone()], "in 10 minutes");
        assert_eq!(found.due, received() + Duration::minutes(10));
    }

    #[test]
    fn test_find_due_time_none_when_absent() {
        let found = find_due_time("call mom", received(), utc_tz()).unwrap();
        assert!(found.is_none());
    }

    #[test]
    fn test_find_recurrence() {
        let (rec, span) = find_recurrence("drink water every 2 hours").unwrap();
        assert_eq!(rec.seconds(), 7200);
        assert_eq!(&"drink water every 2 hours"[span], "every 2 hours");

        let (rec, _) = find_recurrence("stand up every day at 9am").unwrap();
        assert_eq!(rec.seconds(), 86400);
        let (rec, _) = find_recurrence("review notes weekly").unwrap();
        assert_eq!(rec.seconds(), 604800);
        assert!(find_recurrence("call mom tomorrow").is_none());
    }
}
