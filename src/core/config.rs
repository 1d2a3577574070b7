//! # Configuration
//!
//! Environment-derived configuration for the assistant.
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.1.0
//!
//! ## Changelog
//! - 1.1.0: Add dispatch lease timeout and recent-window settings
//! - 1.0.0: Initial creation

use anyhow::{anyhow, Context, Result};
use chrono::FixedOffset;
use std::time::Duration;

/// Runtime configuration, loaded from the environment.
///
/// Every knob has a documented default so the bot starts with nothing but
/// `OPENAI_API_KEY` set.
#[derive(Clone, Debug)]
pub struct Config {
    /// OpenAI API key (required).
    pub openai_api_key: String,
    /// Chat model used for classification, extraction, and conversation.
    pub openai_model: String,
    /// Path to the sqlite database file.
    pub database_path: String,
    /// The owner-facing timezone as a fixed UTC offset, e.g. `-03:00`.
    pub timezone: FixedOffset,
    /// Classifications below this confidence are treated as UNKNOWN.
    pub confidence_threshold: f32,
    /// Interval between reminder sweeps.
    pub sweep_interval: Duration,
    /// How long an incomplete draft survives before it is abandoned.
    pub draft_timeout: Duration,
    /// How far past due a reminder may slip before it expires undelivered.
    pub grace_window: Duration,
    /// Bounded retry count for notification dispatch.
    pub max_dispatch_attempts: u32,
    /// How long fired/expired reminders keep showing up in list output.
    pub recent_window: Duration,
    /// Age after which an in-flight dispatch lease is considered stale.
    pub lease_timeout: Duration,
    /// Bounded length of per-owner conversation context.
    pub context_turns: usize,
}

impl Config {
    /// Load configuration from the environment.
    ///
    /// Call `dotenvy::dotenv()` first if a `.env` file should be honored.
    pub fn from_env() -> Result<Self> {
        let openai_api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow!("OPENAI_API_KEY must be set"))?;

        Ok(Config {
            openai_api_key,
            openai_model: env_or("OPENAI_MODEL", "gpt-4o-mini"),
            database_path: env_or("DATABASE_PATH", "concierge.db"),
            timezone: parse_offset(&env_or("ASSISTANT_TIMEZONE", "+00:00"))?,
            confidence_threshold: env_parsed("INTENT_CONFIDENCE_THRESHOLD", 0.6)?,
            sweep_interval: Duration::from_secs(env_parsed("SWEEP_INTERVAL_SECS", 60)?),
            draft_timeout: Duration::from_secs(env_parsed("DRAFT_TIMEOUT_SECS", 1800)?),
            grace_window: Duration::from_secs(env_parsed("GRACE_WINDOW_SECS", 1800)?),
            max_dispatch_attempts: env_parsed("MAX_DISPATCH_ATTEMPTS", 3)?,
            recent_window: Duration::from_secs(env_parsed("RECENT_WINDOW_SECS", 86400)?),
            lease_timeout: Duration::from_secs(env_parsed("LEASE_TIMEOUT_SECS", 120)?),
            context_turns: env_parsed("CONTEXT_TURNS", 10)?,
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("invalid value for {key}: '{raw}'")),
        Err(_) => Ok(default),
    }
}

/// Parse a `+HH:MM` / `-HH:MM` offset string into a `FixedOffset`.
pub fn parse_offset(raw: &str) -> Result<FixedOffset> {
    let raw = raw.trim();
    let (sign, rest) = match raw.as_bytes().first() {
        Some(b'+') => (1, &raw[1..]),
        Some(b'-') => (-1, &raw[1..]),
        _ => (1, raw),
    };
    let (hours, minutes) = rest
        .split_once(':')
        .ok_or_else(|| anyhow!("timezone offset must look like +HH:MM, got '{raw}'"))?;
    let hours: i32 = hours
        .parse()
        .with_context(|| format!("bad hour in timezone offset '{raw}'"))?;
    let minutes: i32 = minutes
        .parse()
        .with_context(|| format!("bad minute in timezone offset '{raw}'"))?;
    if !(0..24).contains(&hours) || !(0..60).contains(&minutes) {
        return Err(anyhow!("timezone offset out of range: '{raw}'"));
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
        .ok_or_else(|| anyhow!("timezone offset out of range: '{raw}'"))
}
