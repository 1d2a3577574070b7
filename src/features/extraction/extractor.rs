//! Slot extractor contract and rule-based implementation
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.2.0

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use regex::Regex;
use std::ops::Range;
use std::sync::OnceLock;

use crate::features::reminders::Recurrence;
use super::timeparse::{find_due_time, find_recurrence, DueTimeIssue};

/// Structured fields extracted from a reminder-intent message.
///
/// Every field is optional; missing fields drive the clarification loop.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SlotExtraction {
    pub action: Option<String>,
    pub due_at: Option<DateTime<Utc>>,
    /// Set when a due-time expression was present but unusable.
    pub due_issue: Option<DueTimeIssue>,
    pub recurrence: Option<Recurrence>,
}

/// Slot extraction contract.
///
/// Due times are resolved against the message's received timestamp and the
/// owner's timezone; past-resolving expressions surface as
/// [`SlotExtraction::due_issue`], never a clamped time.
#[async_trait]
pub trait SlotExtractor: Send + Sync {
    async fn extract(
        &self,
        text: &str,
        received_at: DateTime<Utc>,
        tz: FixedOffset,
    ) -> Result<SlotExtraction>;
}

fn action_prefix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)^(?:please\s+)?(?:can you\s+)?(?:remind me|set\s+(?:a\s+|up\s+a\s+)?reminder|remember|new reminder:?|reminder:?)(?:\s+(?:to|about|of|that|for))?\s*",
        )
        .unwrap()
    })
}

/// Regex-driven extractor for common phrasings.
///
/// Good enough to run the engine without a model; the LLM extractor handles
/// everything this one cannot.
pub struct RuleBasedExtractor;

#[async_trait]
impl SlotExtractor for RuleBasedExtractor {
    async fn extract(
        &self,
        text: &str,
        received_at: DateTime<Utc>,
        tz: FixedOffset,
    ) -> Result<SlotExtraction> {
        let mut consumed: Vec<Range<usize>> = Vec::new();

        let recurrence = match find_recurrence(text) {
            Some((recurrence, span)) => {
                consumed.push(span);
                Some(recurrence)
            }
            None => None,
        };

        let (due_at, due_issue) = match find_due_time(text, received_at, tz) {
            Ok(Some(found)) => {
                consumed.push(found.span);
                (Some(found.due), None)
            }
            Ok(None) => (None, None),
            Err(issue) => (None, Some(issue)),
        };

        Ok(SlotExtraction {
            action: extract_action(text, &consumed),
            due_at,
            due_issue,
            recurrence,
        })
    }
}

/// Strip the time/recurrence spans and request boilerplate, leaving the
/// action text.
fn extract_action(text: &str, consumed: &[Range<usize>]) -> Option<String> {
    let mut remaining = String::with_capacity(text.len());
    for (i, ch) in text.char_indices() {
        if consumed.iter().any(|span| span.contains(&i)) {
            continue;
        }
        remaining.push(ch);
    }

    let remaining = remaining.trim();
    let stripped = action_prefix_re().replace(remaining, "");
    let cleaned = stripped
        .trim_matches(|c: char| c.is_whitespace() || matches!(c, ',' | '.' | '!' | '?' | ';' | ':'))
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}
