//! Model-backed slot extraction
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.2.0

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use log::{debug, warn};
use serde::Deserialize;

use crate::features::llm::{single_turn, strip_code_fences};
use crate::features::reminders::Recurrence;
use super::extractor::{RuleBasedExtractor, SlotExtraction, SlotExtractor};
use super::timeparse::{find_recurrence, resolve_absolute, resolve_due_phrase};

const SYSTEM_PROMPT: &str = "\
You are an assistant specialized in extracting reminder details from chat messages.

Analyze the user's message and extract:
- what should be remembered (the action)
- when the reminder should fire
- whether it repeats

Return a JSON object with exactly this shape:
{
  \"action\": \"text of the reminder\" or null,
  \"due_time\": \"YYYY-MM-DD HH:MM\" or null,
  \"due_phrase\": \"the verbatim time expression from the message\" or null,
  \"recurrence_seconds\": number or null
}

Rules:
- \"due_time\" is the resolved date and time in the user's timezone; prefer it
  when the message names a concrete moment.
- When you cannot resolve the moment yourself, copy the raw expression into
  \"due_phrase\" instead and leave \"due_time\" null.
- Never invent a time: if the message gives none, both time fields are null.
- \"recurrence_seconds\" is the repeat interval (e.g. 86400 for daily), or null.

Examples:
- \"remind me to pay the bill tomorrow at 10am\" -> {\"action\": \"pay the bill\", \"due_time\": \"2023-05-11 10:00\", \"due_phrase\": \"tomorrow at 10am\", \"recurrence_seconds\": null}
- \"remind me to stand up every hour\" -> {\"action\": \"stand up\", \"due_time\": null, \"due_phrase\": \"in 1 hour\", \"recurrence_seconds\": 3600}
- \"remind me to call my mom\" -> {\"action\": \"call my mom\", \"due_time\": null, \"due_phrase\": null, \"recurrence_seconds\": null}";

#[derive(Debug, Deserialize)]
struct RawExtraction {
    action: Option<String>,
    due_time: Option<String>,
    due_phrase: Option<String>,
    recurrence_seconds: Option<i64>,
}

/// Slot extractor backed by an OpenAI chat model, with the rule-based
/// extractor as a fallback when the model call fails.
pub struct OpenAiSlotExtractor {
    model: String,
}

impl OpenAiSlotExtractor {
    pub fn new(model: impl Into<String>) -> Self {
        OpenAiSlotExtractor { model: model.into() }
    }

    async fn extract_with_model(
        &self,
        text: &str,
        received_at: DateTime<Utc>,
        tz: FixedOffset,
    ) -> Result<SlotExtraction> {
        let local_now = received_at.with_timezone(&tz);
        let system_prompt = format!(
            "{SYSTEM_PROMPT}\n\nThe current date and time in the user's timezone is {}.",
            local_now.format("%Y-%m-%d %H:%M")
        );

        let response = single_turn(&self.model, &system_prompt, text).await?;
        let raw: RawExtraction = serde_json::from_str(strip_code_fences(&response))
            .context("extractor returned malformed JSON")?;
        debug!("Extracted raw slots: {raw:?}");

        let (due_at, due_issue) = match (&raw.due_time, &raw.due_phrase) {
            (Some(absolute), _) => match resolve_absolute(absolute, received_at, tz) {
                Ok(due) => (Some(due), None),
                Err(issue) => (None, Some(issue)),
            },
            (None, Some(phrase)) => match resolve_due_phrase(phrase, received_at, tz) {
                Ok(due) => (Some(due), None),
                Err(issue) => (None, Some(issue)),
            },
            (None, None) => (None, None),
        };

        let recurrence = raw
            .recurrence_seconds
            .and_then(Recurrence::from_seconds)
            .or_else(|| find_recurrence(text).map(|(r, _)| r));

        let action = raw
            .action
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty());

        Ok(SlotExtraction {
            action,
            due_at,
            due_issue,
            recurrence,
        })
    }
}

#[async_trait]
impl SlotExtractor for OpenAiSlotExtractor {
    async fn extract(
        &self,
        text: &str,
        received_at: DateTime<Utc>,
        tz: FixedOffset,
    ) -> Result<SlotExtraction> {
        match self.extract_with_model(text, received_at, tz).await {
            Ok(slots) => Ok(slots),
            Err(e) => {
                warn!("⚠️ Model extraction failed, falling back to rules: {e:#}");
                RuleBasedExtractor.extract(text, received_at, tz).await
            }
        }
    }
}
