//! Model-backed intent classification
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use log::{debug, warn};
use serde::Deserialize;

use crate::features::llm::{single_turn, strip_code_fences};
use super::classifier::{Classification, Intent, IntentClassifier, KeywordClassifier};

const SYSTEM_PROMPT: &str = "\
You are an assistant specialized in classifying the intent of chat messages.

Analyze the user's message and determine whether it asks to:
1. Create a reminder
2. List existing reminders
3. Cancel a reminder
4. Anything else (general conversation)

Return a JSON object of the form:
{
  \"intent\": \"reminder_create\" | \"reminder_list\" | \"reminder_cancel\" | \"general\",
  \"confidence\": 0.0 to 1.0
}

Where:
- \"intent\" is the detected intent type
- \"confidence\" is your confidence in the classification (0.0 to 1.0)

Examples:
- \"remind me to pay the bill tomorrow\" -> {\"intent\": \"reminder_create\", \"confidence\": 0.9}
- \"what are my reminders?\" -> {\"intent\": \"reminder_list\", \"confidence\": 0.9}
- \"cancel reminder 2\" -> {\"intent\": \"reminder_cancel\", \"confidence\": 0.9}
- \"how is the weather today?\" -> {\"intent\": \"general\", \"confidence\": 0.9}";

#[derive(Debug, Deserialize)]
struct RawClassification {
    intent: String,
    confidence: f32,
}

/// Intent classifier backed by an OpenAI chat model.
///
/// Falls back to keyword classification when the model call fails, so the
/// routing path keeps working through an API outage.
pub struct OpenAiIntentClassifier {
    model: String,
}

impl OpenAiIntentClassifier {
    pub fn new(model: impl Into<String>) -> Self {
        OpenAiIntentClassifier {
            model: model.into(),
        }
    }

    async fn classify_with_model(
        &self,
        text: &str,
        history: &[(String, String)],
    ) -> Result<Classification> {
        let user_message = if history.is_empty() {
            text.to_string()
        } else {
            // A couple of prior turns help disambiguate short follow-ups
            // like "tomorrow at 9" inside a clarification loop.
            let recent: Vec<String> = history
                .iter()
                .rev()
                .take(4)
                .rev()
                .map(|(role, content)| format!("{role}: {content}"))
                .collect();
            format!(
                "Recent conversation:\n{}\n\nMessage to classify:\n{text}",
                recent.join("\n")
            )
        };

        let response = single_turn(&self.model, SYSTEM_PROMPT, &user_message).await?;
        let raw: RawClassification = serde_json::from_str(strip_code_fences(&response))
            .context("classifier returned malformed JSON")?;

        let intent = Intent::from_wire(&raw.intent)
            .ok_or_else(|| anyhow!("classifier returned unknown intent '{}'", raw.intent))?;
        let classification = Classification {
            intent,
            confidence: raw.confidence.clamp(0.0, 1.0),
        };
        debug!("Model classification: {classification:?}");
        Ok(classification)
    }
}

#[async_trait]
impl IntentClassifier for OpenAiIntentClassifier {
    async fn classify(
        &self,
        text: &str,
        history: &[(String, String)],
    ) -> Result<Classification> {
        match self.classify_with_model(text, history).await {
            Ok(classification) => Ok(classification),
            Err(e) => {
                warn!("⚠️ Model classification failed, falling back to keywords: {e:#}");
                Ok(KeywordClassifier::classify_text(text))
            }
        }
    }
}
