//! Shared OpenAI chat-completion plumbing
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.2.0
//!
//! Thin helpers used by the classifier, extractor, and conversation
//! implementations. The API key is process-global (`openai::set_key`), set
//! once at startup.

use anyhow::{anyhow, Result};
use openai::chat::{ChatCompletion, ChatCompletionMessage, ChatCompletionMessageRole};
use std::time::Duration;
use tokio::time::timeout;

/// Upper bound on any single model call.
pub const LLM_TIMEOUT: Duration = Duration::from_secs(45);

/// Build a chat message with the given role and content.
pub fn chat_message(role: ChatCompletionMessageRole, content: &str) -> ChatCompletionMessage {
    ChatCompletionMessage {
        role,
        content: Some(content.to_string()),
        name: None,
        function_call: None,
        tool_call_id: None,
        tool_calls: None,
    }
}

/// Run a single system + user turn and return the assistant text.
pub async fn single_turn(model: &str, system_prompt: &str, user_message: &str) -> Result<String> {
    let messages = vec![
        chat_message(ChatCompletionMessageRole::System, system_prompt),
        chat_message(ChatCompletionMessageRole::User, user_message),
    ];
    complete(model, messages).await
}

/// Run a chat completion with a timeout and return the assistant text.
pub async fn complete(model: &str, messages: Vec<ChatCompletionMessage>) -> Result<String> {
    let completion = timeout(LLM_TIMEOUT, ChatCompletion::builder(model, messages).create())
        .await
        .map_err(|_| anyhow!("model request timed out after {}s", LLM_TIMEOUT.as_secs()))??;

    let response = completion
        .choices
        .first()
        .and_then(|choice| choice.message.content.clone())
        .unwrap_or_default()
        .trim()
        .to_string();

    if response.is_empty() {
        return Err(anyhow!("model returned an empty response"));
    }
    Ok(response)
}

/// Strip markdown code fences some models wrap JSON responses in.
pub fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    match trimmed.strip_prefix("```") {
        None => trimmed,
        Some(rest) => {
            let rest = rest.strip_prefix("json").unwrap_or(rest);
            let rest = rest.trim_start_matches(['\r', '\n']);
            match rest.strip_suffix("```") {
                Some(inner) => inner.trim_end(),
                None => rest,
            }
        }
    }
}
