//! Model-backed general conversation
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.2.0

use anyhow::Result;
use async_trait::async_trait;
use log::debug;
use openai::chat::ChatCompletionMessageRole;

use crate::features::llm::{chat_message, complete};
use super::Conversationalist;

const SYSTEM_PROMPT: &str = "You are a helpful messaging assistant. Be concise and friendly \
in your responses. When you get ambiguous messages, ask clarification questions.";

/// General-conversation collaborator backed by an OpenAI chat model.
pub struct OpenAiConversationalist {
    model: String,
}

impl OpenAiConversationalist {
    pub fn new(model: impl Into<String>) -> Self {
        OpenAiConversationalist {
            model: model.into(),
        }
    }
}

#[async_trait]
impl Conversationalist for OpenAiConversationalist {
    async fn respond(&self, text: &str, history: &[(String, String)]) -> Result<String> {
        let mut messages = vec![chat_message(ChatCompletionMessageRole::System, SYSTEM_PROMPT)];

        for (role, content) in history {
            let role = match role.as_str() {
                "user" => ChatCompletionMessageRole::User,
                "assistant" => ChatCompletionMessageRole::Assistant,
                _ => continue,
            };
            messages.push(chat_message(role, content));
        }
        messages.push(chat_message(ChatCompletionMessageRole::User, text));

        debug!("Sending {} message(s) to the conversation model", messages.len());
        complete(&self.model, messages).await
    }
}
