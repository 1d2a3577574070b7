//! # Conversation Feature
//!
//! The general-conversation collaborator contract and the bounded per-owner
//! context tracker.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.2.0
//! - **Toggleable**: false

pub mod llm;
pub mod tracker;

use anyhow::Result;
use async_trait::async_trait;

pub use llm::OpenAiConversationalist;
pub use tracker::{ConversationTracker, TurnRole};

/// Open-ended conversation contract.
///
/// Opaque to the engine: the router hands over the message and recent turns
/// and relays whatever comes back.
#[async_trait]
pub trait Conversationalist: Send + Sync {
    async fn respond(&self, text: &str, history: &[(String, String)]) -> Result<String>;
}
