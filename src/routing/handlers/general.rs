//! General conversation handler
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.2.0

use anyhow::Result;
use async_trait::async_trait;
use log::warn;
use std::sync::Arc;

use crate::features::intent::{Classification, Intent};
use crate::message_handler::InboundMessage;
use crate::routing::context::HandlerContext;
use crate::routing::handler::IntentHandler;

const FALLBACK_REPLY: &str =
    "I apologize, but I'm having trouble processing your request right now.";

/// Handler relaying general messages to the conversation collaborator.
pub struct GeneralHandler;

#[async_trait]
impl IntentHandler for GeneralHandler {
    fn intents(&self) -> &'static [Intent] {
        &[Intent::General]
    }

    async fn handle(
        &self,
        ctx: Arc<HandlerContext>,
        message: &InboundMessage,
        _classification: &Classification,
    ) -> Result<String> {
        let history = ctx.tracker.history(&message.sender);
        match ctx.conversationalist.respond(&message.text, &history).await {
            Ok(reply) => Ok(reply),
            Err(e) => {
                warn!("⚠️ Conversation collaborator failed: {e:#}");
                Ok(FALLBACK_REPLY.to_string())
            }
        }
    }
}
