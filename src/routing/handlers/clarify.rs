//! Clarification handler for unknown intent
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.2.0

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::features::intent::{Classification, Intent};
use crate::message_handler::InboundMessage;
use crate::routing::context::HandlerContext;
use crate::routing::handler::IntentHandler;

const CLARIFY_REPLY: &str = "I'm not sure what you meant. I can chat, or manage reminders: \
try 'remind me to call the dentist tomorrow at 9am', 'list my reminders', or \
'cancel reminder 2'.";

/// Handler for messages the classifier could not place with confidence.
///
/// Mutates no state: it only asks the user to rephrase.
pub struct ClarifyHandler;

#[async_trait]
impl IntentHandler for ClarifyHandler {
    fn intents(&self) -> &'static [Intent] {
        &[Intent::Unknown]
    }

    async fn handle(
        &self,
        _ctx: Arc<HandlerContext>,
        _message: &InboundMessage,
        _classification: &Classification,
    ) -> Result<String> {
        Ok(CLARIFY_REPLY.to_string())
    }
}
