//! Intent handler trait
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.2.0

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::features::intent::{Classification, Intent};
use crate::message_handler::InboundMessage;
use super::context::HandlerContext;

/// Trait for intent handlers.
///
/// Each handler declares the intents it serves and is dispatched by the
/// router. Handlers produce the outbound reply text; they never decide
/// routing themselves.
#[async_trait]
pub trait IntentHandler: Send + Sync {
    /// Intent(s) this handler processes.
    fn intents(&self) -> &'static [Intent];

    /// Handle one classified message and produce the reply.
    async fn handle(
        &self,
        ctx: Arc<HandlerContext>,
        message: &InboundMessage,
        classification: &Classification,
    ) -> Result<String>;
}
