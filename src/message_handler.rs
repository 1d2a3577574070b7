//! Inbound message pipeline
//!
//! classify -> threshold -> route -> reply. Classification and handler
//! failures degrade to clarification or an apology; the routing path never
//! panics on model trouble.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0

use anyhow::Result;
use chrono::{DateTime, Utc};
use log::{error, info, warn};
use std::sync::Arc;
use uuid::Uuid;

use crate::features::intent::{apply_threshold, Classification, Intent, IntentClassifier};
use crate::routing::{HandlerContext, Router};

const ERROR_REPLY: &str =
    "I apologize, but I'm having trouble processing your request right now.";

/// One inbound chat message. Ephemeral: the engine persists reminders, not
/// messages.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    /// Sender identifier; doubles as the reminder owner.
    pub sender: String,
    pub text: String,
    pub received_at: DateTime<Utc>,
    /// Transport message id, used as the idempotency token for retried
    /// deliveries of the same message.
    pub message_id: Option<String>,
}

/// The assistant's inbound pipeline.
#[derive(Clone)]
pub struct MessageHandler {
    classifier: Arc<dyn IntentClassifier>,
    router: Router,
    ctx: Arc<HandlerContext>,
    confidence_threshold: f32,
}

impl MessageHandler {
    pub fn new(
        classifier: Arc<dyn IntentClassifier>,
        router: Router,
        ctx: Arc<HandlerContext>,
        confidence_threshold: f32,
    ) -> Self {
        MessageHandler {
            classifier,
            router,
            ctx,
            confidence_threshold,
        }
    }

    /// Process one inbound message and produce the reply text.
    pub async fn handle_message(&self, message: &InboundMessage) -> Result<String> {
        let request_id = Uuid::new_v4();
        info!(
            "[{}] 📥 Message received | From: {} | Content: '{}'",
            request_id,
            message.sender,
            message.text.chars().take(100).collect::<String>()
        );

        let history = self.ctx.tracker.history(&message.sender);
        let classification = match self.classifier.classify(&message.text, &history).await {
            Ok(classification) => apply_threshold(classification, self.confidence_threshold),
            Err(e) => {
                warn!("[{request_id}] ⚠️ Classification failed, treating as unknown: {e:#}");
                Classification {
                    intent: Intent::Unknown,
                    confidence: 0.0,
                }
            }
        };
        info!(
            "[{}] 🧭 Intent: {} (confidence {:.2})",
            request_id,
            classification.intent.as_str(),
            classification.confidence
        );

        let reply = match self
            .router
            .route(Arc::clone(&self.ctx), message, &classification)
            .await
        {
            Ok(reply) => reply,
            Err(e) => {
                error!("[{request_id}] ❌ Handler failed: {e:#}");
                ERROR_REPLY.to_string()
            }
        };

        self.ctx.tracker.record_user(&message.sender, &message.text);
        self.ctx.tracker.record_assistant(&message.sender, &reply);
        info!("[{request_id}] 📤 Reply ready ({} chars)", reply.len());
        Ok(reply)
    }
}
