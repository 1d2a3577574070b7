//! Intent dispatch table
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.2.0

use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::sync::Arc;

use crate::features::intent::{Classification, Intent};
use crate::message_handler::InboundMessage;
use super::context::HandlerContext;
use super::handler::IntentHandler;
use super::handlers::{ClarifyHandler, GeneralHandler, ReminderHandler};

/// Registry mapping intents to handlers.
///
/// Purely a dispatch table: the router never mutates reminder state itself,
/// so new intents can be added without touching lifecycle logic.
#[derive(Clone, Default)]
pub struct Router {
    handlers: HashMap<Intent, Arc<dyn IntentHandler>>,
}

impl Router {
    /// Create a new empty router.
    pub fn new() -> Self {
        Router {
            handlers: HashMap::new(),
        }
    }

    /// A router with the standard handler set, covering every intent.
    pub fn standard() -> Self {
        let mut router = Router::new();
        router.register(Arc::new(ReminderHandler));
        router.register(Arc::new(GeneralHandler));
        router.register(Arc::new(ClarifyHandler));
        router
    }

    /// Register a handler for its declared intents.
    pub fn register(&mut self, handler: Arc<dyn IntentHandler>) {
        for intent in handler.intents() {
            self.handlers.insert(*intent, Arc::clone(&handler));
        }
    }

    /// Get the handler for an intent.
    pub fn get(&self, intent: Intent) -> Option<Arc<dyn IntentHandler>> {
        self.handlers.get(&intent).cloned()
    }

    /// Whether an intent has a registered handler.
    pub fn contains(&self, intent: Intent) -> bool {
        self.handlers.contains_key(&intent)
    }

    /// Dispatch a classified message to its handler.
    pub async fn route(
        &self,
        ctx: Arc<HandlerContext>,
        message: &InboundMessage,
        classification: &Classification,
    ) -> Result<String> {
        let handler = self
            .get(classification.intent)
            .ok_or_else(|| anyhow!("no handler registered for intent {:?}", classification.intent))?;
        handler.handle(ctx, message, classification).await
    }
}
