//! Shared context for intent handlers
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.2.0

use chrono::FixedOffset;
use std::sync::Arc;

use crate::features::conversation::{Conversationalist, ConversationTracker};
use crate::features::extraction::SlotExtractor;
use crate::features::reminders::ReminderLifecycle;

/// Shared services for all intent handlers.
///
/// - the reminder lifecycle controller (the only writer of reminder state)
/// - the slot extractor for reminder-intent messages
/// - the general-conversation collaborator
/// - the bounded conversation tracker
/// - the owner-facing timezone
pub struct HandlerContext {
    pub lifecycle: Arc<ReminderLifecycle>,
    pub extractor: Arc<dyn SlotExtractor>,
    pub conversationalist: Arc<dyn Conversationalist>,
    pub tracker: ConversationTracker,
    pub timezone: FixedOffset,
}

impl HandlerContext {
    pub fn new(
        lifecycle: Arc<ReminderLifecycle>,
        extractor: Arc<dyn SlotExtractor>,
        conversationalist: Arc<dyn Conversationalist>,
        tracker: ConversationTracker,
        timezone: FixedOffset,
    ) -> Self {
        HandlerContext {
            lifecycle,
            extractor,
            conversationalist,
            tracker,
            timezone,
        }
    }
}
