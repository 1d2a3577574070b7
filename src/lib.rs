// Core layer - shared types and configuration
pub mod core;

// Features layer - all feature modules
pub mod features;

// Infrastructure
pub mod database;

// Application layer
pub mod message_handler;
pub mod routing;

// Re-export core config for convenience
pub use crate::core::Config;

// Re-export commonly used items
pub use database::Database;
pub use features::{
    // Conversation
    Conversationalist, ConversationTracker, OpenAiConversationalist,
    // Extraction
    DueTimeIssue, OpenAiSlotExtractor, RuleBasedExtractor, SlotExtraction, SlotExtractor,
    // Intent
    Classification, Intent, IntentClassifier, KeywordClassifier, OpenAiIntentClassifier,
    // Notification
    ConsoleNotifier, DispatchOutcome, Notifier,
    // Reminders
    CancelOutcome, CancelSelector, CreateOutcome, LifecycleConfig, Recurrence, Reminder,
    ReminderDraftInput, ReminderLifecycle, ReminderScheduler, ReminderStatus, ReminderStore,
    TickEffect, TimeIndex,
};
pub use message_handler::{InboundMessage, MessageHandler};
pub use routing::{HandlerContext, Router};
