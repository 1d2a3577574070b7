//! # Features Layer
//!
//! All feature modules of the assistant.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0

pub mod conversation;
pub mod extraction;
pub mod intent;
pub mod llm;
pub mod notify;
pub mod reminders;

// Re-export feature items for crate-level convenience
pub use conversation::{Conversationalist, ConversationTracker, OpenAiConversationalist};
pub use extraction::{
    DueTimeIssue, OpenAiSlotExtractor, RuleBasedExtractor, SlotExtraction, SlotExtractor,
};
pub use intent::{
    apply_threshold, Classification, Intent, IntentClassifier, KeywordClassifier,
    OpenAiIntentClassifier,
};
pub use notify::{ConsoleNotifier, DispatchOutcome, Notifier};
pub use reminders::{
    CancelOutcome, CancelSelector, CreateOutcome, LifecycleConfig, MissingSlot, Recurrence,
    Reminder, ReminderDraftInput, ReminderLifecycle, ReminderScheduler, ReminderStatus,
    ReminderStore, SchedulerHandle, StoreError, TickEffect, TimeIndex,
};
