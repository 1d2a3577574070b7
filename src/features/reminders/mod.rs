//! # Reminders Feature
//!
//! The reminder lifecycle engine: durable store, time index, state machine,
//! and the periodic sweep.
//!
//! - **Version**: 1.2.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false

pub mod lifecycle;
pub mod reminder;
pub mod scheduler;
pub mod store;
pub mod time_index;

pub use lifecycle::{
    CancelOutcome, CancelSelector, CreateOutcome, LifecycleConfig, MissingSlot,
    ReminderDraftInput, ReminderLifecycle, TickEffect,
};
pub use reminder::{Recurrence, Reminder, ReminderStatus};
pub use scheduler::{ReminderScheduler, SchedulerHandle};
pub use store::{NewReminder, ReminderChanges, ReminderStore, StatusGuard, StoreError};
pub use time_index::TimeIndex;
