//! # Slot Extraction Feature
//!
//! Turns reminder-intent messages into structured fields: action text, due
//! time, recurrence. Incomplete extractions drive the clarification loop.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.2.0
//! - **Toggleable**: false

pub mod extractor;
pub mod llm;
pub mod timeparse;

pub use extractor::{RuleBasedExtractor, SlotExtraction, SlotExtractor};
pub use llm::OpenAiSlotExtractor;
pub use timeparse::{
    find_due_time, find_recurrence, parse_compact_duration, resolve_absolute, resolve_due_phrase,
    DueTimeIssue, FoundDueTime,
};
