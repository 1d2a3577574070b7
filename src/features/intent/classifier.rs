//! Intent classifier contract, closed intent set, and keyword fallback
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0

use anyhow::Result;
use async_trait::async_trait;

/// Closed set of message intents the router dispatches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intent {
    ReminderCreate,
    ReminderList,
    ReminderCancel,
    General,
    /// Assigned only when confidence falls below the configured threshold,
    /// never inferred from message content.
    Unknown,
}

impl Intent {
    /// Every intent, for exhaustive registration checks.
    pub const ALL: [Intent; 5] = [
        Intent::ReminderCreate,
        Intent::ReminderList,
        Intent::ReminderCancel,
        Intent::General,
        Intent::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::ReminderCreate => "reminder_create",
            Intent::ReminderList => "reminder_list",
            Intent::ReminderCancel => "reminder_cancel",
            Intent::General => "general",
            Intent::Unknown => "unknown",
        }
    }

    /// Parse the wire name used in the model's JSON contract.
    pub fn from_wire(raw: &str) -> Option<Intent> {
        match raw.trim().to_lowercase().as_str() {
            "reminder_create" => Some(Intent::ReminderCreate),
            "reminder_list" => Some(Intent::ReminderList),
            "reminder_cancel" => Some(Intent::ReminderCancel),
            "general" => Some(Intent::General),
            _ => None,
        }
    }
}

/// A classified intent with the classifier's confidence in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    pub intent: Intent,
    pub confidence: f32,
}

/// Intent classification contract over the external NLU capability.
#[async_trait]
pub trait IntentClassifier: Send + Sync {
    /// Classify a message given recent conversation turns as context.
    async fn classify(
        &self,
        text: &str,
        history: &[(String, String)],
    ) -> Result<Classification>;
}

/// Demote low-confidence classifications to `Unknown`.
///
/// This is the only way `Unknown` is ever assigned.
pub fn apply_threshold(classification: Classification, threshold: f32) -> Classification {
    if classification.confidence < threshold {
        Classification {
            intent: Intent::Unknown,
            confidence: classification.confidence,
        }
    } else {
        classification
    }
}

const LIST_KEYWORDS: &[&str] = &[
    "my reminders",
    "list reminders",
    "list my reminders",
    "show reminders",
    "show my reminders",
    "what are my reminders",
    "what reminders do i have",
];

const CANCEL_KEYWORDS: &[&str] = &[
    "cancel reminder",
    "cancel my reminder",
    "cancel the reminder",
    "cancel all reminders",
    "delete reminder",
    "delete my reminder",
    "remove reminder",
    "remove my reminder",
    "forget the reminder",
];

const CREATE_KEYWORDS: &[&str] = &[
    "remind me",
    "set a reminder",
    "set up a reminder",
    "create a reminder",
    "add a reminder",
    "new reminder",
];

/// Keyword-based classifier.
///
/// Used as the fallback when the model is unreachable, mirroring the
/// model's intent contract with coarse confidence scores.
pub struct KeywordClassifier;

impl KeywordClassifier {
    pub fn classify_text(text: &str) -> Classification {
        let lowered = text.to_lowercase();

        for keyword in LIST_KEYWORDS {
            if lowered.contains(keyword) {
                return Classification {
                    intent: Intent::ReminderList,
                    confidence: 0.9,
                };
            }
        }
        for keyword in CANCEL_KEYWORDS {
            if lowered.contains(keyword) {
                return Classification {
                    intent: Intent::ReminderCancel,
                    confidence: 0.9,
                };
            }
        }
        for keyword in CREATE_KEYWORDS {
            if lowered.contains(keyword) {
                return Classification {
                    intent: Intent::ReminderCreate,
                    confidence: 0.9,
                };
            }
        }
        // A bare mention of reminders without a recognizable verb: guess
        // creation, but below any sane threshold so the router asks instead.
        if lowered.contains("reminder") {
            return Classification {
                intent: Intent::ReminderCreate,
                confidence: 0.4,
            };
        }

        Classification {
            intent: Intent::General,
            confidence: 0.8,
        }
    }
}

#[async_trait]
impl IntentClassifier for KeywordClassifier {
    async fn classify(
        &self,
        text: &str,
        _history: &[(String, String)],
    ) -> Result<Classification> {
        Ok(KeywordClassifier::classify_text(text))
    }
}
