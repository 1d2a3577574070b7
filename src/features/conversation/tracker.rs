//! Bounded per-owner conversation context
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.2.0
//!
//! Ephemeral by design: context lives in memory only and is capped per owner.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::Arc;

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnRole {
    User,
    Assistant,
}

impl TurnRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnRole::User => "user",
            TurnRole::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone)]
struct Turn {
    role: TurnRole,
    content: String,
    #[allow(dead_code)]
    at: DateTime<Utc>,
}

/// In-memory recent-turns tracker, bounded per owner.
#[derive(Clone)]
pub struct ConversationTracker {
    turns: Arc<DashMap<String, VecDeque<Turn>>>,
    max_turns: usize,
}

impl ConversationTracker {
    pub fn new(max_turns: usize) -> Self {
        ConversationTracker {
            turns: Arc::new(DashMap::new()),
            max_turns: max_turns.max(1),
        }
    }

    pub fn record_user(&self, owner: &str, content: &str) {
        self.record(owner, TurnRole::User, content);
    }

    pub fn record_assistant(&self, owner: &str, content: &str) {
        self.record(owner, TurnRole::Assistant, content);
    }

    fn record(&self, owner: &str, role: TurnRole, content: &str) {
        let mut entry = self.turns.entry(owner.to_string()).or_default();
        entry.push_back(Turn {
            role,
            content: content.to_string(),
            at: Utc::now(),
        });
        while entry.len() > self.max_turns {
            entry.pop_front();
        }
    }

    /// Recent turns as (role, content) pairs, oldest first.
    pub fn history(&self, owner: &str) -> Vec<(String, String)> {
        self.turns
            .get(owner)
            .map(|turns| {
                turns
                    .iter()
                    .map(|t| (t.role.as_str().to_string(), t.content.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Drop an owner's context entirely.
    pub fn clear(&self, owner: &str) {
        self.turns.remove(owner);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_order_and_roles() {
        let tracker = ConversationTracker::new(10);
        tracker.record_user("user-1", "hello");
        tracker.record_assistant("user-1", "hi there");

        let history = tracker.history("user-1");
        assert_eq!(
            history,
            vec![
                ("user".to_string(), "hello".to_string()),
                ("assistant".to_string(), "hi there".to_string()),
            ]
        );
    }

    #[test]
    fn test_bounded_length() {
        let tracker = ConversationTracker::new(3);
        for i in 0..10 {
            tracker.record_user("user-1", &format!("message {i}"));
        }
        let history = tracker.history("user-1");
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].1, "message 7");
        assert_eq!(history[2].1, "message 9");
    }

    #[test]
    fn test_owners_are_isolated() {
        let tracker = ConversationTracker::new(10);
        tracker.record_user("user-1", "mine");
        assert!(tracker.history("user-2").is_empty());
    }

    #[test]
    fn test_clear() {
        let tracker = ConversationTracker::new(10);
        tracker.record_user("user-1", "hello");
        tracker.clear("user-1");
        assert!(tracker.history("user-1").is_empty());
    }
}
