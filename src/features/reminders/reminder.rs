//! Reminder entity and status state machine data
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

/// Lifecycle status of a reminder.
///
/// Transitions are owned by the lifecycle controller and are monotonic:
/// `Fired`, `Cancelled`, and `Expired` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReminderStatus {
    /// Created but not yet fully specified.
    Draft,
    /// Armed with an action and a future due time.
    Scheduled,
    /// Due time reached and the notification was delivered.
    Fired,
    /// Cancelled by the owner or abandoned as a stale draft.
    Cancelled,
    /// Past due beyond the grace window without successful delivery.
    Expired,
}

impl ReminderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReminderStatus::Draft => "draft",
            ReminderStatus::Scheduled => "scheduled",
            ReminderStatus::Fired => "fired",
            ReminderStatus::Cancelled => "cancelled",
            ReminderStatus::Expired => "expired",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "draft" => Some(ReminderStatus::Draft),
            "scheduled" => Some(ReminderStatus::Scheduled),
            "fired" => Some(ReminderStatus::Fired),
            "cancelled" => Some(ReminderStatus::Cancelled),
            "expired" => Some(ReminderStatus::Expired),
            _ => None,
        }
    }

    /// Whether no further transitions may leave this status.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ReminderStatus::Fired | ReminderStatus::Cancelled | ReminderStatus::Expired
        )
    }
}

/// Recurrence rule. A recurring reminder is re-armed on firing instead of
/// transitioning to `Fired`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recurrence {
    /// Repeat on a fixed interval.
    Interval(Duration),
}

impl Recurrence {
    /// Build an interval recurrence; rejects non-positive intervals.
    pub fn from_seconds(seconds: i64) -> Option<Self> {
        if seconds > 0 {
            Some(Recurrence::Interval(Duration::seconds(seconds)))
        } else {
            None
        }
    }

    pub fn interval(&self) -> Duration {
        match self {
            Recurrence::Interval(d) => *d,
        }
    }

    pub fn seconds(&self) -> i64 {
        self.interval().num_seconds()
    }

    /// Human-readable description, e.g. "daily" or "every 2 hours".
    pub fn describe(&self) -> String {
        match self.seconds() {
            3600 => "hourly".to_string(),
            86400 => "daily".to_string(),
            604800 => "weekly".to_string(),
            secs => format!("every {}", crate::core::response::format_duration(secs)),
        }
    }
}

/// A reminder record as stored.
#[derive(Debug, Clone, PartialEq)]
pub struct Reminder {
    /// Unique, generated at creation, never reused.
    pub id: Uuid,
    /// Sender identifier of the owner; reminders are visible only to their owner.
    pub owner: String,
    /// What to remind about. Non-empty once the status leaves `Draft`.
    pub action: String,
    /// Absolute due time (UTC). Meaningful only while `Scheduled`.
    pub due_at: Option<DateTime<Utc>>,
    pub recurrence: Option<Recurrence>,
    pub status: ReminderStatus,
    /// Client-supplied token making retried create requests idempotent.
    pub draft_token: Option<String>,
    /// Failed delivery attempts since the reminder was last (re)armed.
    pub dispatch_attempts: u32,
    /// When the sweep last attempted delivery.
    pub last_attempt_at: Option<DateTime<Utc>>,
    /// In-flight dispatch lease; set while a notification is being sent.
    pub firing_lease: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
