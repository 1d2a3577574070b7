//! Durable reminder store
//!
//! Sqlite-backed mapping from reminder id to record. `update` is guarded by
//! optimistic concurrency on the expected prior status, so a cancel and a
//! fire can never both succeed on stale state.
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.1.0
//!
//! ## Changelog
//! - 1.1.0: Add dispatch-lease guard for the fire path
//! - 1.0.0: Initial creation

use chrono::{DateTime, Utc};
use sqlite::{State, Statement, Value};
use thiserror::Error;
use uuid::Uuid;

use crate::database::{decode_ts, encode_ts, Database};
use super::reminder::{Recurrence, Reminder, ReminderStatus};

/// Store operation failures.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Unknown identifier, or an identifier the caller must not see.
    #[error("reminder not found")]
    NotFound,
    /// The record's current state did not match the caller's expectation.
    #[error("reminder was modified concurrently")]
    Conflict,
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl From<sqlite::Error> for StoreError {
    fn from(err: sqlite::Error) -> Self {
        StoreError::Backend(anyhow::Error::new(err))
    }
}

/// Fields accepted at creation. Reminders are always created as drafts.
#[derive(Debug, Default, Clone)]
pub struct NewReminder {
    pub action: Option<String>,
    pub due_at: Option<DateTime<Utc>>,
    pub recurrence: Option<Recurrence>,
    pub draft_token: Option<String>,
}

/// Partial update. `None` leaves a field untouched; the nested `Option`
/// distinguishes "set" from "clear" for nullable columns.
#[derive(Debug, Default, Clone)]
pub struct ReminderChanges {
    pub action: Option<String>,
    pub due_at: Option<Option<DateTime<Utc>>>,
    pub recurrence: Option<Option<Recurrence>>,
    pub status: Option<ReminderStatus>,
    pub dispatch_attempts: Option<u32>,
    pub last_attempt_at: Option<Option<DateTime<Utc>>>,
    pub firing_lease: Option<Option<DateTime<Utc>>>,
}

/// Conditional-update guard for [`ReminderStore::update`].
#[derive(Debug, Clone, Copy)]
pub struct StatusGuard {
    /// Required current status; mismatch fails with [`StoreError::Conflict`].
    pub expected: ReminderStatus,
    /// When set, additionally require that no live dispatch lease exists:
    /// `firing_lease` must be NULL or at/before this threshold (stale).
    pub lease_free_before: Option<DateTime<Utc>>,
}

impl StatusGuard {
    /// Guard on status alone.
    pub fn status(expected: ReminderStatus) -> Self {
        StatusGuard {
            expected,
            lease_free_before: None,
        }
    }

    /// Guard on status and on the absence of a live dispatch lease.
    pub fn unleased(expected: ReminderStatus, stale_before: DateTime<Utc>) -> Self {
        StatusGuard {
            expected,
            lease_free_before: Some(stale_before),
        }
    }
}

/// Durable reminder store.
#[derive(Clone)]
pub struct ReminderStore {
    db: Database,
}

const COLUMNS: &str = "id, owner, action, due_at, recurrence_seconds, status, draft_token, \
                       dispatch_attempts, last_attempt_at, firing_lease, created_at, updated_at";

impl ReminderStore {
    pub fn new(db: Database) -> Self {
        ReminderStore { db }
    }

    /// Insert a new draft reminder and return it.
    pub async fn create(&self, owner: &str, fields: NewReminder) -> Result<Reminder, StoreError> {
        let now = Utc::now();
        let reminder = Reminder {
            id: Uuid::new_v4(),
            owner: owner.to_string(),
            action: fields.action.unwrap_or_default(),
            due_at: fields.due_at,
            recurrence: fields.recurrence,
            status: ReminderStatus::Draft,
            draft_token: fields.draft_token,
            dispatch_attempts: 0,
            last_attempt_at: None,
            firing_lease: None,
            created_at: now,
            updated_at: now,
        };

        let conn = self.db.lock().await;
        let mut statement = conn.prepare(
            "INSERT INTO reminders (id, owner, action, due_at, recurrence_seconds, status, \
             draft_token, dispatch_attempts, last_attempt_at, firing_lease, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, 0, NULL, NULL, ?, ?)",
        )?;
        statement.bind((1, reminder.id.to_string().as_str()))?;
        statement.bind((2, owner))?;
        statement.bind((3, reminder.action.as_str()))?;
        bind_optional(&mut statement, 4, reminder.due_at.map(encode_ts).map(Value::String))?;
        bind_optional(
            &mut statement,
            5,
            reminder.recurrence.map(|r| Value::Integer(r.seconds())),
        )?;
        statement.bind((6, reminder.status.as_str()))?;
        bind_optional(
            &mut statement,
            7,
            reminder.draft_token.clone().map(Value::String),
        )?;
        statement.bind((8, encode_ts(now).as_str()))?;
        statement.bind((9, encode_ts(now).as_str()))?;
        statement.next()?;

        Ok(reminder)
    }

    /// Fetch a reminder by id.
    pub async fn get(&self, id: Uuid) -> Result<Reminder, StoreError> {
        let conn = self.db.lock().await;
        let mut statement =
            conn.prepare(format!("SELECT {COLUMNS} FROM reminders WHERE id = ?"))?;
        statement.bind((1, id.to_string().as_str()))?;
        match statement.next()? {
            State::Row => row_to_reminder(&statement),
            State::Done => Err(StoreError::NotFound),
        }
    }

    /// List an owner's reminders, oldest first, optionally filtered by status.
    pub async fn list(
        &self,
        owner: &str,
        statuses: Option<&[ReminderStatus]>,
    ) -> Result<Vec<Reminder>, StoreError> {
        let mut sql = format!("SELECT {COLUMNS} FROM reminders WHERE owner = ?");
        if let Some(statuses) = statuses {
            if statuses.is_empty() {
                return Ok(Vec::new());
            }
            let placeholders = vec!["?"; statuses.len()].join(", ");
            sql.push_str(&format!(" AND status IN ({placeholders})"));
        }
        sql.push_str(" ORDER BY created_at ASC, id ASC");

        let conn = self.db.lock().await;
        let mut statement = conn.prepare(sql)?;
        statement.bind((1, owner))?;
        if let Some(statuses) = statuses {
            for (i, status) in statuses.iter().enumerate() {
                statement.bind((i + 2, status.as_str()))?;
            }
        }

        let mut reminders = Vec::new();
        while let State::Row = statement.next()? {
            reminders.push(row_to_reminder(&statement)?);
        }
        Ok(reminders)
    }

    /// Conditionally update a reminder.
    ///
    /// The write commits only if the guard matches the current row; otherwise
    /// the operation fails with `Conflict` (or `NotFound` for unknown ids).
    /// Returns the updated record.
    pub async fn update(
        &self,
        id: Uuid,
        guard: StatusGuard,
        changes: ReminderChanges,
    ) -> Result<Reminder, StoreError> {
        let now = Utc::now();
        let mut sets = vec!["updated_at = ?".to_string()];
        let mut values = vec![Value::String(encode_ts(now))];

        if let Some(action) = changes.action {
            sets.push("action = ?".to_string());
            values.push(Value::String(action));
        }
        if let Some(due_at) = changes.due_at {
            sets.push("due_at = ?".to_string());
            values.push(optional_value(due_at.map(encode_ts).map(Value::String)));
        }
        if let Some(recurrence) = changes.recurrence {
            sets.push("recurrence_seconds = ?".to_string());
            values.push(optional_value(
                recurrence.map(|r| Value::Integer(r.seconds())),
            ));
        }
        if let Some(status) = changes.status {
            sets.push("status = ?".to_string());
            values.push(Value::String(status.as_str().to_string()));
        }
        if let Some(attempts) = changes.dispatch_attempts {
            sets.push("dispatch_attempts = ?".to_string());
            values.push(Value::Integer(i64::from(attempts)));
        }
        if let Some(last_attempt) = changes.last_attempt_at {
            sets.push("last_attempt_at = ?".to_string());
            values.push(optional_value(
                last_attempt.map(encode_ts).map(Value::String),
            ));
        }
        if let Some(lease) = changes.firing_lease {
            sets.push("firing_lease = ?".to_string());
            values.push(optional_value(lease.map(encode_ts).map(Value::String)));
        }

        let mut sql = format!(
            "UPDATE reminders SET {} WHERE id = ? AND status = ?",
            sets.join(", ")
        );
        values.push(Value::String(id.to_string()));
        values.push(Value::String(guard.expected.as_str().to_string()));
        if let Some(threshold) = guard.lease_free_before {
            sql.push_str(" AND (firing_lease IS NULL OR firing_lease <= ?)");
            values.push(Value::String(encode_ts(threshold)));
        }

        let conn = self.db.lock().await;
        {
            let mut statement = conn.prepare(sql)?;
            for (i, value) in values.iter().enumerate() {
                statement.bind((i + 1, value))?;
            }
            statement.next()?;
        }

        if conn.change_count() == 0 {
            // Distinguish a missing row from a guard mismatch.
            let mut probe = conn.prepare("SELECT 1 FROM reminders WHERE id = ?")?;
            probe.bind((1, id.to_string().as_str()))?;
            return match probe.next()? {
                State::Row => Err(StoreError::Conflict),
                State::Done => Err(StoreError::NotFound),
            };
        }

        let mut statement =
            conn.prepare(format!("SELECT {COLUMNS} FROM reminders WHERE id = ?"))?;
        statement.bind((1, id.to_string().as_str()))?;
        match statement.next()? {
            State::Row => row_to_reminder(&statement),
            State::Done => Err(StoreError::NotFound),
        }
    }

    /// Remove a reminder entirely.
    pub async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        let conn = self.db.lock().await;
        let mut statement = conn.prepare("DELETE FROM reminders WHERE id = ?")?;
        statement.bind((1, id.to_string().as_str()))?;
        statement.next()?;
        if conn.change_count() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    /// Look up a reminder by its client draft token, any status.
    pub async fn find_by_token(
        &self,
        owner: &str,
        token: &str,
    ) -> Result<Option<Reminder>, StoreError> {
        let conn = self.db.lock().await;
        let mut statement = conn.prepare(format!(
            "SELECT {COLUMNS} FROM reminders WHERE owner = ? AND draft_token = ?"
        ))?;
        statement.bind((1, owner))?;
        statement.bind((2, token))?;
        match statement.next()? {
            State::Row => Ok(Some(row_to_reminder(&statement)?)),
            State::Done => Ok(None),
        }
    }

    /// The owner's most recently touched open draft, if any.
    pub async fn latest_open_draft(&self, owner: &str) -> Result<Option<Reminder>, StoreError> {
        let conn = self.db.lock().await;
        let mut statement = conn.prepare(format!(
            "SELECT {COLUMNS} FROM reminders WHERE owner = ? AND status = 'draft' \
             ORDER BY updated_at DESC, id ASC LIMIT 1"
        ))?;
        statement.bind((1, owner))?;
        match statement.next()? {
            State::Row => Ok(Some(row_to_reminder(&statement)?)),
            State::Done => Ok(None),
        }
    }

    /// Drafts with no activity since `cutoff`, across all owners.
    pub async fn drafts_idle_since(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Reminder>, StoreError> {
        let conn = self.db.lock().await;
        let mut statement = conn.prepare(format!(
            "SELECT {COLUMNS} FROM reminders WHERE status = 'draft' AND updated_at <= ? \
             ORDER BY updated_at ASC"
        ))?;
        statement.bind((1, encode_ts(cutoff).as_str()))?;
        let mut reminders = Vec::new();
        while let State::Row = statement.next()? {
            reminders.push(row_to_reminder(&statement)?);
        }
        Ok(reminders)
    }

    /// All scheduled (id, due time) pairs, for rebuilding the time index.
    pub async fn scheduled_entries(&self) -> Result<Vec<(Uuid, DateTime<Utc>)>, StoreError> {
        let conn = self.db.lock().await;
        let mut statement = conn.prepare(
            "SELECT id, due_at FROM reminders WHERE status = 'scheduled' AND due_at IS NOT NULL",
        )?;
        let mut entries = Vec::new();
        while let State::Row = statement.next()? {
            let id: String = statement.read("id")?;
            let due: String = statement.read("due_at")?;
            entries.push((parse_id(&id)?, decode_ts(&due)?));
        }
        Ok(entries)
    }
}

fn bind_optional(
    statement: &mut Statement<'_>,
    index: usize,
    value: Option<Value>,
) -> Result<(), StoreError> {
    statement.bind((index, &optional_value(value)))?;
    Ok(())
}

fn optional_value(value: Option<Value>) -> Value {
    value.unwrap_or(Value::Null)
}

fn parse_id(raw: &str) -> Result<Uuid, StoreError> {
    Uuid::parse_str(raw)
        .map_err(|e| StoreError::Backend(anyhow::anyhow!("corrupt reminder id '{raw}': {e}")))
}

fn row_to_reminder(statement: &Statement<'_>) -> Result<Reminder, StoreError> {
    let id: String = statement.read("id")?;
    let status_raw: String = statement.read("status")?;
    let status = ReminderStatus::parse(&status_raw).ok_or_else(|| {
        StoreError::Backend(anyhow::anyhow!("corrupt reminder status '{status_raw}'"))
    })?;
    let due_at: Option<String> = statement.read("due_at")?;
    let recurrence_seconds: Option<i64> = statement.read("recurrence_seconds")?;
    let last_attempt_at: Option<String> = statement.read("last_attempt_at")?;
    let firing_lease: Option<String> = statement.read("firing_lease")?;
    let created_at: String = statement.read("created_at")?;
    let updated_at: String = statement.read("updated_at")?;
    let attempts: i64 = statement.read("dispatch_attempts")?;

    Ok(Reminder {
        id: parse_id(&id)?,
        owner: statement.read("owner")?,
        action: statement.read("action")?,
        due_at: due_at.as_deref().map(decode_ts).transpose()?,
        recurrence: recurrence_seconds.and_then(Recurrence::from_seconds),
        status,
        draft_token: statement.read("draft_token")?,
        dispatch_attempts: u32::try_from(attempts).unwrap_or(0),
        last_attempt_at: last_attempt_at.as_deref().map(decode_ts).transpose()?,
        firing_lease: firing_lease.as_deref().map(decode_ts).transpose()?,
        created_at: decode_ts(&created_at)?,
        updated_at: decode_ts(&updated_at)?,
    })
}
