//! # Database Module
//!
//! Sqlite connection management and schema for durable assistant state.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false
//!
//! All queries run through a single connection guarded by an async mutex, so
//! each logical operation (including conditional updates and their follow-up
//! reads) observes a consistent view.

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use log::info;
use sqlite::{Connection, ConnectionWithFullMutex};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS reminders (
    id                 TEXT PRIMARY KEY,
    owner              TEXT NOT NULL,
    action             TEXT NOT NULL DEFAULT '',
    due_at             TEXT,
    recurrence_seconds INTEGER,
    status             TEXT NOT NULL,
    draft_token        TEXT,
    dispatch_attempts  INTEGER NOT NULL DEFAULT 0,
    last_attempt_at    TEXT,
    firing_lease       TEXT,
    created_at         TEXT NOT NULL,
    updated_at         TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_reminders_owner_created
    ON reminders(owner, created_at);
CREATE INDEX IF NOT EXISTS idx_reminders_status_due
    ON reminders(status, due_at);
CREATE UNIQUE INDEX IF NOT EXISTS idx_reminders_draft_token
    ON reminders(owner, draft_token) WHERE draft_token IS NOT NULL;
";

/// Handle to the assistant database.
///
/// Cheap to clone; all clones share one connection.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<ConnectionWithFullMutex>>,
}

impl Database {
    /// Open (creating if necessary) the database at `path` and apply the schema.
    pub async fn open(path: &str) -> Result<Self> {
        let conn = Connection::open_with_full_mutex(path)
            .with_context(|| format!("failed to open database at {path}"))?;
        conn.execute(SCHEMA).context("failed to apply schema")?;
        info!("💾 Database ready at {path}");
        Ok(Database {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open a private in-memory database. Used by tests.
    pub async fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_with_full_mutex(":memory:")
            .context("failed to open in-memory database")?;
        conn.execute(SCHEMA).context("failed to apply schema")?;
        Ok(Database {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Acquire the connection for one logical operation.
    pub(crate) async fn lock(&self) -> MutexGuard<'_, ConnectionWithFullMutex> {
        self.conn.lock().await
    }
}

/// Encode a timestamp as a fixed-width RFC 3339 string.
///
/// Fixed width keeps lexicographic order equal to chronological order, which
/// the store's range queries rely on.
pub(crate) fn encode_ts(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, false)
}

/// Decode a timestamp stored by [`encode_ts`].
pub(crate) fn decode_ts(raw: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw)
        .with_context(|| format!("corrupt timestamp in database: '{raw}'"))?
        .with_timezone(&Utc))
}
