//! Time index over scheduled reminders
//!
//! Ordered by due time (ties broken by identifier) to answer "what is due"
//! queries without scanning the store. Derived state: it holds nothing the
//! store does not already own and can be rebuilt from it at any time. The
//! lifecycle controller is the only writer and mirrors every store status
//! change in the same logical operation.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0

use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap};
use std::ops::Bound;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

use super::store::{ReminderStore, StoreError};

#[derive(Default)]
struct Inner {
    by_due: BTreeSet<(DateTime<Utc>, Uuid)>,
    by_id: HashMap<Uuid, DateTime<Utc>>,
}

/// Ordered index of scheduled reminders keyed by due time.
#[derive(Clone, Default)]
pub struct TimeIndex {
    inner: Arc<RwLock<Inner>>,
}

impl TimeIndex {
    pub fn new() -> Self {
        TimeIndex::default()
    }

    /// Insert or move an entry for `id`.
    pub fn upsert(&self, id: Uuid, due: DateTime<Utc>) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = inner.by_id.insert(id, due) {
            inner.by_due.remove(&(previous, id));
        }
        inner.by_due.insert((due, id));
    }

    /// Remove the entry for `id`, if present.
    pub fn remove(&self, id: Uuid) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        if let Some(due) = inner.by_id.remove(&id) {
            inner.by_due.remove(&(due, id));
        }
    }

    /// Identifiers due at or before `threshold`, ascending by due time, ties
    /// broken by identifier for determinism.
    pub fn due_before(&self, threshold: DateTime<Utc>) -> Vec<Uuid> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner
            .by_due
            .range(..=(threshold, Uuid::max()))
            .map(|(_, id)| *id)
            .collect()
    }

    /// The next identifier due strictly after `after`, if any.
    pub fn next_due_after(&self, after: DateTime<Utc>) -> Option<Uuid> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner
            .by_due
            .range((Bound::Excluded((after, Uuid::max())), Bound::Unbounded))
            .map(|(_, id)| *id)
            .next()
    }

    pub fn contains(&self, id: Uuid) -> bool {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.by_id.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Replace the index contents with the store's scheduled reminders.
    pub async fn rebuild(&self, store: &ReminderStore) -> Result<usize, StoreError> {
        let entries = store.scheduled_entries().await?;
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner.by_due.clear();
        inner.by_id.clear();
        for (id, due) in &entries {
            inner.by_id.insert(*id, *due);
            inner.by_due.insert((*due, *id));
        }
        Ok(entries.len())
    }
}
