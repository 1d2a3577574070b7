//! Reminder lifecycle controller
//!
//! The state machine governing a reminder from draft through scheduled to
//! fired, cancelled, or expired. This is the only writer of reminder status
//! and of the time index; every store status change is mirrored in the index
//! within the same logical operation.
//!
//! - **Version**: 1.2.0
//! - **Since**: 0.1.0
//!
//! ## Changelog
//! - 1.2.0: Dispatch lease makes cancel-vs-fire races commit exactly once
//! - 1.1.0: Recurring reminders re-arm instead of terminating
//! - 1.0.0: Initial creation

use chrono::{DateTime, Duration, Utc};
use log::{debug, info, warn};
use std::sync::Arc;
use uuid::Uuid;

use crate::features::extraction::DueTimeIssue;
use crate::features::notify::{DispatchOutcome, Notifier};
use super::reminder::{Recurrence, Reminder, ReminderStatus};
use super::store::{NewReminder, ReminderChanges, ReminderStore, StatusGuard, StoreError};
use super::time_index::TimeIndex;

/// Tunables for the lifecycle controller. Defaults documented in DESIGN.md.
#[derive(Clone, Debug)]
pub struct LifecycleConfig {
    /// Idle time after which a draft is considered abandoned.
    pub draft_timeout: Duration,
    /// How far past due a reminder may slip before expiring undelivered.
    pub grace_window: Duration,
    /// Bounded retry count for notification dispatch.
    pub max_dispatch_attempts: u32,
    /// How long fired/expired reminders remain visible in list output.
    pub recent_window: Duration,
    /// Age after which an in-flight dispatch lease is considered stale.
    pub lease_timeout: Duration,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        LifecycleConfig {
            draft_timeout: Duration::seconds(1800),
            grace_window: Duration::seconds(1800),
            max_dispatch_attempts: 3,
            recent_window: Duration::seconds(86400),
            lease_timeout: Duration::seconds(120),
        }
    }
}

impl LifecycleConfig {
    pub fn from_app_config(config: &crate::core::Config) -> Self {
        let defaults = LifecycleConfig::default();
        LifecycleConfig {
            draft_timeout: Duration::from_std(config.draft_timeout)
                .unwrap_or(defaults.draft_timeout),
            grace_window: Duration::from_std(config.grace_window).unwrap_or(defaults.grace_window),
            max_dispatch_attempts: config.max_dispatch_attempts,
            recent_window: Duration::from_std(config.recent_window)
                .unwrap_or(defaults.recent_window),
            lease_timeout: Duration::from_std(config.lease_timeout)
                .unwrap_or(defaults.lease_timeout),
        }
    }
}

/// Slots carried by a create-or-continue request.
#[derive(Debug, Clone, Default)]
pub struct ReminderDraftInput {
    /// Client-supplied token; retried messages reuse it, making creation
    /// idempotent.
    pub draft_token: Option<String>,
    pub action: Option<String>,
    pub due_at: Option<DateTime<Utc>>,
    /// Present when a due-time expression existed but was unusable.
    pub due_issue: Option<DueTimeIssue>,
    pub recurrence: Option<Recurrence>,
}

/// A slot still needed before a draft can be scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingSlot {
    Action,
    DueTime,
}

/// Outcome of [`ReminderLifecycle::create_or_continue`].
#[derive(Debug, Clone)]
pub enum CreateOutcome {
    /// The reminder is fully specified (usually freshly scheduled; for a
    /// replayed draft token, whatever the original request produced).
    Complete(Reminder),
    /// The draft is persisted but still missing slots.
    NeedsMoreInfo {
        draft: Reminder,
        missing: Vec<MissingSlot>,
        due_issue: Option<DueTimeIssue>,
    },
}

/// How the caller names the reminder to cancel.
#[derive(Debug, Clone)]
pub enum CancelSelector {
    ById(Uuid),
    /// 1-based position in the owner's scheduled list (ordered by due time).
    ByOrdinal(usize),
}

/// Outcome of [`ReminderLifecycle::cancel`].
#[derive(Debug, Clone)]
pub enum CancelOutcome {
    Cancelled(Reminder),
    /// Unknown id, bad ordinal, or a reminder owned by someone else.
    NotFound,
    /// The reminder already left the cancellable states; the prior status
    /// says how (`Scheduled` means a delivery is in flight right now).
    AlreadyHandled(ReminderStatus),
}

/// Side effect produced by one sweep.
#[derive(Debug, Clone, PartialEq)]
pub enum TickEffect {
    Fired { id: Uuid, owner: String },
    Rescheduled { id: Uuid, next_due: DateTime<Utc> },
    RetryPending { id: Uuid, attempt: u32, reason: String },
    Expired { id: Uuid },
    DraftAbandoned { id: Uuid },
}

/// The lifecycle controller.
#[derive(Clone)]
pub struct ReminderLifecycle {
    store: ReminderStore,
    index: TimeIndex,
    notifier: Arc<dyn Notifier>,
    config: LifecycleConfig,
}

impl ReminderLifecycle {
    pub fn new(
        store: ReminderStore,
        index: TimeIndex,
        notifier: Arc<dyn Notifier>,
        config: LifecycleConfig,
    ) -> Self {
        ReminderLifecycle {
            store,
            index,
            notifier,
            config,
        }
    }

    pub fn store(&self) -> &ReminderStore {
        &self.store
    }

    pub fn index(&self) -> &TimeIndex {
        &self.index
    }

    /// Restore the time index from the store, e.g. after startup.
    pub async fn rebuild_index(&self) -> Result<usize, StoreError> {
        let count = self.index.rebuild(&self.store).await?;
        info!("🗂️ Time index rebuilt with {count} scheduled reminder(s)");
        Ok(count)
    }

    /// Create a reminder, or continue filling in the owner's open draft.
    ///
    /// Promotes the draft to `Scheduled` once the action and a strictly
    /// future due time are both present; otherwise persists what was given
    /// and reports the missing slots.
    pub async fn create_or_continue(
        &self,
        owner: &str,
        input: ReminderDraftInput,
        now: DateTime<Utc>,
    ) -> Result<CreateOutcome, StoreError> {
        let draft = match &input.draft_token {
            Some(token) => match self.store.find_by_token(owner, token).await? {
                Some(existing) if existing.status != ReminderStatus::Draft => {
                    debug!("Draft token replay for reminder {}", existing.id);
                    return Ok(CreateOutcome::Complete(existing));
                }
                Some(draft) => Some(draft),
                None => self.store.latest_open_draft(owner).await?,
            },
            None => self.store.latest_open_draft(owner).await?,
        };

        // Merge the new slots over what the draft already holds. A due time
        // that is no longer in the future is reported, never stored.
        let action = input
            .action
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(String::from)
            .or_else(|| {
                draft
                    .as_ref()
                    .map(|d| d.action.clone())
                    .filter(|a| !a.is_empty())
            });
        let mut due_issue = input.due_issue;
        let due_at = input
            .due_at
            .filter(|due| {
                if *due > now {
                    true
                } else {
                    due_issue = Some(DueTimeIssue::InPast);
                    false
                }
            })
            .or_else(|| draft.as_ref().and_then(|d| d.due_at).filter(|due| *due > now));
        let recurrence = input
            .recurrence
            .or_else(|| draft.as_ref().and_then(|d| d.recurrence));

        let mut missing = Vec::new();
        if action.is_none() {
            missing.push(MissingSlot::Action);
        }
        if due_at.is_none() {
            missing.push(MissingSlot::DueTime);
        }

        let draft = match draft {
            Some(existing) => {
                let changes = ReminderChanges {
                    action: action.clone(),
                    due_at: due_at.map(Some),
                    recurrence: recurrence.map(Some),
                    ..Default::default()
                };
                match self
                    .store
                    .update(existing.id, StatusGuard::status(ReminderStatus::Draft), changes)
                    .await
                {
                    Ok(updated) => updated,
                    Err(StoreError::Conflict) => {
                        // Lost a race with promotion or abandonment; report
                        // the current state instead of duplicating.
                        let current = self.store.get(existing.id).await?;
                        return Ok(CreateOutcome::Complete(current));
                    }
                    Err(e) => return Err(e),
                }
            }
            None => {
                self.store
                    .create(
                        owner,
                        NewReminder {
                            action: action.clone(),
                            due_at,
                            recurrence,
                            draft_token: input.draft_token.clone(),
                        },
                    )
                    .await?
            }
        };

        if !missing.is_empty() {
            debug!(
                "Reminder {} still needs {:?} (issue: {:?})",
                draft.id, missing, due_issue
            );
            return Ok(CreateOutcome::NeedsMoreInfo {
                draft,
                missing,
                due_issue,
            });
        }

        // DRAFT -> SCHEDULED, with the index updated in the same logical step.
        let scheduled = self
            .store
            .update(
                draft.id,
                StatusGuard::status(ReminderStatus::Draft),
                ReminderChanges {
                    status: Some(ReminderStatus::Scheduled),
                    ..Default::default()
                },
            )
            .await?;
        if let Some(due) = scheduled.due_at {
            self.index.upsert(scheduled.id, due);
        }
        info!(
            "⏰ Scheduled reminder {} for {} at {:?}",
            scheduled.id, scheduled.owner, scheduled.due_at
        );
        Ok(CreateOutcome::Complete(scheduled))
    }

    /// Cancel a draft or scheduled reminder.
    ///
    /// Races with a concurrent fire resolve through the store's conditional
    /// update: whichever transition commits first wins, the loser reports
    /// "already handled".
    pub async fn cancel(
        &self,
        owner: &str,
        selector: CancelSelector,
        now: DateTime<Utc>,
    ) -> Result<CancelOutcome, StoreError> {
        let id = match selector {
            CancelSelector::ById(id) => id,
            CancelSelector::ByOrdinal(position) => {
                if position == 0 {
                    return Ok(CancelOutcome::NotFound);
                }
                let scheduled = self.scheduled_sorted(owner).await?;
                match scheduled.get(position - 1) {
                    Some(reminder) => reminder.id,
                    None => return Ok(CancelOutcome::NotFound),
                }
            }
        };

        let reminder = match self.store.get(id).await {
            Ok(reminder) => reminder,
            Err(StoreError::NotFound) => return Ok(CancelOutcome::NotFound),
            Err(e) => return Err(e),
        };
        // Owner mismatch reads as NotFound so existence is not leaked.
        if reminder.owner != owner {
            return Ok(CancelOutcome::NotFound);
        }

        let guard = match reminder.status {
            ReminderStatus::Draft => StatusGuard::status(ReminderStatus::Draft),
            ReminderStatus::Scheduled => StatusGuard::unleased(
                ReminderStatus::Scheduled,
                now - self.config.lease_timeout,
            ),
            status => return Ok(CancelOutcome::AlreadyHandled(status)),
        };

        match self
            .store
            .update(
                id,
                guard,
                ReminderChanges {
                    status: Some(ReminderStatus::Cancelled),
                    ..Default::default()
                },
            )
            .await
        {
            Ok(cancelled) => {
                self.index.remove(id);
                info!("🗑️ Cancelled reminder {id} for {owner}");
                Ok(CancelOutcome::Cancelled(cancelled))
            }
            Err(StoreError::Conflict) => {
                // The fire path (or another cancel) committed first.
                let current = self.store.get(id).await?;
                if current.status != ReminderStatus::Scheduled {
                    self.index.remove(id);
                }
                Ok(CancelOutcome::AlreadyHandled(current.status))
            }
            Err(StoreError::NotFound) => Ok(CancelOutcome::NotFound),
            Err(e) => Err(e),
        }
    }

    /// The owner's scheduled reminders plus recently fired/expired ones.
    pub async fn list(
        &self,
        owner: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<Reminder>, StoreError> {
        let mut scheduled = self.scheduled_sorted(owner).await?;
        let mut recent: Vec<Reminder> = self
            .store
            .list(
                owner,
                Some(&[ReminderStatus::Fired, ReminderStatus::Expired]),
            )
            .await?
            .into_iter()
            .filter(|r| now - r.updated_at <= self.config.recent_window)
            .collect();
        recent.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        scheduled.extend(recent);
        Ok(scheduled)
    }

    /// Scheduled reminders ordered by due time; the ordering ordinal cancel
    /// selectors resolve against.
    pub async fn scheduled_sorted(&self, owner: &str) -> Result<Vec<Reminder>, StoreError> {
        let mut scheduled = self
            .store
            .list(owner, Some(&[ReminderStatus::Scheduled]))
            .await?;
        scheduled.sort_by(|a, b| (a.due_at, a.created_at, a.id).cmp(&(b.due_at, b.created_at, b.id)));
        Ok(scheduled)
    }

    /// The periodic sweep: fire due reminders, expire what slipped past the
    /// grace window, abandon stale drafts.
    ///
    /// Idempotent for a fixed `now`: a candidate attempted at `now` is not
    /// attempted again until a later sweep.
    pub async fn tick(&self, now: DateTime<Utc>) -> Result<Vec<TickEffect>, StoreError> {
        let mut effects = Vec::new();

        for draft in self
            .store
            .drafts_idle_since(now - self.config.draft_timeout)
            .await?
        {
            match self
                .store
                .update(
                    draft.id,
                    StatusGuard::status(ReminderStatus::Draft),
                    ReminderChanges {
                        status: Some(ReminderStatus::Cancelled),
                        ..Default::default()
                    },
                )
                .await
            {
                Ok(_) => {
                    info!("🧹 Abandoned stale draft {}", draft.id);
                    effects.push(TickEffect::DraftAbandoned { id: draft.id });
                }
                Err(StoreError::Conflict) | Err(StoreError::NotFound) => {}
                Err(e) => return Err(e),
            }
        }

        for id in self.index.due_before(now) {
            let reminder = match self.store.get(id).await {
                Ok(reminder) => reminder,
                Err(StoreError::NotFound) => {
                    // Index raced ahead of the store; drop the orphan entry.
                    debug!("Dropping index entry for missing reminder {id}");
                    self.index.remove(id);
                    continue;
                }
                Err(e) => return Err(e),
            };
            if reminder.status != ReminderStatus::Scheduled {
                self.index.remove(id);
                continue;
            }
            let due = match reminder.due_at {
                Some(due) => due,
                None => {
                    warn!("Scheduled reminder {id} has no due time; dropping from index");
                    self.index.remove(id);
                    continue;
                }
            };

            if now - due > self.config.grace_window {
                if let Some(effect) = self.expire(&reminder, now).await? {
                    effects.push(effect);
                }
                continue;
            }

            // Re-running the sweep at the same instant must not re-attempt.
            if reminder.last_attempt_at.is_some_and(|at| at >= now) {
                continue;
            }

            if let Some(effect) = self.fire(&reminder, due, now).await? {
                effects.push(effect);
            }
        }

        Ok(effects)
    }

    /// SCHEDULED -> EXPIRED for a reminder past its grace window.
    async fn expire(
        &self,
        reminder: &Reminder,
        now: DateTime<Utc>,
    ) -> Result<Option<TickEffect>, StoreError> {
        match self
            .store
            .update(
                reminder.id,
                StatusGuard::unleased(ReminderStatus::Scheduled, now - self.config.lease_timeout),
                ReminderChanges {
                    status: Some(ReminderStatus::Expired),
                    firing_lease: Some(None),
                    ..Default::default()
                },
            )
            .await
        {
            Ok(_) => {
                self.index.remove(reminder.id);
                warn!(
                    "⌛ Reminder {} expired undelivered (due {:?})",
                    reminder.id, reminder.due_at
                );
                Ok(Some(TickEffect::Expired { id: reminder.id }))
            }
            Err(StoreError::Conflict) | Err(StoreError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Attempt SCHEDULED -> FIRED (or re-arm, for recurring reminders).
    ///
    /// The dispatch lease is taken before notifying, so a concurrent cancel
    /// observes Conflict instead of cancelling a reminder whose notification
    /// is already on its way.
    async fn fire(
        &self,
        reminder: &Reminder,
        due: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Option<TickEffect>, StoreError> {
        let attempt = reminder.dispatch_attempts + 1;
        let claimed = match self
            .store
            .update(
                reminder.id,
                StatusGuard::unleased(ReminderStatus::Scheduled, now - self.config.lease_timeout),
                ReminderChanges {
                    firing_lease: Some(Some(now)),
                    last_attempt_at: Some(Some(now)),
                    dispatch_attempts: Some(attempt),
                    ..Default::default()
                },
            )
            .await
        {
            Ok(claimed) => claimed,
            Err(StoreError::Conflict) | Err(StoreError::NotFound) => {
                // A cancel or a concurrent sweep got there first.
                debug!("Lost the fire claim for reminder {}", reminder.id);
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let text = format!("⏰ Reminder: {}", claimed.action);
        match self.notifier.notify(&claimed.owner, &text).await {
            DispatchOutcome::Delivered => {
                if let Some(recurrence) = claimed.recurrence {
                    let next_due = advance_due(due, recurrence, now);
                    self.commit_fire(
                        &claimed,
                        ReminderChanges {
                            due_at: Some(Some(next_due)),
                            dispatch_attempts: Some(0),
                            firing_lease: Some(None),
                            ..Default::default()
                        },
                        Some(next_due),
                    )
                    .await?;
                    info!(
                        "🔁 Reminder {} fired and re-armed for {next_due}",
                        claimed.id
                    );
                    Ok(Some(TickEffect::Rescheduled {
                        id: claimed.id,
                        next_due,
                    }))
                } else {
                    self.commit_fire(
                        &claimed,
                        ReminderChanges {
                            status: Some(ReminderStatus::Fired),
                            firing_lease: Some(None),
                            ..Default::default()
                        },
                        None,
                    )
                    .await?;
                    info!("🔔 Reminder {} fired for {}", claimed.id, claimed.owner);
                    Ok(Some(TickEffect::Fired {
                        id: claimed.id,
                        owner: claimed.owner.clone(),
                    }))
                }
            }
            DispatchOutcome::Failed(reason) => {
                if attempt >= self.config.max_dispatch_attempts {
                    self.commit_fire(
                        &claimed,
                        ReminderChanges {
                            status: Some(ReminderStatus::Expired),
                            firing_lease: Some(None),
                            ..Default::default()
                        },
                        None,
                    )
                    .await?;
                    warn!(
                        "⌛ Reminder {} expired after {attempt} failed dispatch attempt(s): {reason}",
                        claimed.id
                    );
                    Ok(Some(TickEffect::Expired { id: claimed.id }))
                } else {
                    // Release the lease; the reminder stays scheduled and a
                    // later sweep retries (cancellation possible in between).
                    self.commit_fire(
                        &claimed,
                        ReminderChanges {
                            firing_lease: Some(None),
                            ..Default::default()
                        },
                        claimed.due_at,
                    )
                    .await?;
                    warn!(
                        "📡 Dispatch attempt {attempt} failed for reminder {}: {reason}",
                        claimed.id
                    );
                    Ok(Some(TickEffect::RetryPending {
                        id: claimed.id,
                        attempt,
                        reason,
                    }))
                }
            }
        }
    }

    /// Commit the post-dispatch store write and mirror it in the index.
    async fn commit_fire(
        &self,
        claimed: &Reminder,
        changes: ReminderChanges,
        keep_indexed_at: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        match self
            .store
            .update(claimed.id, StatusGuard::status(ReminderStatus::Scheduled), changes)
            .await
        {
            Ok(_) => {
                match keep_indexed_at {
                    Some(due) => self.index.upsert(claimed.id, due),
                    None => self.index.remove(claimed.id),
                }
                Ok(())
            }
            Err(StoreError::Conflict) | Err(StoreError::NotFound) => {
                // Nothing else can touch a leased reminder; realign the index
                // with whatever state the store now holds.
                warn!("Unexpected state change under lease for {}", claimed.id);
                match self.store.get(claimed.id).await {
                    Ok(current) if current.status == ReminderStatus::Scheduled => {
                        if let Some(due) = current.due_at {
                            self.index.upsert(current.id, due);
                        }
                    }
                    _ => self.index.remove(claimed.id),
                }
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

/// Advance a due time by whole intervals until it is strictly in the future.
fn advance_due(due: DateTime<Utc>, recurrence: Recurrence, now: DateTime<Utc>) -> DateTime<Utc> {
    let interval = recurrence.interval();
    let mut next = due + interval;
    while next <= now {
        next = next + interval;
    }
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct MockNotifier {
        calls: Mutex<Vec<(String, String)>>,
        outcomes: Mutex<VecDeque<DispatchOutcome>>,
    }

    impl MockNotifier {
        fn delivering() -> Arc<Self> {
            Arc::new(MockNotifier {
                calls: Mutex::new(Vec::new()),
                outcomes: Mutex::new(VecDeque::new()),
            })
        }

        fn failing_times(n: usize) -> Arc<Self> {
            let notifier = MockNotifier::delivering();
            let mut outcomes = notifier.outcomes.lock().unwrap();
            for _ in 0..n {
                outcomes.push_back(DispatchOutcome::Failed("transport down".to_string()));
            }
            drop(outcomes);
            notifier
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Notifier for MockNotifier {
        async fn notify(&self, owner: &str, text: &str) -> DispatchOutcome {
            self.calls
                .lock()
                .unwrap()
                .push((owner.to_string(), text.to_string()));
            self.outcomes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(DispatchOutcome::Delivered)
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 10, 12, 0, 0).unwrap()
    }

    async fn lifecycle_with(notifier: Arc<MockNotifier>) -> ReminderLifecycle {
        let store = ReminderStore::new(Database::open_in_memory().await.unwrap());
        ReminderLifecycle::new(store, TimeIndex::new(), notifier, LifecycleConfig::default())
    }

    fn complete_input(action: &str, due: DateTime<Utc>) -> ReminderDraftInput {
        ReminderDraftInput {
            action: Some(action.to_string()),
            due_at: Some(due),
            ..Default::default()
        }
    }

    /// Invariant from the data model: a reminder is in the index iff it is
    /// scheduled in the store.
    async fn assert_index_consistent(lifecycle: &ReminderLifecycle) {
        let entries = lifecycle.store().scheduled_entries().await.unwrap();
        assert_eq!(
            entries.len(),
            lifecycle.index().len(),
            "index and store disagree on scheduled count"
        );
        for (id, _) in entries {
            assert!(lifecycle.index().contains(id), "scheduled {id} not indexed");
        }
    }

    #[tokio::test]
    async fn test_create_complete_schedules() {
        let notifier = MockNotifier::delivering();
        let lifecycle = lifecycle_with(notifier).await;
        let due = t0() + Duration::minutes(5);

        let outcome = lifecycle
            .create_or_continue("user-1", complete_input("pay the bill", due), t0())
            .await
            .unwrap();

        let reminder = match outcome {
            CreateOutcome::Complete(r) => r,
            other => panic!("expected Complete, got {other:?}"),
        };
        assert_eq!(reminder.status, ReminderStatus::Scheduled);
        assert_eq!(reminder.action, "pay the bill");
        assert_eq!(reminder.due_at, Some(due));
        assert!(lifecycle.index().contains(reminder.id));
        assert_index_consistent(&lifecycle).await;
    }

    #[tokio::test]
    async fn test_create_missing_due_needs_more_info() {
        let lifecycle = lifecycle_with(MockNotifier::delivering()).await;
        let input = ReminderDraftInput {
            action: Some("water the plants".to_string()),
            ..Default::default()
        };

        let outcome = lifecycle
            .create_or_continue("user-1", input, t0())
            .await
            .unwrap();
        match outcome {
            CreateOutcome::NeedsMoreInfo { draft, missing, due_issue } => {
                assert_eq!(draft.status, ReminderStatus::Draft);
                assert_eq!(missing, vec![MissingSlot::DueTime]);
                assert_eq!(due_issue, None);
            }
            other => panic!("expected NeedsMoreInfo, got {other:?}"),
        }
        assert!(lifecycle.index().is_empty());
        assert_index_consistent(&lifecycle).await;
    }

    #[tokio::test]
    async fn test_continue_draft_to_completion() {
        let lifecycle = lifecycle_with(MockNotifier::delivering()).await;
        let due = t0() + Duration::hours(21);

        lifecycle
            .create_or_continue(
                "user-1",
                ReminderDraftInput {
                    action: Some("call the doctor".to_string()),
                    ..Default::default()
                },
                t0(),
            )
            .await
            .unwrap();

        // The clarification reply carries only the missing due time.
        let outcome = lifecycle
            .create_or_continue(
                "user-1",
                ReminderDraftInput {
                    due_at: Some(due),
                    ..Default::default()
                },
                t0(),
            )
            .await
            .unwrap();

        let reminder = match outcome {
            CreateOutcome::Complete(r) => r,
            other => panic!("expected Complete, got {other:?}"),
        };
        assert_eq!(reminder.action, "call the doctor");
        assert_eq!(reminder.due_at, Some(due));
        assert_eq!(reminder.status, ReminderStatus::Scheduled);

        // Exactly one reminder exists for the owner.
        assert_eq!(lifecycle.store().list("user-1", None).await.unwrap().len(), 1);
        assert_index_consistent(&lifecycle).await;
    }

    #[tokio::test]
    async fn test_draft_token_makes_create_idempotent() {
        let lifecycle = lifecycle_with(MockNotifier::delivering()).await;
        let due = t0() + Duration::minutes(30);
        let input = ReminderDraftInput {
            draft_token: Some("msg-7".to_string()),
            ..complete_input("submit expenses", due)
        };

        let first = lifecycle
            .create_or_continue("user-1", input.clone(), t0())
            .await
            .unwrap();
        let second = lifecycle
            .create_or_continue("user-1", input, t0())
            .await
            .unwrap();

        let (a, b) = match (first, second) {
            (CreateOutcome::Complete(a), CreateOutcome::Complete(b)) => (a, b),
            other => panic!("expected two Complete outcomes, got {other:?}"),
        };
        assert_eq!(a.id, b.id);
        assert_eq!(lifecycle.store().list("user-1", None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_past_due_reports_issue_not_schedule() {
        let lifecycle = lifecycle_with(MockNotifier::delivering()).await;
        let input = ReminderDraftInput {
            action: Some("stretch".to_string()),
            due_at: Some(t0() - Duration::minutes(5)),
            ..Default::default()
        };

        let outcome = lifecycle
            .create_or_continue("user-1", input, t0())
            .await
            .unwrap();
        match outcome {
            CreateOutcome::NeedsMoreInfo { missing, due_issue, .. } => {
                assert_eq!(missing, vec![MissingSlot::DueTime]);
                assert_eq!(due_issue, Some(DueTimeIssue::InPast));
            }
            other => panic!("expected NeedsMoreInfo, got {other:?}"),
        }
        assert!(lifecycle.index().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_succeeds_exactly_once() {
        let lifecycle = lifecycle_with(MockNotifier::delivering()).await;
        let due = t0() + Duration::minutes(10);
        let reminder = match lifecycle
            .create_or_continue("user-1", complete_input("check the oven", due), t0())
            .await
            .unwrap()
        {
            CreateOutcome::Complete(r) => r,
            other => panic!("unexpected {other:?}"),
        };

        let first = lifecycle
            .cancel("user-1", CancelSelector::ById(reminder.id), t0())
            .await
            .unwrap();
        assert!(matches!(first, CancelOutcome::Cancelled(_)));
        assert!(!lifecycle.index().contains(reminder.id));

        let second = lifecycle
            .cancel("user-1", CancelSelector::ById(reminder.id), t0())
            .await
            .unwrap();
        assert!(matches!(
            second,
            CancelOutcome::AlreadyHandled(ReminderStatus::Cancelled)
        ));
        assert_index_consistent(&lifecycle).await;
    }

    #[tokio::test]
    async fn test_cancel_by_ordinal_uses_due_order() {
        let lifecycle = lifecycle_with(MockNotifier::delivering()).await;
        lifecycle
            .create_or_continue(
                "user-1",
                complete_input("later task", t0() + Duration::hours(2)),
                t0(),
            )
            .await
            .unwrap();
        lifecycle
            .create_or_continue(
                "user-1",
                complete_input("sooner task", t0() + Duration::hours(1)),
                t0(),
            )
            .await
            .unwrap();

        let outcome = lifecycle
            .cancel("user-1", CancelSelector::ByOrdinal(1), t0())
            .await
            .unwrap();
        match outcome {
            CancelOutcome::Cancelled(r) => assert_eq!(r.action, "sooner task"),
            other => panic!("expected Cancelled, got {other:?}"),
        }

        let remaining = lifecycle.scheduled_sorted("user-1").await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].action, "later task");
    }

    #[tokio::test]
    async fn test_cancel_owner_mismatch_is_not_found() {
        let lifecycle = lifecycle_with(MockNotifier::delivering()).await;
        let reminder = match lifecycle
            .create_or_continue(
                "user-1",
                complete_input("secret", t0() + Duration::minutes(10)),
                t0(),
            )
            .await
            .unwrap()
        {
            CreateOutcome::Complete(r) => r,
            other => panic!("unexpected {other:?}"),
        };

        let outcome = lifecycle
            .cancel("intruder", CancelSelector::ById(reminder.id), t0())
            .await
            .unwrap();
        assert!(matches!(outcome, CancelOutcome::NotFound));
        // untouched
        assert!(lifecycle.index().contains(reminder.id));
    }

    #[tokio::test]
    async fn test_tick_fires_due_reminder() {
        let notifier = MockNotifier::delivering();
        let lifecycle = lifecycle_with(Arc::clone(&notifier)).await;
        let due = t0() + Duration::minutes(5);
        let reminder = match lifecycle
            .create_or_continue("user-1", complete_input("stand up", due), t0())
            .await
            .unwrap()
        {
            CreateOutcome::Complete(r) => r,
            other => panic!("unexpected {other:?}"),
        };

        // Before the due time nothing happens.
        assert!(lifecycle.tick(t0() + Duration::minutes(4)).await.unwrap().is_empty());
        assert_eq!(notifier.call_count(), 0);

        let effects = lifecycle.tick(due).await.unwrap();
        assert_eq!(
            effects,
            vec![TickEffect::Fired {
                id: reminder.id,
                owner: "user-1".to_string()
            }]
        );
        assert_eq!(notifier.call_count(), 1);

        let fired = lifecycle.store().get(reminder.id).await.unwrap();
        assert_eq!(fired.status, ReminderStatus::Fired);
        assert!(fired.firing_lease.is_none());
        assert!(!lifecycle.index().contains(reminder.id));
        assert_index_consistent(&lifecycle).await;
    }

    #[tokio::test]
    async fn test_tick_is_idempotent_for_same_now() {
        let notifier = MockNotifier::failing_times(1);
        let lifecycle = lifecycle_with(Arc::clone(&notifier)).await;
        let due = t0() + Duration::minutes(5);
        lifecycle
            .create_or_continue("user-1", complete_input("stand up", due), t0())
            .await
            .unwrap();

        // First sweep attempts and fails; the reminder stays scheduled.
        let effects = lifecycle.tick(due).await.unwrap();
        assert!(matches!(effects[0], TickEffect::RetryPending { attempt: 1, .. }));
        assert_eq!(notifier.call_count(), 1);

        // Same `now` again: no additional attempt.
        let effects = lifecycle.tick(due).await.unwrap();
        assert!(effects.is_empty());
        assert_eq!(notifier.call_count(), 1);
        assert_index_consistent(&lifecycle).await;
    }

    #[tokio::test]
    async fn test_dispatch_failures_expire_after_bounded_retries() {
        let notifier = MockNotifier::failing_times(10);
        let lifecycle = lifecycle_with(Arc::clone(&notifier)).await;
        let due = t0() + Duration::minutes(5);
        let reminder = match lifecycle
            .create_or_continue("user-1", complete_input("stand up", due), t0())
            .await
            .unwrap()
        {
            CreateOutcome::Complete(r) => r,
            other => panic!("unexpected {other:?}"),
        };

        let e1 = lifecycle.tick(due).await.unwrap();
        assert!(matches!(e1[0], TickEffect::RetryPending { attempt: 1, .. }));
        let e2 = lifecycle.tick(due + Duration::minutes(1)).await.unwrap();
        assert!(matches!(e2[0], TickEffect::RetryPending { attempt: 2, .. }));
        let e3 = lifecycle.tick(due + Duration::minutes(2)).await.unwrap();
        assert_eq!(e3, vec![TickEffect::Expired { id: reminder.id }]);

        assert_eq!(notifier.call_count(), 3);
        let expired = lifecycle.store().get(reminder.id).await.unwrap();
        assert_eq!(expired.status, ReminderStatus::Expired);
        assert!(!lifecycle.index().contains(reminder.id));
        assert_index_consistent(&lifecycle).await;
    }

    #[tokio::test]
    async fn test_past_grace_expires_without_dispatch() {
        let notifier = MockNotifier::delivering();
        let lifecycle = lifecycle_with(Arc::clone(&notifier)).await;
        let due = t0() + Duration::minutes(5);
        let reminder = match lifecycle
            .create_or_continue("user-1", complete_input("stand up", due), t0())
            .await
            .unwrap()
        {
            CreateOutcome::Complete(r) => r,
            other => panic!("unexpected {other:?}"),
        };

        // The sweep comes back long after due + grace (service outage).
        let late = due + LifecycleConfig::default().grace_window + Duration::minutes(1);
        let effects = lifecycle.tick(late).await.unwrap();
        assert_eq!(effects, vec![TickEffect::Expired { id: reminder.id }]);
        assert_eq!(notifier.call_count(), 0);
        assert_index_consistent(&lifecycle).await;
    }

    #[tokio::test]
    async fn test_recurring_reminder_re_arms_strictly_forward() {
        let notifier = MockNotifier::delivering();
        let lifecycle = lifecycle_with(Arc::clone(&notifier)).await;
        let due = t0() + Duration::hours(1);
        let input = ReminderDraftInput {
            recurrence: Recurrence::from_seconds(86400),
            ..complete_input("take vitamins", due)
        };
        let reminder = match lifecycle
            .create_or_continue("user-1", input, t0())
            .await
            .unwrap()
        {
            CreateOutcome::Complete(r) => r,
            other => panic!("unexpected {other:?}"),
        };

        let effects = lifecycle.tick(due).await.unwrap();
        assert_eq!(
            effects,
            vec![TickEffect::Rescheduled {
                id: reminder.id,
                next_due: due + Duration::days(1)
            }]
        );
        assert_eq!(notifier.call_count(), 1);

        let rearmed = lifecycle.store().get(reminder.id).await.unwrap();
        assert_eq!(rearmed.status, ReminderStatus::Scheduled);
        assert_eq!(rearmed.due_at, Some(due + Duration::days(1)));
        assert_eq!(rearmed.dispatch_attempts, 0);
        assert!(lifecycle.index().contains(reminder.id));
        assert_index_consistent(&lifecycle).await;
    }

    #[tokio::test]
    async fn test_cancel_blocked_while_dispatch_in_flight() {
        let lifecycle = lifecycle_with(MockNotifier::delivering()).await;
        let due = t0() + Duration::minutes(5);
        let reminder = match lifecycle
            .create_or_continue("user-1", complete_input("stand up", due), t0())
            .await
            .unwrap()
        {
            CreateOutcome::Complete(r) => r,
            other => panic!("unexpected {other:?}"),
        };

        // Simulate the sweep's claim: lease taken, notification in flight.
        lifecycle
            .store()
            .update(
                reminder.id,
                StatusGuard::status(ReminderStatus::Scheduled),
                ReminderChanges {
                    firing_lease: Some(Some(due)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let outcome = lifecycle
            .cancel("user-1", CancelSelector::ById(reminder.id), due)
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            CancelOutcome::AlreadyHandled(ReminderStatus::Scheduled)
        ));

        // The reminder was not cancelled out from under the dispatch.
        let current = lifecycle.store().get(reminder.id).await.unwrap();
        assert_eq!(current.status, ReminderStatus::Scheduled);
    }

    #[tokio::test]
    async fn test_cancel_first_beats_fire() {
        let notifier = MockNotifier::delivering();
        let lifecycle = lifecycle_with(Arc::clone(&notifier)).await;
        let due = t0() + Duration::minutes(5);
        let reminder = match lifecycle
            .create_or_continue("user-1", complete_input("stand up", due), t0())
            .await
            .unwrap()
        {
            CreateOutcome::Complete(r) => r,
            other => panic!("unexpected {other:?}"),
        };

        let outcome = lifecycle
            .cancel("user-1", CancelSelector::ById(reminder.id), due)
            .await
            .unwrap();
        assert!(matches!(outcome, CancelOutcome::Cancelled(_)));

        // The sweep arrives after the cancel committed: no notification.
        let effects = lifecycle.tick(due).await.unwrap();
        assert!(effects.is_empty());
        assert_eq!(notifier.call_count(), 0);
        let current = lifecycle.store().get(reminder.id).await.unwrap();
        assert_eq!(current.status, ReminderStatus::Cancelled);
        assert_index_consistent(&lifecycle).await;
    }

    #[tokio::test]
    async fn test_stale_draft_abandoned_by_tick() {
        let lifecycle = lifecycle_with(MockNotifier::delivering()).await;
        let draft = match lifecycle
            .create_or_continue(
                "user-1",
                ReminderDraftInput {
                    action: Some("half-finished".to_string()),
                    ..Default::default()
                },
                t0(),
            )
            .await
            .unwrap()
        {
            CreateOutcome::NeedsMoreInfo { draft, .. } => draft,
            other => panic!("unexpected {other:?}"),
        };

        let later = Utc::now() + LifecycleConfig::default().draft_timeout + Duration::minutes(1);
        let effects = lifecycle.tick(later).await.unwrap();
        assert_eq!(effects, vec![TickEffect::DraftAbandoned { id: draft.id }]);

        let abandoned = lifecycle.store().get(draft.id).await.unwrap();
        assert_eq!(abandoned.status, ReminderStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_orphan_index_entry_is_dropped() {
        let lifecycle = lifecycle_with(MockNotifier::delivering()).await;
        let ghost = Uuid::new_v4();
        lifecycle.index().upsert(ghost, t0());

        let effects = lifecycle.tick(t0() + Duration::minutes(1)).await.unwrap();
        assert!(effects.is_empty());
        assert!(!lifecycle.index().contains(ghost));
    }

    #[tokio::test]
    async fn test_list_shows_scheduled_then_recent() {
        let notifier = MockNotifier::delivering();
        let lifecycle = lifecycle_with(Arc::clone(&notifier)).await;
        let soon = t0() + Duration::minutes(5);
        let later = t0() + Duration::hours(3);
        lifecycle
            .create_or_continue("user-1", complete_input("soon task", soon), t0())
            .await
            .unwrap();
        lifecycle
            .create_or_continue("user-1", complete_input("later task", later), t0())
            .await
            .unwrap();

        lifecycle.tick(soon).await.unwrap();

        let listed = lifecycle.list("user-1", soon).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].action, "later task");
        assert_eq!(listed[0].status, ReminderStatus::Scheduled);
        assert_eq!(listed[1].action, "soon task");
        assert_eq!(listed[1].status, ReminderStatus::Fired);
    }

    #[test]
    fn test_advance_due_skips_missed_periods() {
        let due = t0();
        let recurrence = Recurrence::from_seconds(86400).unwrap();
        // Fired on time: exactly one interval forward.
        assert_eq!(advance_due(due, recurrence, due), due + Duration::days(1));
        // Fired three days late: lands strictly after `now`, never at it.
        let now = due + Duration::days(3);
        assert_eq!(advance_due(due, recurrence, now), due + Duration::days(4));
    }
}
