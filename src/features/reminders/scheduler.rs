//! Timer-driven reminder sweep
//!
//! Runs the lifecycle controller's `tick` on a fixed interval, independent of
//! message arrival.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0

use chrono::Utc;
use log::{debug, error, info};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::lifecycle::ReminderLifecycle;

/// Background task sweeping for due reminders.
pub struct ReminderScheduler {
    lifecycle: Arc<ReminderLifecycle>,
    interval: Duration,
}

/// Handle to a running scheduler; dropping it does not stop the task.
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Signal the sweep loop to stop and wait for it to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let _ = self.task.await;
    }
}

impl ReminderScheduler {
    pub fn new(lifecycle: Arc<ReminderLifecycle>, interval: Duration) -> Self {
        ReminderScheduler {
            lifecycle,
            interval,
        }
    }

    /// Spawn the sweep loop.
    pub fn start(self) -> SchedulerHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        info!(
            "⏱️ Reminder scheduler started (interval: {}s)",
            self.interval.as_secs()
        );

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match self.lifecycle.tick(Utc::now()).await {
                            Ok(effects) if effects.is_empty() => {
                                debug!("Sweep complete, nothing due");
                            }
                            Ok(effects) => {
                                info!("Sweep produced {} effect(s): {effects:?}", effects.len());
                            }
                            Err(e) => {
                                error!("❌ Sweep failed: {e:#}");
                            }
                        }
                    }
                    _ = shutdown_rx.changed() => {
                        info!("⏱️ Reminder scheduler stopping");
                        break;
                    }
                }
            }
        });

        SchedulerHandle {
            shutdown: shutdown_tx,
            task,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;
    use crate::features::notify::{DispatchOutcome, Notifier};
    use crate::features::reminders::{
        CreateOutcome, LifecycleConfig, ReminderDraftInput, ReminderStatus, ReminderStore,
        TimeIndex,
    };
    use async_trait::async_trait;

    struct SilentNotifier;

    #[async_trait]
    impl Notifier for SilentNotifier {
        async fn notify(&self, _owner: &str, _text: &str) -> DispatchOutcome {
            DispatchOutcome::Delivered
        }
    }

    #[tokio::test]
    async fn test_scheduler_fires_due_reminder_and_shuts_down() {
        let store = ReminderStore::new(Database::open_in_memory().await.unwrap());
        let lifecycle = Arc::new(ReminderLifecycle::new(
            store,
            TimeIndex::new(),
            Arc::new(SilentNotifier),
            LifecycleConfig::default(),
        ));

        let now = Utc::now();
        let reminder = match lifecycle
            .create_or_continue(
                "user-1",
                ReminderDraftInput {
                    action: Some("blink".to_string()),
                    due_at: Some(now + chrono::Duration::milliseconds(50)),
                    ..Default::default()
                },
                now,
            )
            .await
            .unwrap()
        {
            CreateOutcome::Complete(r) => r,
            other => panic!("unexpected {other:?}"),
        };

        let handle =
            ReminderScheduler::new(Arc::clone(&lifecycle), Duration::from_millis(20)).start();
        tokio::time::sleep(Duration::from_millis(200)).await;
        handle.shutdown().await;

        let fired = lifecycle.store().get(reminder.id).await.unwrap();
        assert_eq!(fired.status, ReminderStatus::Fired);
    }
}
