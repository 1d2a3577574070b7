//! Reminder intent handlers
//!
//! Handles: reminder creation (with the clarification loop), listing, and
//! cancellation.
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.2.0
//!
//! ## Changelog
//! - 1.1.0: Ordinal cancel selectors and recently-fired list section
//! - 1.0.0: Initial implementation

use anyhow::Result;
use async_trait::async_trait;
use log::{info, warn};
use regex::Regex;
use std::sync::Arc;
use std::sync::OnceLock;
use uuid::Uuid;

use crate::core::response::format_due_time;
use crate::features::extraction::DueTimeIssue;
use crate::features::intent::{Classification, Intent};
use crate::features::reminders::{
    CancelOutcome, CancelSelector, CreateOutcome, MissingSlot, Reminder, ReminderDraftInput,
    ReminderStatus,
};
use crate::message_handler::InboundMessage;
use crate::routing::context::HandlerContext;
use crate::routing::handler::IntentHandler;

/// Handler for the three reminder intents.
pub struct ReminderHandler;

#[async_trait]
impl IntentHandler for ReminderHandler {
    fn intents(&self) -> &'static [Intent] {
        &[Intent::ReminderCreate, Intent::ReminderList, Intent::ReminderCancel]
    }

    async fn handle(
        &self,
        ctx: Arc<HandlerContext>,
        message: &InboundMessage,
        classification: &Classification,
    ) -> Result<String> {
        match classification.intent {
            Intent::ReminderCreate => self.handle_create(&ctx, message).await,
            Intent::ReminderList => self.handle_list(&ctx, message).await,
            Intent::ReminderCancel => self.handle_cancel(&ctx, message).await,
            _ => Ok(String::new()),
        }
    }
}

impl ReminderHandler {
    /// Create a reminder or continue the owner's clarification loop.
    async fn handle_create(
        &self,
        ctx: &HandlerContext,
        message: &InboundMessage,
    ) -> Result<String> {
        let slots = match ctx
            .extractor
            .extract(&message.text, message.received_at, ctx.timezone)
            .await
        {
            Ok(slots) => slots,
            Err(e) => {
                warn!("⚠️ Slot extraction failed: {e:#}");
                return Ok(
                    "I couldn't work out the reminder details. Try something like \
                     'remind me to pay the bill tomorrow at 10am'."
                        .to_string(),
                );
            }
        };

        let input = ReminderDraftInput {
            draft_token: message.message_id.clone(),
            action: slots.action,
            due_at: slots.due_at,
            due_issue: slots.due_issue,
            recurrence: slots.recurrence,
        };

        let outcome = ctx
            .lifecycle
            .create_or_continue(&message.sender, input, message.received_at)
            .await?;

        Ok(match outcome {
            CreateOutcome::Complete(reminder) => match reminder.status {
                ReminderStatus::Scheduled => {
                    info!(
                        "Created reminder {} for user {}",
                        reminder.id, message.sender
                    );
                    confirmation_text(&reminder, message, ctx)
                }
                // A replayed request whose reminder has since moved on.
                ReminderStatus::Fired => {
                    format!("That reminder ('{}') already fired.", reminder.action)
                }
                _ => format!(
                    "That reminder ('{}') is no longer pending.",
                    reminder.action
                ),
            },
            CreateOutcome::NeedsMoreInfo {
                missing, due_issue, ..
            } => clarification_text(&missing, due_issue),
        })
    }

    /// List scheduled and recently fired/expired reminders.
    async fn handle_list(&self, ctx: &HandlerContext, message: &InboundMessage) -> Result<String> {
        let reminders = ctx
            .lifecycle
            .list(&message.sender, message.received_at)
            .await?;

        if reminders.is_empty() {
            return Ok(
                "You don't have any reminders scheduled.\n\nSay 'remind me to pay the bill \
                 tomorrow at 10am' to create one!"
                    .to_string(),
            );
        }

        let (scheduled, recent): (Vec<&Reminder>, Vec<&Reminder>) = reminders
            .iter()
            .partition(|r| r.status == ReminderStatus::Scheduled);

        let mut text = String::from("📋 Your reminders:\n");
        for (position, reminder) in scheduled.iter().enumerate() {
            let due = reminder
                .due_at
                .map(|due| format_due_time(due, message.received_at, ctx.timezone))
                .unwrap_or_else(|| "unscheduled".to_string());
            let repeat = reminder
                .recurrence
                .map(|r| format!(" ({})", r.describe()))
                .unwrap_or_default();
            text.push_str(&format!(
                "{}. {} - {due}{repeat}\n",
                position + 1,
                reminder.action
            ));
        }

        if !recent.is_empty() {
            text.push_str("\nRecently:\n");
            for reminder in &recent {
                let note = match reminder.status {
                    ReminderStatus::Fired => "delivered",
                    ReminderStatus::Expired => "expired before I could deliver it",
                    _ => "no longer pending",
                };
                text.push_str(&format!("• {} - {note}\n", reminder.action));
            }
        }

        if !scheduled.is_empty() {
            text.push_str("\nTo cancel one, say 'cancel reminder 2'.");
        }
        Ok(text.trim_end().to_string())
    }

    /// Cancel a reminder named by list position or id.
    async fn handle_cancel(
        &self,
        ctx: &HandlerContext,
        message: &InboundMessage,
    ) -> Result<String> {
        let selector = match parse_cancel_selector(&message.text) {
            Some(selector) => selector,
            None => {
                let scheduled = ctx.lifecycle.scheduled_sorted(&message.sender).await?;
                if scheduled.is_empty() {
                    return Ok("You don't have any reminders to cancel.".to_string());
                }
                let mut text = String::from("Which one should I cancel?\n");
                for (position, reminder) in scheduled.iter().enumerate() {
                    text.push_str(&format!("{}. {}\n", position + 1, reminder.action));
                }
                text.push_str("\nSay 'cancel reminder 2' (using the number).");
                return Ok(text);
            }
        };

        let outcome = ctx
            .lifecycle
            .cancel(&message.sender, selector, message.received_at)
            .await?;

        Ok(match outcome {
            CancelOutcome::Cancelled(reminder) => {
                info!("Cancelled reminder {} for user {}", reminder.id, message.sender);
                format!("✅ Cancelled '{}'.", reminder.action)
            }
            CancelOutcome::NotFound => {
                "I couldn't find that reminder. Say 'list my reminders' to see what's scheduled."
                    .to_string()
            }
            CancelOutcome::AlreadyHandled(ReminderStatus::Fired) => {
                "That reminder already fired.".to_string()
            }
            CancelOutcome::AlreadyHandled(ReminderStatus::Scheduled) => {
                "That reminder is being delivered right now.".to_string()
            }
            CancelOutcome::AlreadyHandled(_) => "That reminder is no longer pending.".to_string(),
        })
    }
}

fn confirmation_text(
    reminder: &Reminder,
    message: &InboundMessage,
    ctx: &HandlerContext,
) -> String {
    let due = reminder
        .due_at
        .map(|due| format_due_time(due, message.received_at, ctx.timezone))
        .unwrap_or_else(|| "soon".to_string());
    let repeat = reminder
        .recurrence
        .map(|r| format!(", repeating {}", r.describe()))
        .unwrap_or_default();
    format!(
        "✅ Reminder set! I'll remind you to {} {due}{repeat}.",
        reminder.action
    )
}

fn clarification_text(missing: &[MissingSlot], due_issue: Option<DueTimeIssue>) -> String {
    match due_issue {
        Some(DueTimeIssue::InPast) => {
            return "That time has already passed. When should I remind you?".to_string();
        }
        Some(DueTimeIssue::Ambiguous) => {
            return "I couldn't pin down the time. Try something like 'tomorrow at 9am' \
                    or 'in 30 minutes'."
                .to_string();
        }
        None => {}
    }
    let needs_action = missing.contains(&MissingSlot::Action);
    let needs_due = missing.contains(&MissingSlot::DueTime);
    match (needs_action, needs_due) {
        (true, false) => "Got it! What should I remind you about?".to_string(),
        (false, true) => "When should I remind you?".to_string(),
        _ => "I can set that up! Tell me what to remind you about and when, e.g. \
              'remind me to pay the bill tomorrow at 10am'."
            .to_string(),
    }
}

fn uuid_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}\b")
            .unwrap()
    })
}

fn ordinal_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(\d{1,3})\b").unwrap())
}

/// Pull a cancel target out of free text: a full id, or a list position.
fn parse_cancel_selector(text: &str) -> Option<CancelSelector> {
    if let Some(m) = uuid_re().find(text) {
        if let Ok(id) = Uuid::parse_str(m.as_str()) {
            return Some(CancelSelector::ById(id));
        }
    }
    ordinal_re()
        .captures(text)
        .and_then(|caps| caps[1].parse::<usize>().ok())
        .map(CancelSelector::ByOrdinal)
}
