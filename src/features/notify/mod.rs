//! # Notification Dispatch Feature
//!
//! Outbound delivery seam for fired reminders.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.3.0
//! - **Toggleable**: false
//!
//! The engine only sees this contract; the real transport lives behind it.

use async_trait::async_trait;
use log::info;

/// Result of one delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Delivered,
    Failed(String),
}

/// Outbound notification contract.
///
/// Implementations report failure through [`DispatchOutcome::Failed`] rather
/// than panicking or erroring; the lifecycle controller owns retry policy.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, owner: &str, text: &str) -> DispatchOutcome;
}

/// Notifier that prints to stdout. Used by the local console transport.
pub struct ConsoleNotifier;

#[async_trait]
impl Notifier for ConsoleNotifier {
    async fn notify(&self, owner: &str, text: &str) -> DispatchOutcome {
        info!("📨 Delivering notification to {owner}");
        println!("[to {owner}] {text}");
        DispatchOutcome::Delivered
    }
}
