//! # Routing Layer
//!
//! Maps classified intents to handlers. Purely a dispatch table over the
//! closed intent set; reminder state is only ever touched by the lifecycle
//! controller the handlers call into.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.2.0

pub mod context;
pub mod handler;
pub mod handlers;
pub mod router;

pub use context::HandlerContext;
pub use handler::IntentHandler;
pub use handlers::{ClarifyHandler, GeneralHandler, ReminderHandler};
pub use router::Router;
