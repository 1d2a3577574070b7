//! Intent handler implementations

pub mod clarify;
pub mod general;
pub mod reminder;

pub use clarify::ClarifyHandler;
pub use general::GeneralHandler;
pub use reminder::ReminderHandler;
