//! # Intent Classification Feature
//!
//! The closed intent set and the classifier adapter over the external NLU
//! capability.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false

pub mod classifier;
pub mod llm;

pub use classifier::{
    apply_threshold, Classification, Intent, IntentClassifier, KeywordClassifier,
};
pub use llm::OpenAiIntentClassifier;
