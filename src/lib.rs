//! muster library - usage-ranked name suggestions
//!
//! Faction and unit names typed by army list builders are recorded per
//! manufacturer and game, filtered for quality, ranked against the search
//! term and cached locally. The autocomplete controller drives a single
//! input field on top of the engine.

pub mod batcher;
pub mod cache;
pub mod config;
pub mod controller;
pub mod debounce;
pub mod engine;
pub mod error;
pub mod normalize;
pub mod quality;
pub mod ranking;
pub mod store;
pub mod suggestion;

#[cfg(test)]
pub mod test_utils;

// Re-export commonly used types for convenience
pub use config::Config;
pub use controller::AutocompleteController;
pub use engine::{SuggestRequest, SuggestResponse, SuggestionEngine};
pub use error::MusterError;
pub use store::RemoteSuggestionStore;
pub use suggestion::{Scope, Suggestion, SuggestionType};
