//! Book identity matching
//!
//! Resolves an imported `BookRecord` to a library id with a 0-5 confidence.
//! Confidence 3 and up merges without asking; lower values need a caller
//! decision.

mod matcher;
mod types;

pub use matcher::ConfidenceMatcher;
pub use types::{Confidence, FieldMismatch, MatchField, MatchOutcome, MatchRule};
