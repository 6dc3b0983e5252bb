//! Annotation import
//!
//! Match → confirm/fallback → normalize → merge → persist, one book at a
//! time per library id, many books in parallel.

mod locks;
mod pipeline;
mod types;

pub use locks::BookLocks;
pub use pipeline::ImportPipeline;
pub use types::{BookOutcome, BookReport, ImportRequest, ImportSettings, ImportSummary};
