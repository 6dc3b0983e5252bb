//! Annotation module
//!
//! Canonical annotation and book records shared by producers, the
//! reconciliation core and storage.
//!
//! - `types` - `AnnotationRecord`, `BookRecord`, colors and timestamps
//! - `hash` - content identity used for deduplication
//! - `store` - SQLite persistence of per-book annotation sets

mod hash;
mod store;
mod types;

pub use hash::content_hash;
pub use store::AnnotationRepository;
pub use types::{AnnotationRecord, BookRecord, HighlightColor, Timestamp};
