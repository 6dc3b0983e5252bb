//! Annotation merge engine
//!
//! Reconciles stored and incoming annotations for one book under either
//! content-hash or device-timestamp identity.

mod merger;
mod types;

pub use merger::AnnotationMerger;
pub use types::{MergeResult, MergeStats, MergeStrategy};
