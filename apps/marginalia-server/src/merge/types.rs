//! Merge strategy and result types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::annotations::AnnotationRecord;

/// How stored and incoming annotations are identified as "the same"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    /// Identity is the content hash; merge is append-only
    #[default]
    HashIdentity,
    /// Identity is the device timestamp; device wins on content conflict
    TimestampIdentity,
}

impl FromStr for MergeStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hash" | "hash_identity" => Ok(MergeStrategy::HashIdentity),
            "timestamp" | "timestamp_identity" => Ok(MergeStrategy::TimestampIdentity),
            other => Err(format!("unknown merge strategy '{}'", other)),
        }
    }
}

impl fmt::Display for MergeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MergeStrategy::HashIdentity => "hash",
            MergeStrategy::TimestampIdentity => "timestamp",
        })
    }
}

/// Counters describing what a merge did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeStats {
    /// Records in the stored input
    pub stored: usize,
    /// Records in the incoming input
    pub incoming: usize,
    /// Incoming records that were not present before
    pub added: usize,
    /// Stored records replaced by a conflicting device version
    pub replaced: usize,
    /// Incoming records dropped for having no text
    pub discarded: usize,
    /// Records dropped because another record on the same side had the same identity
    pub duplicates: usize,
}

impl MergeStats {
    /// True when the merge result equals the stored set
    pub fn is_noop(&self) -> bool {
        self.added == 0 && self.replaced == 0 && self.duplicates == 0
    }
}

/// Ordered, deduplicated annotation set for one book
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MergeResult {
    pub annotations: Vec<AnnotationRecord>,
    pub stats: MergeStats,
}

impl MergeResult {
    pub fn len(&self) -> usize {
        self.annotations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }

    pub fn into_annotations(self) -> Vec<AnnotationRecord> {
        self.annotations
    }
}
