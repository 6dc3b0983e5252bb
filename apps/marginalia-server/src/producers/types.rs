//! Producer output shapes

use serde::{Deserialize, Serialize};

use crate::annotations::{AnnotationRecord, BookRecord};
use crate::location::LocationDescriptor;

/// An annotation as a producer reports it
///
/// `record.location_sort` may be empty; the import pipeline derives it from
/// `descriptor`, or from the timestamp when there is no descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawAnnotation {
    #[serde(flatten)]
    pub record: AnnotationRecord,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub descriptor: Option<LocationDescriptor>,
}

impl RawAnnotation {
    pub fn new(record: AnnotationRecord, descriptor: Option<LocationDescriptor>) -> Self {
        Self { record, descriptor }
    }
}

impl From<AnnotationRecord> for RawAnnotation {
    fn from(record: AnnotationRecord) -> Self {
        Self::new(record, None)
    }
}

/// One book and the annotations a producer found for it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookAnnotations {
    pub book: BookRecord,
    #[serde(default)]
    pub annotations: Vec<RawAnnotation>,
}
