//! JSON export producer
//!
//! Reads a document of canonical records:
//!
//! ```json
//! {
//!   "reader_app": "Marvin",
//!   "merge_strategy": "timestamp_identity",
//!   "books": [{ "book": { ... }, "annotations": [{ ... }] }]
//! }
//! ```

use async_trait::async_trait;
use serde::Deserialize;

use crate::annotations::BookRecord;
use crate::merge::MergeStrategy;

use super::{AnnotationProducer, BookAnnotations, ProducerError};

#[derive(Debug, Deserialize)]
struct ExportDocument {
    reader_app: String,
    #[serde(default)]
    merge_strategy: Option<MergeStrategy>,
    #[serde(default)]
    books: Vec<BookAnnotations>,
}

/// Producer over an already-canonical JSON export
#[derive(Debug, Clone)]
pub struct JsonExportProducer {
    reader_app: String,
    strategy: Option<MergeStrategy>,
    books: Vec<BookAnnotations>,
}

pub(super) fn open(payload: &str) -> Result<Box<dyn AnnotationProducer>, ProducerError> {
    Ok(Box::new(JsonExportProducer::from_payload(payload)?))
}

impl JsonExportProducer {
    pub fn from_payload(payload: &str) -> Result<Self, ProducerError> {
        let document: ExportDocument = serde_json::from_str(payload)?;
        let reader_app = document.reader_app.trim().to_string();
        if reader_app.is_empty() {
            return Err(ProducerError::InvalidPayload {
                producer: "json".to_string(),
                reason: "reader_app is empty".to_string(),
            });
        }

        let books = document
            .books
            .into_iter()
            .map(|mut entry| {
                if entry.book.reader_app.is_empty() {
                    entry.book.reader_app = reader_app.clone();
                }
                for raw in &mut entry.annotations {
                    raw.record
                        .reader_app
                        .get_or_insert_with(|| reader_app.clone());
                    if raw.record.genre.is_none() {
                        raw.record.genre = entry.book.genre.clone();
                    }
                }
                entry
            })
            .collect::<Vec<_>>();

        tracing::debug!("Parsed JSON export from {} with {} books", reader_app, books.len());

        Ok(Self {
            reader_app,
            strategy: document.merge_strategy,
            books,
        })
    }
}

#[async_trait]
impl AnnotationProducer for JsonExportProducer {
    fn reader_app(&self) -> &str {
        &self.reader_app
    }

    fn merge_strategy(&self) -> Option<MergeStrategy> {
        self.strategy
    }

    async fn installed_books(&self) -> Result<Vec<BookRecord>, ProducerError> {
        Ok(self.books.iter().map(|entry| entry.book.clone()).collect())
    }

    async fn active_annotations(&self) -> Result<Vec<BookAnnotations>, ProducerError> {
        Ok(self
            .books
            .iter()
            .filter(|entry| !entry.annotations.is_empty())
            .cloned()
            .collect())
    }
}
