//! Annotation producers
//!
//! A producer turns one reader app's export (or device data) into canonical
//! `BookRecord`s and `RawAnnotation`s. Producers are looked up by name in a
//! [`ProducerRegistry`] and opened on a raw payload.

mod json;
mod kindle;
mod types;

pub use json::JsonExportProducer;
pub use kindle::KindleClippingsProducer;
pub use types::{BookAnnotations, RawAnnotation};

use async_trait::async_trait;
use std::collections::HashMap;

use crate::annotations::BookRecord;
use crate::merge::MergeStrategy;

/// Errors raised by producers and the registry
#[derive(Debug, thiserror::Error)]
pub enum ProducerError {
    #[error("Unknown producer: {0}")]
    UnknownProducer(String),

    #[error("Invalid {producer} payload: {reason}")]
    InvalidPayload { producer: String, reason: String },

    #[error("Failed to parse JSON export: {0}")]
    Json(#[from] serde_json::Error),
}

/// A source of annotations for one reader app
#[async_trait]
pub trait AnnotationProducer: Send + Sync {
    /// Reader app name stamped on every record
    fn reader_app(&self) -> &str;

    /// Identity this source's records prefer to merge under, if any
    fn merge_strategy(&self) -> Option<MergeStrategy> {
        None
    }

    /// Every book the source knows about, annotated or not
    async fn installed_books(&self) -> Result<Vec<BookRecord>, ProducerError>;

    /// Books with their active annotations
    async fn active_annotations(&self) -> Result<Vec<BookAnnotations>, ProducerError>;
}

/// Opens a producer over a raw payload
pub type ProducerFactory = fn(&str) -> Result<Box<dyn AnnotationProducer>, ProducerError>;

/// Name → producer factory, case-insensitive
#[derive(Clone, Default)]
pub struct ProducerRegistry {
    factories: HashMap<String, ProducerFactory>,
}

impl ProducerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in producers (`json`, `kindle`)
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("json", json::open);
        registry.register("kindle", kindle::open);
        registry
    }

    pub fn register(&mut self, name: &str, factory: ProducerFactory) {
        self.factories.insert(name.to_lowercase(), factory);
    }

    pub fn open(&self, name: &str, payload: &str) -> Result<Box<dyn AnnotationProducer>, ProducerError> {
        let factory = self
            .factories
            .get(&name.to_lowercase())
            .ok_or_else(|| ProducerError::UnknownProducer(name.to_string()))?;
        factory(payload)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }
}
