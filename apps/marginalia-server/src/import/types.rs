//! Import request and summary types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::library::LibraryId;
use crate::location::LocationSortKeyGenerator;
use crate::matching::{Confidence, FieldMismatch, MatchRule};
use crate::merge::{MergeStats, MergeStrategy};
use crate::producers::BookAnnotations;

/// Tunables for the import pipeline
#[derive(Debug, Clone)]
pub struct ImportSettings {
    /// Minimum confidence merged without confirmation
    pub auto_merge_threshold: Confidence,
    /// Strategy when neither the request nor the producer chose one
    pub default_strategy: MergeStrategy,
    /// Library title that collects annotations from `News` books
    pub news_clippings_destination: Option<String>,
    /// Books processed at the same time
    pub concurrency: usize,
    pub generator: LocationSortKeyGenerator,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            auto_merge_threshold: Confidence::AUTOMATIC,
            default_strategy: MergeStrategy::HashIdentity,
            news_clippings_destination: None,
            concurrency: 4,
            generator: LocationSortKeyGenerator::default(),
        }
    }
}

/// A batch of books from one reader app
#[derive(Debug, Clone, Deserialize)]
pub struct ImportRequest {
    pub reader_app: String,
    #[serde(default)]
    pub books: Vec<BookAnnotations>,
    /// Overrides the configured merge strategy
    #[serde(default)]
    pub strategy: Option<MergeStrategy>,
    /// Where unmatched books go once confirmed
    #[serde(default)]
    pub fallback_library_id: Option<LibraryId>,
    /// The caller accepts low-confidence matches and the fallback
    #[serde(default)]
    pub confirm_ambiguous: bool,
}

impl ImportRequest {
    pub fn new(reader_app: impl Into<String>, books: Vec<BookAnnotations>) -> Self {
        Self {
            reader_app: reader_app.into(),
            books,
            strategy: None,
            fallback_library_id: None,
            confirm_ambiguous: false,
        }
    }
}

/// What happened to one book of the batch
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BookOutcome {
    Merged {
        library_id: LibraryId,
        confidence: Confidence,
        rule: MatchRule,
        stats: MergeStats,
    },
    /// Needs confirmation before merging into `proposed`
    Ambiguous {
        proposed: Option<LibraryId>,
        confidence: Confidence,
        rule: MatchRule,
        mismatches: Vec<FieldMismatch>,
    },
    Unmatched,
    /// Storage failed for this book; the rest of the batch went on
    Failed { error: String },
}

/// Per-book line of an [`ImportSummary`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BookReport {
    pub book_id: String,
    pub title: String,
    pub outcome: BookOutcome,
    pub discarded: usize,
    pub location_errors: usize,
    /// Human-readable reasons for skipped annotations
    pub issues: Vec<String>,
}

impl BookReport {
    pub(super) fn new(book_id: &str, title: &str, outcome: BookOutcome) -> Self {
        Self {
            book_id: book_id.to_string(),
            title: title.to_string(),
            outcome,
            discarded: 0,
            location_errors: 0,
            issues: Vec::new(),
        }
    }
}

/// Result of one import batch
#[derive(Debug, Clone, Serialize)]
pub struct ImportSummary {
    pub batch_id: Uuid,
    pub reader_app: String,
    pub strategy: MergeStrategy,
    pub merged_books: usize,
    pub ambiguous: usize,
    pub unmatched: usize,
    pub failed: usize,
    pub annotations_added: usize,
    pub annotations_discarded: usize,
    pub location_errors: usize,
    pub books: Vec<BookReport>,
}

impl ImportSummary {
    pub(super) fn from_reports(reader_app: String, strategy: MergeStrategy, books: Vec<BookReport>) -> Self {
        let mut summary = Self {
            batch_id: Uuid::new_v4(),
            reader_app,
            strategy,
            merged_books: 0,
            ambiguous: 0,
            unmatched: 0,
            failed: 0,
            annotations_added: 0,
            annotations_discarded: 0,
            location_errors: 0,
            books: Vec::new(),
        };

        for report in &books {
            summary.annotations_discarded += report.discarded;
            summary.location_errors += report.location_errors;
            match &report.outcome {
                BookOutcome::Merged { stats, .. } => {
                    summary.merged_books += 1;
                    summary.annotations_added += stats.added;
                    summary.annotations_discarded += stats.discarded;
                }
                BookOutcome::Ambiguous { .. } => summary.ambiguous += 1,
                BookOutcome::Unmatched => summary.unmatched += 1,
                BookOutcome::Failed { .. } => summary.failed += 1,
            }
        }

        summary.books = books;
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults() {
        let request: ImportRequest = serde_json::from_str(r#"{"reader_app": "Kobo"}"#).unwrap();
        assert!(request.books.is_empty());
        assert_eq!(request.strategy, None);
        assert!(!request.confirm_ambiguous);
    }

    #[test]
    fn test_summary_counts() {
        let merged = BookReport {
            discarded: 1,
            location_errors: 2,
            ..BookReport::new(
                "a",
                "A",
                BookOutcome::Merged {
                    library_id: LibraryId::new(1),
                    confidence: Confidence::EXACT,
                    rule: MatchRule::UuidTitleAuthor,
                    stats: MergeStats {
                        added: 3,
                        ..MergeStats::default()
                    },
                },
            )
        };
        let unmatched = BookReport::new("b", "B", BookOutcome::Unmatched);

        let summary =
            ImportSummary::from_reports("Kobo".to_string(), MergeStrategy::HashIdentity, vec![merged, unmatched]);
        assert_eq!(summary.merged_books, 1);
        assert_eq!(summary.unmatched, 1);
        assert_eq!(summary.annotations_added, 3);
        assert_eq!(summary.annotations_discarded, 1);
        assert_eq!(summary.location_errors, 2);

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["books"][1]["outcome"]["status"], "unmatched");
        assert_eq!(json["books"][0]["outcome"]["confidence"], 5);
    }
}
