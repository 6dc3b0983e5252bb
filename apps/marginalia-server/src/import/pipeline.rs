//! Import pipeline
//!
//! For every book of a batch: match it against the library, decide whether
//! it may be merged, normalize its annotations, then merge them into the
//! stored set under the book's lock. A failure in one book or one record
//! never stops the batch.

use futures::stream::{self, StreamExt};
use sqlx::SqlitePool;
use std::sync::Arc;

use crate::annotations::{AnnotationRecord, AnnotationRepository, BookRecord};
use crate::db::{BookLink, BookLinkRepository};
use crate::error::{ReconcileError, Result};
use crate::library::{LibraryId, LibraryIndex, LibraryIndexCache};
use crate::location::chronological;
use crate::matching::{Confidence, ConfidenceMatcher, MatchOutcome, MatchRule};
use crate::merge::{AnnotationMerger, MergeResult, MergeStrategy};
use crate::producers::{BookAnnotations, RawAnnotation};
use crate::render::capture_html;

use super::locks::BookLocks;
use super::types::{BookOutcome, BookReport, ImportRequest, ImportSettings, ImportSummary};

/// Where a matched book's annotations may go
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Decision {
    Merge(LibraryId),
    Ambiguous,
    Unmatched,
}

fn decide(
    outcome: &MatchOutcome,
    threshold: Confidence,
    confirm_ambiguous: bool,
    fallback: Option<LibraryId>,
) -> Decision {
    match outcome.library_id {
        Some(id) if outcome.confidence.meets(threshold) => Decision::Merge(id),
        Some(id) if confirm_ambiguous => Decision::Merge(id),
        Some(_) => Decision::Ambiguous,
        None => match fallback {
            Some(id) if confirm_ambiguous => Decision::Merge(id),
            _ => Decision::Unmatched,
        },
    }
}

/// Incoming annotations ready for merging
#[derive(Debug, Default)]
struct Normalized {
    records: Vec<AnnotationRecord>,
    discarded: usize,
    location_errors: usize,
    issues: Vec<String>,
}

/// Per-request values shared by every book of the batch
struct BatchContext {
    reader_app: String,
    strategy: MergeStrategy,
    confirm_ambiguous: bool,
    fallback_library_id: Option<LibraryId>,
}

/// Runs import batches against the library and the annotation store
pub struct ImportPipeline {
    pool: SqlitePool,
    cache: Arc<LibraryIndexCache>,
    matcher: ConfidenceMatcher,
    merger: AnnotationMerger,
    settings: ImportSettings,
    locks: BookLocks,
}

impl ImportPipeline {
    pub fn new(pool: SqlitePool, cache: Arc<LibraryIndexCache>, settings: ImportSettings) -> Self {
        Self {
            pool,
            cache,
            matcher: ConfidenceMatcher::new(),
            merger: AnnotationMerger::new(),
            settings,
            locks: BookLocks::new(),
        }
    }

    pub fn settings(&self) -> &ImportSettings {
        &self.settings
    }

    pub fn cache(&self) -> &Arc<LibraryIndexCache> {
        &self.cache
    }

    /// Import one batch
    ///
    /// Only a failure to obtain a current library index fails the whole
    /// call; everything else is reported per book.
    pub async fn run(&self, request: ImportRequest) -> Result<ImportSummary> {
        let index = self.cache.fresh().await?;
        let context = BatchContext {
            reader_app: request.reader_app,
            strategy: request.strategy.unwrap_or(self.settings.default_strategy),
            confirm_ambiguous: request.confirm_ambiguous,
            fallback_library_id: request.fallback_library_id,
        };

        tracing::info!(
            "Importing {} books from {} ({} merge)",
            request.books.len(),
            context.reader_app,
            context.strategy
        );

        let reports: Vec<BookReport> = stream::iter(request.books)
            .map(|entry| self.import_book(&index, entry, &context))
            .buffered(self.settings.concurrency.max(1))
            .collect()
            .await;

        let summary = ImportSummary::from_reports(context.reader_app, context.strategy, reports);
        tracing::info!(
            batch_id = %summary.batch_id,
            "Import finished: {} merged, {} ambiguous, {} unmatched, {} failed, {} annotations added",
            summary.merged_books,
            summary.ambiguous,
            summary.unmatched,
            summary.failed,
            summary.annotations_added
        );

        Ok(summary)
    }

    async fn import_book(&self, index: &LibraryIndex, entry: BookAnnotations, context: &BatchContext) -> BookReport {
        let BookAnnotations { mut book, annotations } = entry;
        if book.reader_app.is_empty() {
            book.reader_app = context.reader_app.clone();
        }
        self.resolve_from_link(&mut book, index).await;

        let (outcome, news) = self.match_book(&book, index);
        let decision = decide(
            &outcome,
            self.settings.auto_merge_threshold,
            context.confirm_ambiguous,
            context.fallback_library_id,
        );

        let library_id = match decision {
            Decision::Merge(id) => id,
            Decision::Ambiguous => {
                let err = ReconcileError::AmbiguousMatch {
                    book_id: book.book_id.clone(),
                    confidence: outcome.confidence,
                    proposed: outcome.library_id,
                };
                tracing::info!(book_id = %book.book_id, "{}", err);
                return BookReport::new(
                    &book.book_id,
                    &book.title,
                    BookOutcome::Ambiguous {
                        proposed: outcome.library_id,
                        confidence: outcome.confidence,
                        rule: outcome.rule,
                        mismatches: self.matcher.describe_mismatch(&book, &outcome, index),
                    },
                );
            }
            Decision::Unmatched => {
                tracing::info!(book_id = %book.book_id, "No library match for '{}'", book.title);
                return BookReport::new(&book.book_id, &book.title, BookOutcome::Unmatched);
            }
        };

        let normalized = self.normalize(&book, annotations, news, &context.reader_app);
        let last_annotation = normalized.records.iter().map(|r| r.last_modification).max();

        let mut report = match self.merge_into(library_id, normalized.records, context.strategy).await {
            Ok(result) => {
                tracing::info!(
                    book_id = %book.book_id,
                    library_id = %library_id,
                    "Merged {} new annotations ({} replaced, {} total)",
                    result.stats.added,
                    result.stats.replaced,
                    result.len()
                );
                BookReport::new(
                    &book.book_id,
                    &book.title,
                    BookOutcome::Merged {
                        library_id,
                        confidence: outcome.confidence,
                        rule: outcome.rule,
                        stats: result.stats,
                    },
                )
            }
            Err(e) => {
                tracing::error!(book_id = %book.book_id, "Failed to merge annotations: {}", e);
                BookReport::new(&book.book_id, &book.title, BookOutcome::Failed { error: e.to_string() })
            }
        };
        report.discarded = normalized.discarded;
        report.location_errors = normalized.location_errors;
        report.issues = normalized.issues;

        if matches!(report.outcome, BookOutcome::Merged { .. }) {
            let link = BookLink {
                library_id,
                reader_app: book.reader_app.clone(),
                source_book_id: book.book_id.clone(),
                title: book.title.clone(),
                author: book.author.clone(),
                uuid: book.uuid.clone(),
                confidence: outcome.confidence,
                last_annotation,
            };
            if let Err(e) = BookLinkRepository::new(&self.pool).upsert(&link).await {
                tracing::warn!(book_id = %book.book_id, "Failed to record book link: {}", e);
            }
        }

        report
    }

    /// Reuse the library id an earlier import linked this book to
    async fn resolve_from_link(&self, book: &mut BookRecord, index: &LibraryIndex) {
        if book.resolved_library_id.is_some() {
            return;
        }
        match BookLinkRepository::new(&self.pool).get(&book.reader_app, &book.book_id).await {
            Ok(Some(link)) if index.get(link.library_id).is_some() => {
                tracing::debug!(book_id = %book.book_id, library_id = %link.library_id, "Using stored book link");
                book.resolved_library_id = Some(link.library_id);
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(book_id = %book.book_id, "Failed to read book link: {}", e),
        }
    }

    /// Match a book, routing news to the clippings book when configured
    fn match_book(&self, book: &BookRecord, index: &LibraryIndex) -> (MatchOutcome, bool) {
        if book.is_news() {
            if let Some(destination) = &self.settings.news_clippings_destination {
                match index.find_title(destination) {
                    Some(entry) => return (MatchOutcome::new(entry.library_id, MatchRule::NewsClippings), true),
                    None => tracing::warn!("News clippings book '{}' is not in the library", destination),
                }
            }
        }
        (self.matcher.match_book(book, index), false)
    }

    fn normalize(
        &self,
        book: &BookRecord,
        annotations: Vec<RawAnnotation>,
        news: bool,
        reader_app: &str,
    ) -> Normalized {
        let mut normalized = Normalized::default();

        for RawAnnotation { mut record, descriptor } in annotations {
            if !record.has_content() {
                let err = ReconcileError::MalformedAnnotation {
                    book_id: book.book_id.clone(),
                    reason: "no highlight or note text".to_string(),
                };
                tracing::debug!("{}", err);
                normalized.discarded += 1;
                normalized.issues.push(err.to_string());
                continue;
            }

            record.reader_app.get_or_insert_with(|| reader_app.to_string());
            if record.genre.is_none() {
                record.genre = book.genre.clone();
            }

            let key = if news {
                chronological(record.last_modification)
                    .map_err(|reason| format!("annotation in '{}': {}", book.book_id, reason))
            } else if !record.location_sort.is_empty() {
                Ok(record.location_sort.clone())
            } else if let Some(descriptor) = &descriptor {
                self.settings
                    .generator
                    .derive(descriptor, record.last_modification)
                    .map_err(|e| ReconcileError::from(e).to_string())
            } else {
                chronological(record.last_modification)
                    .map_err(|reason| format!("annotation in '{}': {}", book.book_id, reason))
            };

            match key {
                Ok(key) => record.location_sort = key,
                Err(reason) => {
                    tracing::warn!(book_id = %book.book_id, "Skipping annotation: {}", reason);
                    normalized.location_errors += 1;
                    normalized.issues.push(reason);
                    continue;
                }
            }

            record.ensure_hash();
            normalized.records.push(record);
        }

        normalized
    }

    /// Load, merge and persist one book's set under its lock
    pub async fn merge_into(
        &self,
        library_id: LibraryId,
        incoming: Vec<AnnotationRecord>,
        strategy: MergeStrategy,
    ) -> Result<MergeResult> {
        let lock = self.locks.lock_for(library_id);
        let _guard = lock.lock().await;

        let repo = AnnotationRepository::new(&self.pool);
        let stored = repo.load_for_book(library_id).await?;
        let result = self.merger.merge(stored, incoming, strategy);

        if !result.stats.is_noop() {
            repo.replace_for_book(library_id, &result.annotations).await?;
        }

        Ok(result)
    }

    /// Merge previously rendered markup into a book's stored set
    pub async fn capture(&self, library_id: LibraryId, html: &str) -> Result<MergeResult> {
        let records = capture_html(html, &library_id.to_string())?;
        self.merge_into(library_id, records, MergeStrategy::HashIdentity).await
    }

    /// Drop a book's stored set, returning how many records were removed
    pub async fn clear(&self, library_id: LibraryId) -> Result<u64> {
        let lock = self.locks.lock_for(library_id);
        let _guard = lock.lock().await;

        let deleted = AnnotationRepository::new(&self.pool).delete_for_book(library_id).await?;
        tracing::info!(library_id = %library_id, "Cleared {} stored annotations", deleted);
        Ok(deleted)
    }
}
