//! Confidence matcher
//!
//! Strict decision table, checked top to bottom; the first satisfied rule
//! wins:
//!
//! | rule | condition                                   | confidence |
//! |------|---------------------------------------------|------------|
//! | 1    | book already resolved to a library id       | 5          |
//! | 2    | uuid found, title equal, author listed      | 5          |
//! | 3    | uuid found, title equal                     | 4          |
//! | 4    | uuid found                                  | 3          |
//! | 5    | title found, author listed                  | 2          |
//! | 6    | title found                                 | 1          |
//! | 7    | nothing                                     | 0          |

use crate::annotations::BookRecord;
use crate::error::ReconcileError;
use crate::library::{normalize_title, split_authors, LibraryBookEntry, LibraryFingerprint, LibraryIndex};

use super::types::{FieldMismatch, MatchField, MatchOutcome, MatchRule};

/// Scores imported books against a library index
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfidenceMatcher;

impl ConfidenceMatcher {
    pub fn new() -> Self {
        Self
    }

    /// Match a book against the index
    ///
    /// Pure: the same book and index always produce the same outcome.
    pub fn match_book(&self, book: &BookRecord, index: &LibraryIndex) -> MatchOutcome {
        if let Some(library_id) = book.resolved_library_id {
            if index.get(library_id).is_some() {
                return MatchOutcome::new(library_id, MatchRule::AlreadyResolved);
            }
            tracing::debug!(book_id = %book.book_id, library_id = %library_id, "Resolved id is not in the library");
        }

        let title = normalize_title(&book.title);
        let authors = book.author.as_deref().map(split_authors).unwrap_or_default();
        let author_listed = |entry: &LibraryBookEntry| authors.iter().any(|a| entry.has_author(a));

        if let Some(entry) = book.uuid.as_deref().and_then(|uuid| index.by_uuid(uuid)) {
            let rule = if entry.title_normalized == title {
                if author_listed(entry) {
                    MatchRule::UuidTitleAuthor
                } else {
                    MatchRule::UuidTitle
                }
            } else {
                MatchRule::UuidOnly
            };
            return MatchOutcome::new(entry.library_id, rule);
        }

        if let Some(entry) = index.by_title(&title) {
            let rule = if author_listed(entry) {
                MatchRule::TitleAuthor
            } else {
                MatchRule::TitleOnly
            };
            return MatchOutcome::new(entry.library_id, rule);
        }

        MatchOutcome::no_match()
    }

    /// Match only if `index` was built from the library's current state
    pub fn match_checked(
        &self,
        book: &BookRecord,
        index: &LibraryIndex,
        current: &LibraryFingerprint,
    ) -> std::result::Result<MatchOutcome, ReconcileError> {
        if index.fingerprint() != current {
            return Err(ReconcileError::IndexStale {
                built: index.fingerprint().clone(),
                current: current.clone(),
            });
        }
        Ok(self.match_book(book, index))
    }

    /// Describe which fields differ from the proposed library book
    ///
    /// Used to ask for confirmation of matches below full confidence. Empty
    /// for exact and already-resolved matches.
    pub fn describe_mismatch(
        &self,
        book: &BookRecord,
        outcome: &MatchOutcome,
        index: &LibraryIndex,
    ) -> Vec<FieldMismatch> {
        let fields: &[MatchField] = match outcome.rule {
            MatchRule::AlreadyResolved | MatchRule::UuidTitleAuthor | MatchRule::NewsClippings => &[],
            MatchRule::UuidTitle => &[MatchField::Author],
            MatchRule::UuidOnly => &[MatchField::Title, MatchField::Author],
            MatchRule::TitleAuthor => &[MatchField::Uuid],
            MatchRule::TitleOnly => &[MatchField::Author, MatchField::Uuid],
            MatchRule::NoMatch => &[MatchField::Title, MatchField::Author, MatchField::Uuid],
        };

        let entry = outcome.library_id.and_then(|id| index.get(id));

        fields
            .iter()
            .map(|field| {
                let (library_value, imported_value) = match field {
                    MatchField::Title => (entry.map(|e| e.title.clone()), Some(book.title.clone())),
                    MatchField::Author => (
                        entry.map(|e| e.authors.join(" & ")).filter(|a| !a.is_empty()),
                        book.author.clone(),
                    ),
                    MatchField::Uuid => (entry.map(|e| e.uuid.clone()), book.uuid.clone()),
                };
                FieldMismatch {
                    field: *field,
                    library_value,
                    imported_value,
                }
            })
            .collect()
    }
}
