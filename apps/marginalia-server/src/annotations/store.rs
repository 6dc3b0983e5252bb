//! SQLite storage for reconciled annotations
//!
//! Each library book owns an ordered annotation set. The set is always
//! written as a whole (the output of a merge), so a reader never sees a
//! half-merged book.

use anyhow::{Context, Result};
use sqlx::SqlitePool;

use super::types::{AnnotationRecord, HighlightColor, Timestamp};
use crate::library::LibraryId;

/// Repository for per-book annotation sets
pub struct AnnotationRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> AnnotationRepository<'a> {
    /// Create a new repository
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Initialize the annotations table
    pub async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS annotations (
                library_id INTEGER NOT NULL,
                position INTEGER NOT NULL,
                annotation_id TEXT,
                source_book_id TEXT NOT NULL,
                reader_app TEXT,
                genre TEXT,
                highlight_color TEXT NOT NULL,
                highlight_text_json TEXT,
                note_text_json TEXT,
                location TEXT,
                location_sort TEXT NOT NULL,
                last_modification REAL NOT NULL,
                content_hash TEXT NOT NULL,
                PRIMARY KEY (library_id, position)
            );

            CREATE INDEX IF NOT EXISTS idx_annotations_hash ON annotations(library_id, content_hash);
            CREATE INDEX IF NOT EXISTS idx_annotations_reader ON annotations(reader_app);
            "#,
        )
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Load the stored set for a book, in stored order
    ///
    /// A row that cannot be turned back into an [`AnnotationRecord`] fails the
    /// whole load; a partially readable set must never reach the merger.
    pub async fn load_for_book(&self, library_id: LibraryId) -> Result<Vec<AnnotationRecord>> {
        let rows = sqlx::query_as::<_, AnnotationRow>(
            r#"
            SELECT position, annotation_id, source_book_id, reader_app, genre,
                   highlight_color, highlight_text_json, note_text_json,
                   location, location_sort, last_modification, content_hash
            FROM annotations
            WHERE library_id = ?
            ORDER BY position ASC
            "#,
        )
        .bind(library_id.get())
        .fetch_all(self.pool)
        .await?;

        rows.into_iter()
            .map(|r| {
                let position = r.position;
                r.into_record()
                    .with_context(|| format!("corrupted annotation row {} for book {}", position, library_id))
            })
            .collect()
    }

    /// Replace the stored set for a book in a single transaction
    pub async fn replace_for_book(&self, library_id: LibraryId, records: &[AnnotationRecord]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM annotations WHERE library_id = ?")
            .bind(library_id.get())
            .execute(&mut *tx)
            .await?;

        for (position, record) in records.iter().enumerate() {
            let highlight_text_json = record
                .highlight_text
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?;
            let note_text_json = record.note_text.as_ref().map(serde_json::to_string).transpose()?;
            let content_hash = record
                .content_hash
                .clone()
                .unwrap_or_else(|| record.compute_hash());

            sqlx::query(
                r#"
                INSERT INTO annotations (
                    library_id, position, annotation_id, source_book_id, reader_app, genre,
                    highlight_color, highlight_text_json, note_text_json,
                    location, location_sort, last_modification, content_hash
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(library_id.get())
            .bind(position as i64)
            .bind(&record.annotation_id)
            .bind(&record.book_id)
            .bind(&record.reader_app)
            .bind(&record.genre)
            .bind(record.highlight_color.as_str())
            .bind(&highlight_text_json)
            .bind(&note_text_json)
            .bind(&record.location)
            .bind(&record.location_sort)
            .bind(record.last_modification.as_secs())
            .bind(&content_hash)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        tracing::debug!(library_id = %library_id, count = records.len(), "Stored annotation set");
        Ok(())
    }

    /// Delete all annotations for a book
    pub async fn delete_for_book(&self, library_id: LibraryId) -> Result<u64> {
        let result = sqlx::query("DELETE FROM annotations WHERE library_id = ?")
            .bind(library_id.get())
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// Count annotations for a book
    pub async fn count_for_book(&self, library_id: LibraryId) -> Result<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM annotations WHERE library_id = ?")
            .bind(library_id.get())
            .fetch_one(self.pool)
            .await?;

        Ok(row.0)
    }
}

/// Internal row type for SQLite queries
#[derive(sqlx::FromRow)]
struct AnnotationRow {
    position: i64,
    annotation_id: Option<String>,
    source_book_id: String,
    reader_app: Option<String>,
    genre: Option<String>,
    highlight_color: String,
    highlight_text_json: Option<String>,
    note_text_json: Option<String>,
    location: Option<String>,
    location_sort: String,
    last_modification: f64,
    content_hash: String,
}

impl AnnotationRow {
    fn into_record(self) -> Result<AnnotationRecord> {
        let highlight_text: Option<Vec<String>> = self
            .highlight_text_json
            .as_deref()
            .map(serde_json::from_str)
            .transpose()?;
        let note_text: Option<Vec<String>> = self
            .note_text_json
            .as_deref()
            .map(serde_json::from_str)
            .transpose()?;

        if self.content_hash.is_empty() {
            anyhow::bail!("missing content hash");
        }

        Ok(AnnotationRecord {
            annotation_id: self.annotation_id,
            book_id: self.source_book_id,
            highlight_color: HighlightColor::parse(&self.highlight_color),
            highlight_text,
            note_text,
            location: self.location,
            location_sort: self.location_sort,
            last_modification: Timestamp::from_secs(self.last_modification),
            content_hash: Some(self.content_hash),
            genre: self.genre,
            reader_app: self.reader_app,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup_test_db() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let repo = AnnotationRepository::new(&pool);
        repo.init().await.unwrap();
        pool
    }

    fn record(text: &str, sort: &str) -> AnnotationRecord {
        let mut record = AnnotationRecord::new("src-1", Timestamp::from_secs(1_700_000_000.25))
            .with_highlight([text])
            .with_location("Page 1", sort)
            .with_color(HighlightColor::Yellow);
        record.reader_app = Some("Kindle".to_string());
        record.ensure_hash();
        record
    }

    #[tokio::test]
    async fn test_replace_and_load() {
        let pool = setup_test_db().await;
        let repo = AnnotationRepository::new(&pool);
        let book = LibraryId::new(42);

        let records = vec![record("first", "000001"), record("second", "000002")];
        repo.replace_for_book(book, &records).await.unwrap();

        let loaded = repo.load_for_book(book).await.unwrap();
        assert_eq!(loaded, records);
        assert_eq!(repo.count_for_book(book).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_replace_overwrites_previous_set() {
        let pool = setup_test_db().await;
        let repo = AnnotationRepository::new(&pool);
        let book = LibraryId::new(7);

        repo.replace_for_book(book, &[record("a", "1"), record("b", "2")])
            .await
            .unwrap();
        repo.replace_for_book(book, &[record("c", "3")]).await.unwrap();

        let loaded = repo.load_for_book(book).await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].highlight_text, Some(vec!["c".to_string()]));
    }

    #[tokio::test]
    async fn test_books_are_isolated() {
        let pool = setup_test_db().await;
        let repo = AnnotationRepository::new(&pool);

        repo.replace_for_book(LibraryId::new(1), &[record("a", "1")])
            .await
            .unwrap();
        repo.replace_for_book(LibraryId::new(2), &[record("b", "1")])
            .await
            .unwrap();

        assert_eq!(repo.delete_for_book(LibraryId::new(1)).await.unwrap(), 1);
        assert_eq!(repo.count_for_book(LibraryId::new(1)).await.unwrap(), 0);
        assert_eq!(repo.count_for_book(LibraryId::new(2)).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_corrupted_row_is_an_error() {
        let pool = setup_test_db().await;
        let repo = AnnotationRepository::new(&pool);

        sqlx::query(
            r#"
            INSERT INTO annotations (
                library_id, position, source_book_id, highlight_color,
                highlight_text_json, location_sort, last_modification, content_hash
            ) VALUES (9, 0, 'x', 'Gray', 'not json', '1', 0.0, 'abc')
            "#,
        )
        .execute(&pool)
        .await
        .unwrap();

        assert!(repo.load_for_book(LibraryId::new(9)).await.is_err());
    }
}
