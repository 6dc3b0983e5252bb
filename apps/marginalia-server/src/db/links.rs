//! Links between producer books and library books

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::annotations::Timestamp;
use crate::error::Result;
use crate::library::LibraryId;
use crate::matching::Confidence;

/// Which library book a producer's book was merged into
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookLink {
    pub library_id: LibraryId,
    pub reader_app: String,
    pub source_book_id: String,
    pub title: String,
    pub author: Option<String>,
    pub uuid: Option<String>,
    pub confidence: Confidence,
    /// Newest annotation timestamp seen for the book
    pub last_annotation: Option<Timestamp>,
}

/// Book link repository
pub struct BookLinkRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> BookLinkRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Initialize the books table
    pub async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS books (
                reader_app TEXT NOT NULL,
                source_book_id TEXT NOT NULL,
                library_id INTEGER NOT NULL,
                title TEXT NOT NULL,
                author TEXT,
                uuid TEXT,
                confidence INTEGER NOT NULL,
                last_annotation REAL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (reader_app, source_book_id)
            );

            CREATE INDEX IF NOT EXISTS idx_books_library ON books(library_id);
            "#,
        )
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Look up the link for a producer book
    pub async fn get(&self, reader_app: &str, source_book_id: &str) -> Result<Option<BookLink>> {
        let row = sqlx::query_as::<_, BookLinkRow>(
            r#"
            SELECT library_id, reader_app, source_book_id, title, author, uuid,
                   confidence, last_annotation
            FROM books
            WHERE reader_app = ? AND source_book_id = ?
            "#,
        )
        .bind(reader_app)
        .bind(source_book_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(BookLinkRow::into_link))
    }

    /// All producer books linked to a library book
    pub async fn list_for_library(&self, library_id: LibraryId) -> Result<Vec<BookLink>> {
        let rows = sqlx::query_as::<_, BookLinkRow>(
            r#"
            SELECT library_id, reader_app, source_book_id, title, author, uuid,
                   confidence, last_annotation
            FROM books
            WHERE library_id = ?
            ORDER BY reader_app, source_book_id
            "#,
        )
        .bind(library_id.get())
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(BookLinkRow::into_link).collect())
    }

    /// Create or update a link
    ///
    /// `last_annotation` only moves forward.
    pub async fn upsert(&self, link: &BookLink) -> Result<()> {
        let now = chrono::Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO books (reader_app, source_book_id, library_id, title, author, uuid,
                               confidence, last_annotation, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(reader_app, source_book_id) DO UPDATE SET
                library_id = excluded.library_id,
                title = excluded.title,
                author = excluded.author,
                uuid = excluded.uuid,
                confidence = excluded.confidence,
                last_annotation = MAX(COALESCE(books.last_annotation, excluded.last_annotation),
                                      COALESCE(excluded.last_annotation, books.last_annotation)),
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&link.reader_app)
        .bind(&link.source_book_id)
        .bind(link.library_id.get())
        .bind(&link.title)
        .bind(&link.author)
        .bind(&link.uuid)
        .bind(i64::from(link.confidence.value()))
        .bind(link.last_annotation.map(Timestamp::as_secs))
        .bind(&now)
        .execute(self.pool)
        .await?;

        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct BookLinkRow {
    library_id: i64,
    reader_app: String,
    source_book_id: String,
    title: String,
    author: Option<String>,
    uuid: Option<String>,
    confidence: i64,
    last_annotation: Option<f64>,
}

impl BookLinkRow {
    fn into_link(self) -> BookLink {
        BookLink {
            library_id: LibraryId::new(self.library_id),
            reader_app: self.reader_app,
            source_book_id: self.source_book_id,
            title: self.title,
            author: self.author,
            uuid: self.uuid,
            confidence: u8::try_from(self.confidence)
                .ok()
                .and_then(Confidence::new)
                .unwrap_or(Confidence::NONE),
            last_annotation: self.last_annotation.map(Timestamp::from_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        BookLinkRepository::new(&pool).init().await.unwrap();
        pool
    }

    fn link(last: Option<f64>) -> BookLink {
        BookLink {
            library_id: LibraryId::new(7),
            reader_app: "Kindle".to_string(),
            source_book_id: "Dune (Frank Herbert)".to_string(),
            title: "Dune".to_string(),
            author: Some("Frank Herbert".to_string()),
            uuid: None,
            confidence: Confidence::new(2).unwrap(),
            last_annotation: last.map(Timestamp::from_secs),
        }
    }

    #[tokio::test]
    async fn test_upsert_and_get() {
        let pool = pool().await;
        let repo = BookLinkRepository::new(&pool);

        assert!(repo.get("Kindle", "Dune (Frank Herbert)").await.unwrap().is_none());

        repo.upsert(&link(Some(200.0))).await.unwrap();
        repo.upsert(&link(Some(100.0))).await.unwrap();

        let stored = repo.get("Kindle", "Dune (Frank Herbert)").await.unwrap().unwrap();
        assert_eq!(stored.library_id, LibraryId::new(7));
        assert_eq!(stored.last_annotation, Some(Timestamp::from_secs(200.0)));

        let listed = repo.list_for_library(LibraryId::new(7)).await.unwrap();
        assert_eq!(listed.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_last_annotation_keeps_previous() {
        let pool = pool().await;
        let repo = BookLinkRepository::new(&pool);

        repo.upsert(&link(Some(50.0))).await.unwrap();
        repo.upsert(&link(None)).await.unwrap();

        let stored = repo.get("Kindle", "Dune (Frank Herbert)").await.unwrap().unwrap();
        assert_eq!(stored.last_annotation, Some(Timestamp::from_secs(50.0)));
    }
}
