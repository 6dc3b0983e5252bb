//! Database module for SQLite persistence
//!
//! Holds reconciled annotation sets and the links between producer books and
//! library books.

mod links;

pub use links::{BookLink, BookLinkRepository};

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

use crate::annotations::AnnotationRepository;
use crate::error::Result;

/// Create a new database connection pool and make sure all tables exist
pub async fn create_pool(database_url: &str) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    initialize_schema(&pool).await?;

    Ok(pool)
}

/// Create every table used by the server
pub async fn initialize_schema(pool: &SqlitePool) -> Result<()> {
    AnnotationRepository::new(pool).init().await?;
    BookLinkRepository::new(pool).init().await?;
    Ok(())
}
