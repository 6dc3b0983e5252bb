//! Library index endpoints

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::annotations::BookRecord;
use crate::error::{AppError, Result};
use crate::library::{LibraryFingerprint, LibraryIndex};
use crate::matching::{ConfidenceMatcher, FieldMismatch, MatchOutcome};
use crate::state::AppState;

/// Create the library router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/refresh", post(refresh_index))
        .route("/match", get(match_book))
}

#[derive(Debug, Serialize)]
pub struct IndexStatus {
    pub books: usize,
    pub skipped: usize,
    pub fingerprint: LibraryFingerprint,
    pub generation: u64,
}

impl IndexStatus {
    fn new(index: &LibraryIndex, generation: u64) -> Self {
        Self {
            books: index.len(),
            skipped: index.skipped(),
            fingerprint: index.fingerprint().clone(),
            generation,
        }
    }
}

/// Rebuild the library index
async fn refresh_index(State(state): State<AppState>) -> Result<Json<IndexStatus>> {
    let cache = state.library();
    let index = cache.refresh().await?;
    Ok(Json(IndexStatus::new(&index, cache.generation())))
}

#[derive(Debug, Deserialize)]
pub struct MatchParams {
    title: String,
    author: Option<String>,
    uuid: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MatchResponse {
    #[serde(flatten)]
    pub outcome: MatchOutcome,
    pub mismatches: Vec<FieldMismatch>,
}

/// Match a book description against the current library
async fn match_book(State(state): State<AppState>, Query(params): Query<MatchParams>) -> Result<Json<MatchResponse>> {
    if params.title.trim().is_empty() {
        return Err(AppError::BadRequest("title must not be empty".to_string()));
    }

    let index = state.library().fresh().await?;
    let mut book = BookRecord::new("query", params.title, "query");
    book.author = params.author;
    book.uuid = params.uuid;

    let matcher = ConfidenceMatcher::new();
    let outcome = matcher.match_book(&book, &index);
    let mismatches = matcher.describe_mismatch(&book, &outcome, &index);

    Ok(Json(MatchResponse { outcome, mismatches }))
}
