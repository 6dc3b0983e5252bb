//! Per-book annotation endpoints

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse},
    routing::{get, post},
    Json, Router,
};

use crate::annotations::{AnnotationRecord, AnnotationRepository};
use crate::db::{BookLink, BookLinkRepository};
use crate::error::Result;
use crate::library::LibraryId;
use crate::merge::MergeStats;
use crate::render::{render_html, render_text};
use crate::state::AppState;

/// Create the books router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/:library_id/annotations", get(list_annotations).delete(delete_annotations))
        .route("/:library_id/annotations/html", get(annotations_html))
        .route("/:library_id/annotations/text", get(annotations_text))
        .route("/:library_id/capture", post(capture_markup))
        .route("/:library_id/links", get(list_links))
}

async fn load(state: &AppState, library_id: i64) -> Result<Vec<AnnotationRecord>> {
    let records = AnnotationRepository::new(state.db())
        .load_for_book(LibraryId::new(library_id))
        .await?;
    Ok(records)
}

/// Stored annotations of a book
async fn list_annotations(
    State(state): State<AppState>,
    Path(library_id): Path<i64>,
) -> Result<Json<Vec<AnnotationRecord>>> {
    Ok(Json(load(&state, library_id).await?))
}

/// Stored annotations rendered as HTML
async fn annotations_html(State(state): State<AppState>, Path(library_id): Path<i64>) -> Result<Html<String>> {
    let records = load(&state, library_id).await?;
    Ok(Html(render_html(&records, state.render_options())))
}

/// Stored annotations as plain text
async fn annotations_text(State(state): State<AppState>, Path(library_id): Path<i64>) -> Result<impl IntoResponse> {
    let records = load(&state, library_id).await?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        render_text(&records, state.render_options()),
    ))
}

/// Remove every stored annotation of a book
async fn delete_annotations(State(state): State<AppState>, Path(library_id): Path<i64>) -> Result<StatusCode> {
    state.pipeline().clear(LibraryId::new(library_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Merge previously rendered markup into the stored set
async fn capture_markup(
    State(state): State<AppState>,
    Path(library_id): Path<i64>,
    body: String,
) -> Result<Json<MergeStats>> {
    let result = state.pipeline().capture(LibraryId::new(library_id), &body).await?;
    Ok(Json(result.stats))
}

/// Producer books linked to a library book
async fn list_links(State(state): State<AppState>, Path(library_id): Path<i64>) -> Result<Json<Vec<BookLink>>> {
    let links = BookLinkRepository::new(state.db())
        .list_for_library(LibraryId::new(library_id))
        .await?;
    Ok(Json(links))
}
