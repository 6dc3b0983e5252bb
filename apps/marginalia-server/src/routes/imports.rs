//! Import endpoints

use axum::{
    extract::{Path, Query, State},
    routing::post,
    Json, Router,
};
use serde::Deserialize;

use crate::error::Result;
use crate::import::{ImportRequest, ImportSummary};
use crate::library::LibraryId;
use crate::merge::MergeStrategy;
use crate::state::AppState;

/// Create the imports router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(import_records))
        .route("/:producer", post(import_payload))
}

/// Import canonical records
async fn import_records(
    State(state): State<AppState>,
    Json(request): Json<ImportRequest>,
) -> Result<Json<ImportSummary>> {
    let summary = state.pipeline().run(request).await?;
    Ok(Json(summary))
}

/// Options for a raw producer payload
#[derive(Debug, Default, Deserialize)]
pub struct PayloadParams {
    strategy: Option<MergeStrategy>,
    fallback_library_id: Option<i64>,
    #[serde(default)]
    confirm_ambiguous: bool,
}

/// Import a raw producer payload (a clippings file, a JSON export, ...)
async fn import_payload(
    State(state): State<AppState>,
    Path(producer): Path<String>,
    Query(params): Query<PayloadParams>,
    body: String,
) -> Result<Json<ImportSummary>> {
    let producer = state.producers().open(&producer, &body)?;
    let books = producer.active_annotations().await?;

    let mut request = ImportRequest::new(producer.reader_app(), books);
    request.strategy = params.strategy.or_else(|| producer.merge_strategy());
    request.fallback_library_id = params.fallback_library_id.map(LibraryId::new);
    request.confirm_ambiguous = params.confirm_ambiguous;

    let summary = state.pipeline().run(request).await?;
    Ok(Json(summary))
}
