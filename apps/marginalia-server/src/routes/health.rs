//! Health check endpoints

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub service: &'static str,
    /// Books in the current library index
    pub library_books: usize,
    /// Completed index builds since start-up
    pub index_generation: u64,
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let library = state.library();
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        service: "marginalia-server",
        library_books: library.current().len(),
        index_generation: library.generation(),
    })
}

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(health_check))
}
