//! Error types for the Marginalia server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::library::{LibraryFingerprint, LibraryId};
use crate::location::LocationParseError;
use crate::matching::Confidence;
use crate::producers::ProducerError;
use crate::render::CaptureError;

/// Application-wide result type
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Storage error: {0:#}")]
    Storage(#[from] anyhow::Error),

    #[error("XML deserialization error: {0}")]
    XmlDeserialize(#[from] quick_xml::de::DeError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    #[error(transparent)]
    Producer(#[from] ProducerError),

    #[error(transparent)]
    Capture(#[from] CaptureError),
}

impl From<LocationParseError> for AppError {
    fn from(e: LocationParseError) -> Self {
        AppError::Reconcile(ReconcileError::LocationParse(e))
    }
}

/// Per-record reconciliation failures
///
/// None of these abort a batch; the import pipeline counts them and moves on.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReconcileError {
    #[error(transparent)]
    LocationParse(#[from] LocationParseError),

    #[error("Ambiguous match for '{book_id}': confidence {confidence}, proposed {proposed:?}")]
    AmbiguousMatch {
        book_id: String,
        confidence: Confidence,
        proposed: Option<LibraryId>,
    },

    #[error("Malformed annotation in '{book_id}': {reason}")]
    MalformedAnnotation { book_id: String, reason: String },

    #[error("Library index is stale: built from {built}, library is at {current}")]
    IndexStale {
        built: LibraryFingerprint,
        current: LibraryFingerprint,
    },
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone()),
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "database_error",
                    "Database error".to_string(),
                )
            }
            AppError::Storage(e) => {
                tracing::error!("Storage error: {:#}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "storage_error",
                    "Stored annotations could not be read or written".to_string(),
                )
            }
            AppError::XmlDeserialize(e) => {
                tracing::error!("XML deserialize error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "parse_error",
                    "Failed to deserialize XML".to_string(),
                )
            }
            AppError::Json(e) => (StatusCode::BAD_REQUEST, "invalid_json", e.to_string()),
            AppError::Io(e) => {
                tracing::error!("IO error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "io_error",
                    "IO error".to_string(),
                )
            }
            AppError::Reconcile(e) => match e {
                ReconcileError::IndexStale { .. } => {
                    (StatusCode::CONFLICT, "index_stale", e.to_string())
                }
                ReconcileError::AmbiguousMatch { .. } => {
                    (StatusCode::CONFLICT, "ambiguous_match", e.to_string())
                }
                ReconcileError::LocationParse(_) | ReconcileError::MalformedAnnotation { .. } => {
                    (StatusCode::UNPROCESSABLE_ENTITY, "invalid_annotation", e.to_string())
                }
            },
            AppError::Producer(e) => match e {
                ProducerError::UnknownProducer(_) => (StatusCode::NOT_FOUND, "unknown_producer", e.to_string()),
                _ => (StatusCode::BAD_REQUEST, "producer_error", e.to_string()),
            },
            AppError::Capture(e) => (StatusCode::BAD_REQUEST, "capture_error", e.to_string()),
        };

        let body = Json(ErrorResponse {
            error: error_type.to_string(),
            message,
            details: if cfg!(debug_assertions) {
                Some(self.to_string())
            } else {
                None
            },
        });

        (status, body).into_response()
    }
}
