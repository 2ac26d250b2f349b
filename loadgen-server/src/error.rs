//! Error types for the HTTP API layer.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Error type for API operations.
///
/// The workload functions themselves are infallible; the only failure paths
/// are infrastructure-level and map to a `500`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The blocking task running a workload batch failed to join.
    #[error("workload task failed: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),

    /// The registry could not be rendered for scraping.
    #[error("metrics encoding failed: {0}")]
    Encoding(#[from] prometheus::Error),
}

/// Result type for API operations.
pub type ApiResult<T> = Result<T, ApiError>;

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::error!(
            error = &self as &dyn std::error::Error,
            "error handling request"
        );
        StatusCode::INTERNAL_SERVER_ERROR.into_response()
    }
}
