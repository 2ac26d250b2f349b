//! The metrics scrape endpoint.

use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::{Router, routing};

use crate::error::ApiResult;
use crate::state::ServiceState;

pub fn router() -> Router<ServiceState> {
    Router::new().route("/metrics", routing::get(metrics))
}

/// Renders the registry in Prometheus text exposition format.
async fn metrics(State(state): State<ServiceState>) -> ApiResult<Response> {
    let body = state.metrics.render()?;
    Ok(([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], body).into_response())
}
