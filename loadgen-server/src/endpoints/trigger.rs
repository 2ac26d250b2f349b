//! The workload trigger endpoints.
//!
//! Each route accepts only `POST`; axum answers any other method on these
//! paths with `405 Method Not Allowed` and an empty body. Request bodies are
//! optional JSON, with missing or malformed fields falling back to defaults.

use axum::body::Bytes;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::{Router, routing};

use crate::error::ApiResult;
use crate::state::ServiceState;
use crate::workload::{self, TriggerParams, WorkloadKind};

pub fn router() -> Router<ServiceState> {
    Router::new()
        .route("/cpu", routing::post(trigger_cpu))
        .route("/io", routing::post(trigger_io))
        .route("/cpui", routing::post(trigger_cpu_io))
}

async fn trigger_cpu(State(state): State<ServiceState>, body: Bytes) -> ApiResult<Response> {
    run_workload(state, WorkloadKind::Cpu, body).await
}

async fn trigger_io(State(state): State<ServiceState>, body: Bytes) -> ApiResult<Response> {
    run_workload(state, WorkloadKind::Io, body).await
}

async fn trigger_cpu_io(State(state): State<ServiceState>, body: Bytes) -> ApiResult<Response> {
    run_workload(state, WorkloadKind::CpuIo, body).await
}

/// Decodes the parameters and runs the workload to completion.
///
/// The batches are CPU-heavy and sleep with blocking primitives, so they run
/// on the blocking thread pool. The handler does not respond until all units
/// have completed; there is no cancellation of accepted workloads.
async fn run_workload(
    state: ServiceState,
    kind: WorkloadKind,
    body: Bytes,
) -> ApiResult<Response> {
    let params = TriggerParams::from_json(&body);
    tracing::debug!(%kind, ?params, "triggering workload");

    let message =
        tokio::task::spawn_blocking(move || workload::dispatch(&state.metrics, kind, params))
            .await?;

    Ok(message.into_response())
}
