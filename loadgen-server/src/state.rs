use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;

use crate::config::Config;
use crate::metrics::Metrics;

/// Shared reference to the server [state](State).
pub type ServiceState = Arc<State>;

/// State shared with all HTTP request handlers.
///
/// This structure is created during server startup. In request handlers, use
/// `axum::extract::State<ServiceState>` to retrieve a shared reference to
/// this structure.
#[derive(Debug)]
pub struct State {
    /// The server configuration.
    pub config: Config,
    /// The process-wide metric registry.
    pub metrics: Metrics,
}

impl State {
    /// Creates the shared state and spawns its background tasks.
    pub async fn new(config: Config) -> anyhow::Result<ServiceState> {
        let state = Arc::new(Self {
            metrics: Metrics::new()?,
            config,
        });

        tokio::spawn(track_runtime_metrics(
            state.clone(),
            state.config.runtime.metrics_interval,
        ));

        Ok(state)
    }
}

/// Periodically samples tokio runtime metrics into the registry.
async fn track_runtime_metrics(state: ServiceState, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    let runtime = Handle::current().metrics();

    loop {
        ticker.tick().await;
        tracing::trace!("Capturing runtime metrics");

        let metrics = &state.metrics;
        metrics.runtime_workers.set(runtime.num_workers() as i64);
        metrics
            .runtime_alive_tasks
            .set(runtime.num_alive_tasks() as i64);
        metrics
            .runtime_queue_depth
            .set(runtime.global_queue_depth() as i64);
    }
}
