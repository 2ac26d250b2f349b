//! Contains all HTTP endpoint handlers.
//!
//! The trigger API and the metrics exporter are served by two independent
//! listeners; use [`trigger_routes`] and [`scrape_routes`] to create their
//! respective routers.

use axum::Router;

use crate::state::ServiceState;

pub mod health;
mod scrape;
mod trigger;

/// Routes of the workload trigger API (port A).
pub fn trigger_routes() -> Router<ServiceState> {
    Router::new()
        .merge(health::router())
        .merge(trigger::router())
}

/// Routes of the metrics exporter (port B).
pub fn scrape_routes() -> Router<ServiceState> {
    scrape::router()
}
