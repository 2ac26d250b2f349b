use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Result;
use axum::ServiceExt;
use axum::extract::Request;
use prometheus::IntGauge;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::metrics::InFlightRequestsLayer;
use tower_http::metrics::in_flight_requests::InFlightRequestsCounter;
use tower_http::trace::{DefaultOnFailure, TraceLayer};
use tracing::Level;

use crate::endpoints;
use crate::state::ServiceState;
use crate::web::middleware as m;

/// Interval for emitting the in-flight requests gauge metric.
const IN_FLIGHT_INTERVAL: Duration = Duration::from_secs(1);

/// One listener's web application.
///
/// [`App::trigger`] builds the workload trigger API with the full middleware
/// stack; [`App::scrape`] builds the metrics exporter, which is deliberately
/// left out of request metering so scraping does not inflate the registry it
/// reads.
#[derive(Debug)]
pub struct App {
    router: axum::Router,
    in_flight_requests: Option<(InFlightRequestsCounter, IntGauge)>,
    graceful_shutdown: bool,
}

impl App {
    /// Creates the workload trigger application.
    pub fn trigger(state: ServiceState) -> Self {
        let (in_flight_layer, in_flight_requests) = InFlightRequestsLayer::pair();
        let in_flight_gauge = state.metrics.http_in_flight.clone();

        // Build the router middleware into a single service which runs
        // _after_ routing. Layers added first are called first, meaning
        // requests go from top to bottom and responses from bottom to top.
        let middleware = ServiceBuilder::new()
            .layer(axum::middleware::from_fn_with_state(
                state.clone(),
                m::emit_request_metrics,
            ))
            .layer(in_flight_layer)
            .layer(CatchPanicLayer::custom(m::handle_panic))
            .layer(m::set_server_header())
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(m::make_http_span)
                    .on_failure(DefaultOnFailure::new().level(Level::DEBUG)),
            );

        let router = endpoints::trigger_routes()
            .layer(middleware)
            .with_state(state);

        App {
            router,
            in_flight_requests: Some((in_flight_requests, in_flight_gauge)),
            graceful_shutdown: false,
        }
    }

    /// Creates the metrics exporter application.
    pub fn scrape(state: ServiceState) -> Self {
        let middleware = ServiceBuilder::new()
            .layer(CatchPanicLayer::custom(m::handle_panic))
            .layer(m::set_server_header())
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(m::make_http_span)
                    .on_failure(DefaultOnFailure::new().level(Level::DEBUG)),
            );

        let router = endpoints::scrape_routes()
            .layer(middleware)
            .with_state(state);

        App {
            router,
            in_flight_requests: None,
            graceful_shutdown: false,
        }
    }

    /// Enables or disables graceful shutdown for the server.
    ///
    /// By default, graceful shutdown is disabled.
    pub fn graceful_shutdown(mut self, enable: bool) -> Self {
        self.graceful_shutdown = enable;
        self
    }

    /// Runs the web server until graceful shutdown is triggered.
    ///
    /// This function creates a future that runs the server. The future must
    /// be spawned or awaited for the server to continue running.
    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        let Self {
            router,
            in_flight_requests,
            graceful_shutdown,
        } = self;

        let service =
            ServiceExt::<Request>::into_make_service_with_connect_info::<SocketAddr>(router);

        let guard = if graceful_shutdown {
            Some(elegant_departure::get_shutdown_guard())
        } else {
            None
        };

        let server = async {
            if let Some(ref guard) = guard {
                axum::serve(listener, service)
                    .with_graceful_shutdown(guard.wait_owned())
                    .await
            } else {
                axum::serve(listener, service).await
            }
        };

        match in_flight_requests {
            Some((counter, gauge)) => {
                let emitter = counter.run_emitter(IN_FLIGHT_INTERVAL, move |count| {
                    let gauge = gauge.clone();
                    async move { gauge.set(count as i64) }
                });

                let (serve_result, _) = tokio::join!(server, emitter);
                serve_result?;
            }
            None => server.await?,
        }

        Ok(())
    }
}
