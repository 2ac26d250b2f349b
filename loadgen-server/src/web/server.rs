use std::net::SocketAddr;

use anyhow::{Context, Result};
use tokio::net::{TcpListener, TcpSocket};
use tokio::signal::unix::SignalKind;

use crate::config::Config;
use crate::state::State;
use crate::web::app::App;

/// The maximum backlog for TCP listen sockets before refusing connections.
const TCP_LISTEN_BACKLOG: u32 = 1024;

/// Runs the load generator HTTP servers.
///
/// This binds the trigger API and the metrics exporter to their configured
/// addresses and runs both until termination is requested. Failure to bind
/// either listener aborts startup.
pub async fn server(config: Config) -> Result<()> {
    tracing::info!("Starting server");

    let trigger_listener =
        listen(config.http_addr).context("failed to start trigger API listener")?;
    let scrape_listener =
        listen(config.metrics_addr).context("failed to start metrics listener")?;
    tracing::info!("Workload API listening on {}", config.http_addr);
    tracing::info!("Metrics exposed on {}/metrics", config.metrics_addr);

    let state = State::new(config).await?;

    let trigger_handle = tokio::spawn(
        App::trigger(state.clone())
            .graceful_shutdown(true)
            .serve(trigger_listener),
    );
    let scrape_handle = tokio::spawn(
        App::scrape(state)
            .graceful_shutdown(true)
            .serve(scrape_listener),
    );

    tokio::spawn(async move {
        elegant_departure::get_shutdown_guard().wait().await;
        tracing::info!("Shutting down ...");
    });

    elegant_departure::tokio::depart()
        .on_termination()
        .on_sigint()
        .on_signal(SignalKind::hangup())
        .on_signal(SignalKind::quit())
        .await;

    let (trigger_result, scrape_result) = tokio::join!(trigger_handle, scrape_handle);
    trigger_result??;
    scrape_result??;

    tracing::info!("Shutdown complete");
    Ok(())
}

fn listen(addr: SocketAddr) -> Result<TcpListener> {
    let socket = match addr {
        SocketAddr::V4(_) => TcpSocket::new_v4(),
        SocketAddr::V6(_) => TcpSocket::new_v6(),
    }?;

    #[cfg(all(unix, not(target_os = "solaris"), not(target_os = "illumos")))]
    socket.set_reuseport(true)?;
    socket.bind(addr)?;

    let listener = socket.listen(TCP_LISTEN_BACKLOG)?;

    Ok(listener)
}
