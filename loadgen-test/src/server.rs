//! Exposes an in-process test server for use in integration tests.
//!
//! ```
//! use loadgen_test::server::TestServer;
//!
//! #[tokio::main]
//! async fn main() {
//!    let server = TestServer::new().await;
//!    let url = server.trigger_url("/health");
//!    // use the URL in tests...
//! }
//! ```

use std::net::{SocketAddr, TcpListener};

use loadgen_server::config::Config;
use loadgen_server::state::State;
use loadgen_server::web::App;

/// An in-process test server for use in integration tests.
///
/// This runs the full server with a fresh metric registry, listening on
/// random available ports on localhost for both the trigger API and the
/// metrics exporter.
#[derive(Debug)]
pub struct TestServer {
    trigger_handle: tokio::task::JoinHandle<()>,
    scrape_handle: tokio::task::JoinHandle<()>,
    trigger_socket: SocketAddr,
    scrape_socket: SocketAddr,
}

impl TestServer {
    /// Starts a new test server on ephemeral ports.
    pub async fn new() -> Self {
        let (trigger_listener, trigger_socket) = bind_ephemeral();
        let (scrape_listener, scrape_socket) = bind_ephemeral();

        let config = Config {
            http_addr: trigger_socket,
            metrics_addr: scrape_socket,
            ..Default::default()
        };

        let state = State::new(config).await.unwrap();

        let trigger_app = App::trigger(state.clone());
        let trigger_handle = tokio::spawn(async move {
            let listener = tokio::net::TcpListener::from_std(trigger_listener).unwrap();
            trigger_app.serve(listener).await.unwrap();
        });

        let scrape_app = App::scrape(state);
        let scrape_handle = tokio::spawn(async move {
            let listener = tokio::net::TcpListener::from_std(scrape_listener).unwrap();
            scrape_app.serve(listener).await.unwrap();
        });

        Self {
            trigger_handle,
            scrape_handle,
            trigger_socket,
            scrape_socket,
        }
    }

    /// Returns a full URL pointing to the given path on the trigger API.
    ///
    /// This URL uses `localhost` as hostname.
    pub fn trigger_url(&self, path: &str) -> String {
        let path = path.trim_start_matches('/');
        format!("http://localhost:{}/{}", self.trigger_socket.port(), path)
    }

    /// Returns the URL of the metrics scrape endpoint.
    pub fn metrics_url(&self) -> String {
        format!("http://localhost:{}/metrics", self.scrape_socket.port())
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.trigger_handle.abort();
        self.scrape_handle.abort();
    }
}

fn bind_ephemeral() -> (TcpListener, SocketAddr) {
    let addr = SocketAddr::from(([127, 0, 0, 1], 0));
    let listener = TcpListener::bind(addr).unwrap();
    listener.set_nonblocking(true).unwrap();
    let socket = listener.local_addr().unwrap();
    (listener, socket)
}
