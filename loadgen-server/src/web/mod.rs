//! Module implementing the load generator webserver.
//!
//! The server application is implemented in the [`App`] struct, which sets
//! up routing, middleware, and the HTTP server for one listener. The
//! [`server()`] function opens the trigger and scrape TCP listeners and
//! serves one application on each.
//!
//! # Testing
//!
//! For end-to-end tests of the server, see the `loadgen-test` crate, which
//! provides utilities to start an in-process test server.

mod app;
mod middleware;
mod server;

pub use app::App;
pub use server::server;
