//! A synthetic load generator for benchmarking infrastructure.
//!
//! The server exposes HTTP endpoints that trigger CPU-bound, IO-bound, and
//! mixed CPU/IO workloads. Every unit of work is instrumented into a
//! process-wide Prometheus registry, which is served on a separate listener
//! for scraping.

pub mod cli;
pub mod config;
pub mod endpoints;
pub mod error;
pub mod healthcheck;
pub mod metrics;
pub mod observability;
pub mod state;
pub mod web;
pub mod workload;
