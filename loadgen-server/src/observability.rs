//! Logging setup for the server.

use std::env;

use tracing::Level;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, prelude::*};

use crate::config::Config;

/// Initializes the global tracing subscriber.
///
/// Logs go to stderr. The configured level applies unless `RUST_LOG` is set,
/// which takes precedence.
pub fn init_tracing(config: &Config) {
    let (level, env_filter) = parse_rust_log(config.logging.level);
    let format = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true);

    tracing_subscriber::registry()
        .with(format.with_filter(level))
        .with(env_filter)
        .init();
}

/// Resolves the effective log level and module filter.
///
/// `RUST_LOG` is first tried as a simple level filter, with default
/// per-module verbosity applied internally. Otherwise it is used literally
/// if the user knows which overrides they want to run.
pub fn parse_rust_log(configured: LevelFilter) -> (LevelFilter, EnvFilter) {
    let level = match env::var(EnvFilter::DEFAULT_ENV) {
        Ok(value) => match value.parse::<Level>() {
            Ok(level) => LevelFilter::from(level),
            Err(_) => return (LevelFilter::TRACE, EnvFilter::new(value)),
        },
        Err(_) => configured,
    };

    // This is the maximum verbosity that will be logged, filtered down to
    // `level` by the format layer.
    let env_filter = EnvFilter::new(
        "INFO,\
        tower_http=TRACE,\
        loadgen_server=TRACE,\
        ",
    );

    (level, env_filter)
}
