//! Configuration for the load generator server.
//!
//! Configuration can be loaded from multiple sources with the following
//! precedence (highest to lowest):
//!
//! 1. Environment variables (prefixed with `LOADGEN__`)
//! 2. YAML configuration file (specified via `-c` or `--config` flag)
//! 3. Defaults
//!
//! Environment variables use `LOADGEN__` as a prefix and double underscores
//! (`__`) to denote nested configuration structures. For example:
//!
//! - `LOADGEN__HTTP_ADDR=0.0.0.0:9091` sets the workload trigger address
//! - `LOADGEN__METRICS_ADDR=0.0.0.0:9092` sets the metrics exporter address
//! - `LOADGEN__RUNTIME__WORKER_THREADS=8` sets the runtime thread count
//!
//! The same configuration in YAML:
//!
//! ```yaml
//! http_addr: 0.0.0.0:9091
//! metrics_addr: 0.0.0.0:9092
//!
//! runtime:
//!   worker_threads: 8
//! ```

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use figment::providers::{Env, Format, Serialized, Yaml};
use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;

/// Environment variable prefix for all configuration options.
const ENV_PREFIX: &str = "LOADGEN__";

/// Runtime configuration for the Tokio async runtime.
///
/// Used in: [`Config::runtime`]
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Runtime {
    /// Number of worker threads for the server runtime.
    ///
    /// Workload batches run on the blocking thread pool, so this only needs
    /// to cover request handling and the metrics exporter. Defaults to the
    /// number of CPU cores on the host machine.
    ///
    /// Environment variable: `LOADGEN__RUNTIME__WORKER_THREADS`
    pub worker_threads: usize,

    /// Interval for sampling internal tokio runtime metrics into the
    /// registry.
    ///
    /// Defaults to `10` seconds.
    #[serde(with = "humantime_serde")]
    pub metrics_interval: Duration,
}

impl Default for Runtime {
    fn default() -> Self {
        Self {
            worker_threads: num_cpus::get(),
            metrics_interval: Duration::from_secs(10),
        }
    }
}

/// Logging configuration.
///
/// Logs are always written to stderr. Used in: [`Config::logging`]
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Logging {
    /// Minimum log level to output.
    ///
    /// Valid levels in increasing severity: TRACE, DEBUG, INFO, WARN, ERROR,
    /// OFF. The `RUST_LOG` environment variable provides more granular
    /// per-module control and takes precedence when set.
    ///
    /// Defaults to `INFO`. Environment variable: `LOADGEN__LOGGING__LEVEL`
    #[serde(with = "display_fromstr")]
    pub level: LevelFilter,
}

impl Default for Logging {
    fn default() -> Self {
        Self {
            level: LevelFilter::INFO,
        }
    }
}

mod display_fromstr {
    pub fn serialize<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
        T: std::fmt::Display,
    {
        serializer.collect_str(&value)
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
    where
        D: serde::Deserializer<'de>,
        T: std::str::FromStr,
        <T as std::str::FromStr>::Err: std::fmt::Display,
    {
        use serde::Deserialize;
        let s = <std::borrow::Cow<'de, str>>::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Main configuration struct for the load generator server.
///
/// See individual field documentation for details on each configuration
/// option, including defaults and environment variables.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Bind address of the workload trigger API.
    ///
    /// This listener serves `POST /cpu`, `POST /io` and `POST /cpui` as well
    /// as `GET /health`.
    ///
    /// Defaults to `0.0.0.0:9091`. Environment variable:
    /// `LOADGEN__HTTP_ADDR`
    pub http_addr: SocketAddr,

    /// Bind address of the metrics exporter.
    ///
    /// This listener serves `GET /metrics` in Prometheus text exposition
    /// format. It is bound separately from the trigger API so scraping can
    /// be firewalled independently of load injection.
    ///
    /// Defaults to `0.0.0.0:9092`. Environment variable:
    /// `LOADGEN__METRICS_ADDR`
    pub metrics_addr: SocketAddr,

    /// Configuration of the internal task runtime.
    pub runtime: Runtime,

    /// Logging configuration.
    pub logging: Logging,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_addr: "0.0.0.0:9091".parse().unwrap(),
            metrics_addr: "0.0.0.0:9092".parse().unwrap(),
            runtime: Runtime::default(),
            logging: Logging::default(),
        }
    }
}

impl Config {
    /// Loads configuration from the provided arguments.
    ///
    /// Configuration is merged in the following order (later sources
    /// override earlier ones):
    /// 1. Default values
    /// 2. YAML configuration file (if provided)
    /// 3. Environment variables (prefixed with `LOADGEN__`)
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML file cannot be read or parsed, or if any
    /// source contains invalid values.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = figment::Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        let config = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;

        Ok(config)
    }
}
