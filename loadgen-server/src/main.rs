//! The synthetic load generator binary.
//!
//! This exposes the workload trigger API and the metrics exporter as two
//! independent `HTTP` listeners, so load injection and scraping can be
//! firewalled or scaled separately.
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

use anyhow::Result;

fn main() -> Result<()> {
    loadgen_server::cli::execute()
}
