//! Healthcheck probe used by the `healthcheck` CLI subcommand.

use anyhow::Result;

use crate::config::Config;

/// Checks whether the trigger API of a running server responds on the
/// configured address.
pub async fn healthcheck(config: Config) -> Result<()> {
    let client = reqwest::Client::new();
    let url = format!("http://{}/health", config.http_addr);

    tracing::debug!("sending healthcheck request to {}", url);
    let response = client.get(&url).send().await?;
    if !response.status().is_success() {
        anyhow::bail!("Bad Status: {}", response.status());
    }

    tracing::info!("OK");
    Ok(())
}
