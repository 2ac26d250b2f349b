//! Blackbox tests for the workload trigger API and the metrics exporter.
//!
//! These exercise the full request path: trigger a workload over HTTP, then
//! scrape the second listener and assert on the text exposition.

use anyhow::Result;
use loadgen_test::server::TestServer;

/// Fetches the current text exposition from the metrics listener.
async fn scrape(server: &TestServer) -> Result<String> {
    let response = reqwest::get(server.metrics_url()).await?;
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    Ok(response.text().await?)
}

/// Extracts a single sample value from a text exposition.
///
/// `series` must be the full series name including labels, e.g.
/// `workload_ops_total{type="cpu"}`.
fn sample(exposition: &str, series: &str) -> Option<f64> {
    exposition
        .lines()
        .find_map(|line| line.strip_prefix(series)?.trim().parse().ok())
}

#[tokio::test]
async fn trigger_cpu_runs_requested_ops() -> Result<()> {
    let server = TestServer::new().await;
    let client = reqwest::Client::new();

    let response = client
        .post(server.trigger_url("/cpu"))
        .body(r#"{"ops": 10, "workers": 2}"#)
        .send()
        .await?;

    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let body = response.text().await?;
    assert!(body.contains("ops=10, workers=2"), "{body}");

    let exposition = scrape(&server).await?;
    assert_eq!(
        sample(&exposition, r#"workload_ops_total{type="cpu"}"#),
        Some(10.0)
    );
    assert_eq!(
        sample(&exposition, r#"workload_latency_seconds_count{type="cpu"}"#),
        Some(10.0)
    );
    // 2 workers -> one heap observation per batch.
    assert_eq!(
        sample(&exposition, r#"workload_heap_kb_count{type="cpu"}"#),
        Some(2.0)
    );

    Ok(())
}

#[tokio::test]
async fn non_post_method_is_rejected() -> Result<()> {
    let server = TestServer::new().await;
    let client = reqwest::Client::new();

    for path in ["/cpu", "/io", "/cpui"] {
        let response = client.get(server.trigger_url(path)).send().await?;
        assert_eq!(response.status(), reqwest::StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.text().await?, "");
    }

    Ok(())
}

#[tokio::test]
async fn mixed_workload_echoes_ratio() -> Result<()> {
    let server = TestServer::new().await;
    let client = reqwest::Client::new();

    let response = client
        .post(server.trigger_url("/cpui"))
        .body(r#"{"ops": 4, "workers": 1, "ratio": 0.3}"#)
        .send()
        .await?;

    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let body = response.text().await?;
    assert!(body.contains("ratio=0.3"), "{body}");

    let exposition = scrape(&server).await?;
    assert_eq!(
        sample(&exposition, r#"workload_ops_total{type="cpu_io"}"#),
        Some(4.0)
    );

    Ok(())
}

#[tokio::test]
async fn empty_body_uses_defaults() -> Result<()> {
    let server = TestServer::new().await;
    let client = reqwest::Client::new();

    let response = client.post(server.trigger_url("/io")).send().await?;

    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let body = response.text().await?;
    assert!(body.contains("ops=1, workers=1"), "{body}");

    let exposition = scrape(&server).await?;
    assert_eq!(
        sample(&exposition, r#"workload_ops_total{type="io"}"#),
        Some(1.0)
    );

    Ok(())
}

#[tokio::test]
async fn malformed_fields_fall_back_to_defaults() -> Result<()> {
    let server = TestServer::new().await;
    let client = reqwest::Client::new();

    let response = client
        .post(server.trigger_url("/io"))
        .body(r#"{"ops": "garbage", "workers": 2}"#)
        .send()
        .await?;

    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let body = response.text().await?;
    assert!(body.contains("ops=1, workers=2"), "{body}");

    Ok(())
}

#[tokio::test]
async fn io_latency_lands_above_first_bucket() -> Result<()> {
    let server = TestServer::new().await;
    let client = reqwest::Client::new();

    let response = client
        .post(server.trigger_url("/io"))
        .body(r#"{"ops": 5}"#)
        .send()
        .await?;
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    // The simulated sleep is 2.5ms, so no observation fits the 1ms bucket.
    let exposition = scrape(&server).await?;
    assert_eq!(
        sample(
            &exposition,
            r#"workload_latency_seconds_bucket{type="io",le="0.001"}"#
        ),
        Some(0.0)
    );

    Ok(())
}

#[tokio::test]
async fn counters_accumulate_across_requests() -> Result<()> {
    let server = TestServer::new().await;
    let client = reqwest::Client::new();

    for _ in 0..3 {
        client
            .post(server.trigger_url("/io"))
            .body(r#"{"ops": 2}"#)
            .send()
            .await?;
    }

    let exposition = scrape(&server).await?;
    assert_eq!(
        sample(&exposition, r#"workload_ops_total{type="io"}"#),
        Some(6.0)
    );

    Ok(())
}

#[tokio::test]
async fn scrape_has_exposition_content_type() -> Result<()> {
    let server = TestServer::new().await;

    let response = reqwest::get(server.metrics_url()).await?;
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_owned();

    assert!(content_type.starts_with("text/plain"), "{content_type}");

    Ok(())
}

#[tokio::test]
async fn health_endpoint_responds() -> Result<()> {
    let server = TestServer::new().await;

    let response = reqwest::get(server.trigger_url("/health")).await?;
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert_eq!(response.text().await?, "OK");

    Ok(())
}
