//! The process-wide metric registry.
//!
//! All workload instrumentation flows through [`Metrics`], which owns the
//! Prometheus registry served by the scrape endpoint. The registry holds the
//! workload metric families (operation counter, latency histogram, heap
//! histogram, all partitioned by a `type` label), generic HTTP server
//! metrics, tokio runtime gauges, and the default process collector on
//! Linux.

use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Context, Result};
use prometheus::{
    HistogramOpts, HistogramTimer, HistogramVec, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use sysinfo::{Pid, System};

use crate::workload::WorkloadKind;

/// Bucket boundaries for per-unit workload latency, in seconds.
const LATENCY_BUCKETS: &[f64] = &[0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0];

/// Parameters of the exponential bucket sequence for heap usage, in KB.
const HEAP_BUCKETS_START: f64 = 10.0;
const HEAP_BUCKETS_FACTOR: f64 = 1.5;
const HEAP_BUCKETS_COUNT: usize = 20;

/// The metric registry shared by all request handlers.
///
/// Construct this once at startup via [`Metrics::new`] and share it through
/// the server [`State`](crate::state::State). All contained metric handles
/// are internally synchronized and safe to update from concurrent requests.
pub struct Metrics {
    registry: Registry,

    /// Total units of work completed, by workload type.
    pub workload_ops: IntCounterVec,
    /// Per-unit wall clock duration in seconds, by workload type.
    pub workload_latency: HistogramVec,
    /// Per-batch heap usage in kilobytes, by workload type.
    pub workload_heap: HistogramVec,

    /// Requests served by the trigger API.
    pub http_requests: IntCounterVec,
    /// Request handling duration of the trigger API.
    pub http_request_duration: HistogramVec,
    /// Requests currently being handled by the trigger API.
    pub http_in_flight: IntGauge,

    /// Tokio runtime worker threads.
    pub runtime_workers: IntGauge,
    /// Tasks currently alive on the runtime.
    pub runtime_alive_tasks: IntGauge,
    /// Depth of the runtime's global task queue.
    pub runtime_queue_depth: IntGauge,

    system: Mutex<System>,
    pid: Pid,
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics").field("pid", &self.pid).finish()
    }
}

impl Metrics {
    /// Creates the registry and registers all metric families.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let workload_ops = IntCounterVec::new(
            Opts::new("workload_ops_total", "Total number of operations executed"),
            &["type"],
        )?;

        let workload_latency = HistogramVec::new(
            HistogramOpts::new(
                "workload_latency_seconds",
                "Latency of each operation in seconds",
            )
            .buckets(LATENCY_BUCKETS.to_vec()),
            &["type"],
        )?;

        let workload_heap = HistogramVec::new(
            HistogramOpts::new("workload_heap_kb", "Heap usage in KB per batch")
                .buckets(heap_buckets()?),
            &["type"],
        )?;

        let http_requests = IntCounterVec::new(
            Opts::new("http_requests_total", "Requests served by the trigger API"),
            &["route", "method", "status"],
        )?;

        let http_request_duration = HistogramVec::new(
            HistogramOpts::new(
                "http_request_duration_seconds",
                "Request handling duration of the trigger API",
            ),
            &["route", "method"],
        )?;

        let http_in_flight = IntGauge::new(
            "http_requests_in_flight",
            "Requests currently being handled by the trigger API",
        )?;

        let runtime_workers =
            IntGauge::new("tokio_runtime_workers", "Tokio runtime worker threads")?;
        let runtime_alive_tasks = IntGauge::new(
            "tokio_runtime_alive_tasks",
            "Tasks currently alive on the runtime",
        )?;
        let runtime_queue_depth = IntGauge::new(
            "tokio_runtime_global_queue_depth",
            "Depth of the runtime's global task queue",
        )?;

        registry.register(Box::new(workload_ops.clone()))?;
        registry.register(Box::new(workload_latency.clone()))?;
        registry.register(Box::new(workload_heap.clone()))?;
        registry.register(Box::new(http_requests.clone()))?;
        registry.register(Box::new(http_request_duration.clone()))?;
        registry.register(Box::new(http_in_flight.clone()))?;
        registry.register(Box::new(runtime_workers.clone()))?;
        registry.register(Box::new(runtime_alive_tasks.clone()))?;
        registry.register(Box::new(runtime_queue_depth.clone()))?;

        #[cfg(target_os = "linux")]
        registry.register(Box::new(
            prometheus::process_collector::ProcessCollector::for_self(),
        ))?;

        let pid = sysinfo::get_current_pid()
            .map_err(|err| anyhow::anyhow!(err))
            .context("failed to determine own pid")?;

        Ok(Self {
            registry,
            workload_ops,
            workload_latency,
            workload_heap,
            http_requests,
            http_request_duration,
            http_in_flight,
            runtime_workers,
            runtime_alive_tasks,
            runtime_queue_depth,
            system: Mutex::new(System::new()),
            pid,
        })
    }

    /// Starts the latency timer for one unit of work.
    ///
    /// The returned timer records into `workload_latency_seconds` when
    /// stopped or dropped.
    pub fn unit_timer(&self, kind: WorkloadKind) -> HistogramTimer {
        self.workload_latency
            .with_label_values(&[kind.label()])
            .start_timer()
    }

    /// Records one completed unit of work into `workload_ops_total`.
    pub fn unit_completed(&self, kind: WorkloadKind) {
        self.workload_ops.with_label_values(&[kind.label()]).inc();
    }

    /// Samples current heap usage and records one `workload_heap_kb`
    /// observation.
    ///
    /// Called once per batch, after all of its units have completed.
    pub fn observe_batch_heap(&self, kind: WorkloadKind) {
        let heap_kb = self.heap_used_kb();
        self.workload_heap
            .with_label_values(&[kind.label()])
            .observe(heap_kb);
    }

    /// Records one served request of the trigger API.
    pub fn observe_request(&self, route: &str, method: &str, status: u16, elapsed: Duration) {
        self.http_requests
            .with_label_values(&[route, method, &status.to_string()])
            .inc();
        self.http_request_duration
            .with_label_values(&[route, method])
            .observe(elapsed.as_secs_f64());
    }

    /// Renders the registry in Prometheus text exposition format.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        TextEncoder::new().encode_to_string(&self.registry.gather())
    }

    /// Resident memory of this process in kilobytes.
    ///
    /// Returns 0 if the process cannot be inspected, so heap sampling never
    /// fails a workload.
    fn heap_used_kb(&self) -> f64 {
        let mut system = self.system.lock().unwrap_or_else(|err| err.into_inner());
        system.refresh_process(self.pid);
        system
            .process(self.pid)
            .map(|process| process.memory() as f64 / 1024.0)
            .unwrap_or(0.0)
    }
}

/// The exponential bucket sequence for `workload_heap_kb`.
///
/// `bucket[i] = 10 * 1.5^i` for `i in 0..20`.
fn heap_buckets() -> Result<Vec<f64>> {
    Ok(prometheus::exponential_buckets(
        HEAP_BUCKETS_START,
        HEAP_BUCKETS_FACTOR,
        HEAP_BUCKETS_COUNT,
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heap_buckets_are_exponential() {
        let buckets = heap_buckets().unwrap();

        assert_eq!(buckets.len(), HEAP_BUCKETS_COUNT);
        for (i, bucket) in buckets.iter().enumerate() {
            let expected = HEAP_BUCKETS_START * HEAP_BUCKETS_FACTOR.powi(i as i32);
            assert!((bucket - expected).abs() < 1e-9, "bucket {i} = {bucket}");
        }
    }

    #[test]
    fn heap_sample_is_positive() {
        let metrics = Metrics::new().unwrap();

        // A running test binary always has resident memory.
        assert!(metrics.heap_used_kb() > 0.0);
    }

    #[test]
    fn heap_observation_is_per_batch() {
        let metrics = Metrics::new().unwrap();

        metrics.observe_batch_heap(WorkloadKind::Io);
        metrics.observe_batch_heap(WorkloadKind::Io);

        let histogram = metrics.workload_heap.with_label_values(&["io"]);
        assert_eq!(histogram.get_sample_count(), 2);
    }

    #[test]
    fn render_contains_workload_families() {
        let metrics = Metrics::new().unwrap();
        metrics.unit_completed(WorkloadKind::Cpu);
        metrics.observe_batch_heap(WorkloadKind::Cpu);
        drop(metrics.unit_timer(WorkloadKind::Cpu));

        let exposition = metrics.render().unwrap();

        assert!(exposition.contains("workload_ops_total{type=\"cpu\"} 1"));
        assert!(exposition.contains("workload_latency_seconds_bucket"));
        assert!(exposition.contains("workload_heap_kb_count{type=\"cpu\"} 1"));
    }

    #[test]
    fn counters_partition_by_label() {
        let metrics = Metrics::new().unwrap();

        metrics.unit_completed(WorkloadKind::Cpu);
        metrics.unit_completed(WorkloadKind::CpuIo);
        metrics.unit_completed(WorkloadKind::CpuIo);

        let ops = |label| metrics.workload_ops.with_label_values(&[label]).get();
        assert_eq!(ops("cpu"), 1);
        assert_eq!(ops("io"), 0);
        assert_eq!(ops("cpu_io"), 2);
    }
}
