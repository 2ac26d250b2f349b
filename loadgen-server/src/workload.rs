//! Synthetic workload functions and the dispatcher mapping trigger requests
//! onto them.
//!
//! A trigger request declares `ops` and `workers`; the dispatcher runs
//! `workers` sequential batches of `max(1, ops / workers)` units each. Every
//! unit is individually timed and counted, and each batch records one heap
//! observation after completing. Note that the total number of executed
//! units can differ from the requested `ops` when it is not evenly divisible
//! by `workers`.

use std::fmt;
use std::thread;
use std::time::Duration;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde_json::Value;

use crate::metrics::Metrics;

/// Iterations of the busy-compute body per CPU-bound unit.
const BURN_ITERATIONS: u64 = 1_000_000;

/// The fixed value set the busy-compute body draws from.
const BURN_VALUES: [f64; 10] = [
    100.0, 200.0, 300.0, 400.0, 500.0, 600.0, 700.0, 800.0, 900.0, 1000.0,
];

/// Simulated external-call latency of one IO-bound unit.
const IO_SLEEP: Duration = Duration::from_micros(2500);

/// The kind of synthetic workload to run.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum WorkloadKind {
    /// Busy-computes a numeric accumulator.
    Cpu,
    /// Sleeps to simulate external-call latency.
    Io,
    /// Per unit, randomly either burns CPU or sleeps.
    CpuIo,
}

impl WorkloadKind {
    /// The `type` label value under which this workload records metrics.
    pub fn label(&self) -> &'static str {
        match self {
            WorkloadKind::Cpu => "cpu",
            WorkloadKind::Io => "io",
            WorkloadKind::CpuIo => "cpu_io",
        }
    }
}

impl fmt::Display for WorkloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Parameters of one trigger request.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TriggerParams {
    /// Requested total units of work.
    pub ops: u64,
    /// Number of batches to split the units into.
    pub workers: u64,
    /// CPU share of the mixed workload, in `[0, 1]`. Ignored by the other
    /// kinds.
    pub ratio: f64,
}

impl Default for TriggerParams {
    fn default() -> Self {
        Self {
            ops: 1,
            workers: 1,
            ratio: 0.5,
        }
    }
}

impl TriggerParams {
    /// Decodes trigger parameters from a JSON request body.
    ///
    /// Every field is optional and resolved independently: a missing or
    /// malformed field falls back to its default instead of failing the
    /// request, as does a body that is not valid JSON at all.
    pub fn from_json(body: &[u8]) -> Self {
        let value: Value = serde_json::from_slice(body).unwrap_or_default();
        let defaults = Self::default();

        Self {
            ops: value
                .get("ops")
                .and_then(Value::as_u64)
                .unwrap_or(defaults.ops),
            workers: value
                .get("workers")
                .and_then(Value::as_u64)
                .unwrap_or(defaults.workers),
            ratio: value
                .get("ratio")
                .and_then(Value::as_f64)
                .unwrap_or(defaults.ratio)
                .clamp(0.0, 1.0),
        }
    }
}

/// Runs the requested workload and returns the acknowledgement string.
///
/// `ops` and `workers` are coerced to at least 1, so a request can never
/// produce a division by zero or a zero-unit batch. Batches run sequentially
/// on the calling thread; the per-unit metrics contract is independent of
/// fan-out, so this is equivalent to parallel dispatch as far as the
/// registry is concerned.
pub fn dispatch(metrics: &Metrics, kind: WorkloadKind, params: TriggerParams) -> String {
    let ops = params.ops.max(1);
    let workers = params.workers.max(1);
    let ops_per_worker = (ops / workers).max(1);

    for _ in 0..workers {
        match kind {
            WorkloadKind::Cpu => cpu_work(metrics, ops_per_worker),
            WorkloadKind::Io => io_work(metrics, ops_per_worker),
            WorkloadKind::CpuIo => cpu_io_work(metrics, ops_per_worker, params.ratio),
        }
    }

    match kind {
        WorkloadKind::CpuIo => format!(
            "Triggered {kind} workload with ops={ops}, workers={workers}, ratio={}",
            params.ratio
        ),
        _ => format!("Triggered {kind} workload with ops={ops}, workers={workers}"),
    }
}

/// One batch of CPU-bound units.
fn cpu_work(metrics: &Metrics, ops: u64) {
    let mut rng = SmallRng::from_os_rng();

    for _ in 0..ops {
        let timer = metrics.unit_timer(WorkloadKind::Cpu);
        burn(&mut rng);
        timer.observe_duration();
        metrics.unit_completed(WorkloadKind::Cpu);
    }

    metrics.observe_batch_heap(WorkloadKind::Cpu);
}

/// One batch of IO-bound units.
fn io_work(metrics: &Metrics, ops: u64) {
    for _ in 0..ops {
        let timer = metrics.unit_timer(WorkloadKind::Io);
        thread::sleep(IO_SLEEP);
        timer.observe_duration();
        metrics.unit_completed(WorkloadKind::Io);
    }

    metrics.observe_batch_heap(WorkloadKind::Io);
}

/// One batch of mixed units: each unit burns CPU with probability `ratio`,
/// otherwise it sleeps a random 5-10ms.
fn cpu_io_work(metrics: &Metrics, ops: u64, ratio: f64) {
    let mut rng = SmallRng::from_os_rng();

    for _ in 0..ops {
        let timer = metrics.unit_timer(WorkloadKind::CpuIo);
        if rng.random::<f64>() < ratio {
            burn(&mut rng);
        } else {
            thread::sleep(Duration::from_millis(5 + rng.random_range(0..5)));
        }
        timer.observe_duration();
        metrics.unit_completed(WorkloadKind::CpuIo);
    }

    metrics.observe_batch_heap(WorkloadKind::CpuIo);
}

/// The busy-compute body of one CPU-bound unit.
///
/// Accumulates square roots of values drawn from [`BURN_VALUES`]. The result
/// is routed through `black_box` so the loop cannot be optimized away.
fn burn(rng: &mut SmallRng) {
    let mut acc = 0.0f64;
    for _ in 0..BURN_ITERATIONS {
        let value = BURN_VALUES[rng.random_range(0..BURN_VALUES.len())];
        acc += value.sqrt();
    }
    std::hint::black_box(acc);
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;

    fn params(ops: u64, workers: u64) -> TriggerParams {
        TriggerParams {
            ops,
            workers,
            ..Default::default()
        }
    }

    fn ops_count(metrics: &Metrics, kind: WorkloadKind) -> u64 {
        metrics.workload_ops.with_label_values(&[kind.label()]).get()
    }

    #[test]
    fn params_default_when_body_is_empty_or_invalid() {
        assert_eq!(TriggerParams::from_json(b""), TriggerParams::default());
        assert_eq!(
            TriggerParams::from_json(b"not json"),
            TriggerParams::default()
        );
        assert_eq!(TriggerParams::from_json(b"{}"), TriggerParams::default());
    }

    #[test]
    fn params_resolve_fields_independently() {
        let params = TriggerParams::from_json(br#"{"ops": 10, "workers": "oops"}"#);

        assert_eq!(params.ops, 10);
        assert_eq!(params.workers, 1);
        assert_eq!(params.ratio, 0.5);
    }

    #[test]
    fn params_clamp_ratio() {
        let params = TriggerParams::from_json(br#"{"ratio": 7.5}"#);
        assert_eq!(params.ratio, 1.0);

        let params = TriggerParams::from_json(br#"{"ratio": -0.5}"#);
        assert_eq!(params.ratio, 0.0);
    }

    #[test]
    fn dispatch_runs_workers_times_ops_per_worker_units() {
        let metrics = Metrics::new().unwrap();

        dispatch(&metrics, WorkloadKind::Io, params(10, 2));

        assert_eq!(ops_count(&metrics, WorkloadKind::Io), 10);
        let heap = metrics.workload_heap.with_label_values(&["io"]);
        assert_eq!(heap.get_sample_count(), 2, "one heap sample per batch");
    }

    #[test]
    fn dispatch_rounds_down_uneven_splits() {
        let metrics = Metrics::new().unwrap();

        // 7 ops over 2 workers -> 2 batches of 3 units.
        dispatch(&metrics, WorkloadKind::Io, params(7, 2));

        assert_eq!(ops_count(&metrics, WorkloadKind::Io), 6);
    }

    #[test]
    fn dispatch_coerces_zero_parameters() {
        let metrics = Metrics::new().unwrap();

        let message = dispatch(&metrics, WorkloadKind::Io, params(0, 0));

        assert_eq!(ops_count(&metrics, WorkloadKind::Io), 1);
        assert!(message.contains("ops=1, workers=1"), "{message}");
    }

    #[test]
    fn dispatch_acknowledgement_format() {
        let metrics = Metrics::new().unwrap();

        let message = dispatch(&metrics, WorkloadKind::Io, params(4, 2));
        assert_eq!(message, "Triggered io workload with ops=4, workers=2");

        let message = dispatch(
            &metrics,
            WorkloadKind::CpuIo,
            TriggerParams {
                ops: 1,
                workers: 1,
                ratio: 0.3,
            },
        );
        assert_eq!(
            message,
            "Triggered cpu_io workload with ops=1, workers=1, ratio=0.3"
        );
    }

    #[test]
    fn io_units_record_latency_above_sleep_duration() {
        let metrics = Metrics::new().unwrap();

        dispatch(&metrics, WorkloadKind::Io, params(4, 1));

        let latency = metrics.workload_latency.with_label_values(&["io"]);
        assert_eq!(latency.get_sample_count(), 4);
        // Each unit sleeps 2.5ms, so every observation is >= 0.001s.
        assert!(latency.get_sample_sum() >= 4.0 * 0.0025);
    }

    #[test]
    fn cpu_units_are_counted_per_unit() {
        let metrics = Metrics::new().unwrap();

        dispatch(&metrics, WorkloadKind::Cpu, params(2, 1));

        assert_eq!(ops_count(&metrics, WorkloadKind::Cpu), 2);
        let latency = metrics.workload_latency.with_label_values(&["cpu"]);
        assert_eq!(latency.get_sample_count(), 2);
        assert!(latency.get_sample_sum() > 0.0);
    }

    #[test]
    fn mixed_with_zero_ratio_only_sleeps() {
        let metrics = Metrics::new().unwrap();

        let start = Instant::now();
        dispatch(
            &metrics,
            WorkloadKind::CpuIo,
            TriggerParams {
                ops: 3,
                workers: 1,
                ratio: 0.0,
            },
        );

        // Every unit slept at least 5ms.
        assert!(start.elapsed() >= Duration::from_millis(15));
        assert_eq!(ops_count(&metrics, WorkloadKind::CpuIo), 3);
    }

    #[test]
    fn mixed_with_full_ratio_never_sleeps_long() {
        let metrics = Metrics::new().unwrap();

        dispatch(
            &metrics,
            WorkloadKind::CpuIo,
            TriggerParams {
                ops: 2,
                workers: 1,
                ratio: 1.0,
            },
        );

        assert_eq!(ops_count(&metrics, WorkloadKind::CpuIo), 2);
    }
}
