//! Lifetime execution statistics
//!
//! Counters are plain atomics so concurrent batches can update them without a
//! shared lock. Throughput is a weighted average over a rolling window of
//! per-batch `(tasks, elapsed)` samples; batch latency goes into a fixed-bucket
//! histogram.

use crate::orchestrator::ExecutionResult;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Default latency bucket bounds, in microseconds
const LATENCY_BUCKETS_US: [f64; 10] = [
    100.0, 500.0, 1_000.0, 5_000.0, 10_000.0, 50_000.0, 100_000.0, 500_000.0, 1_000_000.0,
    10_000_000.0,
];

/// Histogram for batch latency
pub struct LatencyHistogram {
    /// Bucket upper bounds (in microseconds)
    buckets: Vec<f64>,
    /// Counts per bucket, plus one overflow slot
    counts: Vec<AtomicU64>,
    sum: AtomicU64,
    count: AtomicU64,
}

impl LatencyHistogram {
    /// Create histogram with default buckets
    pub fn new() -> Self {
        Self::with_buckets(LATENCY_BUCKETS_US.to_vec())
    }

    /// Create histogram with custom buckets
    pub fn with_buckets(buckets: Vec<f64>) -> Self {
        let counts = (0..=buckets.len()).map(|_| AtomicU64::new(0)).collect();
        Self {
            buckets,
            counts,
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    /// Record a duration
    pub fn observe(&self, elapsed: Duration) {
        let micros = elapsed.as_micros() as f64;
        self.sum.fetch_add(micros as u64, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);

        let slot = self
            .buckets
            .iter()
            .position(|bound| micros <= *bound)
            .unwrap_or(self.buckets.len());
        self.counts[slot].fetch_add(1, Ordering::Relaxed);
    }

    /// Mean in microseconds
    pub fn mean(&self) -> f64 {
        let count = self.count.load(Ordering::Relaxed);
        if count == 0 {
            return 0.0;
        }
        self.sum.load(Ordering::Relaxed) as f64 / count as f64
    }

    /// Get total count
    pub fn total_count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// `(upper bound, count)` per bucket; the overflow bucket has bound `f64::INFINITY`
    pub fn buckets(&self) -> Vec<(f64, u64)> {
        self.buckets
            .iter()
            .copied()
            .chain(std::iter::once(f64::INFINITY))
            .zip(self.counts.iter().map(|c| c.load(Ordering::Relaxed)))
            .collect()
    }

    fn reset(&self) {
        for c in &self.counts {
            c.store(0, Ordering::Relaxed);
        }
        self.sum.store(0, Ordering::Relaxed);
        self.count.store(0, Ordering::Relaxed);
    }
}

impl Default for LatencyHistogram {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Copy, Debug)]
struct BatchSample {
    tasks: u64,
    elapsed: Duration,
}

/// Live statistics owned by an executor
pub struct ExecutionStats {
    total_executed: AtomicU64,
    total_failed: AtomicU64,
    total_conflicts: AtomicU64,
    total_batches: AtomicU64,
    window: Mutex<VecDeque<BatchSample>>,
    window_capacity: usize,
    latency: LatencyHistogram,
}

impl ExecutionStats {
    /// Create statistics keeping `window_capacity` throughput samples
    pub fn new(window_capacity: usize) -> Self {
        let window_capacity = window_capacity.max(1);
        Self {
            total_executed: AtomicU64::new(0),
            total_failed: AtomicU64::new(0),
            total_conflicts: AtomicU64::new(0),
            total_batches: AtomicU64::new(0),
            window: Mutex::new(VecDeque::with_capacity(window_capacity)),
            window_capacity,
            latency: LatencyHistogram::new(),
        }
    }

    /// Fold one batch result into the totals
    pub fn record(&self, result: &ExecutionResult) {
        self.total_executed
            .fetch_add(result.success_count as u64, Ordering::Relaxed);
        self.total_failed
            .fetch_add(result.failed_count as u64, Ordering::Relaxed);
        self.total_conflicts
            .fetch_add(result.conflict_count as u64, Ordering::Relaxed);
        self.total_batches.fetch_add(1, Ordering::Relaxed);
        self.latency.observe(result.elapsed);

        let mut window = self.window.lock();
        if window.len() == self.window_capacity {
            window.pop_front();
        }
        window.push_back(BatchSample {
            tasks: result.completed() as u64,
            elapsed: result.elapsed,
        });
    }

    /// Tasks per second across the sample window
    pub fn average_throughput(&self) -> f64 {
        let window = self.window.lock();
        let (tasks, elapsed) = window
            .iter()
            .fold((0u64, Duration::ZERO), |(tasks, elapsed), sample| {
                (tasks + sample.tasks, elapsed + sample.elapsed)
            });
        let secs = elapsed.as_secs_f64();
        if secs == 0.0 {
            return 0.0;
        }
        tasks as f64 / secs
    }

    /// Point-in-time copy of the statistics
    pub fn snapshot(&self) -> ExecutionStatistics {
        ExecutionStatistics {
            total_executed: self.total_executed.load(Ordering::Relaxed),
            total_failed: self.total_failed.load(Ordering::Relaxed),
            total_conflicts: self.total_conflicts.load(Ordering::Relaxed),
            total_batches: self.total_batches.load(Ordering::Relaxed),
            average_throughput: self.average_throughput(),
            mean_batch_latency_us: self.latency.mean(),
            latency_buckets: self
                .latency
                .buckets()
                .into_iter()
                .map(|(le, count)| LatencyBucket {
                    le: le.is_finite().then_some(le),
                    count,
                })
                .collect(),
        }
    }

    /// Clear all counters and samples
    pub fn reset(&self) {
        self.total_executed.store(0, Ordering::Relaxed);
        self.total_failed.store(0, Ordering::Relaxed);
        self.total_conflicts.store(0, Ordering::Relaxed);
        self.total_batches.store(0, Ordering::Relaxed);
        self.window.lock().clear();
        self.latency.reset();
    }
}

/// One histogram bucket in a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatencyBucket {
    /// Upper bound in microseconds; `None` for the overflow bucket
    pub le: Option<f64>,
    /// Batches that fell in this bucket
    pub count: u64,
}

/// Snapshot of executor statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionStatistics {
    /// Tasks that completed successfully
    pub total_executed: u64,
    /// Tasks that failed, including conflicts
    pub total_failed: u64,
    /// Tasks refused by the conflict resolver
    pub total_conflicts: u64,
    /// Batches recorded
    pub total_batches: u64,
    /// Weighted tasks per second over the sample window
    pub average_throughput: f64,
    /// Mean batch latency in microseconds
    pub mean_batch_latency_us: f64,
    /// Batch latency distribution
    pub latency_buckets: Vec<LatencyBucket>,
}

impl ExecutionStatistics {
    /// Export snapshot as JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Export snapshot as compact JSON string
    pub fn to_json_compact(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
