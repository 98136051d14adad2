//! Executor configuration

use crate::error::{ExecutorError, ExecutorResult};
use crate::grouping::GroupingAlgorithm;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Whole-batch deadline used when none is configured
pub const DEFAULT_BATCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Number of per-batch samples kept for the throughput average
pub const DEFAULT_STATS_WINDOW: usize = 64;

/// Upper bound for the blocking pool that runs task actions
pub const DEFAULT_MAX_BLOCKING_THREADS: usize = 512;

/// How groups of pairwise-independent partitions are dispatched
///
/// Union-Find partitions ignore this: their components always run
/// concurrently with members in sequence.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DispatchMode {
    /// All groups at once; cross-group overlap is caught by the conflict resolver
    #[default]
    Concurrent,
    /// One group at a time, each to completion
    Waves,
}

/// What `execute_parallel` does when the batch deadline passes
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TimeoutPolicy {
    /// Return [`ExecutorError::BatchTimeout`] and discard partial counts
    #[default]
    Fail,
    /// Return the counts gathered so far, flagged incomplete
    ReturnPartial,
}

/// Parallel executor configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Partitioning algorithm
    #[serde(default)]
    pub algorithm: GroupingAlgorithm,
    /// Group dispatch for pairwise-independent partitions
    #[serde(default)]
    pub dispatch: DispatchMode,
    /// Whole-batch deadline in milliseconds
    #[serde(default = "default_batch_timeout_ms")]
    pub batch_timeout_ms: u64,
    /// Async worker threads (0 = one per core)
    #[serde(default)]
    pub worker_threads: usize,
    /// Upper bound for concurrently blocking actions
    #[serde(default = "default_max_blocking_threads")]
    pub max_blocking_threads: usize,
    /// Per-batch samples kept for the throughput average
    #[serde(default = "default_stats_window")]
    pub stats_window: usize,
    /// Deadline behaviour
    #[serde(default)]
    pub timeout_policy: TimeoutPolicy,
}

fn default_batch_timeout_ms() -> u64 {
    DEFAULT_BATCH_TIMEOUT.as_millis() as u64
}

fn default_max_blocking_threads() -> usize {
    DEFAULT_MAX_BLOCKING_THREADS
}

fn default_stats_window() -> usize {
    DEFAULT_STATS_WINDOW
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            algorithm: GroupingAlgorithm::default(),
            dispatch: DispatchMode::default(),
            batch_timeout_ms: default_batch_timeout_ms(),
            worker_threads: 0,
            max_blocking_threads: default_max_blocking_threads(),
            stats_window: default_stats_window(),
            timeout_policy: TimeoutPolicy::default(),
        }
    }
}

impl ExecutorConfig {
    /// Set the partitioning algorithm
    pub fn with_algorithm(mut self, algorithm: GroupingAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Set the group dispatch mode
    pub fn with_dispatch(mut self, dispatch: DispatchMode) -> Self {
        self.dispatch = dispatch;
        self
    }

    /// Set the whole-batch deadline
    pub fn with_batch_timeout(mut self, timeout: Duration) -> Self {
        self.batch_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set the deadline behaviour
    pub fn with_timeout_policy(mut self, policy: TimeoutPolicy) -> Self {
        self.timeout_policy = policy;
        self
    }

    /// Set the number of async worker threads
    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = threads;
        self
    }

    /// Whole-batch deadline
    pub fn batch_timeout(&self) -> Duration {
        Duration::from_millis(self.batch_timeout_ms)
    }

    /// Reject values the executor cannot run with
    pub fn validate(&self) -> ExecutorResult<()> {
        if self.batch_timeout_ms == 0 {
            return Err(ExecutorError::InvalidConfig(
                "batch_timeout_ms must be greater than zero".into(),
            ));
        }
        if self.max_blocking_threads == 0 {
            return Err(ExecutorError::InvalidConfig(
                "max_blocking_threads must be greater than zero".into(),
            ));
        }
        if self.stats_window == 0 {
            return Err(ExecutorError::InvalidConfig(
                "stats_window must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}
