//! Parallel execution orchestrator
//!
//! One `execute_parallel` call runs:
//!
//! ```text
//! schedule → partition → dispatch groups → run members → collect → aggregate
//! ```
//!
//! Dispatch depends on what the partition guarantees:
//!
//! | partition | groups | members of a group |
//! |---|---|---|
//! | union-find | concurrent | in scheduled order, one unit per component |
//! | legacy / optimized-hash | concurrent, or one wave at a time | concurrent |
//!
//! Every action runs inside an [`InFlightGuard`](crate::resolver::InFlightGuard),
//! so tasks from concurrent groups that touch the same address are refused
//! instead of racing.

use crate::config::{DispatchMode, ExecutorConfig, TimeoutPolicy};
use crate::error::{ExecutorError, ExecutorResult};
use crate::grouping::{self, Group, GroupSemantics, GroupingAlgorithm};
use crate::resolver::ConflictResolver;
use crate::scheduler::TransactionScheduler;
use crate::stats::{ExecutionStatistics, ExecutionStats};
use crate::task::TransactionTask;
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Outcome of one batch
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ExecutionResult {
    /// Tasks whose action completed
    pub success_count: usize,
    /// Tasks that failed or were refused
    pub failed_count: usize,
    /// Tasks refused by the conflict resolver (also counted as failed)
    pub conflict_count: usize,
    /// Groups the batch was partitioned into
    pub group_count: usize,
    /// Tasks submitted
    pub batch_size: usize,
    /// Wall time of the whole call
    pub elapsed: Duration,
    /// Finished tasks per second of `elapsed`
    pub throughput: f64,
    /// Deadline passed before every task finished
    pub incomplete: bool,
}

impl ExecutionResult {
    fn new(
        counts: OutcomeCounts,
        group_count: usize,
        batch_size: usize,
        elapsed: Duration,
        incomplete: bool,
    ) -> Self {
        // Finished tasks only
        let finished = counts.success + counts.failed;
        let secs = elapsed.as_secs_f64();
        let throughput = if finished == 0 || secs == 0.0 {
            0.0
        } else {
            finished as f64 / secs
        };
        Self {
            success_count: counts.success,
            failed_count: counts.failed,
            conflict_count: counts.conflicts,
            group_count,
            batch_size,
            elapsed,
            throughput,
            incomplete,
        }
    }

    /// Wall time in milliseconds
    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed.as_secs_f64() * 1_000.0
    }

    /// Tasks that finished one way or another
    pub fn completed(&self) -> usize {
        self.success_count + self.failed_count
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TaskOutcome {
    Success,
    Failed,
    Conflict,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct OutcomeCounts {
    success: usize,
    failed: usize,
    conflicts: usize,
}

impl OutcomeCounts {
    fn record(&mut self, outcome: TaskOutcome) {
        match outcome {
            TaskOutcome::Success => self.success += 1,
            TaskOutcome::Failed => self.failed += 1,
            TaskOutcome::Conflict => {
                self.conflicts += 1;
                self.failed += 1;
            }
        }
    }

    fn merge(&mut self, other: OutcomeCounts) {
        self.success += other.success;
        self.failed += other.failed;
        self.conflicts += other.conflicts;
    }
}

/// Running totals visible while a batch is still in flight
#[derive(Default)]
struct BatchTally {
    success: AtomicUsize,
    failed: AtomicUsize,
    conflicts: AtomicUsize,
}

impl BatchTally {
    fn record(&self, outcome: TaskOutcome) {
        match outcome {
            TaskOutcome::Success => self.success.fetch_add(1, Ordering::Relaxed),
            TaskOutcome::Failed => self.failed.fetch_add(1, Ordering::Relaxed),
            TaskOutcome::Conflict => {
                self.conflicts.fetch_add(1, Ordering::Relaxed);
                self.failed.fetch_add(1, Ordering::Relaxed)
            }
        };
    }

    fn counts(&self) -> OutcomeCounts {
        OutcomeCounts {
            success: self.success.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            conflicts: self.conflicts.load(Ordering::Relaxed),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Dispatch {
    /// Groups concurrently, members in order
    SerialMembers,
    /// Groups and members concurrently
    ConcurrentMembers,
    /// Groups one after another, members concurrently
    Waves,
}

impl Dispatch {
    fn for_partition(semantics: GroupSemantics, mode: DispatchMode) -> Self {
        match (semantics, mode) {
            (GroupSemantics::MutuallyIndependent, _) => Dispatch::SerialMembers,
            (GroupSemantics::PairwiseIndependent, DispatchMode::Concurrent) => {
                Dispatch::ConcurrentMembers
            }
            (GroupSemantics::PairwiseIndependent, DispatchMode::Waves) => Dispatch::Waves,
        }
    }
}

/// Shared state handed to every execution unit of one batch
#[derive(Clone)]
struct BatchContext {
    tasks: Arc<Vec<TransactionTask>>,
    resolver: Arc<ConflictResolver>,
    tally: Arc<BatchTally>,
}

impl BatchContext {
    fn run_task(&self, position: usize) -> TaskOutcome {
        let task = &self.tasks[position];
        let outcome = match self.resolver.try_acquire(task) {
            Err(conflict) => {
                debug!(task = task.id(), address = %conflict.address, "transaction refused: address in flight");
                TaskOutcome::Conflict
            }
            Ok(_claims) => match task.execute() {
                Ok(()) => TaskOutcome::Success,
                Err(err) => {
                    error!(task = task.id(), error = %err, "transaction execution failed");
                    TaskOutcome::Failed
                }
            },
        };
        self.tally.record(outcome);
        outcome
    }

    fn run_group_serial(&self, group: &Group) -> OutcomeCounts {
        let mut counts = OutcomeCounts::default();
        for &position in &group.members {
            counts.record(self.run_task(position));
        }
        debug!(group = group.index, size = group.len(), success = counts.success, failed = counts.failed, "component finished");
        counts
    }

    async fn run_group_concurrent(self, group: Group) -> OutcomeCounts {
        let mut units = JoinSet::new();
        for &position in &group.members {
            let ctx = self.clone();
            units.spawn_blocking(move || ctx.run_task(position));
        }

        let mut counts = OutcomeCounts::default();
        while let Some(joined) = units.join_next().await {
            match joined {
                Ok(outcome) => counts.record(outcome),
                Err(err) => {
                    error!(group = group.index, error = %err, "task unit failed");
                    self.tally.record(TaskOutcome::Failed);
                    counts.record(TaskOutcome::Failed);
                }
            }
        }
        debug!(group = group.index, size = group.len(), success = counts.success, failed = counts.failed, conflicts = counts.conflicts, "group finished");
        counts
    }

    async fn dispatch(self, dispatch: Dispatch, groups: Vec<Group>) -> ExecutorResult<OutcomeCounts> {
        let mut total = OutcomeCounts::default();

        if dispatch == Dispatch::Waves {
            for group in groups {
                total.merge(self.clone().run_group_concurrent(group).await);
            }
            return Ok(total);
        }

        let mut units = JoinSet::new();
        for group in groups {
            let ctx = self.clone();
            match dispatch {
                Dispatch::SerialMembers => units.spawn_blocking(move || ctx.run_group_serial(&group)),
                _ => units.spawn(ctx.run_group_concurrent(group)),
            };
        }

        while let Some(joined) = units.join_next().await {
            let counts = joined.map_err(|e| ExecutorError::Join(e.to_string()))?;
            total.merge(counts);
        }
        Ok(total)
    }
}

/// Parallel transaction executor
///
/// Owns its runtime, conflict resolver and statistics. `execute_parallel`
/// blocks the calling thread; it may be called from several threads at once.
pub struct ParallelExecutor {
    config: ExecutorConfig,
    runtime: RwLock<Option<Runtime>>,
    resolver: Arc<ConflictResolver>,
    scheduler: TransactionScheduler,
    stats: ExecutionStats,
    algorithm: AtomicU8,
}

impl ParallelExecutor {
    /// Create an executor from a validated configuration
    pub fn new(config: ExecutorConfig) -> ExecutorResult<Self> {
        config.validate()?;

        let mut builder = Builder::new_multi_thread();
        builder
            .enable_time()
            .thread_name("bach-exec")
            .max_blocking_threads(config.max_blocking_threads);
        if config.worker_threads > 0 {
            builder.worker_threads(config.worker_threads);
        }
        let runtime = builder.build()?;

        info!(
            algorithm = %config.algorithm,
            dispatch = ?config.dispatch,
            timeout_ms = config.batch_timeout_ms,
            "parallel executor initialized"
        );

        Ok(Self {
            algorithm: AtomicU8::new(config.algorithm.to_u8()),
            stats: ExecutionStats::new(config.stats_window),
            resolver: Arc::new(ConflictResolver::new()),
            scheduler: TransactionScheduler::new(),
            runtime: RwLock::new(Some(runtime)),
            config,
        })
    }

    /// Create an executor with the default configuration
    pub fn with_defaults() -> ExecutorResult<Self> {
        Self::new(ExecutorConfig::default())
    }

    /// Configuration the executor was built with
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Algorithm used by `execute_parallel`
    pub fn grouping_algorithm(&self) -> GroupingAlgorithm {
        GroupingAlgorithm::from_u8(self.algorithm.load(Ordering::Relaxed))
    }

    /// Change the algorithm used by later `execute_parallel` calls
    pub fn set_grouping_algorithm(&self, algorithm: GroupingAlgorithm) {
        self.algorithm.store(algorithm.to_u8(), Ordering::Relaxed);
    }

    /// Snapshot of lifetime statistics
    pub fn statistics(&self) -> ExecutionStatistics {
        self.stats.snapshot()
    }

    /// Clear lifetime statistics
    pub fn reset_statistics(&self) {
        self.stats.reset();
    }

    /// The runtime conflict guard
    pub fn resolver(&self) -> &ConflictResolver {
        &self.resolver
    }

    /// Check if `shutdown` has been called
    pub fn is_shut_down(&self) -> bool {
        self.runtime.read().is_none()
    }

    /// Execute a batch with the current grouping algorithm
    pub fn execute_parallel(&self, batch: Vec<TransactionTask>) -> ExecutorResult<ExecutionResult> {
        self.execute_with(batch, self.grouping_algorithm())
    }

    /// Execute a batch with an explicit grouping algorithm
    pub fn execute_with(
        &self,
        batch: Vec<TransactionTask>,
        algorithm: GroupingAlgorithm,
    ) -> ExecutorResult<ExecutionResult> {
        if Handle::try_current().is_ok() {
            return Err(ExecutorError::NestedRuntime);
        }
        let runtime = self.runtime.read();
        let runtime = runtime.as_ref().ok_or(ExecutorError::ShutDown)?;

        let started = Instant::now();
        let batch_size = batch.len();
        info!(tasks = batch_size, %algorithm, "executing batch");

        let scheduled = self.scheduler.optimize_schedule(batch);
        let partition = grouping::partition(algorithm, &scheduled);
        let group_count = partition.len();
        let dispatch = Dispatch::for_partition(partition.semantics(), self.config.dispatch);
        debug!(
            groups = group_count,
            max_group = partition.max_group_size(),
            ?dispatch,
            "batch partitioned"
        );

        let ctx = BatchContext {
            tasks: Arc::new(scheduled),
            resolver: Arc::clone(&self.resolver),
            tally: Arc::new(BatchTally::default()),
        };
        let tally = Arc::clone(&ctx.tally);
        let deadline = self.config.batch_timeout();
        // On expiry only the handle is dropped, which detaches the dispatch;
        // queued tasks and later waves still run.
        let work = runtime.spawn(ctx.dispatch(dispatch, partition.into_groups()));
        let outcome = runtime.block_on(async move { tokio::time::timeout(deadline, work).await });
        let elapsed = started.elapsed();

        let (counts, incomplete) = match outcome {
            Ok(Ok(Ok(counts))) => (counts, false),
            Ok(Ok(Err(err))) => {
                error!(error = %err, "parallel execution failed");
                return Err(err);
            }
            Ok(Err(join)) => {
                let err = ExecutorError::Join(join.to_string());
                error!(error = %err, "parallel execution failed");
                return Err(err);
            }
            Err(_) => {
                let partial = tally.counts();
                let completed = partial.success + partial.failed;
                warn!(
                    completed,
                    total = batch_size,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "batch deadline elapsed"
                );
                match self.config.timeout_policy {
                    TimeoutPolicy::Fail => {
                        return Err(ExecutorError::BatchTimeout {
                            elapsed,
                            completed,
                            total: batch_size,
                        })
                    }
                    TimeoutPolicy::ReturnPartial => (partial, true),
                }
            }
        };

        let result = ExecutionResult::new(counts, group_count, batch_size, elapsed, incomplete);
        self.stats.record(&result);

        info!(
            success = result.success_count,
            failed = result.failed_count,
            conflicts = result.conflict_count,
            elapsed_ms = result.elapsed_ms(),
            tps = result.throughput,
            "parallel execution complete"
        );
        Ok(result)
    }

    /// Stop accepting batches and release the runtime
    ///
    /// Waits for batches already inside `execute_parallel`. Work detached by
    /// a timed-out batch keeps running until this is called; blocking actions
    /// already started are left to finish on their own. Calling it again does
    /// nothing.
    pub fn shutdown(&self) {
        if let Some(runtime) = self.runtime.write().take() {
            runtime.shutdown_background();
            info!("parallel executor shut down");
        }
    }
}

impl Drop for ParallelExecutor {
    fn drop(&mut self) {
        self.shutdown();
    }
}
