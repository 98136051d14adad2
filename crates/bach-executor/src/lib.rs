//! # bach-executor
//!
//! Conflict-aware parallel transaction executor for BachLedger.
//!
//! A batch of [`TransactionTask`]s, each declaring the addresses it reads and
//! writes, is ordered by priority, partitioned into groups that may run side
//! by side, and dispatched on a multi-threaded runtime. A runtime
//! [`ConflictResolver`] refuses any task whose addresses are already held by
//! another running task.
//!
//! Features:
//! - Three grouping algorithms (legacy greedy, hashed greedy, union-find)
//! - In-flight read/write claims with RAII release
//! - Whole-batch deadline with fail or partial-result policy
//! - Lifetime statistics with throughput window and latency histogram
//!
//! ```no_run
//! use bach_executor::{ParallelExecutor, TransactionTask};
//!
//! let executor = ParallelExecutor::with_defaults()?;
//! let batch = vec![
//!     TransactionTask::noop("tx1").reads(["alice"]).writes(["bob"]),
//!     TransactionTask::noop("tx2").writes(["carol"]),
//! ];
//! let result = executor.execute_parallel(batch)?;
//! assert_eq!(result.success_count, 2);
//! # Ok::<(), bach_executor::ExecutorError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod grouping;
pub mod orchestrator;
pub mod resolver;
pub mod scheduler;
pub mod stats;
pub mod task;
pub mod union_find;

pub use config::{DispatchMode, ExecutorConfig, TimeoutPolicy};
pub use error::{AddressConflict, ExecutorError, ExecutorResult, TaskError};
pub use grouping::{partition, Group, ParseAlgorithmError, GroupSemantics, GroupingAlgorithm, Partition};
pub use orchestrator::{ExecutionResult, ParallelExecutor};
pub use resolver::{ConflictResolver, InFlightGuard};
pub use scheduler::TransactionScheduler;
pub use stats::{ExecutionStatistics, LatencyBucket};
pub use task::{Address, ConflictSet, TransactionTask};
pub use union_find::UnionFind;
