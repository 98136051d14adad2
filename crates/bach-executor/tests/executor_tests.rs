//! End-to-end tests for the parallel executor
//!
//! Covers grouping through dispatch, failure isolation, statistics and
//! lifecycle.

use bach_executor::{
    DispatchMode, ExecutorConfig, ExecutorError, GroupingAlgorithm, ParallelExecutor, TaskError,
    TimeoutPolicy, TransactionTask,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn executor_with(config: ExecutorConfig) -> ParallelExecutor {
    ParallelExecutor::new(config.with_worker_threads(4)).unwrap()
}

fn executor() -> ParallelExecutor {
    executor_with(ExecutorConfig::default())
}

/// A tiny balance ledger shared by transfer tasks
#[derive(Default)]
struct Ledger {
    balances: Mutex<HashMap<String, i64>>,
}

impl Ledger {
    fn with_accounts(accounts: &[(&str, i64)]) -> Arc<Self> {
        let ledger = Self::default();
        for (name, balance) in accounts {
            ledger.balances.lock().insert(name.to_string(), *balance);
        }
        Arc::new(ledger)
    }

    fn balance(&self, account: &str) -> i64 {
        self.balances.lock().get(account).copied().unwrap_or(0)
    }

    fn transfer(self: &Arc<Self>, id: &str, from: &str, to: &str, amount: i64) -> TransactionTask {
        let ledger = Arc::clone(self);
        let (src, dst) = (from.to_string(), to.to_string());
        TransactionTask::new(id, move || {
            let mut balances = ledger.balances.lock();
            let available = balances.get(&src).copied().unwrap_or(0);
            if available < amount {
                return Err(TaskError::failed(format!("insufficient balance in {src}")));
            }
            balances.insert(src.clone(), available - amount);
            *balances.entry(dst.clone()).or_insert(0) += amount;
            Ok(())
        })
        .reads([from])
        .writes([from, to])
    }
}

// ==================== Basic Execution ====================

#[test]
fn test_independent_transfers_all_succeed() {
    let ledger = Ledger::with_accounts(&[("a0", 10), ("a1", 10), ("a2", 10), ("a3", 10)]);
    let batch = vec![
        ledger.transfer("t0", "a0", "b0", 5),
        ledger.transfer("t1", "a1", "b1", 5),
        ledger.transfer("t2", "a2", "b2", 5),
        ledger.transfer("t3", "a3", "b3", 5),
    ];

    let exec = executor();
    let result = exec.execute_parallel(batch).unwrap();

    assert_eq!(result.batch_size, 4);
    assert_eq!(result.success_count, 4);
    assert_eq!(result.failed_count, 0);
    assert_eq!(result.group_count, 4);
    assert!(result.throughput > 0.0);
    for i in 0..4 {
        assert_eq!(ledger.balance(&format!("b{i}")), 5);
    }
}

#[test]
fn test_dependent_chain_applies_in_order() {
    // Each transfer only succeeds if the previous one already ran
    let ledger = Ledger::with_accounts(&[("alice", 10)]);
    let batch = vec![
        ledger.transfer("t1", "alice", "bob", 10),
        ledger.transfer("t2", "bob", "carol", 10),
        ledger.transfer("t3", "carol", "dave", 10),
    ];

    let exec = executor();
    let result = exec.execute_parallel(batch).unwrap();

    assert_eq!(result.group_count, 1);
    assert_eq!(result.success_count, 3);
    assert_eq!(ledger.balance("dave"), 10);
    assert_eq!(ledger.balance("alice"), 0);
}

#[test]
fn test_two_pairs_grouping_per_algorithm() {
    let batch = || {
        vec![
            TransactionTask::noop("T1").writes(["a"]),
            TransactionTask::noop("T2").writes(["a"]),
            TransactionTask::noop("T3").writes(["b"]),
            TransactionTask::noop("T4").reads(["b"]),
        ]
    };
    let exec = executor_with(ExecutorConfig::default().with_dispatch(DispatchMode::Waves));

    let uf = exec.execute_with(batch(), GroupingAlgorithm::UnionFind).unwrap();
    assert_eq!(uf.group_count, 2);
    assert_eq!(uf.success_count, 4);

    let legacy = exec.execute_with(batch(), GroupingAlgorithm::Legacy).unwrap();
    assert_eq!(legacy.group_count, 2);
    assert_eq!(legacy.success_count, 4);

    let hashed = exec.execute_with(batch(), GroupingAlgorithm::OptimizedHash).unwrap();
    assert_eq!(hashed.group_count, 2);
    assert_eq!(hashed.success_count, 4);
}

// ==================== Failure Isolation ====================

#[test]
fn test_failures_do_not_abort_batch() {
    let ran = Arc::new(AtomicUsize::new(0));
    let mut batch = Vec::new();
    for i in 0..20 {
        let ran = Arc::clone(&ran);
        let task = TransactionTask::new(format!("tx{i}"), move || {
            ran.fetch_add(1, Ordering::SeqCst);
            match i % 5 {
                0 => Err(TaskError::failed("reverted")),
                1 => panic!("action panicked"),
                _ => Ok(()),
            }
        })
        .writes([format!("acct{}", i % 3)]);
        batch.push(task);
    }

    let exec = executor();
    let result = exec.execute_parallel(batch).unwrap();

    assert_eq!(ran.load(Ordering::SeqCst), 20);
    assert_eq!(result.failed_count, 8);
    assert_eq!(result.success_count, 12);
    assert_eq!(result.conflict_count, 0);
    assert!(exec.resolver().is_idle());
}

#[test]
fn test_conflicts_counted_as_failures() {
    let exec = executor_with(ExecutorConfig::default().with_algorithm(GroupingAlgorithm::Legacy));
    let slow = |id: &str| {
        TransactionTask::new(id, || {
            thread::sleep(Duration::from_millis(200));
            Ok(())
        })
        .writes(["shared"])
    };

    let result = exec.execute_parallel(vec![slow("t1"), slow("t2"), slow("t3")]).unwrap();

    assert_eq!(result.group_count, 3);
    assert_eq!(result.success_count, 1);
    assert_eq!(result.conflict_count, 2);
    assert_eq!(result.failed_count, 2);
    assert_eq!(result.success_count + result.failed_count, result.batch_size);
    assert!(exec.resolver().is_idle());
}

// ==================== Statistics ====================

#[test]
fn test_statistics_accumulate_and_reset() {
    let exec = executor();
    for round in 0..3 {
        let batch: Vec<_> = (0..10)
            .map(|i| TransactionTask::noop(format!("r{round}-{i}")).writes([format!("k{i}")]))
            .collect();
        exec.execute_parallel(batch).unwrap();
    }

    let stats = exec.statistics();
    assert_eq!(stats.total_batches, 3);
    assert_eq!(stats.total_executed, 30);
    assert_eq!(stats.total_failed, 0);
    assert!(stats.average_throughput > 0.0);
    let bucketed: u64 = stats.latency_buckets.iter().map(|b| b.count).sum();
    assert_eq!(bucketed, 3);

    exec.reset_statistics();
    let stats = exec.statistics();
    assert_eq!(stats.total_batches, 0);
    assert_eq!(stats.total_executed, 0);
}

#[test]
fn test_statistics_are_monotonic_across_threads() {
    let exec = Arc::new(executor());
    let mut handles = vec![];

    for t in 0..4 {
        let exec = Arc::clone(&exec);
        handles.push(thread::spawn(move || {
            for round in 0..5 {
                let batch: Vec<_> = (0..8)
                    .map(|i| {
                        TransactionTask::noop(format!("t{t}-r{round}-{i}"))
                            .writes([format!("thread{t}-acct{i}")])
                    })
                    .collect();
                exec.execute_parallel(batch).unwrap();
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    let stats = exec.statistics();
    assert_eq!(stats.total_batches, 20);
    assert_eq!(stats.total_executed, 160);
}

// ==================== Dispatch Modes ====================

#[test]
fn test_waves_run_groups_sequentially() {
    let active = Arc::new(AtomicUsize::new(0));
    let overlap = Arc::new(AtomicUsize::new(0));

    let batch: Vec<_> = (0..4)
        .map(|i| {
            let active = Arc::clone(&active);
            let overlap = Arc::clone(&overlap);
            TransactionTask::new(format!("tx{i}"), move || {
                if active.fetch_add(1, Ordering::SeqCst) > 0 {
                    overlap.fetch_add(1, Ordering::SeqCst);
                }
                thread::sleep(Duration::from_millis(20));
                active.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            })
            .writes(["same"])
        })
        .collect();

    let exec = executor_with(
        ExecutorConfig::default()
            .with_algorithm(GroupingAlgorithm::OptimizedHash)
            .with_dispatch(DispatchMode::Waves),
    );
    let result = exec.execute_parallel(batch).unwrap();

    assert_eq!(result.group_count, 4);
    assert_eq!(result.success_count, 4);
    assert_eq!(overlap.load(Ordering::SeqCst), 0);
}

#[test]
fn test_group_members_run_concurrently() {
    let batch: Vec<_> = (0..4)
        .map(|i| {
            TransactionTask::new(format!("tx{i}"), || {
                thread::sleep(Duration::from_millis(200));
                Ok(())
            })
            .writes([format!("acct{i}")])
        })
        .collect();

    let exec = executor_with(ExecutorConfig::default().with_algorithm(GroupingAlgorithm::Legacy));
    let result = exec.execute_parallel(batch).unwrap();

    assert_eq!(result.group_count, 1);
    assert_eq!(result.success_count, 4);
    // Sequential execution would take 800ms
    assert!(result.elapsed < Duration::from_millis(700));
}

// ==================== Timeouts ====================

#[test]
fn test_timeout_policy_fail() {
    let exec = executor_with(ExecutorConfig::default().with_batch_timeout(Duration::from_millis(100)));
    let batch = vec![TransactionTask::new("stuck", || {
        thread::sleep(Duration::from_millis(600));
        Ok(())
    })
    .writes(["a"])];

    let err = exec.execute_parallel(batch).unwrap_err();
    assert!(matches!(err, ExecutorError::BatchTimeout { total: 1, .. }));
    assert!(err.to_string().contains("timed out"));

    // The executor stays usable after a timed-out batch
    let result = exec
        .execute_parallel(vec![TransactionTask::noop("next").writes(["b"])])
        .unwrap();
    assert_eq!(result.success_count, 1);
}

#[test]
fn test_timeout_policy_partial() {
    let exec = executor_with(
        ExecutorConfig::default()
            .with_batch_timeout(Duration::from_millis(200))
            .with_timeout_policy(TimeoutPolicy::ReturnPartial),
    );
    let mut batch: Vec<_> = (0..3)
        .map(|i| TransactionTask::noop(format!("fast{i}")).writes([format!("f{i}")]))
        .collect();
    batch.push(
        TransactionTask::new("slow", || {
            thread::sleep(Duration::from_secs(2));
            Ok(())
        })
        .writes(["s"]),
    );

    let result = exec.execute_parallel(batch).unwrap();
    assert!(result.incomplete);
    assert_eq!(result.batch_size, 4);
    assert_eq!(result.success_count, 3);
    assert!(result.completed() < result.batch_size);
    assert_eq!(exec.statistics().total_batches, 1);
}

fn counted(id: &str, address: &str, ran: &Arc<AtomicUsize>) -> TransactionTask {
    let ran = Arc::clone(ran);
    TransactionTask::new(id, move || {
        thread::sleep(Duration::from_millis(100));
        ran.fetch_add(1, Ordering::SeqCst);
        Ok(())
    })
    .writes([address])
}

#[test]
fn test_timeout_keeps_queued_tasks_running() {
    let config = ExecutorConfig {
        max_blocking_threads: 1,
        ..ExecutorConfig::default()
    }
    .with_batch_timeout(Duration::from_millis(150))
    .with_timeout_policy(TimeoutPolicy::ReturnPartial);
    let exec = executor_with(config);
    let ran = Arc::new(AtomicUsize::new(0));
    let batch = vec![
        counted("q0", "a", &ran),
        counted("q1", "b", &ran),
        counted("q2", "c", &ran),
    ];

    let result = exec.execute_parallel(batch).unwrap();
    assert!(result.incomplete);
    assert!(result.completed() < 3);
    assert!(result.throughput <= result.completed() as f64 / result.elapsed.as_secs_f64() + 1e-9);

    // Tasks still waiting for the single blocking thread run after the deadline
    thread::sleep(Duration::from_secs(1));
    assert_eq!(ran.load(Ordering::SeqCst), 3);
}

#[test]
fn test_timeout_keeps_later_waves_running() {
    let exec = executor_with(
        ExecutorConfig::default()
            .with_algorithm(GroupingAlgorithm::Legacy)
            .with_dispatch(DispatchMode::Waves)
            .with_batch_timeout(Duration::from_millis(150)),
    );
    let ran = Arc::new(AtomicUsize::new(0));
    let batch = vec![
        counted("w0", "hot", &ran),
        counted("w1", "hot", &ran),
        counted("w2", "hot", &ran),
    ];

    let err = exec.execute_parallel(batch).unwrap_err();
    assert!(matches!(err, ExecutorError::BatchTimeout { total: 3, .. }));

    thread::sleep(Duration::from_secs(1));
    assert_eq!(ran.load(Ordering::SeqCst), 3);
}

// ==================== Lifecycle ====================

#[test]
fn test_shutdown_rejects_new_batches() {
    let exec = executor();
    exec.execute_parallel(vec![TransactionTask::noop("t")]).unwrap();

    exec.shutdown();
    assert!(exec.is_shut_down());
    assert!(matches!(
        exec.execute_parallel(vec![TransactionTask::noop("t")]),
        Err(ExecutorError::ShutDown)
    ));
    exec.shutdown();
}

#[test]
fn test_empty_and_accessless_tasks() {
    let exec = executor();

    let empty = exec.execute_parallel(Vec::new()).unwrap();
    assert_eq!(empty.batch_size, 0);
    assert_eq!(empty.group_count, 0);

    let batch: Vec<_> = (0..5).map(|i| TransactionTask::noop(format!("n{i}"))).collect();
    let result = exec.execute_parallel(batch).unwrap();
    assert_eq!(result.success_count, 5);
    assert_eq!(result.group_count, 5);
}

#[test]
fn test_result_serializes() {
    let exec = executor();
    let result = exec
        .execute_parallel(vec![TransactionTask::noop("t").writes(["a"])])
        .unwrap();

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["success_count"], 1);
    assert_eq!(json["incomplete"], false);
}
