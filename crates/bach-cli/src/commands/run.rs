//! `run`: execute generated batches and report results

use bach_executor::{ExecutionResult, ExecutionStatistics, ParallelExecutor};
use tracing::info;

use crate::{config::Config, output::Output, workload::WorkloadGenerator, CliError};

/// Run every configured batch through one executor
pub fn execute(config: &Config, json: bool) -> Result<(), CliError> {
    config.validate()?;

    let executor = ParallelExecutor::new(config.executor.clone())?;
    let mut generator = WorkloadGenerator::new(config.workload.clone())?;
    info!(
        batches = config.workload.batches,
        tasks = config.workload.tasks,
        algorithm = %config.executor.algorithm,
        "running synthetic workload"
    );

    let mut results = Vec::with_capacity(config.workload.batches);
    for batch_no in 0..config.workload.batches {
        let batch = generator.next_batch(batch_no);
        results.push(executor.execute_parallel(batch)?);
    }
    let stats = executor.statistics();
    executor.shutdown();

    let mut out = Output::new(json)
        .field("algorithm", config.executor.algorithm.as_str())
        .field_serde("results", &results)
        .field_serde("statistics", &stats);
    for (batch_no, result) in results.iter().enumerate() {
        out = out.line(describe_batch(batch_no, result));
    }
    out.line(describe_stats(&stats)).print();
    Ok(())
}

fn describe_batch(batch_no: usize, result: &ExecutionResult) -> String {
    let mut line = format!(
        "Batch {}: {} tasks in {} groups, {} succeeded, {} failed ({} conflicts), {:.3} ms, {:.0} tx/s",
        batch_no,
        result.batch_size,
        result.group_count,
        result.success_count,
        result.failed_count,
        result.conflict_count,
        result.elapsed_ms(),
        result.throughput,
    );
    if result.incomplete {
        line.push_str(" [incomplete]");
    }
    line
}

fn describe_stats(stats: &ExecutionStatistics) -> String {
    format!(
        "Total: {} batches, {} executed, {} failed, {} conflicts, avg {:.0} tx/s, mean latency {:.1} us",
        stats.total_batches,
        stats.total_executed,
        stats.total_failed,
        stats.total_conflicts,
        stats.average_throughput,
        stats.mean_batch_latency_us,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_describe_batch() {
        let result = ExecutionResult {
            success_count: 9,
            failed_count: 1,
            conflict_count: 1,
            group_count: 3,
            batch_size: 10,
            elapsed: Duration::from_millis(2),
            throughput: 5_000.0,
            incomplete: true,
        };
        let line = describe_batch(4, &result);
        assert!(line.starts_with("Batch 4: 10 tasks in 3 groups"));
        assert!(line.contains("(1 conflicts)"));
        assert!(line.ends_with("[incomplete]"));
    }
}
