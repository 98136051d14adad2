//! `partition`: compare grouping algorithms on one generated batch

use bach_executor::{partition, GroupingAlgorithm, TransactionScheduler};
use serde::Serialize;

use crate::{config::Config, output::Output, workload::WorkloadGenerator, CliError};

/// Partition summary for one algorithm
#[derive(Debug, Serialize)]
pub struct PartitionSummary {
    /// Algorithm name
    pub algorithm: &'static str,
    /// Number of groups
    pub groups: usize,
    /// Largest group
    pub max_group_size: usize,
    /// Tasks per group
    pub parallelism_ratio: f64,
}

/// Partition one batch with every algorithm
pub fn summarize(config: &Config) -> Result<Vec<PartitionSummary>, CliError> {
    let mut generator = WorkloadGenerator::new(config.workload.clone())?;
    let batch = TransactionScheduler::new().optimize_schedule(generator.next_batch(0));

    Ok(GroupingAlgorithm::ALL
        .into_iter()
        .map(|algorithm| {
            let p = partition(algorithm, &batch);
            PartitionSummary {
                algorithm: algorithm.as_str(),
                groups: p.len(),
                max_group_size: p.max_group_size(),
                parallelism_ratio: p.parallelism_ratio(),
            }
        })
        .collect())
}

/// Print the partition summaries
pub fn execute(config: &Config, json: bool) -> Result<(), CliError> {
    config.workload.validate()?;
    let summaries = summarize(config)?;

    let mut out = Output::new(json)
        .field_u64("tasks", config.workload.tasks as u64)
        .field_serde("partitions", &summaries)
        .line(format!("{} tasks over {} addresses", config.workload.tasks, config.workload.addresses));
    for s in &summaries {
        out = out.line(format!(
            "{:<15} {:>6} groups, largest {:>6}, ratio {:.2}",
            s.algorithm, s.groups, s.max_group_size, s.parallelism_ratio
        ));
    }
    out.print();
    Ok(())
}
