//! Subcommand implementations

pub mod partition;
pub mod run;

use bach_executor::{DispatchMode, GroupingAlgorithm, TimeoutPolicy};
use clap::Args;

use crate::config::Config;

/// Flags that override the `[executor]` and `[workload]` config tables
#[derive(Debug, Default, Args)]
pub struct WorkloadArgs {
    /// Tasks per batch
    #[arg(long)]
    pub tasks: Option<usize>,
    /// Number of batches
    #[arg(long)]
    pub batches: Option<usize>,
    /// Size of the address pool
    #[arg(long)]
    pub addresses: Option<usize>,
    /// Addresses touched by each task
    #[arg(long)]
    pub accesses: Option<usize>,
    /// Probability that a touched address is written
    #[arg(long)]
    pub write_ratio: Option<f64>,
    /// Probability that an action fails
    #[arg(long)]
    pub failure_rate: Option<f64>,
    /// Simulated work per action in microseconds
    #[arg(long)]
    pub work_us: Option<u64>,
    /// RNG seed
    #[arg(long)]
    pub seed: Option<u64>,
    /// Grouping algorithm (legacy, optimized-hash, union-find)
    #[arg(long)]
    pub algorithm: Option<GroupingAlgorithm>,
    /// Run greedy groups one at a time
    #[arg(long)]
    pub waves: bool,
    /// Whole-batch deadline in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,
    /// Report partial results when the deadline passes
    #[arg(long)]
    pub partial: bool,
}

impl WorkloadArgs {
    /// Apply the flags that were given on top of `config`
    pub fn apply(&self, config: &mut Config) {
        let workload = &mut config.workload;
        if let Some(tasks) = self.tasks {
            workload.tasks = tasks;
        }
        if let Some(batches) = self.batches {
            workload.batches = batches;
        }
        if let Some(addresses) = self.addresses {
            workload.addresses = addresses;
        }
        if let Some(accesses) = self.accesses {
            workload.accesses_per_task = accesses;
        }
        if let Some(ratio) = self.write_ratio {
            workload.write_ratio = ratio;
        }
        if let Some(rate) = self.failure_rate {
            workload.failure_rate = rate;
        }
        if let Some(work) = self.work_us {
            workload.work_us = work;
        }
        if self.seed.is_some() {
            workload.seed = self.seed;
        }

        let executor = &mut config.executor;
        if let Some(algorithm) = self.algorithm {
            executor.algorithm = algorithm;
        }
        if self.waves {
            executor.dispatch = DispatchMode::Waves;
        }
        if let Some(ms) = self.timeout_ms {
            executor.batch_timeout_ms = ms;
        }
        if self.partial {
            executor.timeout_policy = TimeoutPolicy::ReturnPartial;
        }
    }
}
