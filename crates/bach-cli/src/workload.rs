//! Synthetic transaction workloads

use bach_executor::{TaskError, TransactionTask};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::thread;
use std::time::Duration;

use crate::CliError;

/// Shape of the generated batches
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkloadConfig {
    /// Tasks per batch
    #[serde(default = "default_tasks")]
    pub tasks: usize,
    /// Number of batches to run
    #[serde(default = "default_batches")]
    pub batches: usize,
    /// Size of the address pool; smaller pools mean more conflicts
    #[serde(default = "default_addresses")]
    pub addresses: usize,
    /// Addresses touched by each task
    #[serde(default = "default_accesses")]
    pub accesses_per_task: usize,
    /// Probability that a touched address is written rather than read
    #[serde(default = "default_write_ratio")]
    pub write_ratio: f64,
    /// Probability that a task's action fails
    #[serde(default)]
    pub failure_rate: f64,
    /// Simulated work per action, in microseconds
    #[serde(default)]
    pub work_us: u64,
    /// RNG seed; random when unset
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_tasks() -> usize {
    1_000
}

fn default_batches() -> usize {
    1
}

fn default_addresses() -> usize {
    256
}

fn default_accesses() -> usize {
    2
}

fn default_write_ratio() -> f64 {
    0.5
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            tasks: default_tasks(),
            batches: default_batches(),
            addresses: default_addresses(),
            accesses_per_task: default_accesses(),
            write_ratio: default_write_ratio(),
            failure_rate: 0.0,
            work_us: 0,
            seed: None,
        }
    }
}

impl WorkloadConfig {
    /// Reject values the generator cannot use
    pub fn validate(&self) -> Result<(), CliError> {
        if self.addresses == 0 {
            return Err(CliError::InvalidInput(
                "addresses must be greater than zero".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.write_ratio) {
            return Err(CliError::InvalidInput(format!(
                "write_ratio must be within [0, 1], got {}",
                self.write_ratio
            )));
        }
        if !(0.0..=1.0).contains(&self.failure_rate) {
            return Err(CliError::InvalidInput(format!(
                "failure_rate must be within [0, 1], got {}",
                self.failure_rate
            )));
        }
        // TOML integers are signed 64-bit
        if let Some(seed) = self.seed.filter(|&seed| seed > i64::MAX as u64) {
            return Err(CliError::InvalidInput(format!(
                "seed must not exceed {}, got {seed}",
                i64::MAX
            )));
        }
        Ok(())
    }
}

/// Produces batches of tasks with random access sets
pub struct WorkloadGenerator {
    config: WorkloadConfig,
    rng: StdRng,
}

impl WorkloadGenerator {
    /// Create a generator, seeded from the config when a seed is set
    pub fn new(config: WorkloadConfig) -> Result<Self, CliError> {
        config.validate()?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self { config, rng })
    }

    /// Generate the next batch; `batch` only feeds into task ids
    pub fn next_batch(&mut self, batch: usize) -> Vec<TransactionTask> {
        (0..self.config.tasks)
            .map(|i| self.next_task(format!("b{batch}-tx{i}")))
            .collect()
    }

    fn next_task(&mut self, id: String) -> TransactionTask {
        let mut reads = Vec::new();
        let mut writes = Vec::new();
        for _ in 0..self.config.accesses_per_task {
            let address = format!("acct{}", self.rng.gen_range(0..self.config.addresses));
            if self.rng.gen_bool(self.config.write_ratio) {
                writes.push(address);
            } else {
                reads.push(address);
            }
        }

        let fails = self.rng.gen_bool(self.config.failure_rate);
        let priority = self.rng.gen_range(0..4);
        let work = Duration::from_micros(self.config.work_us);

        TransactionTask::new(id, move || {
            if !work.is_zero() {
                thread::sleep(work);
            }
            if fails {
                return Err(TaskError::failed("synthetic failure"));
            }
            Ok(())
        })
        .reads(reads)
        .writes(writes)
        .with_priority(priority)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded(seed: u64) -> WorkloadConfig {
        WorkloadConfig {
            tasks: 50,
            addresses: 10,
            seed: Some(seed),
            ..WorkloadConfig::default()
        }
    }

    fn shape(batch: &[TransactionTask]) -> Vec<(Vec<String>, Vec<String>, i32)> {
        batch
            .iter()
            .map(|t| {
                let mut reads: Vec<_> = t.read_set().iter().cloned().collect();
                let mut writes: Vec<_> = t.write_set().iter().cloned().collect();
                reads.sort();
                writes.sort();
                (reads, writes, t.priority())
            })
            .collect()
    }

    #[test]
    fn test_seed_is_deterministic() {
        let a = WorkloadGenerator::new(seeded(7)).unwrap().next_batch(0);
        let b = WorkloadGenerator::new(seeded(7)).unwrap().next_batch(0);
        assert_eq!(a.len(), 50);
        assert_eq!(shape(&a), shape(&b));
    }

    #[test]
    fn test_addresses_come_from_pool() {
        let batch = WorkloadGenerator::new(seeded(1)).unwrap().next_batch(3);
        assert!(batch[0].id().starts_with("b3-"));
        for task in &batch {
            for addr in task.addresses() {
                let n: usize = addr.trim_start_matches("acct").parse().unwrap();
                assert!(n < 10);
            }
        }
    }

    #[test]
    fn test_write_ratio_extremes() {
        let mut config = seeded(3);
        config.write_ratio = 0.0;
        let batch = WorkloadGenerator::new(config.clone()).unwrap().next_batch(0);
        assert!(batch.iter().all(|t| t.write_set().is_empty()));

        config.write_ratio = 1.0;
        let batch = WorkloadGenerator::new(config).unwrap().next_batch(0);
        assert!(batch.iter().all(|t| t.read_set().is_empty()));
    }

    #[test]
    fn test_failure_rate_one_fails_everything() {
        let mut config = seeded(5);
        config.failure_rate = 1.0;
        let batch = WorkloadGenerator::new(config).unwrap().next_batch(0);
        assert!(batch.iter().all(|t| t.execute().is_err()));
    }

    #[test]
    fn test_validation() {
        let mut config = WorkloadConfig::default();
        config.write_ratio = 1.5;
        assert!(WorkloadGenerator::new(config).is_err());

        let config = WorkloadConfig {
            addresses: 0,
            ..WorkloadConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_seed_must_fit_toml_integer() {
        let config = seeded(u64::MAX);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("seed"));

        let config = seeded(i64::MAX as u64);
        assert!(config.validate().is_ok());
        let text = toml::to_string(&config).unwrap();
        let back: WorkloadConfig = toml::from_str(&text).unwrap();
        assert_eq!(back.seed, Some(i64::MAX as u64));
    }

    #[test]
    fn test_deserialize_partial() {
        let config: WorkloadConfig = toml::from_str("tasks = 10\nseed = 42").unwrap();
        assert_eq!(config.tasks, 10);
        assert_eq!(config.seed, Some(42));
        assert_eq!(config.addresses, 256);
    }
}
