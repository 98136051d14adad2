//! Priority ordering applied before partitioning

use crate::task::TransactionTask;

/// Reorders a batch by descending priority
///
/// The sort is stable: tasks with equal priority keep their submission order.
#[derive(Clone, Copy, Debug, Default)]
pub struct TransactionScheduler;

impl TransactionScheduler {
    /// Create a scheduler
    pub fn new() -> Self {
        Self
    }

    /// Batch positions in execution order
    pub fn order(&self, batch: &[TransactionTask]) -> Vec<usize> {
        let mut order: Vec<usize> = (0..batch.len()).collect();
        order.sort_by_key(|&i| std::cmp::Reverse(batch[i].priority()));
        order
    }

    /// Return the batch in execution order
    pub fn optimize_schedule(&self, batch: Vec<TransactionTask>) -> Vec<TransactionTask> {
        let mut batch = batch;
        batch.sort_by_key(|task| std::cmp::Reverse(task.priority()));
        batch
    }
}
