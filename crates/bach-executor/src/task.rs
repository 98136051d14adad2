//! Transaction tasks and the address-conflict model

use crate::error::TaskError;
use std::collections::HashSet;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Opaque key identifying a unit of shared ledger state
pub type Address = String;

/// The caller-supplied unit of work behind a task
pub type TaskAction = Arc<dyn Fn() -> Result<(), TaskError> + Send + Sync>;

/// A proposed ledger transaction together with its declared accesses
///
/// Tasks have identity semantics: two tasks with identical fields are still
/// distinct, and the executor only ever refers to them by batch position.
/// An address present in both sets is treated as a write.
#[derive(Clone)]
pub struct TransactionTask {
    id: String,
    read_set: HashSet<Address>,
    write_set: HashSet<Address>,
    priority: i32,
    action: TaskAction,
}

impl TransactionTask {
    /// Create a task with empty access sets and priority 0
    pub fn new<F>(id: impl Into<String>, action: F) -> Self
    where
        F: Fn() -> Result<(), TaskError> + Send + Sync + 'static,
    {
        Self {
            id: id.into(),
            read_set: HashSet::new(),
            write_set: HashSet::new(),
            priority: 0,
            action: Arc::new(action),
        }
    }

    /// Create a task whose action always succeeds
    pub fn noop(id: impl Into<String>) -> Self {
        Self::new(id, || Ok(()))
    }

    /// Add addresses to the read set
    pub fn reads<I, A>(mut self, addresses: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<Address>,
    {
        self.read_set.extend(addresses.into_iter().map(Into::into));
        self
    }

    /// Add addresses to the write set
    pub fn writes<I, A>(mut self, addresses: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<Address>,
    {
        self.write_set.extend(addresses.into_iter().map(Into::into));
        self
    }

    /// Set the scheduling priority (higher runs first)
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Caller-assigned task id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Declared read addresses
    pub fn read_set(&self) -> &HashSet<Address> {
        &self.read_set
    }

    /// Declared write addresses
    pub fn write_set(&self) -> &HashSet<Address> {
        &self.write_set
    }

    /// Scheduling priority
    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// Check if this task reads an address
    pub fn reads_key(&self, address: &str) -> bool {
        self.read_set.contains(address)
    }

    /// Check if this task writes an address
    pub fn writes_key(&self, address: &str) -> bool {
        self.write_set.contains(address)
    }

    /// Check if this task references an address at all
    pub fn touches(&self, address: &str) -> bool {
        self.reads_key(address) || self.writes_key(address)
    }

    /// Addresses that are read but not written
    pub fn read_only(&self) -> impl Iterator<Item = &Address> {
        self.read_set
            .iter()
            .filter(move |addr| !self.write_set.contains(*addr))
    }

    /// Every referenced address, writes first, each once
    pub fn addresses(&self) -> impl Iterator<Item = &Address> {
        self.write_set.iter().chain(self.read_only())
    }

    /// Check if the task declares no accesses
    pub fn is_empty(&self) -> bool {
        self.read_set.is_empty() && self.write_set.is_empty()
    }

    /// Conflict predicate: write-write, read-write or write-read overlap
    pub fn conflicts_with(&self, other: &TransactionTask) -> bool {
        self.write_set.iter().any(|addr| other.write_set.contains(addr))
            || self.read_set.iter().any(|addr| other.write_set.contains(addr))
            || self.write_set.iter().any(|addr| other.read_set.contains(addr))
    }

    /// Get all overlapping addresses with another task, by kind
    pub fn conflicting_addresses(&self, other: &TransactionTask) -> ConflictSet {
        let raw = self.read_set.intersection(&other.write_set).cloned().collect();
        let waw = self.write_set.intersection(&other.write_set).cloned().collect();
        let war = self.write_set.intersection(&other.read_set).cloned().collect();

        ConflictSet { raw, waw, war }
    }

    /// Run the action, converting a panic into [`TaskError::Panicked`]
    pub fn execute(&self) -> Result<(), TaskError> {
        match panic::catch_unwind(AssertUnwindSafe(|| (self.action)())) {
            Ok(outcome) => outcome,
            Err(payload) => Err(TaskError::Panicked(panic_message(payload.as_ref()))),
        }
    }
}

impl fmt::Debug for TransactionTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionTask")
            .field("id", &self.id)
            .field("read_set", &self.read_set)
            .field("write_set", &self.write_set)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Overlapping addresses between two tasks
#[derive(Clone, Debug, Default)]
pub struct ConflictSet {
    /// Read-after-write: read here, written there
    pub raw: HashSet<Address>,
    /// Write-after-write: written by both
    pub waw: HashSet<Address>,
    /// Write-after-read: written here, read there
    pub war: HashSet<Address>,
}

impl ConflictSet {
    /// Check if there are any conflicts
    pub fn has_conflicts(&self) -> bool {
        !self.raw.is_empty() || !self.waw.is_empty() || !self.war.is_empty()
    }

    /// Get total number of conflicting addresses
    pub fn total_conflicts(&self) -> usize {
        self.raw.len() + self.waw.len() + self.war.len()
    }
}
