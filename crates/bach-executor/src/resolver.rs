//! Runtime guard over in-flight addresses
//!
//! Before a task runs it claims its write addresses exclusively and its
//! read-only addresses shared. A claim that would overlap another in-flight
//! task is refused and reported as an [`AddressConflict`]; nothing is retried
//! here. Claims are held by an [`InFlightGuard`] and released when it drops.

use crate::error::AddressConflict;
use crate::task::{Address, TransactionTask};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Claim {
    Write,
    Read(usize),
}

/// Table of addresses claimed by running tasks
pub struct ConflictResolver {
    in_flight: DashMap<Address, Claim>,
}

impl ConflictResolver {
    /// Create a resolver with nothing in flight
    pub fn new() -> Self {
        Self {
            in_flight: DashMap::new(),
        }
    }

    /// Check, without claiming, whether `task` would conflict right now
    pub fn has_conflict(&self, task: &TransactionTask) -> bool {
        task.write_set()
            .iter()
            .any(|addr| self.in_flight.contains_key(addr))
            || task.read_only().any(|addr| self.is_write_claimed(addr))
    }

    /// Claim every address of `task`
    ///
    /// Either all claims succeed and a guard holding them is returned, or
    /// the claims taken so far are rolled back and the first contested
    /// address is reported.
    pub fn try_acquire(&self, task: &TransactionTask) -> Result<InFlightGuard<'_>, AddressConflict> {
        let mut guard = InFlightGuard {
            resolver: self,
            writes: Vec::with_capacity(task.write_set().len()),
            reads: Vec::new(),
        };

        for addr in task.write_set() {
            let claimed = match self.in_flight.entry(addr.clone()) {
                Entry::Occupied(_) => false,
                Entry::Vacant(entry) => {
                    entry.insert(Claim::Write);
                    true
                }
            };
            if !claimed {
                return Err(refuse(task, addr));
            }
            guard.writes.push(addr.clone());
        }

        for addr in task.read_only() {
            let claimed = match self.in_flight.entry(addr.clone()) {
                Entry::Occupied(mut entry) => match entry.get_mut() {
                    Claim::Write => false,
                    Claim::Read(readers) => {
                        *readers += 1;
                        true
                    }
                },
                Entry::Vacant(entry) => {
                    entry.insert(Claim::Read(1));
                    true
                }
            };
            if !claimed {
                return Err(refuse(task, addr));
            }
            guard.reads.push(addr.clone());
        }

        Ok(guard)
    }

    fn release_write(&self, addr: &Address) {
        self.in_flight
            .remove_if(addr, |_, claim| *claim == Claim::Write);
    }

    fn release_read(&self, addr: &Address) {
        if let Entry::Occupied(mut entry) = self.in_flight.entry(addr.clone()) {
            let remaining = match entry.get_mut() {
                Claim::Read(readers) => {
                    *readers = readers.saturating_sub(1);
                    *readers
                }
                Claim::Write => return,
            };
            if remaining == 0 {
                entry.remove();
            }
        }
    }

    /// Check if an address is held for writing
    pub fn is_write_claimed(&self, addr: &str) -> bool {
        self.in_flight
            .get(addr)
            .map(|claim| *claim == Claim::Write)
            .unwrap_or(false)
    }

    /// Number of tasks currently reading an address
    pub fn reader_count(&self, addr: &str) -> usize {
        match self.in_flight.get(addr).map(|claim| *claim) {
            Some(Claim::Read(readers)) => readers,
            _ => 0,
        }
    }

    /// Number of addresses currently claimed
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Check if nothing is claimed
    pub fn is_idle(&self) -> bool {
        self.in_flight.is_empty()
    }
}

impl Default for ConflictResolver {
    fn default() -> Self {
        Self::new()
    }
}

fn refuse(task: &TransactionTask, addr: &str) -> AddressConflict {
    AddressConflict {
        task: task.id().to_string(),
        address: addr.to_string(),
    }
}

/// Claims held by one running task; released on drop
#[must_use = "claims are released as soon as the guard is dropped"]
pub struct InFlightGuard<'a> {
    resolver: &'a ConflictResolver,
    writes: Vec<Address>,
    reads: Vec<Address>,
}

impl InFlightGuard<'_> {
    /// Number of addresses held by this guard
    pub fn len(&self) -> usize {
        self.writes.len() + self.reads.len()
    }

    /// Check if the guard holds nothing
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty() && self.reads.is_empty()
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        for addr in &self.writes {
            self.resolver.release_write(addr);
        }
        for addr in &self.reads {
            self.resolver.release_read(addr);
        }
    }
}
