//! Batch partitioning strategies
//!
//! Three interchangeable algorithms turn an ordered batch into groups:
//!
//! - [`GroupingAlgorithm::Legacy`]: greedy pairwise admission, O(n²) conflict tests.
//! - [`GroupingAlgorithm::OptimizedHash`]: the same greedy rule driven by
//!   address→task reverse indices, O(n) average with bounded address fan-out.
//! - [`GroupingAlgorithm::UnionFind`]: connected components of the conflict
//!   relation, O(n·α(n)) after index construction.
//!
//! The first two guarantee that members of one group never conflict with each
//! other but say nothing about different groups. Union-Find guarantees the
//! opposite: no address is shared between components, while members of one
//! component may conflict. See [`GroupSemantics`].

use crate::task::TransactionTask;
use crate::union_find::UnionFind;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Algorithm used to partition a batch
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GroupingAlgorithm {
    /// Pairwise greedy admission
    Legacy,
    /// Index-driven greedy admission
    OptimizedHash,
    /// Disjoint-set components
    #[default]
    UnionFind,
}

impl GroupingAlgorithm {
    /// Every algorithm, in declaration order
    pub const ALL: [GroupingAlgorithm; 3] = [
        GroupingAlgorithm::Legacy,
        GroupingAlgorithm::OptimizedHash,
        GroupingAlgorithm::UnionFind,
    ];

    /// Stable name used in configuration and output
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupingAlgorithm::Legacy => "legacy",
            GroupingAlgorithm::OptimizedHash => "optimized-hash",
            GroupingAlgorithm::UnionFind => "union-find",
        }
    }

    /// What the produced groups guarantee
    pub fn semantics(&self) -> GroupSemantics {
        match self {
            GroupingAlgorithm::Legacy | GroupingAlgorithm::OptimizedHash => {
                GroupSemantics::PairwiseIndependent
            }
            GroupingAlgorithm::UnionFind => GroupSemantics::MutuallyIndependent,
        }
    }

    pub(crate) fn to_u8(self) -> u8 {
        match self {
            GroupingAlgorithm::Legacy => 0,
            GroupingAlgorithm::OptimizedHash => 1,
            GroupingAlgorithm::UnionFind => 2,
        }
    }

    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            0 => GroupingAlgorithm::Legacy,
            1 => GroupingAlgorithm::OptimizedHash,
            _ => GroupingAlgorithm::UnionFind,
        }
    }
}

impl fmt::Display for GroupingAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown algorithm name
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown grouping algorithm '{0}' (expected legacy, optimized-hash or union-find)")]
pub struct ParseAlgorithmError(pub String);

impl FromStr for GroupingAlgorithm {
    type Err = ParseAlgorithmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "legacy" => Ok(GroupingAlgorithm::Legacy),
            "optimized-hash" | "hash" => Ok(GroupingAlgorithm::OptimizedHash),
            "union-find" | "unionfind" => Ok(GroupingAlgorithm::UnionFind),
            _ => Err(ParseAlgorithmError(s.to_string())),
        }
    }
}

/// Guarantee carried by the groups of a partition
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GroupSemantics {
    /// Members of a group are pairwise conflict-free; groups may conflict
    PairwiseIndependent,
    /// Groups share no address; members of a group may conflict
    MutuallyIndependent,
}

/// One group of a partition, as batch positions in batch order
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Group {
    /// Position of this group in the partition
    pub index: usize,
    /// Batch positions of the members
    pub members: Vec<usize>,
}

impl Group {
    /// Get number of members
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Check if the group is empty
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Result of partitioning a batch
#[derive(Clone, Debug)]
pub struct Partition {
    algorithm: GroupingAlgorithm,
    groups: Vec<Group>,
    task_count: usize,
}

impl Partition {
    fn new(algorithm: GroupingAlgorithm, members: Vec<Vec<usize>>, task_count: usize) -> Self {
        let groups = members
            .into_iter()
            .enumerate()
            .map(|(index, members)| Group { index, members })
            .collect();
        Self {
            algorithm,
            groups,
            task_count,
        }
    }

    /// Algorithm that produced this partition
    pub fn algorithm(&self) -> GroupingAlgorithm {
        self.algorithm
    }

    /// Guarantee carried by the groups
    pub fn semantics(&self) -> GroupSemantics {
        self.algorithm.semantics()
    }

    /// Groups in output order
    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    /// Consume the partition, returning its groups
    pub fn into_groups(self) -> Vec<Group> {
        self.groups
    }

    /// Number of groups
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Check if there are no groups
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Number of tasks partitioned
    pub fn task_count(&self) -> usize {
        self.task_count
    }

    /// Size of the largest group
    pub fn max_group_size(&self) -> usize {
        self.groups.iter().map(Group::len).max().unwrap_or(0)
    }

    /// Tasks per group (0.0 for an empty partition)
    pub fn parallelism_ratio(&self) -> f64 {
        if self.groups.is_empty() {
            return 0.0;
        }
        self.task_count as f64 / self.groups.len() as f64
    }

    /// Groups as sets of member positions, for order-insensitive comparison
    pub fn as_sets(&self) -> HashSet<Vec<usize>> {
        self.groups
            .iter()
            .map(|g| {
                let mut members = g.members.clone();
                members.sort_unstable();
                members
            })
            .collect()
    }
}

/// Partition `tasks` with the given algorithm
pub fn partition(algorithm: GroupingAlgorithm, tasks: &[TransactionTask]) -> Partition {
    let groups = match algorithm {
        GroupingAlgorithm::Legacy => legacy_groups(tasks),
        GroupingAlgorithm::OptimizedHash => hashed_groups(tasks),
        GroupingAlgorithm::UnionFind => union_find_groups(tasks),
    };
    Partition::new(algorithm, groups, tasks.len())
}

/// Reverse indices from address to the batch positions that read or write it
#[derive(Debug, Default)]
pub struct AddressIndex<'a> {
    readers: HashMap<&'a str, Vec<usize>>,
    writers: HashMap<&'a str, Vec<usize>>,
}

impl<'a> AddressIndex<'a> {
    /// Build the read and write indices for a batch
    pub fn build(tasks: &'a [TransactionTask]) -> Self {
        let mut index = Self::default();
        for (i, task) in tasks.iter().enumerate() {
            for addr in task.read_set() {
                index.readers.entry(addr.as_str()).or_default().push(i);
            }
            for addr in task.write_set() {
                index.writers.entry(addr.as_str()).or_default().push(i);
            }
        }
        index
    }

    /// Positions that read `address`
    pub fn readers(&self, address: &str) -> &[usize] {
        self.readers.get(address).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Positions that write `address`
    pub fn writers(&self, address: &str) -> &[usize] {
        self.writers.get(address).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every other position that conflicts with `tasks[i]`
    pub fn conflicts_of(&self, tasks: &[TransactionTask], i: usize) -> HashSet<usize> {
        let task = &tasks[i];
        let mut conflicts = HashSet::new();

        for addr in task.write_set() {
            conflicts.extend(self.writers(addr));
            conflicts.extend(self.readers(addr));
        }
        for addr in task.read_set() {
            conflicts.extend(self.writers(addr));
        }

        conflicts.remove(&i);
        conflicts
    }

    /// Number of distinct addresses referenced by the batch
    pub fn address_count(&self) -> usize {
        self.readers
            .keys()
            .chain(self.writers.keys())
            .collect::<HashSet<_>>()
            .len()
    }
}

fn legacy_groups(tasks: &[TransactionTask]) -> Vec<Vec<usize>> {
    let mut groups = Vec::new();
    let mut processed = vec![false; tasks.len()];

    for start in 0..tasks.len() {
        if processed[start] {
            continue;
        }

        let mut group = vec![start];
        processed[start] = true;

        for candidate in (start + 1)..tasks.len() {
            if processed[candidate] {
                continue;
            }

            let has_conflict = group
                .iter()
                .any(|&member| tasks[candidate].conflicts_with(&tasks[member]));

            if !has_conflict {
                group.push(candidate);
                processed[candidate] = true;
            }
        }

        groups.push(group);
    }

    groups
}

fn hashed_groups(tasks: &[TransactionTask]) -> Vec<Vec<usize>> {
    let index = AddressIndex::build(tasks);
    let conflict_graph: Vec<HashSet<usize>> = (0..tasks.len())
        .map(|i| index.conflicts_of(tasks, i))
        .collect();

    let mut groups = Vec::new();
    let mut processed = vec![false; tasks.len()];
    // Union of the members' conflict sets; the relation is symmetric, so a
    // candidate conflicts with some member iff it is blocked.
    let mut blocked: HashSet<usize> = HashSet::new();

    for start in 0..tasks.len() {
        if processed[start] {
            continue;
        }

        let mut group = vec![start];
        processed[start] = true;
        blocked.clear();
        blocked.extend(&conflict_graph[start]);

        for candidate in (start + 1)..tasks.len() {
            if processed[candidate] || blocked.contains(&candidate) {
                continue;
            }
            group.push(candidate);
            processed[candidate] = true;
            blocked.extend(&conflict_graph[candidate]);
        }

        groups.push(group);
    }

    groups
}

fn union_find_groups(tasks: &[TransactionTask]) -> Vec<Vec<usize>> {
    if tasks.is_empty() {
        return Vec::new();
    }

    let index = AddressIndex::build(tasks);
    let mut uf = UnionFind::new(tasks.len());

    // Every task touching an address with at least one writer conflicts with
    // that writer, so chaining them all onto the first writer yields the same
    // closure as unioning every conflicting pair.
    for (addr, writers) in &index.writers {
        let anchor = writers[0];
        for &w in &writers[1..] {
            uf.union(anchor, w);
        }
        for &r in index.readers(addr) {
            uf.union(anchor, r);
        }
    }

    let mut slot_of_root: HashMap<usize, usize> = HashMap::new();
    let mut groups: Vec<Vec<usize>> = Vec::with_capacity(uf.component_count());
    for i in 0..tasks.len() {
        let root = uf.find(i);
        let slot = *slot_of_root.entry(root).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[slot].push(i);
    }

    groups
}
