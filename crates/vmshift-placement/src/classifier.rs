//! Bottleneck classification.
//!
//! A node is a rebalance **source** when any of CPU, memory, or storage
//! usage meets its threshold, and a **target** when CPU and memory are
//! both strictly below theirs. Storage never disqualifies a target, so a
//! storage-only source is also a target; the orchestrator keeps it from
//! being chosen as its own destination.

use std::fmt;

use serde::{Deserialize, Serialize};

use vmshift_core::{NodeRecord, Thresholds};

/// Which resource dimensions of a node are at or over threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Bottleneck {
    pub cpu: bool,
    pub mem: bool,
    pub storage: bool,
}

impl Bottleneck {
    pub fn any(&self) -> bool {
        self.cpu || self.mem || self.storage
    }

    pub fn count(&self) -> usize {
        [self.cpu, self.mem, self.storage]
            .into_iter()
            .filter(|over| *over)
            .count()
    }

    /// Ranking strategy for the node's workloads, or `None` when nothing
    /// is over threshold.
    pub fn strategy(&self) -> Option<Strategy> {
        match (self.cpu, self.mem, self.storage) {
            (false, false, false) => None,
            (false, false, true) => Some(Strategy::DiskPriority),
            (true, false, false) => Some(Strategy::CpuPriority),
            (false, true, false) => Some(Strategy::MemoryPriority),
            _ => Some(Strategy::MultiBottleneck),
        }
    }
}

impl fmt::Display for Bottleneck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = [(self.cpu, "cpu"), (self.mem, "mem"), (self.storage, "storage")]
            .into_iter()
            .filter_map(|(over, name)| over.then_some(name))
            .collect();
        if names.is_empty() {
            f.write_str("none")
        } else {
            f.write_str(&names.join("+"))
        }
    }
}

/// How workloads on a source node are ranked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    DiskPriority,
    CpuPriority,
    MemoryPriority,
    /// Two or more dimensions over threshold. Ranks CPU first.
    MultiBottleneck,
}

impl Strategy {
    pub fn label(&self) -> &'static str {
        match self {
            Strategy::DiskPriority => "disk-priority",
            Strategy::CpuPriority => "cpu-priority",
            Strategy::MemoryPriority => "memory-priority",
            Strategy::MultiBottleneck => "multi-bottleneck",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

pub fn classify(node: &NodeRecord, thresholds: &Thresholds) -> Bottleneck {
    Bottleneck {
        cpu: node.cpu_used_pct >= thresholds.cpu_pct,
        mem: node.mem_used_pct >= thresholds.mem_pct,
        storage: node.storage_used_pct >= thresholds.storage_pct,
    }
}

/// Whether `node` may receive a workload. Storage usage is not considered.
pub fn is_target(node: &NodeRecord, thresholds: &Thresholds) -> bool {
    node.cpu_used_pct < thresholds.cpu_pct && node.mem_used_pct < thresholds.mem_pct
}

/// Nodes split into the two roles of a cycle.
#[derive(Debug, Clone, Default)]
pub struct Partition {
    /// Overloaded nodes, highest `load_index` first.
    pub sources: Vec<(NodeRecord, Bottleneck)>,
    /// Candidate destinations, lowest `load_index` first.
    pub targets: Vec<NodeRecord>,
}

/// Classify every node and order both roles. Ties keep input order.
pub fn partition(nodes: &[NodeRecord], thresholds: &Thresholds) -> Partition {
    let mut sources: Vec<(NodeRecord, Bottleneck)> = nodes
        .iter()
        .map(|n| (n.clone(), classify(n, thresholds)))
        .filter(|(_, b)| b.any())
        .collect();
    sources.sort_by(|(a, _), (b, _)| b.load_index.total_cmp(&a.load_index));

    let mut targets: Vec<NodeRecord> = nodes
        .iter()
        .filter(|n| is_target(n, thresholds))
        .cloned()
        .collect();
    targets.sort_by(|a, b| a.load_index.total_cmp(&b.load_index));

    Partition { sources, targets }
}
