//! Candidate selection — which workload leaves the source node.
//!
//! Workloads are ranked by a strategy-specific list of keys, all
//! descending:
//!
//! ```text
//! disk-priority     used_storage_gb,   configured_mem_gb, cpu_load_mhz
//! cpu-priority      cpu_load_mhz,      mem_usage_kb
//! memory-priority   configured_mem_gb, mem_usage_kb,      cpu_load_mhz
//! multi-bottleneck  cpu_load_mhz,      configured_mem_gb, used_storage_gb
//! ```
//!
//! When CPU is the only bottleneck and even the top workload burns less
//! than [`LOW_CPU_SIGNAL_MHZ`], the CPU ranking carries no information
//! and the memory-priority order is used instead. Configured memory and
//! used disk are always trustworthy, so the other strategies have no
//! such fallback.

use std::cmp::Ordering;

use tracing::debug;

use vmshift_core::WorkloadRecord;

use crate::classifier::Strategy;

/// CPU load below which a CPU-priority pick is considered idle.
pub const LOW_CPU_SIGNAL_MHZ: f64 = 10.0;

#[derive(Debug, Clone, Copy)]
enum Key {
    CpuLoad,
    MemUsage,
    ConfiguredMem,
    UsedStorage,
}

impl Key {
    fn value(self, w: &WorkloadRecord) -> f64 {
        match self {
            Key::CpuLoad => w.cpu_load_mhz,
            Key::MemUsage => w.mem_usage_kb,
            Key::ConfiguredMem => w.configured_mem_gb,
            Key::UsedStorage => w.used_storage_gb,
        }
    }
}

fn keys(strategy: Strategy) -> &'static [Key] {
    match strategy {
        Strategy::DiskPriority => &[Key::UsedStorage, Key::ConfiguredMem, Key::CpuLoad],
        Strategy::CpuPriority => &[Key::CpuLoad, Key::MemUsage],
        Strategy::MemoryPriority => &[Key::ConfiguredMem, Key::MemUsage, Key::CpuLoad],
        Strategy::MultiBottleneck => &[Key::CpuLoad, Key::ConfiguredMem, Key::UsedStorage],
    }
}

fn compare(strategy: Strategy, a: &WorkloadRecord, b: &WorkloadRecord) -> Ordering {
    keys(strategy)
        .iter()
        .map(|k| k.value(b).total_cmp(&k.value(a)))
        .find(|o| o.is_ne())
        .unwrap_or(Ordering::Equal)
}

/// The workload picked for relocation and how it was picked.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub workload: WorkloadRecord,
    /// Strategy derived from the node's bottleneck.
    pub strategy: Strategy,
    /// Key order that produced the pick. Differs from `strategy` only
    /// after the low-CPU re-rank.
    pub ranking: Strategy,
}

impl Selection {
    pub fn reranked(&self) -> bool {
        self.strategy != self.ranking
    }
}

/// Rank workloads that carry any signal, best candidate first.
///
/// Ties on every key keep the input order.
pub fn rank(workloads: &[WorkloadRecord], strategy: Strategy) -> Vec<&WorkloadRecord> {
    let mut ranked: Vec<&WorkloadRecord> = workloads.iter().filter(|w| w.has_signal()).collect();
    ranked.sort_by(|a, b| compare(strategy, a, b));
    ranked
}

/// Pick the workload to relocate, or `None` when no workload qualifies.
pub fn select_candidate(workloads: &[WorkloadRecord], strategy: Strategy) -> Option<Selection> {
    let ranked = rank(workloads, strategy);
    let top = *ranked.first()?;

    if strategy == Strategy::CpuPriority && top.cpu_load_mhz < LOW_CPU_SIGNAL_MHZ {
        let fallback = *rank(workloads, Strategy::MemoryPriority).first()?;
        debug!(
            discarded = %top.name,
            cpu_mhz = top.cpu_load_mhz,
            picked = %fallback.name,
            "top cpu candidate below signal floor, re-ranked by memory"
        );
        return Some(Selection {
            workload: fallback.clone(),
            strategy,
            ranking: Strategy::MemoryPriority,
        });
    }

    Some(Selection {
        workload: top.clone(),
        strategy,
        ranking: strategy,
    })
}
