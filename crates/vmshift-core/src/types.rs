//! Domain types for a single rebalance cycle.
//!
//! Records are derived from one telemetry snapshot, live for one
//! invocation, and are never persisted. The `Outcome` is the only thing
//! a cycle reports back to its caller.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Unique name of a compute node in the cluster.
pub type NodeName = String;

/// Unique name of a workload (guest VM).
pub type WorkloadName = String;

// ── Node ──────────────────────────────────────────────────────────

/// Usage and capacity of one compute node for the current cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub name: NodeName,
    /// Averaged CPU usage over the statistics window (percent).
    pub cpu_used_pct: f64,
    /// Averaged memory usage over the statistics window (percent).
    pub mem_used_pct: f64,
    /// Usage of the representative local volume (percent).
    pub storage_used_pct: f64,
    /// Name of the representative local volume.
    pub volume: String,
    /// Free space on the representative volume (GB).
    pub max_free_storage_gb: f64,
    /// `cpu_used_pct + mem_used_pct`. Only used to order nodes.
    pub load_index: f64,
    pub total_ram_gb: f64,
    pub used_ram_gb: f64,
    pub total_cpu_mhz: f64,
    pub used_cpu_mhz: f64,
}

impl NodeRecord {
    pub fn free_ram_gb(&self) -> f64 {
        self.total_ram_gb - self.used_ram_gb
    }

    /// CPU usage in percent after adding `extra_mhz` on top of current usage.
    ///
    /// Returns `None` when the node reports no CPU capacity.
    pub fn projected_cpu_pct(&self, extra_mhz: f64) -> Option<f64> {
        if self.total_cpu_mhz <= 0.0 {
            return None;
        }
        Some((self.used_cpu_mhz + extra_mhz) * 100.0 / self.total_cpu_mhz)
    }

    /// Charge a planned move against this node's absolute counters.
    pub fn reserve(&mut self, workload: &WorkloadRecord) {
        self.used_ram_gb += workload.configured_mem_gb;
        self.used_cpu_mhz += workload.cpu_load_mhz;
        self.max_free_storage_gb -= workload.used_storage_gb;
    }
}

// ── Workload ──────────────────────────────────────────────────────

/// Resource footprint of one running workload on a source node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkloadRecord {
    pub name: WorkloadName,
    /// Active CPU consumption (MHz).
    pub cpu_load_mhz: f64,
    /// Active memory as reported by the guest counter (KB). Not trusted
    /// as a primary ranking key.
    pub mem_usage_kb: f64,
    /// Provisioned memory (GB).
    pub configured_mem_gb: f64,
    /// Disk space actually consumed (GB).
    pub used_storage_gb: f64,
}

impl WorkloadRecord {
    /// Whether any of the live metrics carries a positive value.
    pub fn has_signal(&self) -> bool {
        self.cpu_load_mhz > 0.0 || self.mem_usage_kb > 0.0 || self.used_storage_gb > 0.0
    }
}

// ── Outcome ───────────────────────────────────────────────────────

/// Result of one rebalance cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    /// Another relocation is already in flight; nothing was analysed.
    DeferredLockHeld,
    /// No node is over any threshold.
    NoActionNeeded,
    /// Some node is overloaded but no node is under both CPU and memory
    /// thresholds.
    NoTargetAvailable,
    /// A relocation was handed to the executor (or only planned, when
    /// `dry_run` is set).
    MigrationInitiated {
        workload: WorkloadName,
        source: NodeName,
        target: NodeName,
        volume: String,
        dry_run: bool,
    },
    /// The executor refused the relocation. Not retried this cycle.
    MigrationRejected {
        workload: WorkloadName,
        source: NodeName,
        target: NodeName,
        volume: String,
        reason: String,
    },
    /// Every source node was tried without finding a candidate and target.
    NoEligibleMove,
}

impl Outcome {
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::DeferredLockHeld => "DEFERRED_LOCK_HELD",
            Outcome::NoActionNeeded => "NO_ACTION_NEEDED",
            Outcome::NoTargetAvailable => "NO_TARGET_AVAILABLE",
            Outcome::MigrationInitiated { .. } => "MIGRATION_INITIATED",
            Outcome::MigrationRejected { .. } => "MIGRATION_REJECTED",
            Outcome::NoEligibleMove => "NO_ELIGIBLE_MOVE",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::MigrationInitiated {
                workload,
                source,
                target,
                volume,
                dry_run,
            } => {
                write!(f, "{} {workload}: {source} -> {target} ({volume})", self.label())?;
                if *dry_run {
                    write!(f, " [dry run]")?;
                }
                Ok(())
            }
            Outcome::MigrationRejected {
                workload,
                source,
                target,
                volume,
                reason,
            } => write!(
                f,
                "{} {workload}: {source} -> {target} ({volume}): {reason}",
                self.label()
            ),
            _ => f.write_str(self.label()),
        }
    }
}
