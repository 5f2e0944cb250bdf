//! Recorded cluster snapshot — a file-backed telemetry source.
//!
//! A snapshot is a JSON document holding host and guest inventory, the
//! averaged counters for each, and the task queue, all captured for one
//! statistics window:
//!
//! ```json
//! {
//!   "stats_window_secs": 300,
//!   "nodes": [{
//!     "name": "esx-01", "connection_state": "connected",
//!     "cpu_total_mhz": 48000, "cpu_usage_mhz": 40800,
//!     "memory_total_mb": 262144, "memory_usage_mb": 131072,
//!     "volumes": [{ "name": "esx-01-local", "capacity_bytes": 1099511627776,
//!                   "free_bytes": 549755813888, "local": true }],
//!     "metrics": { "cpu.usage.average": 85.0, "mem.usage.average": 50.0 },
//!     "workloads": [{ "name": "app-01", "power_state": "powered_on",
//!                     "memory_mb": 8192, "committed_bytes": 42949672960,
//!                     "metrics": { "cpu.usagemhz.average": 3000.0 } }]
//!   }],
//!   "tasks": [{ "name": "RelocateVM_Task", "state": "running" }]
//! }
//! ```

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use vmshift_core::TaskPattern;

use crate::error::{ClusterError, ClusterResult};
use crate::source::*;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Window the counters were averaged over. Requests for any other
    /// window find no counters.
    #[serde(default)]
    pub stats_window_secs: Option<u64>,
    #[serde(default)]
    pub nodes: Vec<SnapshotNode>,
    #[serde(default)]
    pub tasks: Vec<ActiveTask>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotNode {
    #[serde(flatten)]
    pub info: RawNodeInfo,
    #[serde(default)]
    pub metrics: HashMap<String, f64>,
    #[serde(default)]
    pub workloads: Vec<SnapshotWorkload>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotWorkload {
    #[serde(flatten)]
    pub info: RawWorkloadInfo,
    #[serde(default)]
    pub metrics: HashMap<String, f64>,
}

/// Serves inventory, counters, and tasks from a [`Snapshot`].
#[derive(Debug, Clone)]
pub struct SnapshotSource {
    snapshot: Snapshot,
}

impl SnapshotSource {
    pub fn new(snapshot: Snapshot) -> Self {
        Self { snapshot }
    }

    /// Read a snapshot file. An unreadable file is reported the same way
    /// as an unreachable control plane.
    pub fn load(path: &Path) -> ClusterResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ClusterError::Connection(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&content)
    }

    pub fn from_json_str(content: &str) -> ClusterResult<Self> {
        let snapshot: Snapshot =
            serde_json::from_str(content).map_err(|e| ClusterError::Snapshot(e.to_string()))?;
        debug!(
            nodes = snapshot.nodes.len(),
            tasks = snapshot.tasks.len(),
            "snapshot loaded"
        );
        Ok(Self::new(snapshot))
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    fn node(&self, name: &str) -> Option<&SnapshotNode> {
        self.snapshot.nodes.iter().find(|n| n.info.name == name)
    }

    fn workload(&self, node: &str, name: &str) -> Option<&SnapshotWorkload> {
        self.node(node)?.workloads.iter().find(|w| w.info.name == name)
    }
}

impl ClusterTelemetrySource for SnapshotSource {
    fn list_nodes(&self, filter: &NodeFilter<'_>) -> ClusterResult<Vec<RawNodeInfo>> {
        Ok(self
            .snapshot
            .nodes
            .iter()
            .map(|n| &n.info)
            .filter(|info| filter.admits(info))
            .cloned()
            .collect())
    }

    fn list_workloads(
        &self,
        node: &str,
        filter: &WorkloadFilter<'_>,
    ) -> ClusterResult<Vec<RawWorkloadInfo>> {
        let node = self
            .node(node)
            .ok_or_else(|| ClusterError::Query(format!("unknown node: {node}")))?;
        Ok(node
            .workloads
            .iter()
            .map(|w| &w.info)
            .filter(|info| filter.admits(info))
            .cloned()
            .collect())
    }

    fn averaged_metric(&self, entity: Entity<'_>, metric: &str, window_secs: u64) -> Option<f64> {
        if let Some(recorded) = self.snapshot.stats_window_secs
            && recorded != window_secs
        {
            return None;
        }

        let metrics = match entity {
            Entity::Node(name) => &self.node(name)?.metrics,
            Entity::Workload { node, name } => &self.workload(node, name)?.metrics,
        };
        metrics.get(metric).copied()
    }
}

impl TaskQueueInspector for SnapshotSource {
    fn list_active_tasks(&self, pattern: &TaskPattern) -> ClusterResult<Vec<ActiveTask>> {
        Ok(self
            .snapshot
            .tasks
            .iter()
            .filter(|t| pattern.is_match(&t.name))
            .cloned()
            .collect())
    }
}
