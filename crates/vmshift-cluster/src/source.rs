//! Collaborator traits and the raw telemetry they produce.
//!
//! Implementations talk to the real control plane (or a recorded
//! snapshot). The engine only ever sees these shapes.

use serde::{Deserialize, Serialize};

use vmshift_core::{NameSet, TaskPattern};

use crate::error::ClusterResult;

/// Averaged counter ids requested from the telemetry source.
pub mod metric {
    /// Node CPU usage, percent.
    pub const CPU_USAGE_PCT: &str = "cpu.usage.average";
    /// Node memory usage, percent.
    pub const MEM_USAGE_PCT: &str = "mem.usage.average";
    /// Workload CPU consumption, MHz.
    pub const CPU_USAGE_MHZ: &str = "cpu.usagemhz.average";
    /// Workload active memory, KB.
    pub const MEM_ACTIVE_KB: &str = "mem.active.average";
}

// ── Raw telemetry ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Connected,
    Disconnected,
    NotResponding,
}

/// Host inventory entry as reported by the control plane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawNodeInfo {
    pub name: String,
    pub connection_state: ConnectionState,
    #[serde(default)]
    pub maintenance_mode: bool,
    pub cpu_total_mhz: f64,
    pub cpu_usage_mhz: f64,
    pub memory_total_mb: f64,
    pub memory_usage_mb: f64,
    #[serde(default)]
    pub volumes: Vec<RawVolume>,
}

/// A storage volume attached to a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawVolume {
    pub name: String,
    pub capacity_bytes: u64,
    pub free_bytes: u64,
    /// Backed by the node's own disks (not shared storage).
    pub local: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerState {
    PoweredOn,
    PoweredOff,
    Suspended,
}

/// Guest inventory entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawWorkloadInfo {
    pub name: String,
    pub power_state: PowerState,
    /// Provisioned memory (MB).
    pub memory_mb: f64,
    /// Disk space committed on its volumes (bytes).
    pub committed_bytes: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Queued,
    Running,
    Success,
    Error,
}

/// Entry in the control plane's task queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveTask {
    pub name: String,
    pub state: TaskState,
    #[serde(default)]
    pub entity: Option<String>,
}

impl ActiveTask {
    /// Queued and running tasks still hold the cluster.
    pub fn is_in_flight(&self) -> bool {
        matches!(self.state, TaskState::Queued | TaskState::Running)
    }
}

/// Object an averaged counter is requested for.
///
/// Workload names are only unique per node, so a workload is addressed
/// through the node hosting it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity<'a> {
    Node(&'a str),
    Workload { node: &'a str, name: &'a str },
}

// ── Filters ───────────────────────────────────────────────────────

/// Which nodes take part in a cycle.
#[derive(Debug, Clone, Copy)]
pub struct NodeFilter<'a> {
    pub excluded: &'a NameSet,
}

impl NodeFilter<'_> {
    pub fn admits(&self, node: &RawNodeInfo) -> bool {
        node.connection_state == ConnectionState::Connected
            && !node.maintenance_mode
            && !self.excluded.contains(&node.name)
    }
}

/// Which workloads on a node are considered for relocation.
#[derive(Debug, Clone, Copy)]
pub struct WorkloadFilter<'a> {
    pub excluded: &'a NameSet,
}

impl WorkloadFilter<'_> {
    pub fn admits(&self, workload: &RawWorkloadInfo) -> bool {
        workload.power_state == PowerState::PoweredOn && !self.excluded.contains(&workload.name)
    }
}

// ── Collaborators ─────────────────────────────────────────────────

/// Inventory and performance counters.
///
/// `list_nodes` failing is treated as losing the control plane and
/// aborts the cycle.
pub trait ClusterTelemetrySource {
    fn list_nodes(&self, filter: &NodeFilter<'_>) -> ClusterResult<Vec<RawNodeInfo>>;

    fn list_workloads(
        &self,
        node: &str,
        filter: &WorkloadFilter<'_>,
    ) -> ClusterResult<Vec<RawWorkloadInfo>>;

    /// Average of `metric` over the last `window_secs`, or `None` when the
    /// counter is not available for that entity and window.
    fn averaged_metric(&self, entity: Entity<'_>, metric: &str, window_secs: u64) -> Option<f64>;
}

/// Read access to the control plane's task queue.
pub trait TaskQueueInspector {
    /// Tasks whose name matches `pattern`, in any state.
    fn list_active_tasks(&self, pattern: &TaskPattern) -> ClusterResult<Vec<ActiveTask>>;
}

/// Answer of the control plane to a relocation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelocationResponse {
    Accepted,
    Rejected(String),
}

/// Issues relocations. The engine does not wait for completion.
pub trait RelocationExecutor {
    fn relocate(
        &mut self,
        workload: &str,
        destination_node: &str,
        destination_volume: &str,
    ) -> ClusterResult<RelocationResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_node(name: &str, state: ConnectionState, maintenance: bool) -> RawNodeInfo {
        RawNodeInfo {
            name: name.to_string(),
            connection_state: state,
            maintenance_mode: maintenance,
            cpu_total_mhz: 20000.0,
            cpu_usage_mhz: 1000.0,
            memory_total_mb: 65536.0,
            memory_usage_mb: 1024.0,
            volumes: Vec::new(),
        }
    }

    fn make_workload(name: &str, power: PowerState) -> RawWorkloadInfo {
        RawWorkloadInfo {
            name: name.to_string(),
            power_state: power,
            memory_mb: 4096.0,
            committed_bytes: 0,
        }
    }

    #[test]
    fn node_filter_requires_connected_and_active() {
        let excluded = NameSet::new(["esx-mgmt"]);
        let filter = NodeFilter { excluded: &excluded };

        assert!(filter.admits(&make_node("esx-01", ConnectionState::Connected, false)));
        assert!(!filter.admits(&make_node("esx-01", ConnectionState::NotResponding, false)));
        assert!(!filter.admits(&make_node("esx-01", ConnectionState::Connected, true)));
        assert!(!filter.admits(&make_node("ESX-MGMT", ConnectionState::Connected, false)));
    }

    #[test]
    fn workload_filter_requires_powered_on() {
        let excluded = NameSet::new(["vcsa"]);
        let filter = WorkloadFilter { excluded: &excluded };

        assert!(filter.admits(&make_workload("app-01", PowerState::PoweredOn)));
        assert!(!filter.admits(&make_workload("app-01", PowerState::Suspended)));
        assert!(!filter.admits(&make_workload("vcsa", PowerState::PoweredOn)));
    }

    #[test]
    fn queued_and_running_tasks_are_in_flight() {
        let task = |state| ActiveTask {
            name: "RelocateVM_Task".to_string(),
            state,
            entity: None,
        };
        assert!(task(TaskState::Running).is_in_flight());
        assert!(task(TaskState::Queued).is_in_flight());
        assert!(!task(TaskState::Success).is_in_flight());
        assert!(!task(TaskState::Error).is_in_flight());
    }
}
