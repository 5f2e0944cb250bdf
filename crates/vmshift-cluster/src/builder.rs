//! Metric record builder.
//!
//! Turns raw inventory and averaged counters into `NodeRecord`s and
//! `WorkloadRecord`s. Nodes whose telemetry cannot be trusted are left
//! out of the cycle with a warning; only losing the node listing itself
//! is an error.

use thiserror::Error;
use tracing::{debug, warn};

use vmshift_core::{
    ConfigResult, NameSet, NodeRecord, RebalanceConfig, VolumePatterns, WorkloadRecord,
};

use crate::error::ClusterResult;
use crate::source::*;

const MB_PER_GB: f64 = 1024.0;
const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Why a node was left out of the cycle.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NodeSkip {
    #[error("counter {0} is missing")]
    MissingCounter(&'static str),

    #[error("counter {counter} is not positive ({value})")]
    NonPositive { counter: &'static str, value: f64 },

    #[error("no local volume matches the configured patterns")]
    NoLocalVolume,
}

/// Builds per-cycle records from one telemetry source.
pub struct RecordBuilder<'a> {
    source: &'a dyn ClusterTelemetrySource,
    window_secs: u64,
    volumes: VolumePatterns,
    excluded_nodes: NameSet,
    excluded_workloads: NameSet,
}

impl<'a> RecordBuilder<'a> {
    pub fn new(
        source: &'a dyn ClusterTelemetrySource,
        config: &RebalanceConfig,
    ) -> ConfigResult<Self> {
        let excluded_nodes = config.excluded_nodes();
        let excluded_workloads = config.excluded_workloads();
        debug!(
            window_secs = config.telemetry.stats_window_secs,
            excluded_nodes = excluded_nodes.len(),
            excluded_workloads = excluded_workloads.len(),
            "record builder configured"
        );

        Ok(Self {
            source,
            window_secs: config.telemetry.stats_window_secs,
            volumes: config.volume_patterns()?,
            excluded_nodes,
            excluded_workloads,
        })
    }

    /// Build records for every usable node.
    ///
    /// Fails only when the node listing itself fails.
    pub fn build_nodes(&self) -> ClusterResult<Vec<NodeRecord>> {
        let filter = NodeFilter {
            excluded: &self.excluded_nodes,
        };
        let raw_nodes = self.source.list_nodes(&filter)?;

        let mut records = Vec::with_capacity(raw_nodes.len());
        for raw in raw_nodes.iter().filter(|n| filter.admits(n)) {
            match self.build_node(raw) {
                Ok(record) => {
                    debug!(
                        node = %record.name,
                        cpu_pct = record.cpu_used_pct,
                        mem_pct = record.mem_used_pct,
                        storage_pct = record.storage_used_pct,
                        volume = %record.volume,
                        "node record built"
                    );
                    records.push(record);
                }
                Err(skip) => {
                    warn!(node = %raw.name, reason = %skip, "node excluded from cycle");
                }
            }
        }

        Ok(records)
    }

    /// Build the record for one node, or say why it cannot take part.
    pub fn build_node(&self, raw: &RawNodeInfo) -> Result<NodeRecord, NodeSkip> {
        let entity = Entity::Node(&raw.name);
        let cpu_used_pct = self.required_metric(entity, metric::CPU_USAGE_PCT)?;
        let mem_used_pct = self.required_metric(entity, metric::MEM_USAGE_PCT)?;

        let total_cpu_mhz = positive("cpu_total_mhz", raw.cpu_total_mhz)?;
        let used_cpu_mhz = positive("cpu_usage_mhz", raw.cpu_usage_mhz)?;
        let total_ram_gb = positive("memory_total_mb", raw.memory_total_mb)? / MB_PER_GB;
        let used_ram_gb = positive("memory_usage_mb", raw.memory_usage_mb)? / MB_PER_GB;

        let volume = self.representative_volume(raw).ok_or(NodeSkip::NoLocalVolume)?;
        let capacity_gb = volume.capacity_bytes as f64 / BYTES_PER_GB;
        let free_gb = volume.free_bytes as f64 / BYTES_PER_GB;
        let storage_used_pct = (capacity_gb - free_gb) * 100.0 / capacity_gb;

        Ok(NodeRecord {
            name: raw.name.clone(),
            cpu_used_pct,
            mem_used_pct,
            storage_used_pct,
            volume: volume.name.clone(),
            max_free_storage_gb: free_gb,
            load_index: cpu_used_pct + mem_used_pct,
            total_ram_gb,
            used_ram_gb,
            total_cpu_mhz,
            used_cpu_mhz,
        })
    }

    /// Build records for the running, non-excluded workloads on `node`.
    ///
    /// Absent counters read as zero; whether a workload carries enough
    /// signal to be ranked is decided by the selector.
    pub fn build_workloads(&self, node: &str) -> ClusterResult<Vec<WorkloadRecord>> {
        let filter = WorkloadFilter {
            excluded: &self.excluded_workloads,
        };
        let raw_workloads = self.source.list_workloads(node, &filter)?;

        Ok(raw_workloads
            .iter()
            .filter(|w| filter.admits(w))
            .map(|raw| {
                let entity = Entity::Workload {
                    node,
                    name: &raw.name,
                };
                WorkloadRecord {
                    name: raw.name.clone(),
                    cpu_load_mhz: self.metric_or_zero(entity, metric::CPU_USAGE_MHZ),
                    mem_usage_kb: self.metric_or_zero(entity, metric::MEM_ACTIVE_KB),
                    configured_mem_gb: raw.memory_mb / MB_PER_GB,
                    used_storage_gb: raw.committed_bytes as f64 / BYTES_PER_GB,
                }
            })
            .collect())
    }

    /// The matching local volume with the most free space. Earlier
    /// volumes win ties.
    fn representative_volume<'v>(&self, raw: &'v RawNodeInfo) -> Option<&'v RawVolume> {
        raw.volumes
            .iter()
            .filter(|v| v.local && v.capacity_bytes > 0 && self.volumes.is_match(&v.name))
            .fold(None, |best: Option<&RawVolume>, v| match best {
                Some(b) if b.free_bytes >= v.free_bytes => Some(b),
                _ => Some(v),
            })
    }

    fn required_metric(&self, entity: Entity<'_>, counter: &'static str) -> Result<f64, NodeSkip> {
        let value = self
            .source
            .averaged_metric(entity, counter, self.window_secs)
            .ok_or(NodeSkip::MissingCounter(counter))?;
        positive(counter, value)
    }

    fn metric_or_zero(&self, entity: Entity<'_>, counter: &str) -> f64 {
        self.source
            .averaged_metric(entity, counter, self.window_secs)
            .unwrap_or(0.0)
    }
}

fn positive(counter: &'static str, value: f64) -> Result<f64, NodeSkip> {
    if value > 0.0 {
        Ok(value)
    } else {
        Err(NodeSkip::NonPositive { counter, value })
    }
}
