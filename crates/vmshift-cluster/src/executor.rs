//! Logging relocation executor.
//!
//! Records relocation requests instead of issuing them. The CLI uses it
//! when evaluating a recorded snapshot, where there is no control plane
//! to hand the move to.

use tracing::info;

use crate::error::ClusterResult;
use crate::source::{RelocationExecutor, RelocationResponse};

/// A relocation the engine asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelocationRequest {
    pub workload: String,
    pub destination_node: String,
    pub destination_volume: String,
}

/// Accepts every request and keeps it for later inspection.
#[derive(Debug, Default)]
pub struct LoggingExecutor {
    requests: Vec<RelocationRequest>,
}

impl LoggingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> &[RelocationRequest] {
        &self.requests
    }
}

impl RelocationExecutor for LoggingExecutor {
    fn relocate(
        &mut self,
        workload: &str,
        destination_node: &str,
        destination_volume: &str,
    ) -> ClusterResult<RelocationResponse> {
        info!(workload, destination_node, destination_volume, "relocation requested");
        self.requests.push(RelocationRequest {
            workload: workload.to_string(),
            destination_node: destination_node.to_string(),
            destination_volume: destination_volume.to_string(),
        });
        Ok(RelocationResponse::Accepted)
    }
}
