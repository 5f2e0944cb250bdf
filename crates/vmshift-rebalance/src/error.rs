//! Rebalance error types.
//!
//! Only conditions that abort the whole cycle are errors. Everything
//! scoped to one node, workload, or relocation is logged and absorbed.

use thiserror::Error;

use vmshift_cluster::ClusterError;
use vmshift_core::ConfigError;

#[derive(Debug, Error)]
pub enum RebalanceError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("telemetry unavailable: {0}")]
    Telemetry(#[from] ClusterError),

    #[error("cannot verify in-flight relocations: {0}")]
    LockCheck(#[source] ClusterError),
}

pub type RebalanceResult<T> = Result<T, RebalanceError>;
