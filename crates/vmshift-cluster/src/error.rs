//! Cluster collaborator error types.

use thiserror::Error;

/// Result type alias for collaborator calls.
pub type ClusterResult<T> = Result<T, ClusterError>;

/// Errors surfaced by telemetry sources, task inspectors, and executors.
#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("control plane unreachable: {0}")]
    Connection(String),

    #[error("query failed: {0}")]
    Query(String),

    #[error("relocation failed: {0}")]
    Relocation(String),

    #[error("invalid snapshot: {0}")]
    Snapshot(String),
}
