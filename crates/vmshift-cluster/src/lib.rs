//! vmshift-cluster — the engine's view of the virtualization cluster.
//!
//! The control plane itself is out of reach of the engine. This crate
//! defines the traits the engine talks through and turns raw counters
//! into typed records.
//!
//! # Components
//!
//! - **`source`** — Collaborator traits (telemetry, task queue, executor) and raw types
//! - **`builder`** — Metric record builder (raw counters → `NodeRecord` / `WorkloadRecord`)
//! - **`snapshot`** — JSON snapshot file implementing the telemetry and task traits
//! - **`executor`** — Logging relocation executor

pub mod builder;
pub mod error;
pub mod executor;
pub mod snapshot;
pub mod source;

pub use builder::{NodeSkip, RecordBuilder};
pub use error::{ClusterError, ClusterResult};
pub use executor::{LoggingExecutor, RelocationRequest};
pub use snapshot::SnapshotSource;
pub use source::*;
