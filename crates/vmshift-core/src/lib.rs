//! vmshift-core — shared types for the vmshift rebalancing engine.
//!
//! Holds the per-cycle records (`NodeRecord`, `WorkloadRecord`), the
//! outcome signal emitted at the end of a cycle, and the immutable
//! `RebalanceConfig` that is threaded through every component call.

pub mod config;
pub mod error;
pub mod matcher;
pub mod types;

pub use config::{
    ExcludeConfig, LockConfig, LogConfig, LogFormat, RebalanceConfig, StorageConfig,
    TelemetryConfig, Thresholds,
};
pub use error::{ConfigError, ConfigResult};
pub use matcher::{NameSet, TaskPattern, VolumePatterns};
pub use types::*;
