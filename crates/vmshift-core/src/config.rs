//! vmshift.toml configuration parser.
//!
//! The config is loaded once per invocation by the caller and passed by
//! reference into every component. Nothing in the engine reads it from
//! global state.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::matcher::{NameSet, TaskPattern, VolumePatterns};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RebalanceConfig {
    /// Plan the move but never call the relocation executor.
    pub dry_run: bool,
    pub thresholds: Thresholds,
    pub telemetry: TelemetryConfig,
    pub storage: StorageConfig,
    pub exclude: ExcludeConfig,
    pub lock: LockConfig,
    pub log: LogConfig,
}

/// Usage thresholds in percent. A node at or above any of them is a
/// rebalance source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub cpu_pct: f64,
    pub mem_pct: f64,
    pub storage_pct: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            cpu_pct: 80.0,
            mem_pct: 80.0,
            storage_pct: 85.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Averaging window for performance counters, in seconds.
    pub stats_window_secs: u64,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            stats_window_secs: 300,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Local volume name patterns, matched as one alternation.
    pub volume_patterns: Vec<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            volume_patterns: vec!["local".to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ExcludeConfig {
    pub nodes: Vec<String>,
    pub workloads: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    /// Task names matching this pattern count as in-flight relocations.
    pub task_pattern: String,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            task_pattern: "migrate|relocate".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LogConfig {
    /// Append logs here instead of stderr.
    pub file: Option<PathBuf>,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl RebalanceConfig {
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let config: RebalanceConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> ConfigResult<String> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    pub fn validate(&self) -> ConfigResult<()> {
        for (name, value) in [
            ("cpu_pct", self.thresholds.cpu_pct),
            ("mem_pct", self.thresholds.mem_pct),
            ("storage_pct", self.thresholds.storage_pct),
        ] {
            if !(value > 0.0 && value <= 100.0) {
                return Err(ConfigError::Invalid(format!(
                    "thresholds.{name} must be in (0, 100], got {value}"
                )));
            }
        }

        if self.telemetry.stats_window_secs == 0 {
            return Err(ConfigError::Invalid(
                "telemetry.stats_window_secs must be positive".to_string(),
            ));
        }

        self.volume_patterns()?;
        self.task_pattern()?;
        Ok(())
    }

    pub fn volume_patterns(&self) -> ConfigResult<VolumePatterns> {
        VolumePatterns::new(&self.storage.volume_patterns)
    }

    pub fn task_pattern(&self) -> ConfigResult<TaskPattern> {
        TaskPattern::new(&self.lock.task_pattern)
    }

    pub fn excluded_nodes(&self) -> NameSet {
        NameSet::new(&self.exclude.nodes)
    }

    pub fn excluded_workloads(&self) -> NameSet {
        NameSet::new(&self.exclude.workloads)
    }
}
