//! Admission control — can a target absorb the candidate?
//!
//! Targets are tried in ascending `load_index` order and the first one
//! passing all three checks wins. There is no scoring among eligible
//! targets.
//!
//! ```text
//! storage  target.max_free_storage_gb                  >= candidate.used_storage_gb
//! memory   target.total_ram_gb - target.used_ram_gb    >= candidate.configured_mem_gb
//! cpu      (target.used_cpu_mhz + candidate.cpu_load_mhz)
//!              / target.total_cpu_mhz * 100            <  cpu threshold
//! ```

use std::fmt;

use tracing::debug;

use vmshift_core::{NodeRecord, WorkloadRecord};

/// The first check a target failed.
#[derive(Debug, Clone, PartialEq)]
pub enum Rejection {
    Storage { free_gb: f64, needed_gb: f64 },
    Memory { free_gb: f64, needed_gb: f64 },
    /// `projected_pct` is `None` when the target reports no CPU capacity.
    Cpu { projected_pct: Option<f64>, threshold_pct: f64 },
}

impl Rejection {
    pub fn check(&self) -> &'static str {
        match self {
            Rejection::Storage { .. } => "storage",
            Rejection::Memory { .. } => "memory",
            Rejection::Cpu { .. } => "cpu",
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::Storage { free_gb, needed_gb } => {
                write!(f, "storage: {free_gb:.1} GB free, {needed_gb:.1} GB needed")
            }
            Rejection::Memory { free_gb, needed_gb } => {
                write!(f, "memory: {free_gb:.1} GB free, {needed_gb:.1} GB needed")
            }
            Rejection::Cpu {
                projected_pct: Some(pct),
                threshold_pct,
            } => write!(f, "cpu: projected {pct:.1}% not below {threshold_pct:.1}%"),
            Rejection::Cpu {
                projected_pct: None,
                ..
            } => f.write_str("cpu: target reports no capacity"),
        }
    }
}

/// Run the three admission checks for one target.
pub fn check_target(
    target: &NodeRecord,
    candidate: &WorkloadRecord,
    cpu_threshold_pct: f64,
) -> Result<(), Rejection> {
    if target.max_free_storage_gb < candidate.used_storage_gb {
        return Err(Rejection::Storage {
            free_gb: target.max_free_storage_gb,
            needed_gb: candidate.used_storage_gb,
        });
    }

    if target.free_ram_gb() < candidate.configured_mem_gb {
        return Err(Rejection::Memory {
            free_gb: target.free_ram_gb(),
            needed_gb: candidate.configured_mem_gb,
        });
    }

    match target.projected_cpu_pct(candidate.cpu_load_mhz) {
        Some(pct) if pct < cpu_threshold_pct => Ok(()),
        projected_pct => Err(Rejection::Cpu {
            projected_pct,
            threshold_pct: cpu_threshold_pct,
        }),
    }
}

/// First target, in ascending `load_index` order, that admits `candidate`.
///
/// Equal load indexes keep the order they were given in.
pub fn admit<'t, I>(
    candidate: &WorkloadRecord,
    targets: I,
    cpu_threshold_pct: f64,
) -> Option<&'t NodeRecord>
where
    I: IntoIterator<Item = &'t NodeRecord>,
{
    let mut ordered: Vec<&NodeRecord> = targets.into_iter().collect();
    ordered.sort_by(|a, b| a.load_index.total_cmp(&b.load_index));

    ordered.into_iter().find(|target| {
        match check_target(target, candidate, cpu_threshold_pct) {
            Ok(()) => true,
            Err(rejection) => {
                debug!(
                    workload = %candidate.name,
                    target = %target.name,
                    check = rejection.check(),
                    reason = %rejection,
                    "target rejected"
                );
                false
            }
        }
    })
}
