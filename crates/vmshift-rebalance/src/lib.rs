//! vmshift-rebalance — the rebalance cycle.
//!
//! Runs one decision pass over the cluster and hands at most one
//! relocation to the executor:
//!
//! ```text
//! LOCK_CHECK ── in-flight relocation ──────────────────────────▶ DEFERRED_LOCK_HELD
//!     │
//! COLLECT (NodeRecords)
//!     │
//! CLASSIFY_SOURCES ── no source ───────────────────────────────▶ NO_ACTION_NEEDED
//!     │           └── no target ───────────────────────────────▶ NO_TARGET_AVAILABLE
//!     │
//! per source, most loaded first:
//!   SELECT_VM ── none ──┐
//!   SELECT_TARGET ── none ──┴─▶ next source
//!     │
//!   MIGRATE ───────────────────────────────────────────────────▶ MIGRATION_INITIATED
//!
//! sources exhausted ───────────────────────────────────────────▶ NO_ELIGIBLE_MOVE
//! ```
//!
//! Nothing survives the cycle. The next invocation starts from fresh
//! telemetry.

pub mod error;
pub mod rebalancer;

pub use error::{RebalanceError, RebalanceResult};
pub use rebalancer::{MigrationDecision, Plan, Rebalancer};
