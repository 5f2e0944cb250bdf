//! vmshift-placement — the rule engine behind a rebalance decision.
//!
//! Pure functions over `NodeRecord`s and `WorkloadRecord`s. Nothing here
//! talks to the cluster; the orchestrator in `vmshift-rebalance` feeds
//! records in and acts on the answers.
//!
//! # Components
//!
//! - **`classifier`** — Bottleneck flags, selection strategy, source/target partition
//! - **`selector`** — Strategy-specific workload ranking with the low-CPU re-rank
//! - **`admission`** — First-fit admission of a candidate onto a target node

pub mod admission;
pub mod classifier;
pub mod selector;

pub use admission::{Rejection, admit, check_target};
pub use classifier::{Bottleneck, Partition, Strategy, classify, is_target, partition};
pub use selector::{LOW_CPU_SIGNAL_MHZ, Selection, rank, select_candidate};
