//! End-to-end rebalance cycles against in-memory cluster snapshots.

use std::collections::HashMap;

use vmshift_cluster::snapshot::{Snapshot, SnapshotNode, SnapshotWorkload};
use vmshift_cluster::*;
use vmshift_core::{NameSet, Outcome, RebalanceConfig, TaskPattern};
use vmshift_placement::Strategy;
use vmshift_rebalance::{Plan, RebalanceError, Rebalancer};

const GB: f64 = 1024.0 * 1024.0 * 1024.0;
const WINDOW: u64 = 300;

// ── Fixtures ─────────────────────────────────────────────────────

/// A node with 10 000 MHz of CPU, 256 GB of RAM and one 1000 GB local
/// volume, loaded to the given percentages.
fn node(
    name: &str,
    cpu_pct: f64,
    mem_pct: f64,
    storage_pct: f64,
    workloads: Vec<SnapshotWorkload>,
) -> SnapshotNode {
    let free_gb = 1000.0 - storage_pct * 10.0;
    SnapshotNode {
        info: RawNodeInfo {
            name: name.to_string(),
            connection_state: ConnectionState::Connected,
            maintenance_mode: false,
            cpu_total_mhz: 10000.0,
            cpu_usage_mhz: cpu_pct * 100.0,
            memory_total_mb: 262144.0,
            memory_usage_mb: 262144.0 * mem_pct / 100.0,
            volumes: vec![RawVolume {
                name: format!("{name}-local"),
                capacity_bytes: (1000.0 * GB) as u64,
                free_bytes: (free_gb * GB) as u64,
                local: true,
            }],
        },
        metrics: HashMap::from([
            (metric::CPU_USAGE_PCT.to_string(), cpu_pct),
            (metric::MEM_USAGE_PCT.to_string(), mem_pct),
        ]),
        workloads,
    }
}

fn vm(name: &str, cpu_mhz: f64, mem_kb: f64, mem_gb: f64, disk_gb: f64) -> SnapshotWorkload {
    SnapshotWorkload {
        info: RawWorkloadInfo {
            name: name.to_string(),
            power_state: PowerState::PoweredOn,
            memory_mb: mem_gb * 1024.0,
            committed_bytes: (disk_gb * GB) as u64,
        },
        metrics: HashMap::from([
            (metric::CPU_USAGE_MHZ.to_string(), cpu_mhz),
            (metric::MEM_ACTIVE_KB.to_string(), mem_kb),
        ]),
    }
}

fn task(name: &str, state: TaskState) -> ActiveTask {
    ActiveTask {
        name: name.to_string(),
        state,
        entity: None,
    }
}

fn cluster(nodes: Vec<SnapshotNode>) -> SnapshotSource {
    cluster_with_tasks(nodes, Vec::new())
}

fn cluster_with_tasks(nodes: Vec<SnapshotNode>, tasks: Vec<ActiveTask>) -> SnapshotSource {
    SnapshotSource::new(Snapshot {
        stats_window_secs: Some(WINDOW),
        nodes,
        tasks,
    })
}

fn config() -> RebalanceConfig {
    RebalanceConfig::default()
}

fn plan(config: &RebalanceConfig, source: &SnapshotSource) -> Plan {
    Rebalancer::new(config, source, source).unwrap().plan().unwrap()
}

fn decision(plan: Plan) -> vmshift_rebalance::MigrationDecision {
    match plan {
        Plan::Migrate(decision) => *decision,
        other => panic!("expected a migration, got {other:?}"),
    }
}

/// Executor that refuses every relocation.
struct RejectingExecutor {
    calls: usize,
}

impl RelocationExecutor for RejectingExecutor {
    fn relocate(&mut self, _: &str, _: &str, _: &str) -> ClusterResult<RelocationResponse> {
        self.calls += 1;
        Ok(RelocationResponse::Rejected("insufficient licenses".to_string()))
    }
}

/// Executor whose control plane went away.
struct BrokenExecutor;

impl RelocationExecutor for BrokenExecutor {
    fn relocate(&mut self, _: &str, _: &str, _: &str) -> ClusterResult<RelocationResponse> {
        Err(ClusterError::Connection("session expired".to_string()))
    }
}

/// Telemetry source that cannot reach the control plane.
struct Unreachable;

impl ClusterTelemetrySource for Unreachable {
    fn list_nodes(&self, _: &NodeFilter<'_>) -> ClusterResult<Vec<RawNodeInfo>> {
        Err(ClusterError::Connection("connection refused".to_string()))
    }

    fn list_workloads(
        &self,
        _: &str,
        _: &WorkloadFilter<'_>,
    ) -> ClusterResult<Vec<RawWorkloadInfo>> {
        Err(ClusterError::Connection("connection refused".to_string()))
    }

    fn averaged_metric(&self, _: Entity<'_>, _: &str, _: u64) -> Option<f64> {
        None
    }
}

impl TaskQueueInspector for Unreachable {
    fn list_active_tasks(&self, _: &TaskPattern) -> ClusterResult<Vec<ActiveTask>> {
        Err(ClusterError::Connection("connection refused".to_string()))
    }
}

/// Snapshot whose workload listing fails for one node.
struct FlakyWorkloads {
    inner: SnapshotSource,
    broken: &'static str,
}

impl ClusterTelemetrySource for FlakyWorkloads {
    fn list_nodes(&self, filter: &NodeFilter<'_>) -> ClusterResult<Vec<RawNodeInfo>> {
        self.inner.list_nodes(filter)
    }

    fn list_workloads(
        &self,
        node: &str,
        filter: &WorkloadFilter<'_>,
    ) -> ClusterResult<Vec<RawWorkloadInfo>> {
        if node == self.broken {
            return Err(ClusterError::Query(format!("timeout listing {node}")));
        }
        self.inner.list_workloads(node, filter)
    }

    fn averaged_metric(&self, entity: Entity<'_>, metric: &str, window_secs: u64) -> Option<f64> {
        self.inner.averaged_metric(entity, metric, window_secs)
    }
}

// ── Classification outcomes ──────────────────────────────────────

#[test]
fn no_action_when_every_node_is_under_threshold() {
    let source = cluster(vec![
        node("a", 50.0, 50.0, 50.0, vec![vm("w", 100.0, 0.0, 4.0, 10.0)]),
        node("b", 40.0, 40.0, 40.0, Vec::new()),
    ]);
    let mut executor = LoggingExecutor::new();

    let outcome = Rebalancer::new(&config(), &source, &source)
        .unwrap()
        .run_cycle(&mut executor)
        .unwrap();

    assert_eq!(outcome, Outcome::NoActionNeeded);
    assert!(executor.requests().is_empty());
}

#[test]
fn no_target_when_every_node_is_busy() {
    let source = cluster(vec![
        node("a", 85.0, 50.0, 50.0, vec![vm("w", 3000.0, 0.0, 4.0, 10.0)]),
        node("b", 50.0, 80.0, 40.0, Vec::new()),
    ]);

    assert_eq!(plan(&config(), &source), Plan::NoTargetAvailable);
}

#[test]
fn storage_only_node_alone_has_no_eligible_move() {
    // The node is its own only target, which still counts as a target.
    let source = cluster(vec![node(
        "a",
        10.0,
        10.0,
        90.0,
        vec![vm("w", 100.0, 0.0, 8.0, 50.0)],
    )]);

    assert_eq!(plan(&config(), &source), Plan::NoEligibleMove);
}

// ── Candidate selection ──────────────────────────────────────────

#[test]
fn cpu_bottleneck_moves_heaviest_cpu_workload() {
    let source = cluster(vec![
        node(
            "a",
            85.0,
            40.0,
            40.0,
            vec![
                vm("small-1", 50.0, 2_000_000.0, 32.0, 10.0),
                vm("w", 3000.0, 1000.0, 8.0, 40.0),
                vm("small-2", 50.0, 0.0, 4.0, 10.0),
            ],
        ),
        node("b", 40.0, 40.0, 40.0, Vec::new()),
    ]);

    let decision = decision(plan(&config(), &source));
    assert_eq!(decision.workload.name, "w");
    assert_eq!(decision.strategy, Strategy::CpuPriority);
    assert_eq!(decision.ranking, Strategy::CpuPriority);
    assert_eq!(decision.source.name, "a");
    assert_eq!(decision.target(), "b");
    assert_eq!(decision.volume(), "b-local");
}

#[test]
fn idle_cpu_candidate_falls_back_to_memory_ranking() {
    let source = cluster(vec![
        node(
            "a",
            85.0,
            40.0,
            40.0,
            vec![
                vm("idle-small", 2.0, 500_000.0, 2.0, 10.0),
                vm("idle-big", 1.0, 1000.0, 32.0, 10.0),
            ],
        ),
        node("b", 40.0, 40.0, 40.0, Vec::new()),
    ]);

    let decision = decision(plan(&config(), &source));
    assert_eq!(decision.workload.name, "idle-big");
    assert_eq!(decision.strategy, Strategy::CpuPriority);
    assert_eq!(decision.ranking, Strategy::MemoryPriority);
}

#[test]
fn storage_bottleneck_moves_largest_disk() {
    let source = cluster(vec![
        node(
            "a",
            30.0,
            30.0,
            90.0,
            vec![
                vm("cpu-hog", 4000.0, 0.0, 8.0, 20.0),
                vm("disk-hog", 100.0, 0.0, 8.0, 300.0),
            ],
        ),
        node("b", 40.0, 40.0, 40.0, Vec::new()),
    ]);

    let decision = decision(plan(&config(), &source));
    assert_eq!(decision.workload.name, "disk-hog");
    assert_eq!(decision.strategy, Strategy::DiskPriority);
}

#[test]
fn excluded_workload_is_never_moved() {
    let source = cluster(vec![
        node(
            "a",
            85.0,
            40.0,
            40.0,
            vec![vm("vcsa", 5000.0, 0.0, 8.0, 10.0), vm("app", 900.0, 0.0, 8.0, 10.0)],
        ),
        node("b", 40.0, 40.0, 40.0, Vec::new()),
    ]);
    let config = RebalanceConfig::from_toml_str("[exclude]\nworkloads = [\"VCSA\"]\n").unwrap();

    assert_eq!(decision(plan(&config, &source)).workload.name, "app");
}

// ── Admission ────────────────────────────────────────────────────

#[test]
fn first_target_without_disk_room_is_skipped() {
    let source = cluster(vec![
        node("a", 85.0, 40.0, 40.0, vec![vm("w", 1000.0, 0.0, 8.0, 200.0)]),
        // Lowest load, but only 100 GB free.
        node("b", 20.0, 20.0, 90.0, Vec::new()),
        node("c", 30.0, 30.0, 50.0, Vec::new()),
    ]);
    let config = RebalanceConfig::from_toml_str("[thresholds]\nstorage_pct = 95.0\n").unwrap();

    assert_eq!(decision(plan(&config, &source)).target(), "c");
}

#[test]
fn heavier_candidate_is_refused_by_same_target() {
    let make = |cpu| {
        cluster(vec![
            node("a", 85.0, 40.0, 40.0, vec![vm("w", cpu, 0.0, 8.0, 10.0)]),
            node("b", 40.0, 40.0, 40.0, Vec::new()),
        ])
    };

    // b runs 4000 of 10000 MHz: 3999 MHz more lands at 79.99%.
    assert_eq!(decision(plan(&config(), &make(3999.0))).target(), "b");
    assert_eq!(plan(&config(), &make(4000.0)), Plan::NoEligibleMove);
    assert_eq!(plan(&config(), &make(6000.0)), Plan::NoEligibleMove);
}

#[test]
fn storage_only_source_is_not_its_own_target() {
    let source = cluster(vec![
        // Storage bottleneck only, lowest load in the cluster.
        node("a", 10.0, 10.0, 90.0, vec![vm("w", 100.0, 0.0, 8.0, 50.0)]),
        node("b", 50.0, 50.0, 40.0, Vec::new()),
    ]);

    let decision = decision(plan(&config(), &source));
    assert_eq!(decision.source.name, "a");
    assert_eq!(decision.target(), "b");
}

#[test]
fn target_counters_are_charged_on_a_copy() {
    let source = cluster(vec![
        node("a", 85.0, 40.0, 40.0, vec![vm("w", 1500.0, 0.0, 16.0, 120.0)]),
        node("b", 40.0, 50.0, 40.0, Vec::new()),
    ]);
    let config = config();

    let decision = decision(plan(&config, &source));
    let target = &decision.projected_target;
    assert_eq!(target.used_cpu_mhz, 4000.0 + 1500.0);
    assert_eq!(target.used_ram_gb, 128.0 + 16.0);
    assert_eq!(target.max_free_storage_gb, 600.0 - 120.0);
    // Load figures are the observed ones.
    assert_eq!(target.cpu_used_pct, 40.0);
    assert_eq!(target.load_index, 90.0);

    // The next evaluation starts from the untouched snapshot.
    let again = self::decision(plan(&config, &source));
    assert_eq!(again.projected_target, *target);
}

#[test]
fn same_workload_name_on_two_nodes_keeps_own_counters() {
    let source = cluster(vec![
        node("a", 85.0, 40.0, 40.0, vec![vm("dup", 3000.0, 0.0, 8.0, 10.0)]),
        node("c", 95.0, 45.0, 40.0, vec![vm("dup", 500.0, 0.0, 4.0, 20.0)]),
        node("t", 20.0, 20.0, 20.0, Vec::new()),
    ]);

    let decision = decision(plan(&config(), &source));
    assert_eq!(decision.source.name, "c");
    assert_eq!(decision.workload.cpu_load_mhz, 500.0);
    assert_eq!(decision.workload.configured_mem_gb, 4.0);
    assert_eq!(decision.projected_target.used_cpu_mhz, 2000.0 + 500.0);
}

// ── Source ordering and the one-move rule ────────────────────────

#[test]
fn only_one_migration_per_cycle() {
    let source = cluster(vec![
        node("a", 85.0, 40.0, 40.0, vec![vm("wa", 1000.0, 0.0, 8.0, 10.0)]),
        node("b", 90.0, 45.0, 40.0, vec![vm("wb", 1000.0, 0.0, 8.0, 10.0)]),
        node("c", 20.0, 20.0, 20.0, Vec::new()),
        node("d", 30.0, 30.0, 20.0, Vec::new()),
    ]);
    let mut executor = LoggingExecutor::new();

    let outcome = Rebalancer::new(&config(), &source, &source)
        .unwrap()
        .run_cycle(&mut executor)
        .unwrap();

    // b is the most loaded source; c the least loaded target.
    assert_eq!(
        outcome,
        Outcome::MigrationInitiated {
            workload: "wb".to_string(),
            source: "b".to_string(),
            target: "c".to_string(),
            volume: "c-local".to_string(),
            dry_run: false,
        }
    );
    assert_eq!(executor.requests().len(), 1);
    assert_eq!(executor.requests()[0].destination_volume, "c-local");
}

#[test]
fn source_without_candidate_yields_to_next() {
    let source = cluster(vec![
        node("a", 90.0, 50.0, 40.0, vec![vm("silent", 0.0, 0.0, 8.0, 0.0)]),
        node("b", 85.0, 40.0, 40.0, vec![vm("w", 1000.0, 0.0, 8.0, 10.0)]),
        node("c", 20.0, 20.0, 20.0, Vec::new()),
    ]);

    let decision = decision(plan(&config(), &source));
    assert_eq!(decision.source.name, "b");
}

#[test]
fn source_with_unlistable_workloads_yields_to_next() {
    let inner = cluster(vec![
        node("a", 90.0, 50.0, 40.0, vec![vm("wa", 1000.0, 0.0, 8.0, 10.0)]),
        node("b", 85.0, 40.0, 40.0, vec![vm("wb", 1000.0, 0.0, 8.0, 10.0)]),
        node("c", 20.0, 20.0, 20.0, Vec::new()),
    ]);
    let telemetry = FlakyWorkloads {
        inner: inner.clone(),
        broken: "a",
    };
    let config = config();

    let plan = Rebalancer::new(&config, &telemetry, &inner).unwrap().plan().unwrap();
    assert_eq!(decision(plan).workload.name, "wb");
}

#[test]
fn no_eligible_move_when_every_source_is_exhausted() {
    let source = cluster(vec![
        node("a", 90.0, 50.0, 40.0, vec![vm("huge-a", 1000.0, 0.0, 512.0, 10.0)]),
        node("b", 85.0, 40.0, 40.0, Vec::new()),
        node("c", 20.0, 20.0, 20.0, Vec::new()),
    ]);
    let mut executor = LoggingExecutor::new();

    let outcome = Rebalancer::new(&config(), &source, &source)
        .unwrap()
        .run_cycle(&mut executor)
        .unwrap();

    assert_eq!(outcome, Outcome::NoEligibleMove);
    assert!(executor.requests().is_empty());
}

#[test]
fn identical_snapshots_give_identical_plans() {
    let source = cluster(vec![
        node(
            "a",
            88.0,
            82.0,
            90.0,
            vec![
                vm("w1", 1200.0, 10.0, 8.0, 100.0),
                vm("w2", 1200.0, 10.0, 8.0, 100.0),
                vm("w3", 800.0, 10.0, 16.0, 10.0),
            ],
        ),
        node("b", 30.0, 30.0, 40.0, Vec::new()),
        node("c", 30.0, 30.0, 20.0, Vec::new()),
    ]);
    let config = config();
    let rebalancer = Rebalancer::new(&config, &source, &source).unwrap();

    let first = rebalancer.plan().unwrap();
    let second = rebalancer.plan().unwrap();
    assert_eq!(first, second);

    let decision = decision(first);
    assert_eq!(decision.strategy, Strategy::MultiBottleneck);
    // Full tie between w1 and w2 keeps inventory order; b and c tie on load.
    assert_eq!(decision.workload.name, "w1");
    assert_eq!(decision.target(), "b");
}

// ── Lock check ───────────────────────────────────────────────────

#[test]
fn running_migrate_task_defers_cycle() {
    let source = cluster_with_tasks(
        vec![
            node("a", 85.0, 40.0, 40.0, vec![vm("w", 3000.0, 0.0, 8.0, 10.0)]),
            node("b", 40.0, 40.0, 40.0, Vec::new()),
        ],
        vec![task("MigrateVM_Task", TaskState::Running)],
    );
    let mut executor = LoggingExecutor::new();
    let config = config();
    let rebalancer = Rebalancer::new(&config, &source, &source).unwrap();

    assert_eq!(
        rebalancer.plan().unwrap(),
        Plan::Deferred {
            tasks: vec!["MigrateVM_Task".to_string()]
        }
    );
    assert_eq!(rebalancer.run_cycle(&mut executor).unwrap(), Outcome::DeferredLockHeld);
    assert!(executor.requests().is_empty());
}

#[test]
fn lock_check_skips_finished_and_unrelated_tasks() {
    let source = cluster_with_tasks(
        vec![
            node("a", 85.0, 40.0, 40.0, vec![vm("w", 3000.0, 0.0, 8.0, 10.0)]),
            node("b", 40.0, 40.0, 40.0, Vec::new()),
        ],
        vec![
            task("MigrateVM_Task", TaskState::Success),
            task("RelocateVM_Task", TaskState::Error),
            task("CreateSnapshot_Task", TaskState::Running),
        ],
    );

    assert!(matches!(plan(&config(), &source), Plan::Migrate(_)));
}

#[test]
fn lock_check_uses_configured_pattern() {
    let source = cluster_with_tasks(
        vec![node("a", 85.0, 40.0, 40.0, Vec::new())],
        vec![task("vMotion-batch-7", TaskState::Queued)],
    );
    let config = RebalanceConfig::from_toml_str("[lock]\ntask_pattern = \"vmotion\"\n").unwrap();

    assert!(matches!(plan(&config, &source), Plan::Deferred { .. }));
}

// ── Execution ────────────────────────────────────────────────────

#[test]
fn dry_run_never_calls_executor() {
    let source = cluster(vec![
        node("a", 85.0, 40.0, 40.0, vec![vm("w", 3000.0, 0.0, 8.0, 10.0)]),
        node("b", 40.0, 40.0, 40.0, Vec::new()),
    ]);
    let config = RebalanceConfig::from_toml_str("dry_run = true\n").unwrap();
    let mut executor = LoggingExecutor::new();

    let outcome = Rebalancer::new(&config, &source, &source)
        .unwrap()
        .run_cycle(&mut executor)
        .unwrap();

    assert!(matches!(outcome, Outcome::MigrationInitiated { dry_run: true, .. }));
    assert!(executor.requests().is_empty());
}

#[test]
fn rejected_relocation_is_reported_once() {
    let source = cluster(vec![
        node("a", 90.0, 40.0, 40.0, vec![vm("wa", 1000.0, 0.0, 8.0, 10.0)]),
        node("b", 85.0, 40.0, 40.0, vec![vm("wb", 1000.0, 0.0, 8.0, 10.0)]),
        node("c", 20.0, 20.0, 20.0, Vec::new()),
    ]);
    let mut executor = RejectingExecutor { calls: 0 };

    let outcome = Rebalancer::new(&config(), &source, &source)
        .unwrap()
        .run_cycle(&mut executor)
        .unwrap();

    assert_eq!(executor.calls, 1);
    match outcome {
        Outcome::MigrationRejected { workload, reason, .. } => {
            assert_eq!(workload, "wa");
            assert_eq!(reason, "insufficient licenses");
        }
        other => panic!("expected rejection, got {other}"),
    }
}

#[test]
fn executor_failure_is_a_rejection_not_an_error() {
    let source = cluster(vec![
        node("a", 85.0, 40.0, 40.0, vec![vm("w", 3000.0, 0.0, 8.0, 10.0)]),
        node("b", 40.0, 40.0, 40.0, Vec::new()),
    ]);

    let outcome = Rebalancer::new(&config(), &source, &source)
        .unwrap()
        .run_cycle(&mut BrokenExecutor)
        .unwrap();

    assert_eq!(outcome.label(), "MIGRATION_REJECTED");
    let json = serde_json::to_value(&outcome).unwrap();
    assert_eq!(json["outcome"], "migration_rejected");
    assert!(json["reason"].as_str().unwrap().contains("session expired"));
}

// ── Fatal conditions ─────────────────────────────────────────────

#[test]
fn unreachable_telemetry_aborts_cycle() {
    let tasks = cluster(Vec::new());
    let config = config();

    let err = Rebalancer::new(&config, &Unreachable, &tasks)
        .unwrap()
        .plan()
        .unwrap_err();
    assert!(matches!(err, RebalanceError::Telemetry(ClusterError::Connection(_))));
}

#[test]
fn unverifiable_lock_aborts_cycle() {
    let telemetry = cluster(vec![node("a", 85.0, 40.0, 40.0, Vec::new())]);
    let config = config();

    let err = Rebalancer::new(&config, &telemetry, &Unreachable)
        .unwrap()
        .plan()
        .unwrap_err();
    assert!(matches!(err, RebalanceError::LockCheck(_)));
}

#[test]
fn unusable_nodes_are_dropped_not_fatal() {
    let mut broken = node("a", 85.0, 40.0, 40.0, vec![vm("w", 3000.0, 0.0, 8.0, 10.0)]);
    broken.metrics.clear();
    let source = cluster(vec![broken, node("b", 40.0, 40.0, 40.0, Vec::new())]);

    assert_eq!(plan(&config(), &source), Plan::NoActionNeeded);
}

#[test]
fn excluded_nodes_take_no_part() {
    let source = cluster(vec![
        node("a", 85.0, 40.0, 40.0, vec![vm("w", 3000.0, 0.0, 8.0, 10.0)]),
        node("b", 40.0, 40.0, 40.0, Vec::new()),
    ]);
    let config = RebalanceConfig::from_toml_str("[exclude]\nnodes = [\"b\"]\n").unwrap();

    assert_eq!(plan(&config, &source), Plan::NoTargetAvailable);
    assert!(NameSet::new(&config.exclude.nodes).contains("B"));
}
