//! Rebalancer — sequences one decision cycle.
//!
//! `plan()` walks the state machine up to the point of a decision and
//! touches nothing outside the process, so running it twice against the
//! same telemetry gives the same answer. `run_cycle()` plans and then
//! hands an accepted move to the relocation executor.

use tracing::{debug, info, warn};

use vmshift_cluster::{
    ClusterTelemetrySource, RecordBuilder, RelocationExecutor, RelocationResponse,
    TaskQueueInspector,
};
use vmshift_core::{NodeRecord, Outcome, RebalanceConfig, TaskPattern, WorkloadRecord};
use vmshift_placement::{Bottleneck, Strategy, admit, partition, select_candidate};

use crate::error::{RebalanceError, RebalanceResult};

/// A relocation chosen by the cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct MigrationDecision {
    pub workload: WorkloadRecord,
    pub source: NodeRecord,
    pub bottleneck: Bottleneck,
    /// Strategy implied by the source's bottleneck.
    pub strategy: Strategy,
    /// Key order that picked the workload.
    pub ranking: Strategy,
    /// The target as it will look once the workload lands. Charged
    /// before the executor is called.
    pub projected_target: NodeRecord,
}

impl MigrationDecision {
    pub fn target(&self) -> &str {
        &self.projected_target.name
    }

    pub fn volume(&self) -> &str {
        &self.projected_target.volume
    }
}

/// Where the state machine stopped.
#[derive(Debug, Clone, PartialEq)]
pub enum Plan {
    /// Relocation tasks already in flight, by name.
    Deferred { tasks: Vec<String> },
    NoActionNeeded,
    NoTargetAvailable,
    Migrate(Box<MigrationDecision>),
    NoEligibleMove,
}

/// Evaluates the cluster once per call against an immutable config.
pub struct Rebalancer<'a> {
    config: &'a RebalanceConfig,
    tasks: &'a dyn TaskQueueInspector,
    task_pattern: TaskPattern,
    builder: RecordBuilder<'a>,
}

impl<'a> Rebalancer<'a> {
    pub fn new(
        config: &'a RebalanceConfig,
        telemetry: &'a dyn ClusterTelemetrySource,
        tasks: &'a dyn TaskQueueInspector,
    ) -> RebalanceResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            tasks,
            task_pattern: config.task_pattern()?,
            builder: RecordBuilder::new(telemetry, config)?,
        })
    }

    /// Run the cycle up to a decision without acting on it.
    pub fn plan(&self) -> RebalanceResult<Plan> {
        // LOCK_CHECK
        let in_flight = self.in_flight_tasks()?;
        if !in_flight.is_empty() {
            info!(
                tasks = ?in_flight,
                pattern = self.task_pattern.as_str(),
                "relocation already in flight, deferring cycle"
            );
            return Ok(Plan::Deferred { tasks: in_flight });
        }

        // COLLECT
        let nodes = self.builder.build_nodes()?;
        debug!(nodes = nodes.len(), "node records collected");

        // CLASSIFY_SOURCES
        let thresholds = &self.config.thresholds;
        let roles = partition(&nodes, thresholds);
        if roles.sources.is_empty() {
            info!(nodes = nodes.len(), "no node over threshold");
            return Ok(Plan::NoActionNeeded);
        }
        if roles.targets.is_empty() {
            warn!(
                sources = roles.sources.len(),
                "overloaded nodes found but no node can take load"
            );
            return Ok(Plan::NoTargetAvailable);
        }
        info!(
            sources = roles.sources.len(),
            targets = roles.targets.len(),
            "nodes classified"
        );

        for (source, bottleneck) in &roles.sources {
            let Some(strategy) = bottleneck.strategy() else {
                continue;
            };
            debug!(
                node = %source.name,
                load_index = source.load_index,
                %bottleneck,
                dimensions = bottleneck.count(),
                %strategy,
                "evaluating source"
            );

            // SELECT_VM
            let workloads = match self.builder.build_workloads(&source.name) {
                Ok(w) => w,
                Err(e) => {
                    warn!(
                        node = %source.name,
                        error = %e,
                        "cannot list workloads, skipping source"
                    );
                    continue;
                }
            };
            let Some(selection) = select_candidate(&workloads, strategy) else {
                info!(node = %source.name, "no workload with usable metrics, skipping source");
                continue;
            };
            if selection.reranked() {
                info!(
                    node = %source.name,
                    workload = %selection.workload.name,
                    "cpu ranking below signal floor, candidate picked by memory"
                );
            }

            // SELECT_TARGET
            let targets = roles.targets.iter().filter(|t| t.name != source.name);
            let Some(target) = admit(&selection.workload, targets, thresholds.cpu_pct) else {
                info!(
                    node = %source.name,
                    workload = %selection.workload.name,
                    "no target can admit candidate, skipping source"
                );
                continue;
            };

            let mut projected_target = target.clone();
            projected_target.reserve(&selection.workload);

            info!(
                workload = %selection.workload.name,
                source = %source.name,
                target = %projected_target.name,
                volume = %projected_target.volume,
                strategy = %selection.ranking,
                "migration planned"
            );

            return Ok(Plan::Migrate(Box::new(MigrationDecision {
                workload: selection.workload,
                source: source.clone(),
                bottleneck: *bottleneck,
                strategy,
                ranking: selection.ranking,
                projected_target,
            })));
        }

        info!(sources = roles.sources.len(), "no eligible move for any source");
        Ok(Plan::NoEligibleMove)
    }

    /// Run one full cycle and report its outcome.
    pub fn run_cycle(&self, executor: &mut dyn RelocationExecutor) -> RebalanceResult<Outcome> {
        let outcome = match self.plan()? {
            Plan::Deferred { .. } => Outcome::DeferredLockHeld,
            Plan::NoActionNeeded => Outcome::NoActionNeeded,
            Plan::NoTargetAvailable => Outcome::NoTargetAvailable,
            Plan::NoEligibleMove => Outcome::NoEligibleMove,
            Plan::Migrate(decision) => self.migrate(&decision, executor),
        };

        info!(outcome = outcome.label(), "cycle finished");
        Ok(outcome)
    }

    // MIGRATE
    fn migrate(
        &self,
        decision: &MigrationDecision,
        executor: &mut dyn RelocationExecutor,
    ) -> Outcome {
        let workload = decision.workload.name.clone();
        let source = decision.source.name.clone();
        let target = decision.target().to_string();
        let volume = decision.volume().to_string();

        if self.config.dry_run {
            info!(%workload, %target, "dry run, relocation not issued");
            return Outcome::MigrationInitiated {
                workload,
                source,
                target,
                volume,
                dry_run: true,
            };
        }

        let reason = match executor.relocate(&workload, &target, &volume) {
            Ok(RelocationResponse::Accepted) => {
                return Outcome::MigrationInitiated {
                    workload,
                    source,
                    target,
                    volume,
                    dry_run: false,
                };
            }
            Ok(RelocationResponse::Rejected(reason)) => reason,
            Err(e) => e.to_string(),
        };

        warn!(%workload, %target, %reason, "relocation rejected, not retrying this cycle");
        Outcome::MigrationRejected {
            workload,
            source,
            target,
            volume,
            reason,
        }
    }

    fn in_flight_tasks(&self) -> RebalanceResult<Vec<String>> {
        let tasks = self
            .tasks
            .list_active_tasks(&self.task_pattern)
            .map_err(RebalanceError::LockCheck)?;

        Ok(tasks
            .into_iter()
            .filter(|t| t.is_in_flight() && self.task_pattern.is_match(&t.name))
            .map(|t| t.name)
            .collect())
    }
}
