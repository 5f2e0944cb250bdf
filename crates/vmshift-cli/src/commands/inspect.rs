use std::fmt::Write as _;
use std::path::Path;

use serde::Serialize;
use tracing::warn;

use vmshift_cluster::{RecordBuilder, TaskQueueInspector};
use vmshift_core::{NodeRecord, Thresholds};
use vmshift_placement::{Bottleneck, Strategy, classify, is_target, select_candidate};

#[derive(Debug, Serialize)]
struct Report {
    in_flight_tasks: Vec<String>,
    nodes: Vec<NodeReport>,
}

#[derive(Debug, Serialize)]
struct NodeReport {
    #[serde(flatten)]
    record: NodeRecord,
    bottleneck: Bottleneck,
    source: bool,
    target: bool,
    strategy: Option<Strategy>,
    /// Workload the cycle would pick on this node, if it is a source.
    candidate: Option<String>,
}

pub fn inspect(config: &Path, snapshot: &Path, format: &str) -> anyhow::Result<()> {
    let (config, source) = super::load(config, snapshot)?;

    let pattern = config.task_pattern()?;
    let in_flight_tasks = source
        .list_active_tasks(&pattern)?
        .into_iter()
        .filter(|t| t.is_in_flight())
        .map(|t| t.name)
        .collect();

    let builder = RecordBuilder::new(&source, &config)?;
    let mut nodes: Vec<NodeReport> = builder
        .build_nodes()?
        .into_iter()
        .map(|record| node_report(record, &config.thresholds))
        .collect();

    for node in nodes.iter_mut() {
        let Some(strategy) = node.strategy else {
            continue;
        };
        match builder.build_workloads(&node.record.name) {
            Ok(workloads) => {
                node.candidate = select_candidate(&workloads, strategy).map(|s| s.workload.name);
            }
            Err(e) => warn!(node = %node.record.name, error = %e, "cannot list workloads"),
        }
    }

    let report = Report {
        in_flight_tasks,
        nodes,
    };
    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        _ => print!("{}", format_report(&report)),
    }
    Ok(())
}

fn node_report(record: NodeRecord, thresholds: &Thresholds) -> NodeReport {
    let bottleneck = classify(&record, thresholds);
    NodeReport {
        source: bottleneck.any(),
        target: is_target(&record, thresholds),
        strategy: bottleneck.strategy(),
        bottleneck,
        record,
        candidate: None,
    }
}

fn role(node: &NodeReport) -> String {
    match (node.source, node.target) {
        (true, true) => format!("source ({}) + target", node.bottleneck),
        (true, false) => format!("source ({})", node.bottleneck),
        (false, true) => "target".to_string(),
        (false, false) => "-".to_string(),
    }
}

fn format_report(report: &Report) -> String {
    let mut out = String::new();

    if report.in_flight_tasks.is_empty() {
        let _ = writeln!(out, "in-flight relocations: none");
    } else {
        let _ = writeln!(out, "in-flight relocations: {}", report.in_flight_tasks.join(", "));
    }
    let _ = writeln!(out);

    let _ = writeln!(
        out,
        "{:<20} {:>6} {:>6} {:>6} {:>7} {:>9}  {:<20} ROLE",
        "NODE", "CPU%", "MEM%", "DISK%", "LOAD", "FREE GB", "VOLUME"
    );
    for node in &report.nodes {
        let r = &node.record;
        let _ = writeln!(
            out,
            "{:<20} {:>6.1} {:>6.1} {:>6.1} {:>7.1} {:>9.1}  {:<20} {}",
            r.name,
            r.cpu_used_pct,
            r.mem_used_pct,
            r.storage_used_pct,
            r.load_index,
            r.max_free_storage_gb,
            r.volume,
            role(node)
        );
    }

    let sources: Vec<&NodeReport> = report.nodes.iter().filter(|n| n.source).collect();
    if !sources.is_empty() {
        let _ = writeln!(out);
        for node in sources {
            let strategy = node.strategy.map_or("-", |s| s.label());
            let candidate = node.candidate.as_deref().unwrap_or("none");
            let _ = writeln!(out, "{}: {strategy}, candidate {candidate}", node.record.name);
        }
    }

    out
}
