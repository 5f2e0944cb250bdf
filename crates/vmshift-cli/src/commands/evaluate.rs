use std::path::Path;

use tracing::info;

use vmshift_cluster::LoggingExecutor;
use vmshift_core::Outcome;
use vmshift_rebalance::Rebalancer;

pub fn evaluate(config: &Path, snapshot: &Path, format: &str, dry_run: bool) -> anyhow::Result<()> {
    let (mut config, source) = super::load(config, snapshot)?;
    config.dry_run |= dry_run;

    let rebalancer = Rebalancer::new(&config, &source, &source)?;
    let mut executor = LoggingExecutor::new();
    let outcome = rebalancer.run_cycle(&mut executor)?;
    info!(requests = executor.requests().len(), "evaluation complete");

    println!("{}", render(&outcome, format)?);
    Ok(())
}

fn render(outcome: &Outcome, format: &str) -> anyhow::Result<String> {
    Ok(match format {
        "json" => serde_json::to_string_pretty(outcome)?,
        _ => outcome.to_string(),
    })
}
