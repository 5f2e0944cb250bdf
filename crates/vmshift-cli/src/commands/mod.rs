pub mod evaluate;
pub mod inspect;

use std::path::Path;

use anyhow::Context;

use vmshift_cluster::SnapshotSource;
use vmshift_core::RebalanceConfig;

/// Load the config, start logging from it, then load the snapshot.
pub(crate) fn load(
    config: &Path,
    snapshot: &Path,
) -> anyhow::Result<(RebalanceConfig, SnapshotSource)> {
    let config = RebalanceConfig::from_file(config)
        .with_context(|| format!("failed to load config {}", config.display()))?;
    crate::logging::init(&config.log)?;

    let source = SnapshotSource::load(snapshot)
        .with_context(|| format!("failed to load snapshot {}", snapshot.display()))?;
    Ok((config, source))
}

pub fn default_config() -> anyhow::Result<()> {
    print!("{}", RebalanceConfig::default().to_toml_string()?);
    Ok(())
}
