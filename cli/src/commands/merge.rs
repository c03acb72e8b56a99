use anyhow::Result;
use roundabout::Pipeline;
use tracing::info;

use super::{load_config, overpass};
use crate::cli::{Cli, RegionArgs};

pub fn run(cli: &Cli, args: &RegionArgs) -> Result<()> {
    let config = load_config(cli, Some(args))?;
    let source = overpass(&config)?;
    let pipeline = Pipeline::new(config, source)?;
    let records = pipeline.merge()?;
    info!(records, path = %pipeline.config().results_path().display(), "merged");
    Ok(())
}
