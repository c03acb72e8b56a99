use anyhow::Result;
use roundabout::Pipeline;
use tracing::info;

use super::{load_config, overpass};
use crate::cli::{Cli, EnrichArgs};

pub fn run(cli: &Cli, args: &EnrichArgs) -> Result<()> {
    let mut config = load_config(cli, None)?;
    if let Some(dir) = &args.output_dir {
        config.output_dir = dir.clone();
    }
    if let Some(radius) = args.buffer_m {
        config.landuse_buffer_m = radius;
    }

    let source = overpass(&config)?;
    let pipeline = Pipeline::new(config, source)?;
    let summary = pipeline.enrich()?;
    info!(
        enriched = summary.enriched,
        failed = summary.failed,
        path = %pipeline.config().enriched_path().display(),
        "done",
    );
    Ok(())
}
