use anyhow::Result;
use roundabout::Pipeline;
use tracing::{info, warn};

use super::{load_config, overpass};
use crate::cli::{Cli, RunArgs};

pub fn run(cli: &Cli, args: &RunArgs) -> Result<()> {
    let mut config = load_config(cli, Some(&args.region))?;
    if let Some(mode) = args.mode {
        config.mode = mode;
    }
    config.debug_layers |= args.debug_layers;

    let source = overpass(&config)?;
    let pipeline = Pipeline::new(config, source)?;
    let summary = pipeline.run()?;

    info!(
        chunks = summary.chunks,
        cached = summary.cached,
        processed = summary.processed,
        records = summary.records,
        path = %pipeline.config().results_path().display(),
        "done",
    );
    if summary.failed > 0 {
        warn!(failed = summary.failed, "some chunks failed; run again to retry them");
    }
    Ok(())
}
