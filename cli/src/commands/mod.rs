pub mod enrich;
pub mod merge;
pub mod run;
pub mod tiles;

use anyhow::{Context, Result};
use roundabout::{Config, OverpassClient, RetryingSource};

use crate::cli::{Cli, RegionArgs};

/// Config file (or defaults) with the region flags applied, validated.
pub fn load_config(cli: &Cli, region: Option<&RegionArgs>) -> Result<Config> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(region) = region {
        if let Some(dir) = &region.output_dir {
            config.output_dir = dir.clone();
        }
        if let Some(bbox) = region.bbox {
            config.bbox = bbox;
        }
    }
    config.validate()?;
    Ok(config)
}

/// Overpass client with the configured throttling and retries.
pub fn overpass(config: &Config) -> Result<RetryingSource<OverpassClient>> {
    let client = OverpassClient::new(&config.overpass_url, config.query_timeout(), config.landuse_categories.clone())
        .with_context(|| format!("connect to {}", config.overpass_url))?;
    Ok(RetryingSource::new(client, config.retry_policy(), config.query_delay()))
}
