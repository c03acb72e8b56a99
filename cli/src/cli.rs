use std::path::PathBuf;

use roundabout::{BoundingBox, DetectionMode};

/// Roundabout candidate finder
#[derive(clap::Parser, Debug)]
#[command(name = "roundabout", version, about, propagate_version = true)]
pub struct Cli {
    /// Increase output verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only report errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// JSON config file; fields it omits keep their defaults
    #[arg(short, long, global = true, value_hint = clap::ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Search every chunk of the region and merge the results
    Run(RunArgs),

    /// Print the chunk grid and cache keys (no network)
    Tiles(RegionArgs),

    /// Merge existing chunk results only
    Merge(RegionArgs),

    /// Add land-use percentages around each merged result
    Enrich(EnrichArgs),
}

#[derive(clap::Args, Debug)]
pub struct RegionArgs {
    /// Directory for chunk files and merged results
    #[arg(short, long, value_hint = clap::ValueHint::DirPath)]
    pub output_dir: Option<PathBuf>,

    /// Region as min_lon,min_lat,max_lon,max_lat
    #[arg(long, value_parser = parse_bbox, allow_hyphen_values = true)]
    pub bbox: Option<BoundingBox>,
}

#[derive(clap::Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub region: RegionArgs,

    /// topology, spatial or combined
    #[arg(short, long)]
    pub mode: Option<DetectionMode>,

    /// Also write per-chunk road and signal layers
    #[arg(long)]
    pub debug_layers: bool,
}

#[derive(clap::Args, Debug)]
pub struct EnrichArgs {
    /// Directory holding the merged results
    #[arg(short, long, value_hint = clap::ValueHint::DirPath)]
    pub output_dir: Option<PathBuf>,

    /// Land-use buffer radius in meters
    #[arg(long)]
    pub buffer_m: Option<f64>,
}

fn parse_bbox(s: &str) -> Result<BoundingBox, String> {
    let values = s.split(',')
        .map(|v| v.trim().parse::<f64>().map_err(|e| format!("`{v}`: {e}")))
        .collect::<Result<Vec<_>, _>>()?;
    let [min_lon, min_lat, max_lon, max_lat] = values[..] else {
        return Err(format!("expected 4 comma-separated values, got {}", values.len()));
    };
    BoundingBox::new(min_lon, min_lat, max_lon, max_lat).map_err(|e| e.to_string())
}
