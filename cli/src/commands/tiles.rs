use anyhow::Result;
use roundabout::{chunk_filename, stable_key, INTERSECTIONS_POSTFIX};

use super::load_config;
use crate::cli::{Cli, RegionArgs};

pub fn run(cli: &Cli, args: &RegionArgs) -> Result<()> {
    let config = load_config(cli, Some(args))?;
    let kernel = config.kernel()?;
    let area = kernel.bbox_area_sq_miles(&config.bbox)?;
    let chunks = kernel.tile(&config.bbox, config.chunk_size_miles, config.min_tile_area_sq_miles)?;

    eprintln!("{} ({area:.1} sq mi) -> {} chunk(s)", config.bbox, chunks.len());
    for (index, chunk) in chunks.iter().enumerate() {
        let cached = config.output_dir.join(chunk_filename(chunk, INTERSECTIONS_POSTFIX)).exists();
        println!(
            "{}\t{}\t{}\t{}",
            index + 1,
            stable_key(chunk, INTERSECTIONS_POSTFIX),
            chunk,
            if cached { "done" } else { "pending" },
        );
    }
    Ok(())
}
