use std::collections::BTreeSet;
use std::path::PathBuf;

use anyhow::{Context, Result};
use geo::{BoundingRect, Coord};
use serde_json::Value;
use tracing::{debug, error, info, info_span, warn};

use crate::common::ensure_dir_exists;
use crate::config::Config;
use crate::geom::{chunk_filename, BoundingBox, GeometryKernel};
use crate::intersection::{build_records, filter_with_signals, find_intersections, IntersectionRecord};
use crate::io::{
    dedupe_by_intersection_id, intersection_feature, point_coord, read_features, road_features, signal_feature,
    with_landuse, write_feature_collection,
};
use crate::landuse::{landuse_polygons, Apportioner, LandUsePercentage};
use crate::osm::{NodeId, OsmData, TaggedWay};
use crate::roads::filter_two_lane;
use crate::signals::{RoadLines, SignalFilter};
use crate::skip::Processed;
use crate::source::{FeatureClass, FeatureSource};

/// Postfix of per-chunk result files; their presence marks a chunk as done.
pub const INTERSECTIONS_POSTFIX: &str = "intersections";
pub const ROADS_POSTFIX: &str = "roads";
pub const SIGNALS_POSTFIX: &str = "signals";

/// What happened to one chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkOutcome {
    /// A result file already existed.
    Cached,
    /// Fetched, detected and written.
    Processed { records: usize, skipped: usize },
}

/// Totals for a full run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub chunks: usize,
    pub cached: usize,
    pub processed: usize,
    pub failed: usize,
    /// Unique records in the merged output.
    pub records: usize,
}

/// Totals for a land-use enrichment pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnrichSummary {
    pub features: usize,
    pub enriched: usize,
    pub failed: usize,
}

/// Chunked candidate search over a [`FeatureSource`].
///
/// Chunks are processed one after another. Each chunk's result is written
/// atomically once the chunk succeeds, so an interrupted run resumes where
/// it stopped.
#[derive(Debug)]
pub struct Pipeline<S> {
    config: Config,
    source: S,
    kernel: GeometryKernel,
}

impl<S: FeatureSource> Pipeline<S> {
    pub fn new(config: Config, source: S) -> Result<Self> {
        config.validate()?;
        let kernel = config.kernel().context("set up projection")?;
        Ok(Self { config, source, kernel })
    }

    #[inline] pub fn config(&self) -> &Config { &self.config }

    #[inline] pub fn kernel(&self) -> &GeometryKernel { &self.kernel }

    /// The chunk grid for the configured region.
    pub fn chunks(&self) -> Result<Vec<BoundingBox>> {
        let chunks = self.kernel
            .tile(&self.config.bbox, self.config.chunk_size_miles, self.config.min_tile_area_sq_miles)
            .with_context(|| format!("tile {}", self.config.bbox))?;
        Ok(chunks)
    }

    pub fn chunk_path(&self, chunk: &BoundingBox, postfix: &str) -> PathBuf {
        self.config.output_dir.join(chunk_filename(chunk, postfix))
    }

    /// Candidates among `roads` and `signals` for the configured detection mode.
    pub fn detect(&self, roads: &OsmData, signals: &OsmData) -> Processed<IntersectionRecord> {
        let two_lane = filter_two_lane(roads.ways());
        self.detect_among(&two_lane, roads, signals)
    }

    fn detect_among(&self, two_lane: &[&TaggedWay], roads: &OsmData, signals: &OsmData) -> Processed<IntersectionRecord> {
        let mode = self.config.mode;
        let mut detected = Processed::new();

        if mode.uses_topology() {
            let intersections = find_intersections(two_lane.iter().copied());
            let built = build_records(&intersections, roads);
            let signal_ids: BTreeSet<NodeId> = signals.traffic_signals().map(|node| node.id).collect();
            let signalised = filter_with_signals(built.items, &signal_ids);
            debug!(shared_nodes = intersections.len(), signalised = signalised.len(), "topology detection");
            detected.skipped.extend(built.skipped);
            detected.items.extend(signalised);
        }

        if mode.uses_spatial() {
            let (lines, skipped) = RoadLines::build(two_lane.iter().copied(), roads);
            detected.skipped.extend(skipped);
            let matched = SignalFilter::new(&self.kernel, self.config.signal_buffer_m, self.config.min_road_hits)
                .match_signals(signals.nodes(), &lines);
            detected.skipped.extend(matched.skipped);

            let seen: BTreeSet<NodeId> = detected.items.iter().map(|r| r.node_id()).collect();
            detected.items.extend(
                matched.items.into_iter()
                    .filter(|m| !seen.contains(&m.node_id))
                    .map(IntersectionRecord::from),
            );
        }

        detected
    }

    /// Fetch, detect and persist one chunk, unless its result file already exists.
    pub fn process_chunk(&self, chunk: &BoundingBox) -> Result<ChunkOutcome> {
        let path = self.chunk_path(chunk, INTERSECTIONS_POSTFIX);
        if path.exists() {
            info!(path = %path.display(), "chunk already processed, skipping");
            return Ok(ChunkOutcome::Cached);
        }

        let roads = self.source.fetch(chunk, FeatureClass::AllRoads).context("fetch roads")?;
        let two_lane = filter_two_lane(roads.ways());
        info!(ways = roads.ways().len(), two_lane = two_lane.len(), "classified roads");

        if two_lane.len() < 2 {
            info!("fewer than two two-lane roads, nothing to detect");
            write_feature_collection(&path, Vec::new())?;
            return Ok(ChunkOutcome::Processed { records: 0, skipped: 0 });
        }

        let signals = self.source.fetch(chunk, FeatureClass::TrafficSignals).context("fetch traffic signals")?;
        let detected = self.detect_among(&two_lane, &roads, &signals);
        detected.log_skipped("detect");

        if self.config.debug_layers {
            let road_layer = road_features(two_lane.iter().copied(), &roads);
            write_feature_collection(&self.chunk_path(chunk, ROADS_POSTFIX), road_layer.items)?;
            let signal_layer = signals.traffic_signals().map(signal_feature).collect();
            write_feature_collection(&self.chunk_path(chunk, SIGNALS_POSTFIX), signal_layer)?;
        }

        let features = detected.items.iter().map(intersection_feature).collect();
        write_feature_collection(&path, features)?;
        info!(
            signals = signals.traffic_signals().count(),
            records = detected.items.len(),
            skipped = detected.skipped.len(),
            path = %path.display(),
            "chunk written",
        );
        Ok(ChunkOutcome::Processed { records: detected.items.len(), skipped: detected.skipped.len() })
    }

    /// Process every chunk, then merge. A failing chunk is logged and left for the next run.
    pub fn run(&self) -> Result<RunSummary> {
        ensure_dir_exists(&self.config.output_dir)?;
        let chunks = self.chunks()?;
        info!(chunks = chunks.len(), bbox = %self.config.bbox, mode = %self.config.mode, "starting run");

        let mut summary = RunSummary { chunks: chunks.len(), ..RunSummary::default() };
        for (index, chunk) in chunks.iter().enumerate() {
            let span = info_span!("chunk", index = index + 1, total = chunks.len(), bbox = %chunk);
            let _entered = span.enter();
            match self.process_chunk(chunk) {
                Ok(ChunkOutcome::Cached) => summary.cached += 1,
                Ok(ChunkOutcome::Processed { .. }) => summary.processed += 1,
                Err(e) => {
                    error!(error = %format!("{e:#}"), "chunk failed");
                    summary.failed += 1;
                }
            }
        }

        summary.records = self.merge_chunks(&chunks)?;
        info!(?summary, "run finished");
        Ok(summary)
    }

    /// Merge the existing chunk files of the current grid into the results file.
    pub fn merge(&self) -> Result<usize> {
        let chunks = self.chunks()?;
        self.merge_chunks(&chunks)
    }

    fn merge_chunks(&self, chunks: &[BoundingBox]) -> Result<usize> {
        let mut features: Vec<Value> = Vec::new();
        let mut files = 0;
        for chunk in chunks {
            let path = self.chunk_path(chunk, INTERSECTIONS_POSTFIX);
            if !path.exists() {
                continue;
            }
            features.extend(read_features(&path)?);
            files += 1;
        }

        let total = features.len();
        let unique = dedupe_by_intersection_id(features);
        let count = unique.len();
        let out = self.config.results_path();
        write_feature_collection(&out, unique)?;
        info!(files, features = total, unique = count, path = %out.display(), "merged chunk results");
        Ok(count)
    }

    /// Land-use mix around every merged result, written to the enriched file.
    pub fn enrich(&self) -> Result<EnrichSummary> {
        let input = self.config.results_path();
        let features = read_features(&input)?;
        let apportioner = Apportioner::new(&self.kernel);
        let mut summary = EnrichSummary { features: features.len(), ..EnrichSummary::default() };
        let mut enriched = Vec::with_capacity(features.len());

        for (index, feature) in features.iter().enumerate() {
            let Some(coord) = point_coord(feature) else {
                warn!(index, "feature has no point geometry, skipping");
                summary.failed += 1;
                continue;
            };
            match self.landuse_at(coord, &apportioner) {
                Ok(landuse) => {
                    enriched.push(with_landuse(feature, &landuse));
                    summary.enriched += 1;
                }
                Err(e) => {
                    error!(index, error = %format!("{e:#}"), "land-use lookup failed");
                    summary.failed += 1;
                }
            }
        }

        let out = self.config.enriched_path();
        write_feature_collection(&out, enriched)?;
        info!(?summary, path = %out.display(), "enrichment finished");
        Ok(summary)
    }

    /// Land-use percentages inside the configured buffer around `coord`.
    pub fn landuse_at(&self, coord: Coord<f64>, apportioner: &Apportioner<'_>) -> Result<LandUsePercentage> {
        let buffer = self.kernel.buffer(coord, self.config.landuse_buffer_m)?;
        let rect = buffer.bounding_rect().context("buffer has no extent")?;
        let bbox = BoundingBox::from_rect(rect)?;
        let data = self.source.fetch(&bbox, FeatureClass::Landuse).context("fetch land use")?;

        let polygons = landuse_polygons(&data, &self.config.landuse_categories);
        let (landuse, skipped) = apportioner.apportion(&buffer, &polygons.items);
        debug!(
            polygons = polygons.items.len(),
            skipped = polygons.skipped.len() + skipped.len(),
            "apportioned land use",
        );
        Ok(landuse)
    }
}
