// Integration tests for the chunk pipeline against an in-memory feature source:
//   detection end to end, resumability, failure isolation, merge, enrichment

use std::cell::RefCell;
use std::path::Path;

use roundabout::geojson::read_features;
use roundabout::{
    chunk_filename, BoundingBox, Config, DetectionMode, FeatureClass, FeatureSource, FetchError, OsmData, Pipeline,
    TaggedNode, TaggedWay, Tags, INTERSECTIONS_POSTFIX, ROADS_POSTFIX, SIGNALS_POSTFIX,
};

const LON: f64 = -112.07;
const LAT: f64 = 33.45;
const D: f64 = 0.001;

/// Answers every query with canned data, whatever the bbox.
#[derive(Default)]
struct FakeSource {
    roads: OsmData,
    signals: OsmData,
    landuse: OsmData,
    /// 1-based call number that fails with a non-retryable error.
    fail_call: Option<usize>,
    calls: RefCell<Vec<FeatureClass>>,
}

impl FakeSource {
    fn calls(&self) -> Vec<FeatureClass> { self.calls.borrow().clone() }
}

impl FeatureSource for FakeSource {
    fn fetch(&self, _: &BoundingBox, class: FeatureClass) -> Result<OsmData, FetchError> {
        self.calls.borrow_mut().push(class);
        if self.fail_call == Some(self.calls.borrow().len()) {
            return Err(FetchError::Http("503 Service Unavailable".into()));
        }
        Ok(match class {
            FeatureClass::RoadsWithLanes | FeatureClass::AllRoads => self.roads.clone(),
            FeatureClass::TrafficSignals => self.signals.clone(),
            FeatureClass::Landuse => self.landuse.clone(),
        })
    }
}

fn tags(pairs: &[(&str, &str)]) -> Tags { pairs.iter().copied().collect() }

fn two_lane(id: i64, name: &str, nodes: &[i64]) -> TaggedWay {
    TaggedWay::new(id, nodes.iter().copied(), tags(&[("highway", "residential"), ("lanes", "2"), ("name", name)]))
}

fn signal_node() -> TaggedNode { TaggedNode::new(3, LON, LAT, tags(&[("highway", "traffic_signals")])) }

/// An east-west and a north-south two-lane road crossing at signalised node 3.
/// With `diagonal`, a third road runs through the same node.
fn crossing(diagonal: bool) -> FakeSource {
    let mut nodes = vec![
        TaggedNode::new(1, LON - D, LAT, Tags::new()),
        TaggedNode::new(2, LON + D, LAT, Tags::new()),
        signal_node(),
        TaggedNode::new(4, LON, LAT - D, Tags::new()),
        TaggedNode::new(5, LON, LAT + D, Tags::new()),
    ];
    let mut ways = vec![two_lane(10, "Main St", &[1, 3, 2]), two_lane(11, "1st Ave", &[4, 3, 5])];
    if diagonal {
        nodes.push(TaggedNode::new(6, LON - D, LAT - D, Tags::new()));
        nodes.push(TaggedNode::new(7, LON + D, LAT + D, Tags::new()));
        ways.push(two_lane(12, "Grand Ave", &[6, 3, 7]));
    }
    FakeSource {
        roads: OsmData::from_parts(nodes, ways, []),
        signals: OsmData::from_parts([signal_node()], [], []),
        ..FakeSource::default()
    }
}

/// Small enough to be searched as one chunk.
fn small_bbox() -> BoundingBox { BoundingBox::new(LON - 0.005, LAT - 0.005, LON + 0.005, LAT + 0.005).unwrap() }

/// About ten square miles, several chunks.
fn large_bbox() -> BoundingBox { BoundingBox::new(LON - 0.03, LAT - 0.02, LON + 0.03, LAT + 0.02).unwrap() }

fn config(dir: &Path, bbox: BoundingBox) -> Config {
    Config { bbox, output_dir: dir.to_path_buf(), ..Config::default() }
}

#[test]
fn signalised_crossing_yields_one_record() {
    let dir = tempfile::tempdir().unwrap();
    let source = crossing(false);
    let pipeline = Pipeline::new(config(dir.path(), small_bbox()), &source).unwrap();

    let summary = pipeline.run().unwrap();
    assert_eq!((summary.chunks, summary.processed, summary.failed, summary.records), (1, 1, 0, 1));

    let features = read_features(&pipeline.config().results_path()).unwrap();
    assert_eq!(features.len(), 1);
    let properties = &features[0]["properties"];
    assert_eq!(properties["intersection_id"], "3");
    assert_eq!(properties["num_roads"], 2);
    assert_eq!(properties["road_ids"], serde_json::json!(["10", "11"]));
    assert_eq!(features[0]["geometry"]["coordinates"], serde_json::json!([LON, LAT]));
}

#[test]
fn every_mode_reports_a_three_way_signal_once() {
    for mode in [DetectionMode::Topology, DetectionMode::Spatial, DetectionMode::Combined] {
        let dir = tempfile::tempdir().unwrap();
        let source = crossing(true);
        let pipeline = Pipeline::new(Config { mode, ..config(dir.path(), small_bbox()) }, &source).unwrap();

        let roads = source.roads.clone();
        let detected = pipeline.detect(&roads, &source.signals);
        assert_eq!(detected.items.len(), 1, "mode {mode}");
        assert_eq!(detected.items[0].node_id().0, 3);
        assert_eq!(detected.items[0].num_roads(), 3, "mode {mode}");
    }
}

#[test]
fn spatial_mode_needs_enough_roads() {
    let dir = tempfile::tempdir().unwrap();
    let source = crossing(false);
    let cfg = Config { mode: DetectionMode::Spatial, ..config(dir.path(), small_bbox()) };
    let pipeline = Pipeline::new(cfg, &source).unwrap();
    assert!(pipeline.detect(&source.roads, &source.signals).items.is_empty());
}

#[test]
fn finished_chunks_are_not_fetched_again() {
    let dir = tempfile::tempdir().unwrap();
    let source = crossing(false);
    let pipeline = Pipeline::new(config(dir.path(), small_bbox()), &source).unwrap();

    pipeline.run().unwrap();
    let fetched = source.calls().len();
    assert_eq!(fetched, 2);

    let summary = pipeline.run().unwrap();
    assert_eq!((summary.cached, summary.processed, summary.records), (1, 0, 1));
    assert_eq!(source.calls().len(), fetched);
}

#[test]
fn a_failing_chunk_does_not_stop_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let source = FakeSource { fail_call: Some(1), ..crossing(false) };
    let pipeline = Pipeline::new(config(dir.path(), large_bbox()), &source).unwrap();
    let chunks = pipeline.chunks().unwrap();
    assert!(chunks.len() > 1);

    let summary = pipeline.run().unwrap();
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.processed, chunks.len() - 1);
    assert!(!dir.path().join(chunk_filename(&chunks[0], INTERSECTIONS_POSTFIX)).exists());
    // Every chunk sees the same crossing; the merge keeps one copy.
    assert_eq!(summary.records, 1);

    let retry = crossing(false);
    let pipeline = Pipeline::new(config(dir.path(), large_bbox()), &retry).unwrap();
    let summary = pipeline.run().unwrap();
    assert_eq!((summary.cached, summary.processed, summary.failed), (chunks.len() - 1, 1, 0));
    assert_eq!(retry.calls().len(), 2);
}

#[test]
fn sparse_chunks_persist_an_empty_result() {
    let dir = tempfile::tempdir().unwrap();
    let mut source = crossing(false);
    source.roads = OsmData::from_parts(
        source.roads.nodes().to_vec(),
        [two_lane(10, "Main St", &[1, 3, 2]), TaggedWay::new(11, [4, 3, 5], tags(&[("highway", "residential"), ("lanes", "4")]))],
        [],
    );
    let pipeline = Pipeline::new(config(dir.path(), small_bbox()), &source).unwrap();
    let summary = pipeline.run().unwrap();

    assert_eq!((summary.processed, summary.records), (1, 0));
    assert_eq!(source.calls(), vec![FeatureClass::AllRoads]);
    let chunk = pipeline.chunk_path(&small_bbox(), INTERSECTIONS_POSTFIX);
    assert!(read_features(&chunk).unwrap().is_empty());
}

#[test]
fn debug_layers_are_written_on_request() {
    let dir = tempfile::tempdir().unwrap();
    let source = crossing(false);
    let pipeline = Pipeline::new(Config { debug_layers: true, ..config(dir.path(), small_bbox()) }, &source).unwrap();
    pipeline.run().unwrap();

    let roads = read_features(&pipeline.chunk_path(&small_bbox(), ROADS_POSTFIX)).unwrap();
    assert_eq!(roads.len(), 2);
    assert_eq!(roads[0]["properties"]["lanes"], "2");
    let signals = read_features(&pipeline.chunk_path(&small_bbox(), SIGNALS_POSTFIX)).unwrap();
    assert_eq!(signals.len(), 1);
    assert_eq!(signals[0]["properties"]["id"], "3");
}

#[test]
fn enrichment_adds_landuse_mix() {
    let dir = tempfile::tempdir().unwrap();
    let mut source = crossing(false);
    // Covers the whole 804.67 m buffer around the crossing.
    let corners = [(20, -0.02, -0.02), (21, 0.02, -0.02), (22, 0.02, 0.02), (23, -0.02, 0.02)];
    source.landuse = OsmData::from_parts(
        corners.iter().map(|&(id, dx, dy)| TaggedNode::new(id, LON + dx, LAT + dy, Tags::new())),
        [TaggedWay::new(30, [20, 21, 22, 23, 20], tags(&[("landuse", "residential")]))],
        [],
    );
    let pipeline = Pipeline::new(config(dir.path(), small_bbox()), &source).unwrap();
    pipeline.run().unwrap();

    let summary = pipeline.enrich().unwrap();
    assert_eq!((summary.features, summary.enriched, summary.failed), (1, 1, 0));
    let features = read_features(&pipeline.config().enriched_path()).unwrap();
    assert_eq!(features[0]["properties"]["landuse"], serde_json::json!({ "residential": 100.0 }));
    assert_eq!(features[0]["properties"]["intersection_id"], "3");
}
