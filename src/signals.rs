use std::collections::BTreeSet;

use geo::{BoundingRect, Coord, Intersects, LineString, Polygon, Rect};
use rstar::{RTree, RTreeObject, AABB};
use tracing::{debug, info};

use crate::geom::{GeometryError, GeometryKernel};
use crate::intersection::{IntersectionRecord, RoadRef};
use crate::osm::{ElementRef, NodeId, OsmData, TaggedNode, TaggedWay};
use crate::skip::{Processed, SkipReason, Skipped};

/// A line envelope in the R-tree, associated with a road by index.
#[derive(Debug, Clone)]
struct LineEnvelope {
    idx: usize,
    bbox: Rect<f64>,
}

impl RTreeObject for LineEnvelope {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(self.bbox.min().into(), self.bbox.max().into())
    }
}

/// Road geometries with an R-tree over their envelopes.
#[derive(Debug)]
pub struct RoadLines {
    roads: Vec<RoadRef>,
    lines: Vec<LineString<f64>>,
    rtree: RTree<LineEnvelope>,
}

impl RoadLines {
    /// Build lines for `ways`, resolving nodes through `nodes`.
    ///
    /// Unresolvable node references are dropped; ways left with fewer than
    /// two nodes are skipped.
    pub fn build<'a>(ways: impl IntoIterator<Item = &'a TaggedWay>, nodes: &OsmData) -> (Self, Vec<Skipped>) {
        let mut roads = Vec::new();
        let mut lines = Vec::new();
        let mut skipped = Vec::new();

        for way in ways {
            let mut missing = None;
            let coords: Vec<Coord<f64>> = way.nodes.iter()
                .filter_map(|&id| {
                    let coord = nodes.node(id).map(|node| node.coord);
                    if coord.is_none() { missing.get_or_insert(id); }
                    coord
                })
                .collect();

            if coords.len() < 2 {
                let reason = match missing {
                    Some(id) => SkipReason::MissingNode(id),
                    None => GeometryError::InvalidGeometry(format!("road has {} resolvable nodes", coords.len())).into(),
                };
                skipped.push(Skipped::new(ElementRef::Way(way.id), reason));
                continue;
            }
            if coords.iter().any(|c| !(c.x.is_finite() && c.y.is_finite())) {
                let reason = GeometryError::InvalidGeometry("non-finite road coordinate".into());
                skipped.push(Skipped::new(ElementRef::Way(way.id), reason));
                continue;
            }

            roads.push(RoadRef::from_way(way));
            lines.push(LineString(coords));
        }

        let rtree = RTree::bulk_load(lines.iter().enumerate()
            .filter_map(|(idx, line)| line.bounding_rect().map(|bbox| LineEnvelope { idx, bbox }))
            .collect());

        (Self { roads, lines, rtree }, skipped)
    }

    #[inline] pub fn len(&self) -> usize { self.lines.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.lines.is_empty() }

    /// Roads whose line intersects `area` (touching the boundary counts).
    pub fn hits(&self, area: &Polygon<f64>) -> Vec<&RoadRef> {
        let Some(rect) = area.bounding_rect() else { return Vec::new() };
        let search = AABB::from_corners(rect.min().into(), rect.max().into());

        let mut hits: Vec<usize> = self.rtree.locate_in_envelope_intersecting(&search)
            .map(|cand| cand.idx)
            .filter(|&idx| area.intersects(&self.lines[idx]))
            .collect();
        hits.sort_unstable();
        hits.into_iter().map(|idx| &self.roads[idx]).collect()
    }
}

/// A traffic signal whose buffer is crossed by enough roads.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalMatch {
    pub node_id: NodeId,
    pub coord: Coord<f64>,
    pub roads: Vec<RoadRef>,
}

impl From<SignalMatch> for IntersectionRecord {
    fn from(m: SignalMatch) -> Self { IntersectionRecord::new(m.node_id, m.coord, m.roads) }
}

/// Buffers traffic signals and counts the road lines crossing each buffer.
#[derive(Debug)]
pub struct SignalFilter<'k> {
    kernel: &'k GeometryKernel,
    buffer_radius_m: f64,
    min_intersections: usize,
}

impl<'k> SignalFilter<'k> {
    pub const DEFAULT_BUFFER_RADIUS_M: f64 = 2.0;
    pub const DEFAULT_MIN_INTERSECTIONS: usize = 3;

    pub fn new(kernel: &'k GeometryKernel, buffer_radius_m: f64, min_intersections: usize) -> Self {
        Self { kernel, buffer_radius_m, min_intersections }
    }

    /// Signals whose buffer meets at least `min_intersections` roads.
    ///
    /// Nodes not tagged `highway=traffic_signals` are ignored. A signal whose
    /// buffer cannot be built is skipped; it never aborts the batch.
    pub fn match_signals<'a>(
        &self,
        signals: impl IntoIterator<Item = &'a TaggedNode>,
        roads: &RoadLines,
    ) -> Processed<SignalMatch> {
        let mut matches = Processed::new();

        for node in signals.into_iter().filter(|node| node.is_traffic_signal()) {
            let buffer = match self.kernel.buffer(node.coord, self.buffer_radius_m) {
                Ok(buffer) => buffer,
                Err(e) => {
                    matches.skip(Skipped::new(ElementRef::Node(node.id), e));
                    continue;
                }
            };

            let hits = roads.hits(&buffer);
            if hits.len() >= self.min_intersections {
                debug!(signal = %node.id, roads = hits.len(), "signal meets roads");
                matches.push(SignalMatch {
                    node_id: node.id,
                    coord: node.coord,
                    roads: hits.into_iter().cloned().collect(),
                });
            }
        }

        info!(
            eligible = matches.items.len(),
            skipped = matches.skipped.len(),
            min_roads = self.min_intersections,
            "filtered traffic signals against road lines",
        );
        matches.log_skipped("match_signals");
        matches
    }

    /// Ids of the eligible signals.
    pub fn eligible_signals<'a>(
        &self,
        signals: impl IntoIterator<Item = &'a TaggedNode>,
        roads: &RoadLines,
    ) -> BTreeSet<NodeId> {
        self.match_signals(signals, roads).items.into_iter().map(|m| m.node_id).collect()
    }
}

/// One-shot form: build road lines from `roads` and return the eligible signal ids.
pub fn eligible_signals<'a>(
    kernel: &GeometryKernel,
    signal_nodes: impl IntoIterator<Item = &'a TaggedNode>,
    roads: impl IntoIterator<Item = &'a TaggedWay>,
    nodes: &OsmData,
    buffer_radius_m: f64,
    min_intersections: usize,
) -> BTreeSet<NodeId> {
    let (lines, skipped) = RoadLines::build(roads, nodes);
    if !skipped.is_empty() {
        debug!(skipped = skipped.len(), "roads without usable geometry");
    }
    SignalFilter::new(kernel, buffer_radius_m, min_intersections).eligible_signals(signal_nodes, &lines)
}
