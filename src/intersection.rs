use std::collections::{BTreeMap, BTreeSet};

use geo::Coord;
use tracing::warn;

use crate::osm::{ElementRef, NodeId, OsmData, TaggedWay, WayId};
use crate::roads::road_name;
use crate::skip::{Processed, SkipReason, Skipped};

/// A road contributing to an intersection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoadRef {
    pub id: WayId,
    pub name: String,
}

impl RoadRef {
    pub fn from_way(way: &TaggedWay) -> Self {
        Self { id: way.id, name: road_name(way) }
    }
}

/// A candidate site: a node where several roads meet.
#[derive(Debug, Clone, PartialEq)]
pub struct IntersectionRecord {
    node_id: NodeId,
    coord: Coord<f64>,
    roads: Vec<RoadRef>,
}

impl IntersectionRecord {
    pub fn new(node_id: NodeId, coord: Coord<f64>, roads: Vec<RoadRef>) -> Self {
        Self { node_id, coord, roads }
    }

    #[inline] pub fn node_id(&self) -> NodeId { self.node_id }

    /// Position as lon/lat.
    #[inline] pub fn coord(&self) -> Coord<f64> { self.coord }

    #[inline] pub fn roads(&self) -> &[RoadRef] { &self.roads }

    #[inline] pub fn num_roads(&self) -> usize { self.roads.len() }

    pub fn road_names(&self) -> impl Iterator<Item = &str> { self.roads.iter().map(|r| r.name.as_str()) }

    pub fn road_ids(&self) -> impl Iterator<Item = WayId> + '_ { self.roads.iter().map(|r| r.id) }
}

/// Shared nodes mapped to the distinct ways that reference them.
pub type Intersections<'a> = BTreeMap<NodeId, Vec<&'a TaggedWay>>;

/// Nodes referenced by at least two distinct ways.
///
/// Matching is by node id only: an endpoint counts the same as a mid-span
/// node, and no geometric tolerance is applied.
pub fn find_intersections<'a>(ways: impl IntoIterator<Item = &'a TaggedWay>) -> Intersections<'a> {
    let mut node_to_ways: Intersections<'a> = BTreeMap::new();

    for way in ways {
        for &node in way.nodes.iter().collect::<BTreeSet<_>>() {
            let touching = node_to_ways.entry(node).or_default();
            if !touching.iter().any(|other| other.id == way.id) {
                touching.push(way);
            }
        }
    }

    node_to_ways.retain(|_, ways| ways.len() >= 2);
    node_to_ways
}

/// Resolve intersections to records. Nodes missing from `nodes` are skipped.
pub fn build_records(intersections: &Intersections<'_>, nodes: &OsmData) -> Processed<IntersectionRecord> {
    let mut records = Processed::new();

    for (&node_id, ways) in intersections {
        let Some(node) = nodes.node(node_id) else {
            records.skip(Skipped::new(ElementRef::Node(node_id), SkipReason::MissingNode(node_id)));
            continue;
        };
        let roads = ways.iter().map(|way| RoadRef::from_way(way)).collect();
        records.push(IntersectionRecord::new(node_id, node.coord, roads));
    }

    if !records.skipped.is_empty() {
        warn!(missing = records.skipped.len(), "intersection nodes absent from fetched result");
        records.log_skipped("build_records");
    }
    records
}

/// Keep records whose node carries a traffic signal.
pub fn filter_with_signals(records: Vec<IntersectionRecord>, signal_ids: &BTreeSet<NodeId>) -> Vec<IntersectionRecord> {
    records.into_iter().filter(|record| signal_ids.contains(&record.node_id)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::osm::{TaggedNode, Tags};

    fn named(id: i64, nodes: &[i64], name: &str) -> TaggedWay {
        TaggedWay::new(id, nodes.iter().copied(), [("name", name)].into_iter().collect())
    }

    #[test]
    fn two_ways_sharing_one_node() {
        let ways = vec![named(1, &[10, 11, 12], "A"), named(2, &[20, 11, 22], "B"), named(3, &[30, 31], "C")];
        let found = find_intersections(&ways);
        assert_eq!(found.len(), 1);
        let ids: Vec<i64> = found[&NodeId(11)].iter().map(|w| w.id.0).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn shared_endpoints_count_like_mid_span_nodes() {
        let ways = vec![named(1, &[10, 11], "A"), named(2, &[11, 12], "B"), named(3, &[12, 13, 11], "C")];
        let found = find_intersections(&ways);
        assert_eq!(found[&NodeId(11)].len(), 3);
        assert_eq!(found[&NodeId(12)].len(), 2);
        assert!(!found.contains_key(&NodeId(10)));
    }

    #[test]
    fn closed_way_does_not_intersect_itself() {
        let ways = vec![named(1, &[10, 11, 12, 10], "Loop")];
        assert!(find_intersections(&ways).is_empty());
    }

    #[test]
    fn records_skip_missing_nodes() {
        let ways = vec![
            named(1, &[10, 11, 12], "A"),
            TaggedWay::new(2, [20, 11, 12], [("ref", "SR 87")].into_iter().collect()),
        ];
        let nodes = OsmData::from_parts([TaggedNode::new(11, -112.07, 33.45, Tags::new())], [], []);
        let found = find_intersections(&ways);
        assert_eq!(found.len(), 2);

        let records = build_records(&found, &nodes);
        assert_eq!(records.items.len(), 1);
        assert_eq!(records.skipped, vec![Skipped::new(ElementRef::Node(NodeId(12)), SkipReason::MissingNode(NodeId(12)))]);

        let record = &records.items[0];
        assert_eq!(record.node_id(), NodeId(11));
        assert_eq!(record.coord(), Coord { x: -112.07, y: 33.45 });
        assert_eq!(record.num_roads(), 2);
        assert_eq!(record.road_names().collect::<Vec<_>>(), vec!["A", "SR 87"]);
        assert_eq!(record.road_ids().collect::<Vec<_>>(), vec![WayId(1), WayId(2)]);
    }

    #[test]
    fn signal_filter() {
        let a = IntersectionRecord::new(NodeId(1), Coord { x: 0.0, y: 0.0 }, vec![]);
        let b = IntersectionRecord::new(NodeId(2), Coord { x: 0.0, y: 0.0 }, vec![]);
        let kept = filter_with_signals(vec![a, b], &BTreeSet::from([NodeId(2)]));
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].node_id(), NodeId(2));
    }
}
