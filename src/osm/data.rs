use ahash::AHashMap;
use geo::Coord;

use super::{NodeId, RelationId, TaggedNode, TaggedRelation, TaggedWay, WayId};
use crate::skip::SkipReason;

/// One feature-source result: nodes, ways and relations with id lookups.
///
/// Elements keep the order in which they were added. Adding an element whose
/// id is already present is a no-op, so overlapping results can be merged.
#[derive(Debug, Clone, Default)]
pub struct OsmData {
    nodes: Vec<TaggedNode>,
    node_index: AHashMap<NodeId, usize>,
    ways: Vec<TaggedWay>,
    way_index: AHashMap<WayId, usize>,
    relations: Vec<TaggedRelation>,
    relation_index: AHashMap<RelationId, usize>,
}

impl OsmData {
    pub fn new() -> Self { Self::default() }

    pub fn from_parts(
        nodes: impl IntoIterator<Item = TaggedNode>,
        ways: impl IntoIterator<Item = TaggedWay>,
        relations: impl IntoIterator<Item = TaggedRelation>,
    ) -> Self {
        let mut data = Self::new();
        nodes.into_iter().for_each(|node| data.add_node(node));
        ways.into_iter().for_each(|way| data.add_way(way));
        relations.into_iter().for_each(|relation| data.add_relation(relation));
        data
    }

    pub fn add_node(&mut self, node: TaggedNode) {
        if self.node_index.contains_key(&node.id) { return }
        self.node_index.insert(node.id, self.nodes.len());
        self.nodes.push(node);
    }

    pub fn add_way(&mut self, way: TaggedWay) {
        if self.way_index.contains_key(&way.id) { return }
        self.way_index.insert(way.id, self.ways.len());
        self.ways.push(way);
    }

    pub fn add_relation(&mut self, relation: TaggedRelation) {
        if self.relation_index.contains_key(&relation.id) { return }
        self.relation_index.insert(relation.id, self.relations.len());
        self.relations.push(relation);
    }

    /// Absorb another result, keeping the first copy of duplicated elements.
    pub fn merge(&mut self, other: OsmData) {
        other.nodes.into_iter().for_each(|node| self.add_node(node));
        other.ways.into_iter().for_each(|way| self.add_way(way));
        other.relations.into_iter().for_each(|relation| self.add_relation(relation));
    }

    #[inline] pub fn nodes(&self) -> &[TaggedNode] { &self.nodes }

    #[inline] pub fn ways(&self) -> &[TaggedWay] { &self.ways }

    #[inline] pub fn relations(&self) -> &[TaggedRelation] { &self.relations }

    pub fn node(&self, id: NodeId) -> Option<&TaggedNode> {
        self.node_index.get(&id).map(|&i| &self.nodes[i])
    }

    pub fn way(&self, id: WayId) -> Option<&TaggedWay> {
        self.way_index.get(&id).map(|&i| &self.ways[i])
    }

    /// Nodes tagged `highway=traffic_signals`.
    pub fn traffic_signals(&self) -> impl Iterator<Item = &TaggedNode> {
        self.nodes.iter().filter(|node| node.is_traffic_signal())
    }

    /// Resolve every node reference of `way` to its coordinate.
    pub fn way_coords(&self, way: &TaggedWay) -> Result<Vec<Coord<f64>>, SkipReason> {
        way.nodes.iter()
            .map(|&id| self.node(id).map(|node| node.coord).ok_or(SkipReason::MissingNode(id)))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.ways.is_empty() && self.relations.is_empty()
    }

    /// Total number of elements.
    pub fn len(&self) -> usize { self.nodes.len() + self.ways.len() + self.relations.len() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::osm::Tags;

    fn sample() -> OsmData {
        let signal: Tags = [("highway", "traffic_signals")].into_iter().collect();
        OsmData::from_parts(
            [
                TaggedNode::new(1, -112.0, 33.0, Tags::new()),
                TaggedNode::new(2, -112.1, 33.1, signal),
            ],
            [TaggedWay::new(10, [1, 2], Tags::new()), TaggedWay::new(11, [1, 3], Tags::new())],
            [],
        )
    }

    #[test]
    fn lookups() {
        let data = sample();
        assert_eq!(data.len(), 4);
        assert_eq!(data.node(NodeId(2)).map(|n| n.lon()), Some(-112.1));
        assert!(data.node(NodeId(3)).is_none());
        assert!(data.way(WayId(11)).is_some());
        assert_eq!(data.traffic_signals().count(), 1);
    }

    #[test]
    fn way_coords_reports_missing_node() {
        let data = sample();
        let resolved = data.way_coords(data.way(WayId(10)).unwrap()).unwrap();
        assert_eq!(resolved.len(), 2);
        assert_eq!(
            data.way_coords(data.way(WayId(11)).unwrap()),
            Err(SkipReason::MissingNode(NodeId(3))),
        );
    }

    #[test]
    fn merge_keeps_first_copy() {
        let mut data = sample();
        data.merge(OsmData::from_parts(
            [TaggedNode::new(1, 0.0, 0.0, Tags::new()), TaggedNode::new(3, -112.2, 33.2, Tags::new())],
            [],
            [],
        ));
        assert_eq!(data.nodes().len(), 3);
        assert_eq!(data.node(NodeId(1)).map(|n| n.lon()), Some(-112.0));
    }
}
