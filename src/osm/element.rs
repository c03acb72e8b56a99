use std::fmt;

use geo::Coord;
use super::Tags;

macro_rules! element_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
        }
    };
}

element_id!(
    /// OSM node identifier.
    NodeId
);
element_id!(
    /// OSM way identifier.
    WayId
);
element_id!(
    /// OSM relation identifier.
    RelationId
);

/// Reference to any element, used when reporting skipped records.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ElementRef {
    Node(NodeId),
    Way(WayId),
    Relation(RelationId),
}

impl fmt::Display for ElementRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Node(id) => write!(f, "node {id}"),
            Self::Way(id) => write!(f, "way {id}"),
            Self::Relation(id) => write!(f, "relation {id}"),
        }
    }
}

/// A point element with its WGS84 position (`x` = longitude, `y` = latitude).
#[derive(Debug, Clone, PartialEq)]
pub struct TaggedNode {
    pub id: NodeId,
    pub coord: Coord<f64>,
    pub tags: Tags,
}

impl TaggedNode {
    pub fn new(id: i64, lon: f64, lat: f64, tags: Tags) -> Self {
        Self { id: NodeId(id), coord: Coord { x: lon, y: lat }, tags }
    }

    #[inline] pub fn lon(&self) -> f64 { self.coord.x }

    #[inline] pub fn lat(&self) -> f64 { self.coord.y }

    /// True for nodes tagged `highway=traffic_signals`.
    #[inline] pub fn is_traffic_signal(&self) -> bool { self.tags.is("highway", "traffic_signals") }
}

/// An ordered path of node references; either a line or a polygon boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct TaggedWay {
    pub id: WayId,
    pub nodes: Vec<NodeId>,
    pub tags: Tags,
}

impl TaggedWay {
    pub fn new(id: i64, nodes: impl IntoIterator<Item = i64>, tags: Tags) -> Self {
        Self { id: WayId(id), nodes: nodes.into_iter().map(NodeId).collect(), tags }
    }

    /// A way is closed when its first and last node references coincide.
    pub fn is_closed(&self) -> bool {
        self.nodes.len() > 1 && self.nodes.first() == self.nodes.last()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MemberKind {
    Node,
    Way,
    Relation,
}

/// Multipolygon member role. Anything other than `outer`/`inner` is kept as `Other`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    Outer,
    Inner,
    Other(String),
}

impl From<&str> for Role {
    fn from(role: &str) -> Self {
        match role {
            "outer" => Self::Outer,
            "inner" => Self::Inner,
            other => Self::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    pub kind: MemberKind,
    pub id: i64,
    pub role: Role,
}

impl Member {
    pub fn way(id: i64, role: &str) -> Self {
        Self { kind: MemberKind::Way, id, role: Role::from(role) }
    }

    /// The member as a way reference, if it is one.
    pub fn as_way(&self) -> Option<WayId> {
        (self.kind == MemberKind::Way).then_some(WayId(self.id))
    }
}

/// A grouping of members; used here for multipolygons with holes.
#[derive(Debug, Clone, PartialEq)]
pub struct TaggedRelation {
    pub id: RelationId,
    pub members: Vec<Member>,
    pub tags: Tags,
}

impl TaggedRelation {
    pub fn new(id: i64, members: Vec<Member>, tags: Tags) -> Self {
        Self { id: RelationId(id), members, tags }
    }
}
