mod data;
mod element;
mod tags;

pub use data::OsmData;
pub use element::{
    ElementRef, Member, MemberKind, NodeId, RelationId, Role, TaggedNode, TaggedRelation, TaggedWay, WayId,
};
pub use tags::Tags;
