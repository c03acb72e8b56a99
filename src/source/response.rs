use std::collections::BTreeMap;

use serde::Deserialize;
use tracing::debug;

use super::FetchError;
use crate::osm::{Member, MemberKind, OsmData, Role, TaggedNode, TaggedRelation, TaggedWay, Tags};

#[derive(Debug, Deserialize)]
struct ResponseDto {
    #[serde(default)]
    elements: Vec<ElementDto>,
    #[serde(default)]
    remark: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ElementDto {
    Node {
        id: i64,
        lat: f64,
        lon: f64,
        #[serde(default)]
        tags: BTreeMap<String, String>,
    },
    Way {
        id: i64,
        #[serde(default)]
        nodes: Vec<i64>,
        #[serde(default)]
        tags: BTreeMap<String, String>,
    },
    Relation {
        id: i64,
        #[serde(default)]
        members: Vec<MemberDto>,
        #[serde(default)]
        tags: BTreeMap<String, String>,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct MemberDto {
    #[serde(rename = "type")]
    kind: String,
    #[serde(rename = "ref")]
    id: i64,
    #[serde(default)]
    role: String,
}

impl MemberDto {
    fn into_member(self) -> Option<Member> {
        let kind = match self.kind.as_str() {
            "node" => MemberKind::Node,
            "way" => MemberKind::Way,
            "relation" => MemberKind::Relation,
            _ => return None,
        };
        Some(Member { kind, id: self.id, role: Role::from(self.role.as_str()) })
    }
}

/// True for server messages that mean "slow down and try again".
pub fn is_rate_limit_message(message: &str) -> bool {
    let message = message.to_lowercase().replace('_', " ");
    ["too many requests", "rate limit", "server load"].iter().any(|needle| message.contains(needle))
}

/// Decode an Overpass `[out:json]` body.
///
/// A `remark` that reports throttling becomes [`FetchError::RateLimited`];
/// one that reports a runtime error becomes [`FetchError::Remote`].
pub fn decode_response(body: &str) -> Result<OsmData, FetchError> {
    let response: ResponseDto = serde_json::from_str(body).map_err(|e| FetchError::Decode(e.to_string()))?;

    if let Some(remark) = response.remark.as_deref() {
        if is_rate_limit_message(remark) {
            return Err(FetchError::RateLimited(remark.to_string()));
        }
        if remark.trim_start().starts_with("runtime") {
            return Err(FetchError::Remote(remark.to_string()));
        }
        debug!(remark, "ignoring overpass remark");
    }

    let mut data = OsmData::new();
    for element in response.elements {
        match element {
            ElementDto::Node { id, lat, lon, tags } => data.add_node(TaggedNode::new(id, lon, lat, Tags::from(tags))),
            ElementDto::Way { id, nodes, tags } => data.add_way(TaggedWay::new(id, nodes, Tags::from(tags))),
            ElementDto::Relation { id, members, tags } => {
                let members = members.into_iter().filter_map(MemberDto::into_member).collect();
                data.add_relation(TaggedRelation::new(id, members, Tags::from(tags)));
            }
            ElementDto::Other => {}
        }
    }
    Ok(data)
}
