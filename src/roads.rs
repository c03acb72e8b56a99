use crate::osm::TaggedWay;

/// Outcome of lane-topology classification, naming the rule that decided it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaneVerdict {
    /// `lanes - lanes:forward == 1`
    ForwardSplit,
    /// `lanes - lanes:backward == 1`
    BackwardSplit,
    /// Bare `lanes=2` without directional tags.
    BareTwoLane,
    /// `highway=service`, whatever the lane tags say.
    ServiceRoad,
    /// No integer `lanes` tag.
    MissingLanes,
    /// More than four lanes (and not two).
    TooManyLanes(i64),
    /// Directional tags present, but neither is one short of the total.
    Unbalanced,
}

impl LaneVerdict {
    pub fn is_two_lane(self) -> bool {
        matches!(self, Self::ForwardSplit | Self::BackwardSplit | Self::BareTwoLane)
    }
}

/// Classify a way by its lane tags. Rules apply in order; the first match wins.
pub fn classify(way: &TaggedWay) -> LaneVerdict {
    let tags = &way.tags;

    if tags.is("highway", "service") {
        return LaneVerdict::ServiceRoad;
    }

    let Some(lanes) = tags.parse::<i64>("lanes") else { return LaneVerdict::MissingLanes };
    if lanes != 2 && lanes > 4 {
        return LaneVerdict::TooManyLanes(lanes);
    }

    let forward = tags.parse::<i64>("lanes:forward");
    let backward = tags.parse::<i64>("lanes:backward");

    if forward.is_some_and(|f| lanes.checked_sub(f) == Some(1)) {
        LaneVerdict::ForwardSplit
    } else if backward.is_some_and(|b| lanes.checked_sub(b) == Some(1)) {
        LaneVerdict::BackwardSplit
    } else if lanes == 2 && forward.is_none() && backward.is_none() {
        LaneVerdict::BareTwoLane
    } else {
        LaneVerdict::Unbalanced
    }
}

/// True if one direction has exactly one more lane than the other, or a bare `lanes=2`.
#[inline]
pub fn is_two_lane(way: &TaggedWay) -> bool { classify(way).is_two_lane() }

/// Keep only two-lane roads.
pub fn filter_two_lane<'a>(ways: impl IntoIterator<Item = &'a TaggedWay>) -> Vec<&'a TaggedWay> {
    ways.into_iter().filter(|way| is_two_lane(way)).collect()
}

/// Display name of a road: `name`, else `ref`, else `Way <id>`.
pub fn road_name(way: &TaggedWay) -> String {
    way.tags.get("name")
        .or_else(|| way.tags.get("ref"))
        .map(str::to_string)
        .unwrap_or_else(|| format!("Way {}", way.id))
}
