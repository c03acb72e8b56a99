#![doc = "Roundabout candidate search over OpenStreetMap data"]
mod common;
mod config;
mod geom;
mod intersection;
mod io;
mod landuse;
mod osm;
mod pipeline;
mod roads;
mod signals;
mod skip;
mod source;

#[doc(inline)]
pub use config::{Config, ConfigError, DetectionMode, DEFAULT_LANDUSE_CATEGORIES};

#[doc(inline)]
pub use geom::{
    chunk_filename, stable_key, BoundingBox, GeometryError, GeometryKernel, LocalProjection, UtmZone,
    METERS_PER_MILE, SQ_METERS_PER_SQ_MILE,
};

#[doc(inline)]
pub use osm::{
    ElementRef, Member, MemberKind, NodeId, OsmData, RelationId, Role, TaggedNode, TaggedRelation, TaggedWay, Tags,
    WayId,
};

#[doc(inline)]
pub use roads::{classify, filter_two_lane, is_two_lane, road_name, LaneVerdict};

#[doc(inline)]
pub use intersection::{build_records, filter_with_signals, find_intersections, IntersectionRecord, Intersections, RoadRef};

#[doc(inline)]
pub use signals::{eligible_signals, RoadLines, SignalFilter, SignalMatch};

#[doc(inline)]
pub use landuse::{
    landuse_polygons, relation_to_polygon, way_to_polygon, Apportioner, LandUsePercentage, LandUsePolygon, UNKNOWN,
};

#[doc(inline)]
pub use skip::{Processed, SkipReason, Skipped};

#[doc(inline)]
pub use source::{
    build_query, decode_response, is_rate_limit_message, FeatureClass, FeatureSource, FetchError, RetryPolicy, RetryingSource, Sleeper,
    ThreadSleeper, Throttle, HIGHWAY_CLASSES,
};

#[cfg(feature = "overpass")]
#[doc(inline)]
pub use source::OverpassClient;

#[doc(inline)]
pub use pipeline::{ChunkOutcome, EnrichSummary, Pipeline, RunSummary, INTERSECTIONS_POSTFIX, ROADS_POSTFIX, SIGNALS_POSTFIX};

/// GeoJSON encoding of roads, signals and candidate intersections.
pub mod geojson {
    pub use crate::io::*;
}
