mod query;
mod response;
mod retry;

#[cfg(feature = "overpass")]
mod overpass;

use std::fmt;

pub use query::{build_query, HIGHWAY_CLASSES};
pub use response::{decode_response, is_rate_limit_message};
pub use retry::{RetryPolicy, RetryingSource, Sleeper, ThreadSleeper, Throttle};

#[cfg(feature = "overpass")]
pub use overpass::OverpassClient;

use crate::geom::BoundingBox;
use crate::osm::OsmData;

/// One of the canned queries a [`FeatureSource`] answers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FeatureClass {
    /// Highways carrying any lane tag, plus the main highway classes.
    RoadsWithLanes,
    /// The main highway classes regardless of tagging.
    AllRoads,
    /// `highway=traffic_signals` nodes.
    TrafficSignals,
    /// Ways and relations carrying one of the configured `landuse` values.
    Landuse,
}

impl FeatureClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RoadsWithLanes => "roads-with-lanes",
            Self::AllRoads => "all-roads",
            Self::TrafficSignals => "traffic-signals",
            Self::Landuse => "landuse",
        }
    }
}

impl fmt::Display for FeatureClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// Failures of a feature fetch. Only [`FetchError::RateLimited`] is worth retrying.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FetchError {
    /// The server is overloaded or throttling us.
    #[error("rate limited: {0}")]
    RateLimited(String),
    /// Transport failure or an unexpected HTTP status.
    #[error("http error: {0}")]
    Http(String),
    /// The server accepted the query but reported a runtime error.
    #[error("remote runtime error: {0}")]
    Remote(String),
    /// The response body could not be decoded.
    #[error("could not decode response: {0}")]
    Decode(String),
    #[error("gave up after {attempts} attempts")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: Box<FetchError>,
    },
}

impl FetchError {
    #[inline]
    pub fn is_retryable(&self) -> bool { matches!(self, Self::RateLimited(_)) }
}

/// Answers feature-class queries over a bounding box.
///
/// Results contain the matching elements plus every node the returned ways
/// reference, so way geometry can be resolved without another round trip.
pub trait FeatureSource {
    fn fetch(&self, bbox: &BoundingBox, class: FeatureClass) -> Result<OsmData, FetchError>;
}

impl<S: FeatureSource + ?Sized> FeatureSource for &S {
    fn fetch(&self, bbox: &BoundingBox, class: FeatureClass) -> Result<OsmData, FetchError> {
        (**self).fetch(bbox, class)
    }
}

impl<S: FeatureSource + ?Sized> FeatureSource for Box<S> {
    fn fetch(&self, bbox: &BoundingBox, class: FeatureClass) -> Result<OsmData, FetchError> {
        (**self).fetch(bbox, class)
    }
}
