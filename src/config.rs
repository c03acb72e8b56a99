use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::geom::{BoundingBox, GeometryError, GeometryKernel, UtmZone};
use crate::source::RetryPolicy;

/// `landuse=*` values apportioned by default.
pub const DEFAULT_LANDUSE_CATEGORIES: [&str; 25] = [
    "residential", "commercial", "industrial", "retail", "office", "institutional", "mixed",
    "recreation_ground", "cemetery", "allotments", "farmland", "forest", "meadow", "park",
    "greenfield", "brownfield", "construction", "military", "port", "quarry", "railway",
    "religious", "reservoir", "salt_pond", "vineyard",
];

/// How chunk candidates are detected.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionMode {
    /// Shared nodes of two-lane roads that carry a traffic signal.
    Topology,
    /// Traffic signals whose buffer meets enough two-lane road lines.
    Spatial,
    /// Both, one record per node, topology first.
    #[default]
    Combined,
}

impl DetectionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Topology => "topology",
            Self::Spatial => "spatial",
            Self::Combined => "combined",
        }
    }

    #[inline] pub fn uses_topology(self) -> bool { self != Self::Spatial }

    #[inline] pub fn uses_spatial(self) -> bool { self != Self::Topology }
}

impl fmt::Display for DetectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for DetectionMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "topology" => Ok(Self::Topology),
            "spatial" => Ok(Self::Spatial),
            "combined" => Ok(Self::Combined),
            other => Err(ConfigError::Invalid(format!("unknown detection mode `{other}`"))),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("read config {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse config {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Run configuration. Every field has a default, so a config file only
/// needs the values it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Region to search, `[min_lon, min_lat, max_lon, max_lat]`.
    pub bbox: BoundingBox,
    pub overpass_url: String,
    /// Server-side query timeout.
    pub query_timeout_secs: u64,
    pub max_attempts: u32,
    pub initial_delay_secs: f64,
    pub max_delay_secs: f64,
    /// Minimum pause between consecutive queries.
    pub query_delay_secs: f64,
    pub chunk_size_miles: f64,
    /// Regions smaller than this are queried whole.
    pub min_tile_area_sq_miles: f64,
    pub signal_buffer_m: f64,
    pub min_road_hits: usize,
    pub landuse_buffer_m: f64,
    pub landuse_categories: Vec<String>,
    pub output_dir: PathBuf,
    pub results_file: PathBuf,
    pub enriched_file: PathBuf,
    pub mode: DetectionMode,
    /// Also write per-chunk road and signal layers.
    pub debug_layers: bool,
    /// Projection zone; derived from the bbox centre when absent.
    pub utm_zone: Option<UtmZone>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bbox: BoundingBox::PHOENIX,
            overpass_url: "https://overpass-api.de/api/interpreter".into(),
            query_timeout_secs: 180,
            max_attempts: 5,
            initial_delay_secs: 5.0,
            max_delay_secs: 300.0,
            query_delay_secs: 2.0,
            chunk_size_miles: 2.0,
            min_tile_area_sq_miles: 3.0,
            signal_buffer_m: 2.0,
            min_road_hits: 3,
            landuse_buffer_m: 804.67,
            landuse_categories: DEFAULT_LANDUSE_CATEGORIES.iter().map(|c| c.to_string()).collect(),
            output_dir: PathBuf::from("data/intersections"),
            results_file: PathBuf::from("results.geojson"),
            enriched_file: PathBuf::from("results_landuse.geojson"),
            mode: DetectionMode::default(),
            debug_layers: false,
            utm_zone: None,
        }
    }
}

impl Config {
    /// Defaults overlaid with the JSON file at `path`.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })
    }

    /// Defaults, or the file at `path` when given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        path.map_or_else(|| Ok(Self::default()), Self::from_file)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check("chunk_size_miles", self.chunk_size_miles, false)?;
        check("min_tile_area_sq_miles", self.min_tile_area_sq_miles, true)?;
        check("signal_buffer_m", self.signal_buffer_m, false)?;
        check("landuse_buffer_m", self.landuse_buffer_m, false)?;
        check_secs("initial_delay_secs", self.initial_delay_secs)?;
        check_secs("max_delay_secs", self.max_delay_secs)?;
        check_secs("query_delay_secs", self.query_delay_secs)?;

        if self.initial_delay_secs > self.max_delay_secs {
            return Err(ConfigError::Invalid("initial_delay_secs exceeds max_delay_secs".into()));
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::Invalid("max_attempts must be at least 1".into()));
        }
        if self.min_road_hits == 0 {
            return Err(ConfigError::Invalid("min_road_hits must be at least 1".into()));
        }
        if self.overpass_url.trim().is_empty() {
            return Err(ConfigError::Invalid("overpass_url is empty".into()));
        }
        // Categories are spliced into a query regex.
        let bad = self.landuse_categories.iter()
            .find(|c| c.is_empty() || !c.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-'));
        if let Some(bad) = bad {
            return Err(ConfigError::Invalid(format!("bad landuse category `{bad}`")));
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, secs(self.initial_delay_secs), secs(self.max_delay_secs))
    }

    #[inline] pub fn query_delay(&self) -> Duration { secs(self.query_delay_secs) }

    #[inline] pub fn query_timeout(&self) -> Duration { Duration::from_secs(self.query_timeout_secs) }

    /// Geometry kernel for the configured zone, or the zone of the bbox centre.
    pub fn kernel(&self) -> Result<GeometryKernel, GeometryError> {
        match self.utm_zone {
            Some(zone) => GeometryKernel::new(zone),
            None => GeometryKernel::for_region(&self.bbox),
        }
    }

    /// Chunk files live under `output_dir`; the merged files next to them.
    pub fn results_path(&self) -> PathBuf { self.output_dir.join(&self.results_file) }

    pub fn enriched_path(&self) -> PathBuf { self.output_dir.join(&self.enriched_file) }
}

/// Finite and positive, or non-negative when `zero_ok`.
fn check(name: &str, value: f64, zero_ok: bool) -> Result<(), ConfigError> {
    let ok = value.is_finite() && (value > 0.0 || (zero_ok && value == 0.0));
    if ok { Ok(()) } else { Err(ConfigError::Invalid(format!("{name} must be {}, got {value}", if zero_ok { "non-negative" } else { "positive" }))) }
}

/// Non-negative and representable as a `Duration`.
fn check_secs(name: &str, value: f64) -> Result<(), ConfigError> {
    check(name, value, true)?;
    Duration::try_from_secs_f64(value)
        .map(drop)
        .map_err(|_| ConfigError::Invalid(format!("{name} is out of range, got {value}")))
}

fn secs(value: f64) -> Duration { Duration::try_from_secs_f64(value).unwrap_or_default() }
