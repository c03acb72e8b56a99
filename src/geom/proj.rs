use std::fmt;

use geo::{Coord, MapCoords};
use proj4rs::{proj::Proj as Proj4, transform::transform};
use serde::{Deserialize, Serialize};

use super::{BoundingBox, GeometryError};

const WGS84_PROJ4: &str = "+proj=longlat +datum=WGS84 +no_defs +type=crs";

/// A UTM zone on the WGS84 datum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtmZone {
    pub zone: u8,
    #[serde(default)]
    pub south: bool,
}

impl UtmZone {
    /// Zone containing the given lon/lat.
    pub fn containing(coord: Coord<f64>) -> Self {
        let zone = (((coord.x + 180.0) / 6.0).floor() as i32 + 1).clamp(1, 60) as u8;
        Self { zone, south: coord.y < 0.0 }
    }

    /// Zone containing the centre of `bbox`.
    pub fn for_region(bbox: &BoundingBox) -> Self { Self::containing(bbox.center()) }

    /// EPSG code of the zone: 326zz (north) / 327zz (south).
    pub fn epsg(&self) -> u32 {
        let base = if self.south { 32700 } else { 32600 };
        base + self.zone as u32
    }

    fn proj4(&self) -> String {
        let south = if self.south { " +south" } else { "" };
        format!("+proj=utm +zone={}{south} +datum=WGS84 +units=m +no_defs +type=crs", self.zone)
    }
}

impl fmt::Display for UtmZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UTM {}{} (EPSG:{})", self.zone, if self.south { "S" } else { "N" }, self.epsg())
    }
}

/// Two-way transform between WGS84 lon/lat and one fixed UTM zone (meters).
///
/// Built once per deployment region. Coordinates outside the zone still
/// transform, with growing distortion.
pub struct LocalProjection {
    zone: UtmZone,
    geographic: Proj4,
    local: Proj4,
}

impl LocalProjection {
    pub fn new(zone: UtmZone) -> Result<Self, GeometryError> {
        if !(1..=60).contains(&zone.zone) {
            return Err(GeometryError::Projection(format!("UTM zone {} out of range 1..=60", zone.zone)));
        }
        let geographic = Proj4::from_proj_string(WGS84_PROJ4)
            .map_err(|e| GeometryError::Projection(format!("failed to build source PROJ.4 {WGS84_PROJ4}: {e}")))?;
        let proj_string = zone.proj4();
        let local = Proj4::from_proj_string(&proj_string)
            .map_err(|e| GeometryError::Projection(format!("failed to build target PROJ.4 {proj_string}: {e}")))?;

        Ok(Self { zone, geographic, local })
    }

    #[inline] pub fn zone(&self) -> UtmZone { self.zone }

    /// lon/lat degrees -> UTM meters.
    pub fn to_local(&self, coord: Coord<f64>) -> Result<Coord<f64>, GeometryError> {
        check_finite(coord)?;
        let mut point = (coord.x.to_radians(), coord.y.to_radians(), 0.0);
        transform(&self.geographic, &self.local, &mut point)
            .map_err(|e| GeometryError::Projection(format!("({}, {}) -> {}: {e}", coord.x, coord.y, self.zone)))?;
        Ok(Coord { x: point.0, y: point.1 })
    }

    /// UTM meters -> lon/lat degrees.
    pub fn to_geographic(&self, coord: Coord<f64>) -> Result<Coord<f64>, GeometryError> {
        check_finite(coord)?;
        let mut point = (coord.x, coord.y, 0.0);
        transform(&self.local, &self.geographic, &mut point)
            .map_err(|e| GeometryError::Projection(format!("{} ({}, {}) -> lon/lat: {e}", self.zone, coord.x, coord.y)))?;
        Ok(Coord { x: point.0.to_degrees(), y: point.1.to_degrees() })
    }

    /// Reproject a whole geometry from lon/lat to the local frame.
    pub fn project<G: MapCoords<f64, f64>>(&self, geometry: &G) -> Result<G::Output, GeometryError> {
        geometry.try_map_coords(|coord| self.to_local(coord))
    }

    /// Reproject a whole geometry from the local frame back to lon/lat.
    pub fn unproject<G: MapCoords<f64, f64>>(&self, geometry: &G) -> Result<G::Output, GeometryError> {
        geometry.try_map_coords(|coord| self.to_geographic(coord))
    }
}

impl fmt::Debug for LocalProjection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalProjection").field("zone", &self.zone).finish()
    }
}

fn check_finite(coord: Coord<f64>) -> Result<(), GeometryError> {
    if coord.x.is_finite() && coord.y.is_finite() {
        Ok(())
    } else {
        Err(GeometryError::InvalidGeometry(format!("non-finite coordinate ({}, {})", coord.x, coord.y)))
    }
}
