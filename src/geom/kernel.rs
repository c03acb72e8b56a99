use std::f64::consts::TAU;

use geo::{Area, Coord, LineString, MapCoords, Polygon};

use super::{BoundingBox, GeometryError, LocalProjection, UtmZone};

/// Square meters in one square mile.
pub const SQ_METERS_PER_SQ_MILE: f64 = 2_589_988.11;

/// Meters in one mile.
pub const METERS_PER_MILE: f64 = 1609.34;

/// Number of segments used to approximate a circular buffer.
const BUFFER_SEGMENTS: usize = 64;

/// Distance and area arithmetic for one deployment region.
///
/// Inputs and outputs are WGS84 lon/lat; all metric work happens in the
/// region's UTM zone and never leaks out.
#[derive(Debug)]
pub struct GeometryKernel {
    proj: LocalProjection,
}

impl GeometryKernel {
    pub fn new(zone: UtmZone) -> Result<Self, GeometryError> {
        Ok(Self { proj: LocalProjection::new(zone)? })
    }

    /// Kernel projected to the UTM zone containing the centre of `region`.
    pub fn for_region(region: &BoundingBox) -> Result<Self, GeometryError> {
        Self::new(UtmZone::for_region(region))
    }

    #[inline] pub fn projection(&self) -> &LocalProjection { &self.proj }

    /// Circular buffer of `radius_m` meters around `center`, as a lon/lat polygon.
    pub fn buffer(&self, center: Coord<f64>, radius_m: f64) -> Result<Polygon<f64>, GeometryError> {
        if !(radius_m.is_finite() && radius_m > 0.0) {
            return Err(GeometryError::InvalidGeometry(format!("buffer radius must be positive, got {radius_m}")));
        }
        let origin = self.proj.to_local(center)?;

        let mut ring: Vec<Coord<f64>> = (0..BUFFER_SEGMENTS)
            .map(|i| {
                let theta = TAU * i as f64 / BUFFER_SEGMENTS as f64;
                Coord { x: origin.x + radius_m * theta.cos(), y: origin.y + radius_m * theta.sin() }
            })
            .collect();
        ring.push(ring[0]);

        self.proj.unproject(&Polygon::new(LineString(ring), vec![]))
    }

    /// Planar area in square meters, measured in the local frame. Zero for empty geometries.
    pub fn area_m2<G>(&self, geometry: &G) -> Result<f64, GeometryError>
    where
        G: MapCoords<f64, f64>,
        G::Output: Area<f64>,
    {
        Ok(self.proj.project(geometry)?.unsigned_area())
    }

    pub fn bbox_area_sq_miles(&self, bbox: &BoundingBox) -> Result<f64, GeometryError> {
        Ok(self.area_m2(&bbox.to_polygon())? / SQ_METERS_PER_SQ_MILE)
    }

    /// Split `bbox` into a row-major grid of chunks no wider or taller than
    /// `max_chunk_side_miles`.
    ///
    /// Regions smaller than `min_area_sq_miles` come back unchanged. Grid lines
    /// are laid out in the local frame from the south-west corner and mapped
    /// back to lon/lat, so neighbouring chunks share their edges exactly and
    /// the outermost edges coincide with `bbox`.
    pub fn tile(
        &self,
        bbox: &BoundingBox,
        max_chunk_side_miles: f64,
        min_area_sq_miles: f64,
    ) -> Result<Vec<BoundingBox>, GeometryError> {
        if !(max_chunk_side_miles.is_finite() && max_chunk_side_miles > 0.0) {
            return Err(GeometryError::InvalidGeometry(format!(
                "chunk side must be positive, got {max_chunk_side_miles} miles"
            )));
        }
        if self.bbox_area_sq_miles(bbox)? < min_area_sq_miles {
            return Ok(vec![*bbox]);
        }

        let chunk_m = max_chunk_side_miles * METERS_PER_MILE;
        let min = self.proj.to_local(bbox.min())?;
        let max = self.proj.to_local(bbox.max())?;

        let lon_breaks = self.breaks(min.x, max.x, chunk_m, bbox.min_lon(), bbox.max_lon(), |x| {
            Ok(self.proj.to_geographic(Coord { x, y: min.y })?.x)
        })?;
        let lat_breaks = self.breaks(min.y, max.y, chunk_m, bbox.min_lat(), bbox.max_lat(), |y| {
            Ok(self.proj.to_geographic(Coord { x: min.x, y })?.y)
        })?;

        let mut chunks = Vec::with_capacity((lon_breaks.len() - 1) * (lat_breaks.len() - 1));
        for lat in lat_breaks.windows(2) {
            for lon in lon_breaks.windows(2) {
                chunks.push(BoundingBox::new(lon[0], lat[0], lon[1], lat[1])?);
            }
        }
        Ok(chunks)
    }

    /// Grid lines along one axis, in geographic units, from `lo` to `hi` inclusive.
    fn breaks(
        &self,
        start_m: f64,
        end_m: f64,
        chunk_m: f64,
        lo: f64,
        hi: f64,
        to_geographic: impl Fn(f64) -> Result<f64, GeometryError>,
    ) -> Result<Vec<f64>, GeometryError> {
        let count = ((end_m - start_m) / chunk_m).ceil().max(1.0) as usize;

        let mut breaks = Vec::with_capacity(count + 1);
        breaks.push(lo);
        for i in 1..count {
            let value = to_geographic(start_m + i as f64 * chunk_m)?.clamp(lo, hi);
            // Projection wobble can never reorder or duplicate grid lines.
            if value > *breaks.last().unwrap_or(&lo) && value < hi {
                breaks.push(value);
            }
        }
        breaks.push(hi);
        Ok(breaks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{Intersects, Point};

    fn phoenix() -> BoundingBox {
        BoundingBox::PHOENIX
    }

    fn kernel() -> GeometryKernel { GeometryKernel::for_region(&phoenix()).unwrap() }

    #[test]
    fn buffer_area_matches_circle() {
        let kernel = kernel();
        let buffer = kernel.buffer(Coord { x: -112.07, y: 33.45 }, 804.67).unwrap();
        let area = kernel.area_m2(&buffer).unwrap();
        let circle = std::f64::consts::PI * 804.67 * 804.67;
        // A 64-gon covers ~99.84% of its circumscribed circle.
        assert!((area / circle - 1.0).abs() < 0.005, "area {area} vs circle {circle}");
    }

    #[test]
    fn buffer_contains_center_and_not_far_points() {
        let kernel = kernel();
        let center = Coord { x: -112.07, y: 33.45 };
        let buffer = kernel.buffer(center, 2.0).unwrap();
        assert!(buffer.intersects(&Point::from(center)));
        // ~11 m north
        assert!(!buffer.intersects(&Point::new(-112.07, 33.4501)));
    }

    #[test]
    fn buffer_rejects_bad_radius() {
        let kernel = kernel();
        assert!(kernel.buffer(Coord { x: -112.07, y: 33.45 }, 0.0).is_err());
        assert!(kernel.buffer(Coord { x: -112.07, y: 33.45 }, f64::NAN).is_err());
    }

    #[test]
    fn degenerate_polygon_has_zero_area() {
        let kernel = kernel();
        let line = Polygon::new(
            LineString::from(vec![(-112.0, 33.0), (-112.0, 33.1), (-112.0, 33.0)]),
            vec![],
        );
        assert_eq!(kernel.area_m2(&line).unwrap(), 0.0);
        let empty = Polygon::new(LineString::new(vec![]), vec![]);
        assert_eq!(kernel.area_m2(&empty).unwrap(), 0.0);
    }

    #[test]
    fn bbox_area_of_phoenix() {
        // ~55 km x ~43 km
        let area = kernel().bbox_area_sq_miles(&phoenix()).unwrap();
        assert!(area > 850.0 && area < 1000.0, "area {area}");
    }

    #[test]
    fn small_bbox_is_not_tiled() {
        let kernel = kernel();
        let small = BoundingBox::new(-112.08, 33.44, -112.07, 33.45).unwrap();
        assert!(kernel.bbox_area_sq_miles(&small).unwrap() < 3.0);
        assert_eq!(kernel.tile(&small, 2.0, 3.0).unwrap(), vec![small]);
    }

    #[test]
    fn large_bbox_tiles_exactly() {
        let kernel = kernel();
        let region = phoenix();
        let chunks = kernel.tile(&region, 2.0, 3.0).unwrap();
        assert!(chunks.len() > 100, "only {} chunks", chunks.len());

        // Every chunk stays inside the region.
        for chunk in &chunks {
            assert!(region.contains_bbox(chunk), "{chunk} escapes {region}");
        }

        // No two chunks overlap in area.
        for (i, a) in chunks.iter().enumerate() {
            for b in &chunks[i + 1..] {
                let overlaps = a.min_lon() < b.max_lon() && b.min_lon() < a.max_lon()
                    && a.min_lat() < b.max_lat() && b.min_lat() < a.max_lat();
                assert!(!overlaps, "{a} overlaps {b}");
            }
        }

        // Non-overlapping and contained, so equal total area means exact cover.
        let planar = |b: &BoundingBox| (b.max_lon() - b.min_lon()) * (b.max_lat() - b.min_lat());
        let total: f64 = chunks.iter().map(planar).sum();
        assert!((total / planar(&region) - 1.0).abs() < 1e-9);

        // Row-major: the first row runs west to east along the southern edge.
        assert_eq!(chunks[0].min(), region.min());
        assert_eq!(chunks[1].min_lat(), region.min_lat());
        assert_eq!(chunks[1].min_lon(), chunks[0].max_lon());
        assert_eq!(chunks.last().unwrap().max(), region.max());
    }

    #[test]
    fn chunk_side_is_bounded() {
        let kernel = kernel();
        let chunks = kernel.tile(&phoenix(), 2.0, 3.0).unwrap();
        let chunk_m = 2.0 * METERS_PER_MILE;
        for chunk in &chunks {
            let proj = kernel.projection();
            let sw = proj.to_local(chunk.min()).unwrap();
            let se = proj.to_local(Coord { x: chunk.max_lon(), y: chunk.min_lat() }).unwrap();
            let nw = proj.to_local(Coord { x: chunk.min_lon(), y: chunk.max_lat() }).unwrap();
            // Edges are measured separately; grid lines curve slightly in UTM.
            assert!(se.x - sw.x <= chunk_m * 1.01, "width {}", se.x - sw.x);
            assert!(nw.y - sw.y <= chunk_m * 1.01, "height {}", nw.y - sw.y);
        }
    }

    #[test]
    fn tile_rejects_bad_chunk_size() {
        assert!(kernel().tile(&phoenix(), 0.0, 3.0).is_err());
    }
}
