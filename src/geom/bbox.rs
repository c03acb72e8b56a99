use std::fmt;

use geo::{Coord, Polygon, Rect};
use serde::{Deserialize, Serialize};

use super::GeometryError;

/// Axis-aligned WGS84 box: `[min_lon, min_lat, max_lon, max_lat]`.
///
/// Construction enforces `min < max` on both axes and finite bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "[f64; 4]", into = "[f64; 4]")]
pub struct BoundingBox {
    min_lon: f64,
    min_lat: f64,
    max_lon: f64,
    max_lat: f64,
}

impl BoundingBox {
    /// Phoenix metropolitan area.
    pub const PHOENIX: Self = Self { min_lon: -112.247308, min_lat: 33.283753, max_lon: -111.652349, max_lat: 33.669733 };

    pub fn new(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Result<Self, GeometryError> {
        let bounds = [min_lon, min_lat, max_lon, max_lat];
        if bounds.iter().any(|v| !v.is_finite()) {
            return Err(GeometryError::InvalidGeometry(format!("non-finite bounding box {bounds:?}")));
        }
        if min_lon >= max_lon || min_lat >= max_lat {
            return Err(GeometryError::InvalidGeometry(format!(
                "bounding box must satisfy min < max on both axes, got {bounds:?}"
            )));
        }
        Ok(Self { min_lon, min_lat, max_lon, max_lat })
    }

    #[inline] pub fn min_lon(&self) -> f64 { self.min_lon }
    #[inline] pub fn min_lat(&self) -> f64 { self.min_lat }
    #[inline] pub fn max_lon(&self) -> f64 { self.max_lon }
    #[inline] pub fn max_lat(&self) -> f64 { self.max_lat }

    #[inline] pub fn min(&self) -> Coord<f64> { Coord { x: self.min_lon, y: self.min_lat } }
    #[inline] pub fn max(&self) -> Coord<f64> { Coord { x: self.max_lon, y: self.max_lat } }

    pub fn center(&self) -> Coord<f64> {
        Coord { x: (self.min_lon + self.max_lon) / 2.0, y: (self.min_lat + self.max_lat) / 2.0 }
    }

    #[inline] pub fn as_array(&self) -> [f64; 4] { [self.min_lon, self.min_lat, self.max_lon, self.max_lat] }

    pub fn to_rect(&self) -> Rect<f64> { Rect::new(self.min(), self.max()) }

    pub fn to_polygon(&self) -> Polygon<f64> { self.to_rect().to_polygon() }

    /// Smallest box containing `rect`; fails for degenerate rectangles.
    pub fn from_rect(rect: Rect<f64>) -> Result<Self, GeometryError> {
        Self::new(rect.min().x, rect.min().y, rect.max().x, rect.max().y)
    }

    /// True if `coord` lies inside or on the boundary.
    pub fn contains(&self, coord: Coord<f64>) -> bool {
        coord.x >= self.min_lon && coord.x <= self.max_lon && coord.y >= self.min_lat && coord.y <= self.max_lat
    }

    /// True if `other` lies entirely within `self` (shared edges allowed).
    pub fn contains_bbox(&self, other: &BoundingBox) -> bool {
        self.contains(other.min()) && self.contains(other.max())
    }
}

impl TryFrom<[f64; 4]> for BoundingBox {
    type Error = GeometryError;

    fn try_from([min_lon, min_lat, max_lon, max_lat]: [f64; 4]) -> Result<Self, Self::Error> {
        Self::new(min_lon, min_lat, max_lon, max_lat)
    }
}

impl From<BoundingBox> for [f64; 4] {
    fn from(bbox: BoundingBox) -> Self { bbox.as_array() }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:.6}, {:.6}, {:.6}, {:.6}]", self.min_lon, self.min_lat, self.max_lon, self.max_lat)
    }
}

#[cfg(test)]
mod tests {
    use super::BoundingBox;

    #[test]
    fn rejects_inverted_bounds() {
        assert!(BoundingBox::new(-112.0, 33.0, -113.0, 34.0).is_err());
        assert!(BoundingBox::new(-112.0, 33.0, -111.0, 33.0).is_err());
        assert!(BoundingBox::new(f64::NAN, 33.0, -111.0, 34.0).is_err());
        assert!(BoundingBox::new(-112.0, 33.0, -111.0, 34.0).is_ok());
    }

    #[test]
    fn deserializes_from_array() {
        let bbox: BoundingBox = serde_json::from_str("[-112.2, 33.2, -111.6, 33.6]").unwrap();
        assert_eq!(bbox.as_array(), [-112.2, 33.2, -111.6, 33.6]);
        assert!(serde_json::from_str::<BoundingBox>("[1.0, 1.0, 0.0, 2.0]").is_err());
    }

    #[test]
    fn containment() {
        let outer = BoundingBox::new(0.0, 0.0, 2.0, 2.0).unwrap();
        let inner = BoundingBox::new(0.0, 0.5, 1.0, 2.0).unwrap();
        assert!(outer.contains_bbox(&inner));
        assert!(!inner.contains_bbox(&outer));
    }
}
