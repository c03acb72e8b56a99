use std::collections::BTreeMap;

use geo::{Area, BooleanOps, Coord, CoordsIter, Intersects, LineString, MultiPolygon, Polygon};
use serde::Serialize;
use tracing::debug;

use crate::geom::{GeometryError, GeometryKernel};
use crate::osm::{ElementRef, OsmData, Role, TaggedRelation, TaggedWay};
use crate::skip::{Processed, SkipReason, Skipped};

/// Category covering whatever no land-use polygon accounts for.
pub const UNKNOWN: &str = "unknown";

/// A land-use area with its `landuse=*` category.
#[derive(Debug, Clone, PartialEq)]
pub struct LandUsePolygon {
    pub source: ElementRef,
    pub category: String,
    pub geometry: MultiPolygon<f64>,
}

/// Share of a buffer covered by each land-use category, in percent (2 decimals).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct LandUsePercentage(BTreeMap<String, f64>);

impl LandUsePercentage {
    /// Everything unknown.
    pub fn unknown() -> Self { Self(BTreeMap::from([(UNKNOWN.to_string(), 100.0)])) }

    pub fn get(&self, category: &str) -> Option<f64> { self.0.get(category).copied() }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> { self.0.iter().map(|(k, &v)| (k.as_str(), v)) }

    #[inline] pub fn len(&self) -> usize { self.0.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.0.is_empty() }

    /// Sum over all categories, `unknown` included.
    pub fn total(&self) -> f64 { self.0.values().sum() }
}

/// Polygon from a closed (or auto-closed) way of at least three nodes.
pub fn way_to_polygon(way: &TaggedWay, nodes: &OsmData) -> Result<Polygon<f64>, SkipReason> {
    let coords = nodes.way_coords(way)?;
    Ok(Polygon::new(ring(coords)?, vec![]))
}

/// Multipolygon from a relation's `outer`/`inner` way members.
///
/// Unresolvable members and rings with fewer than three nodes are ignored.
/// Outer rings are unioned; inner rings are then subtracted one at a time,
/// and a hole whose subtraction fails is left in place and reported.
pub fn relation_to_polygon(
    relation: &TaggedRelation,
    data: &OsmData,
) -> Result<(MultiPolygon<f64>, Vec<Skipped>), SkipReason> {
    let mut outers = Vec::new();
    let mut inners = Vec::new();

    for member in &relation.members {
        let Some(way) = member.as_way().and_then(|id| data.way(id)) else { continue };
        let Ok(polygon) = way_to_polygon(way, data) else { continue };
        match member.role {
            Role::Outer => outers.push(polygon),
            Role::Inner => inners.push((way.id, polygon)),
            Role::Other(_) => {}
        }
    }

    let mut outers = outers.into_iter();
    let Some(first) = outers.next() else {
        return Err(GeometryError::InvalidGeometry(format!("relation {} has no outer ring", relation.id)).into());
    };
    let shell = outers.fold(MultiPolygon::new(vec![first]), |acc, outer| acc.union(&outer));

    let mut skipped = Vec::new();
    let geometry = inners.into_iter().fold(shell, |acc, (way_id, hole)| {
        match subtract_hole(&acc, &hole) {
            Ok(next) => next,
            Err(e) => {
                skipped.push(Skipped::new(ElementRef::Way(way_id), e));
                acc
            }
        }
    });

    Ok((geometry, skipped))
}

/// Categorised polygons from every way and relation tagged `landuse` with one
/// of `categories` (any category when the list is empty). Unusable elements are skipped.
pub fn landuse_polygons(data: &OsmData, categories: &[String]) -> Processed<LandUsePolygon> {
    let wanted = |category: &str| categories.is_empty() || categories.iter().any(|c| c == category);
    let mut polygons = Processed::new();

    for way in data.ways() {
        let Some(category) = way.tags.get("landuse").filter(|c| wanted(*c)) else { continue };
        let source = ElementRef::Way(way.id);
        match way_to_polygon(way, data).and_then(|p| checked(p).map_err(SkipReason::from)) {
            Ok(polygon) => polygons.push(LandUsePolygon {
                source,
                category: category.to_string(),
                geometry: MultiPolygon::new(vec![polygon]),
            }),
            Err(reason) => polygons.skip(Skipped::new(source, reason)),
        }
    }

    for relation in data.relations() {
        let Some(category) = relation.tags.get("landuse").filter(|c| wanted(*c)) else { continue };
        let source = ElementRef::Relation(relation.id);
        match relation_to_polygon(relation, data) {
            Ok((geometry, holes)) => {
                holes.into_iter().for_each(|hole| polygons.skip(hole));
                if geometry.0.is_empty() {
                    let reason = GeometryError::InvalidGeometry("holes cover the whole relation".into());
                    polygons.skip(Skipped::new(source, reason));
                    continue;
                }
                polygons.push(LandUsePolygon { source, category: category.to_string(), geometry });
            }
            Err(reason) => polygons.skip(Skipped::new(source, reason)),
        }
    }

    polygons.log_skipped("landuse_polygons");
    polygons
}

/// Splits buffer areas across land-use categories.
#[derive(Debug)]
pub struct Apportioner<'k> {
    kernel: &'k GeometryKernel,
}

impl<'k> Apportioner<'k> {
    pub fn new(kernel: &'k GeometryKernel) -> Self { Self { kernel } }

    /// Percentage of `buffer` covered by each category of `polygons`.
    ///
    /// Intersection areas are summed per category as-is, so overlapping
    /// polygons count twice. The uncovered remainder is reported as
    /// [`UNKNOWN`] when positive. Polygons whose intersection cannot be
    /// measured are skipped and returned.
    pub fn apportion(&self, buffer: &Polygon<f64>, polygons: &[LandUsePolygon]) -> (LandUsePercentage, Vec<Skipped>) {
        let mut skipped = Vec::new();
        if polygons.is_empty() {
            return (LandUsePercentage::unknown(), skipped);
        }

        let total = match self.kernel.area_m2(buffer) {
            Ok(area) if area > 0.0 => area,
            _ => return (LandUsePercentage::unknown(), skipped),
        };

        let intersecting: Vec<&LandUsePolygon> = polygons.iter()
            .filter(|p| buffer.intersects(&p.geometry))
            .collect();
        if intersecting.is_empty() {
            return (LandUsePercentage::unknown(), skipped);
        }

        let mut areas: BTreeMap<&str, f64> = BTreeMap::new();
        for polygon in intersecting {
            let overlap = buffer.intersection(&polygon.geometry);
            if overlap.0.is_empty() { continue }
            match self.kernel.area_m2(&overlap) {
                Ok(area) => *areas.entry(polygon.category.as_str()).or_default() += area,
                Err(e) => skipped.push(Skipped::new(polygon.source, e)),
            }
        }

        let covered: f64 = areas.values().sum();
        let mut percentages: BTreeMap<String, f64> = areas.into_iter()
            .map(|(category, area)| (category.to_string(), round2(area / total * 100.0)))
            .collect();

        if total - covered > 0.0 {
            // Absorb rounding error so the categories sum to 100.
            let unknown = round2(100.0 - percentages.values().sum::<f64>());
            if unknown > 0.0 {
                *percentages.entry(UNKNOWN.to_string()).or_default() += unknown;
            }
        }

        debug!(categories = percentages.len(), covered_m2 = covered, buffer_m2 = total, "apportioned buffer");
        (LandUsePercentage(percentages), skipped)
    }
}

#[inline]
fn round2(value: f64) -> f64 { (value * 100.0).round() / 100.0 }

/// Close a coordinate ring, requiring at least three nodes.
fn ring(mut coords: Vec<Coord<f64>>) -> Result<LineString<f64>, GeometryError> {
    if coords.len() < 3 {
        return Err(GeometryError::InvalidGeometry(format!("polygon needs at least 3 nodes, got {}", coords.len())));
    }
    if coords.first() != coords.last() {
        coords.push(coords[0]);
    }
    Ok(LineString(coords))
}

/// Reject polygons that cannot carry area: non-finite or collapsed rings.
fn checked(polygon: Polygon<f64>) -> Result<Polygon<f64>, GeometryError> {
    if polygon.coords_iter().any(|c| !(c.x.is_finite() && c.y.is_finite())) {
        return Err(GeometryError::InvalidGeometry("non-finite polygon coordinate".into()));
    }
    if polygon.unsigned_area() <= 0.0 {
        return Err(GeometryError::InvalidGeometry("polygon has zero area".into()));
    }
    Ok(polygon)
}

/// Subtract one hole; fails for holes that cannot be used as a ring.
fn subtract_hole(shape: &MultiPolygon<f64>, hole: &Polygon<f64>) -> Result<MultiPolygon<f64>, GeometryError> {
    let hole = checked(hole.clone())?;
    Ok(shape.difference(&hole))
}
