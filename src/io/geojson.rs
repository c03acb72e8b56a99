use std::collections::HashSet;
use std::path::Path;

use anyhow::{bail, Context, Result};
use geo::Coord;
use serde_json::{json, Map, Value};

use crate::common::write_atomic;
use crate::intersection::IntersectionRecord;
use crate::landuse::LandUsePercentage;
use crate::osm::{ElementRef, OsmData, TaggedNode, TaggedWay};
use crate::skip::{Processed, Skipped};

fn point(coord: Coord<f64>) -> Value {
    json!({ "type": "Point", "coordinates": [coord.x, coord.y] })
}

/// Road debug feature: a `LineString` with the way's lane tags.
pub fn road_feature(way: &TaggedWay, coords: &[Coord<f64>]) -> Value {
    let coordinates: Vec<[f64; 2]> = coords.iter().map(|c| [c.x, c.y]).collect();
    json!({
        "type": "Feature",
        "geometry": { "type": "LineString", "coordinates": coordinates },
        "properties": {
            "id": way.id.to_string(),
            "highway": way.tags.get_or("highway", ""),
            "name": way.tags.get_or("name", ""),
            "ref": way.tags.get_or("ref", ""),
            "lanes": way.tags.get_or("lanes", ""),
            "lanes:forward": way.tags.get_or("lanes:forward", ""),
            "lanes:backward": way.tags.get_or("lanes:backward", ""),
            "oneway": way.tags.get_or("oneway", ""),
        },
    })
}

/// Road features for every way whose nodes resolve to at least two points.
pub fn road_features<'a>(ways: impl IntoIterator<Item = &'a TaggedWay>, nodes: &OsmData) -> Processed<Value> {
    let mut features = Processed::new();
    for way in ways {
        match nodes.way_coords(way) {
            Ok(coords) if coords.len() >= 2 => features.push(road_feature(way, &coords)),
            Ok(_) => {}
            Err(reason) => features.skip(Skipped::new(ElementRef::Way(way.id), reason)),
        }
    }
    features
}

/// Traffic-signal debug feature.
pub fn signal_feature(node: &TaggedNode) -> Value {
    json!({
        "type": "Feature",
        "geometry": point(node.coord),
        "properties": {
            "id": node.id.to_string(),
            "highway": node.tags.get_or("highway", "traffic_signals"),
            "crossing": node.tags.get_or("crossing", ""),
            "button_operated": node.tags.get_or("button_operated", ""),
            "tactile_paving": node.tags.get_or("tactile_paving", ""),
        },
    })
}

pub fn intersection_feature(record: &IntersectionRecord) -> Value {
    let road_ids: Vec<String> = record.road_ids().map(|id| id.to_string()).collect();
    let roads: Vec<&str> = record.road_names().collect();
    json!({
        "type": "Feature",
        "geometry": point(record.coord()),
        "properties": {
            "intersection_id": record.node_id().to_string(),
            "roads": roads,
            "road_ids": road_ids,
            "num_roads": record.num_roads(),
        },
    })
}

/// Copy of `feature` with a `landuse` object added to its properties.
pub fn with_landuse(feature: &Value, landuse: &LandUsePercentage) -> Value {
    let mut feature = feature.clone();
    if let Some(properties) = feature.get_mut("properties").and_then(Value::as_object_mut) {
        properties.insert("landuse".into(), json!(landuse));
    } else if let Some(object) = feature.as_object_mut() {
        let mut properties = Map::new();
        properties.insert("landuse".into(), json!(landuse));
        object.insert("properties".into(), Value::Object(properties));
    }
    feature
}

/// Coordinates of a `Point` feature.
pub fn point_coord(feature: &Value) -> Option<Coord<f64>> {
    let geometry = feature.get("geometry")?;
    if geometry.get("type")?.as_str()? != "Point" {
        return None;
    }
    let coordinates = geometry.get("coordinates")?.as_array()?;
    let x = coordinates.first()?.as_f64()?;
    let y = coordinates.get(1)?.as_f64()?;
    Some(Coord { x, y })
}

pub fn feature_collection(features: Vec<Value>) -> Value {
    json!({ "type": "FeatureCollection", "features": features })
}

/// Write a FeatureCollection atomically (temp file, then rename).
pub fn write_feature_collection(path: &Path, features: Vec<Value>) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(&feature_collection(features))
        .context("Failed to serialize GeoJSON")?;
    write_atomic(path, &bytes)
}

/// Features of the FeatureCollection stored at `path`.
pub fn read_features(path: &Path) -> Result<Vec<Value>> {
    let bytes = std::fs::read(path).with_context(|| format!("read {}", path.display()))?;
    let value: Value = serde_json::from_slice(&bytes)
        .with_context(|| format!("Failed to parse GeoJSON in {}", path.display()))?;
    if value.get("type").and_then(Value::as_str) != Some("FeatureCollection") {
        bail!("{} is not a GeoJSON FeatureCollection", path.display());
    }
    match value.get("features") {
        Some(Value::Array(features)) => Ok(features.clone()),
        None => Ok(Vec::new()),
        Some(_) => bail!("{}: `features` is not an array", path.display()),
    }
}

/// `properties.intersection_id` as a string; numeric ids from older files are accepted too.
fn intersection_key(feature: &Value) -> Option<String> {
    match feature.pointer("/properties/intersection_id")? {
        Value::String(id) => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}

/// Keep the first feature per `properties.intersection_id`; features without one are dropped.
pub fn dedupe_by_intersection_id(features: impl IntoIterator<Item = Value>) -> Vec<Value> {
    let mut seen = HashSet::new();
    features.into_iter()
        .filter(|feature| intersection_key(feature).is_some_and(|id| seen.insert(id)))
        .collect()
}
