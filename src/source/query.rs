use super::FeatureClass;
use crate::geom::BoundingBox;

/// Highway values treated as roads by the road queries.
pub const HIGHWAY_CLASSES: &str = "primary|secondary|tertiary|residential|unclassified|service";

/// Overpass QL text for `class` over `bbox`.
///
/// An empty `landuse_categories` list matches any `landuse` value.
pub fn build_query(bbox: &BoundingBox, class: FeatureClass, landuse_categories: &[String], timeout_secs: u64) -> String {
    let mut query = format!(
        "[out:json][timeout:{timeout_secs}][bbox:{},{},{},{}];\n(\n",
        bbox.min_lat(), bbox.min_lon(), bbox.max_lat(), bbox.max_lon(),
    );

    let body = match class {
        FeatureClass::RoadsWithLanes => format!(
            "  way[\"highway\"][\"lanes\"];\n  way[\"highway\"][\"lanes:forward\"];\n  \
             way[\"highway\"][\"lanes:backward\"];\n  way[\"highway\"~\"^({HIGHWAY_CLASSES})$\"];\n",
        ),
        FeatureClass::AllRoads => format!("  way[\"highway\"~\"^({HIGHWAY_CLASSES})$\"];\n"),
        FeatureClass::TrafficSignals => "  node[\"highway\"=\"traffic_signals\"];\n".to_string(),
        FeatureClass::Landuse if landuse_categories.is_empty() => {
            "  way[\"landuse\"];\n  relation[\"landuse\"];\n".to_string()
        }
        FeatureClass::Landuse => {
            let values = landuse_categories.join("|");
            format!("  way[\"landuse\"~\"^({values})$\"];\n  relation[\"landuse\"~\"^({values})$\"];\n")
        }
    };
    query.push_str(&body);

    query.push_str(");\n");
    if class != FeatureClass::TrafficSignals {
        query.push_str("(._;>;);\n");
    }
    query.push_str("out body;\n");
    query
}
