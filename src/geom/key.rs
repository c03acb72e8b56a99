use sha2::{Digest, Sha256};

use super::BoundingBox;

/// Hex characters kept from the digest.
const KEY_LEN: usize = 12;

/// Deterministic short key for a bounding box and a caller tag.
///
/// Coordinates are formatted to 6 decimal places first, so boxes that agree
/// to that precision share a key.
pub fn stable_key(bbox: &BoundingBox, tag: &str) -> String {
    let canonical = bbox.as_array().iter()
        .map(|&coord| canonical_coord(coord))
        .collect::<Vec<_>>()
        .join(",");

    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hasher.update(b"|");
    hasher.update(tag.as_bytes());
    let mut key = hex::encode(hasher.finalize());
    key.truncate(KEY_LEN);
    key
}

/// Cache filename for one chunk: `{key}_{postfix}.geojson`.
pub fn chunk_filename(bbox: &BoundingBox, postfix: &str) -> String {
    format!("{}_{postfix}.geojson", stable_key(bbox, postfix))
}

/// Fixed 6-decimal text, with negative zero folded into zero.
fn canonical_coord(coord: f64) -> String {
    let text = format!("{coord:.6}");
    match text.strip_prefix('-') {
        Some(rest) if rest.bytes().all(|b| b == b'0' || b == b'.') => rest.to_string(),
        _ => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bbox(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> BoundingBox {
        BoundingBox::new(min_lon, min_lat, max_lon, max_lat).unwrap()
    }

    #[test]
    fn key_is_deterministic_and_short() {
        let a = bbox(-112.247308, 33.283753, -111.652349, 33.669733);
        assert_eq!(stable_key(&a, "intersections"), stable_key(&a, "intersections"));
        assert_eq!(stable_key(&a, "intersections").len(), 12);
        assert!(stable_key(&a, "roads").bytes().all(|b| b.is_ascii_hexdigit()));
    }

    #[test]
    fn key_ignores_noise_below_six_decimals() {
        let a = bbox(-112.247308, 33.283753, -111.652349, 33.669733);
        let b = bbox(-112.2473080001, 33.2837529999, -111.652349, 33.669733);
        assert_eq!(stable_key(&a, "x"), stable_key(&b, "x"));
    }

    #[test]
    fn key_separates_boxes_and_tags() {
        let a = bbox(-112.247308, 33.283753, -111.652349, 33.669733);
        let b = bbox(-112.247309, 33.283753, -111.652349, 33.669733);
        assert_ne!(stable_key(&a, "x"), stable_key(&b, "x"));
        assert_ne!(stable_key(&a, "roads"), stable_key(&a, "signals"));
    }

    #[test]
    fn negative_zero_is_canonical() {
        assert_eq!(canonical_coord(-0.0000001), "0.000000");
        assert_eq!(canonical_coord(0.0), "0.000000");
        assert_eq!(canonical_coord(-1.5), "-1.500000");
        let a = bbox(-0.0000001, 0.0, 1.0, 1.0);
        let b = bbox(0.0, 0.0, 1.0, 1.0);
        assert_eq!(stable_key(&a, "x"), stable_key(&b, "x"));
    }

    #[test]
    fn filename_layout() {
        let a = bbox(-112.1, 33.4, -112.0, 33.5);
        let name = chunk_filename(&a, "intersections");
        assert!(name.ends_with("_intersections.geojson"));
        assert_eq!(name.len(), 12 + "_intersections.geojson".len());
        assert!(name.starts_with(&stable_key(&a, "intersections")));
    }
}
