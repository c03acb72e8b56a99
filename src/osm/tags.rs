use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// String-keyed OSM tags.
///
/// Values are always kept as strings. Numeric tags must be parsed explicitly
/// through [`Tags::parse`], and a value that does not parse is treated the
/// same as a missing tag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tags(BTreeMap<String, String>);

impl Tags {
    pub fn new() -> Self { Self(BTreeMap::new()) }

    #[inline] pub fn get(&self, key: &str) -> Option<&str> { self.0.get(key).map(String::as_str) }

    /// Get a tag value, falling back to `default` when the key is absent.
    #[inline]
    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }

    #[inline] pub fn contains(&self, key: &str) -> bool { self.0.contains_key(key) }

    /// True if `key` is present with exactly `value`.
    #[inline]
    pub fn is(&self, key: &str, value: &str) -> bool { self.get(key) == Some(value) }

    /// Parse a tag value (surrounding whitespace ignored). `None` if absent or unparseable.
    pub fn parse<T: FromStr>(&self, key: &str) -> Option<T> {
        self.get(key).and_then(|value| value.trim().parse().ok())
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(key.into(), value.into())
    }

    #[inline] pub fn len(&self) -> usize { self.0.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.0.is_empty() }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Tags {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl From<BTreeMap<String, String>> for Tags {
    fn from(map: BTreeMap<String, String>) -> Self { Self(map) }
}
