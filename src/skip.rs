use tracing::debug;

use crate::geom::GeometryError;
use crate::osm::{ElementRef, NodeId, WayId};

/// Why an input record was left out of a result.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SkipReason {
    #[error("node {0} is not in the fetched result")]
    MissingNode(NodeId),
    #[error("way {0} is not in the fetched result")]
    MissingWay(WayId),
    #[error(transparent)]
    Geometry(#[from] GeometryError),
}

/// A record that was skipped, and why.
#[derive(Debug, Clone, PartialEq)]
pub struct Skipped {
    pub element: ElementRef,
    pub reason: SkipReason,
}

impl Skipped {
    pub fn new(element: ElementRef, reason: impl Into<SkipReason>) -> Self {
        Self { element, reason: reason.into() }
    }
}

/// Items produced by a per-record operation together with the records it skipped.
#[derive(Debug, Clone, PartialEq)]
pub struct Processed<T> {
    pub items: Vec<T>,
    pub skipped: Vec<Skipped>,
}

impl<T> Default for Processed<T> {
    fn default() -> Self { Self { items: Vec::new(), skipped: Vec::new() } }
}

impl<T> Processed<T> {
    pub fn new() -> Self { Self::default() }

    #[inline] pub fn push(&mut self, item: T) { self.items.push(item) }

    #[inline] pub fn skip(&mut self, skipped: Skipped) { self.skipped.push(skipped) }

    /// Emit one debug event per skipped record.
    pub fn log_skipped(&self, context: &str) {
        for skipped in &self.skipped {
            debug!(context, element = %skipped.element, reason = %skipped.reason, "skipped record");
        }
    }

    pub fn into_items(self) -> Vec<T> { self.items }
}
