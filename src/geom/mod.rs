mod bbox;
mod kernel;
mod key;
mod proj;

pub use bbox::BoundingBox;
pub use kernel::{GeometryKernel, METERS_PER_MILE, SQ_METERS_PER_SQ_MILE};
pub use key::{chunk_filename, stable_key};
pub use proj::{LocalProjection, UtmZone};

/// Failures of geometric construction or reprojection.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeometryError {
    /// Input is empty, too small, non-finite, or otherwise unusable.
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),
    /// Coordinate transform between lon/lat and the local frame failed.
    #[error("projection failed: {0}")]
    Projection(String),
}
