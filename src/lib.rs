//! extrema-rs: extremal-distance engine for analytic surfaces
//!
//! Computes minimum/maximum Euclidean distance (and the parameter locations
//! realizing it) between pairs of quadric surfaces (cone, cylinder, torus)
//! and between a point and any parametric surface sampled on a grid.

pub mod precision;
pub mod geom;
pub mod surface;
pub mod math;
pub mod extrema;

// Re-exports for convenience
pub use geom::{Pnt, Vec3, Dir, Ax3};
pub use surface::{Cylinder, Cone, Torus, Surface};
pub use extrema::{Domain2D, Domain4D, SearchMode, Status};
pub use extrema::{PointExtremaResult, PointExtremum, SurfaceExtremaResult, SurfaceExtremum};
pub use extrema::{CylinderCylinderExtrema, ConeConeExtrema, CylinderTorusExtrema};
pub use extrema::grid::GridEvaluator;

/// Result type for fallible constructors and setup operations.
///
/// Extremal queries never fail through this type: they report through
/// [`extrema::Status`] on the returned result value.
pub type Result<T> = std::result::Result<T, ExtremaError>;

#[derive(Debug, thiserror::Error)]
pub enum ExtremaError {
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("Invalid domain: {0}")]
    InvalidDomain(String),

    #[error("Invalid sampling: {0}")]
    InvalidSampling(String),
}
