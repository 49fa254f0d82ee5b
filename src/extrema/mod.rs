//! Extremal-distance engine.
//!
//! Surface-surface solvers (one per quadric pair) classify the relationship
//! between the two axes and dispatch to closed-form or sampled-and-refined
//! procedures. The grid evaluator handles point vs. arbitrary parametric
//! surface with a persistent sampled grid and a spatial-coherence cache.
//!
//! All queries report through [`Status`] on the returned result value;
//! numerical non-convergence is absorbed by fallbacks, never surfaced as an
//! error.

pub mod grid;

mod cylinder_cylinder;
mod cone_cone;
mod cylinder_torus;

pub use cylinder_cylinder::CylinderCylinderExtrema;
pub use cone_cone::ConeConeExtrema;
pub use cylinder_torus::CylinderTorusExtrema;

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::geom::{Dir, Pnt, Vec3};
use crate::math;
use crate::precision;
use crate::{ExtremaError, Result};

/// Angular tolerance for axis parallelism checks.
pub const ANGULAR_TOLERANCE: f64 = precision::ANGULAR;

/// Samples per domain edge in boundary scans.
pub(crate) const BOUNDARY_SAMPLES: usize = 20;

/// Fixed iteration budget for gradient-descent refinement.
pub(crate) const DESCENT_STEPS: usize = 200;

/// Finite-difference epsilon for numeric gradients.
pub(crate) const GRADIENT_EPSILON: f64 = 1.0e-6;

/// Search mode for extremal queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchMode {
    Min,
    Max,
    MinMax,
}

impl SearchMode {
    /// True when minima are requested.
    pub fn wants_min(&self) -> bool {
        !matches!(self, SearchMode::Max)
    }

    /// True when maxima are requested.
    pub fn wants_max(&self) -> bool {
        !matches!(self, SearchMode::Min)
    }
}

/// Outcome classification of an extremal query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    /// One or more finite, well-separated extrema found.
    Ok,
    /// A one-parameter family of equally-extremal points exists; one
    /// representative is reported plus the shared distance.
    InfiniteSolutions,
    /// No stationary point could be found or refined.
    NoSolution,
}

/// Ordered bounds on one surface's parameter rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Domain2D {
    pub u_min: f64,
    pub u_max: f64,
    pub v_min: f64,
    pub v_max: f64,
}

impl Domain2D {
    /// Create a validated domain (`u_min <= u_max`, `v_min <= v_max`).
    pub fn new(u_min: f64, u_max: f64, v_min: f64, v_max: f64) -> Result<Self> {
        if u_min > u_max || v_min > v_max {
            return Err(ExtremaError::InvalidDomain(format!(
                "inverted bounds: U [{u_min}, {u_max}], V [{v_min}, {v_max}]"
            )));
        }
        Ok(Self {
            u_min,
            u_max,
            v_min,
            v_max,
        })
    }

    /// True when (u, v) lies inside the rectangle within `tol` slack.
    pub fn contains(&self, u: f64, v: f64, tol: f64) -> bool {
        u >= self.u_min - tol && u <= self.u_max + tol && v >= self.v_min - tol && v <= self.v_max + tol
    }
}

/// Parameter bounds for a surface pair, one rectangle per surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Domain4D {
    pub domain1: Domain2D,
    pub domain2: Domain2D,
}

impl Domain4D {
    pub fn new(domain1: Domain2D, domain2: Domain2D) -> Self {
        Self { domain1, domain2 }
    }

    /// The same bounds with the two surfaces exchanged.
    pub fn swapped(&self) -> Self {
        Self {
            domain1: self.domain2,
            domain2: self.domain1,
        }
    }
}

/// One surface-surface extremum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SurfaceExtremum {
    pub u1: f64,
    pub v1: f64,
    pub u2: f64,
    pub v2: f64,
    pub point1: Pnt,
    pub point2: Pnt,
    pub square_distance: f64,
    pub is_minimum: bool,
}

/// One point-surface extremum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointExtremum {
    pub u: f64,
    pub v: f64,
    pub point: Pnt,
    pub square_distance: f64,
    pub is_minimum: bool,
}

/// Result of a surface-surface query: status plus the extrema in insertion
/// order (not rank order).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurfaceExtremaResult {
    pub status: Status,
    pub extrema: Vec<SurfaceExtremum>,
    /// Shared squared distance of the infinite family, set only when
    /// `status == InfiniteSolutions`.
    pub infinite_square_distance: Option<f64>,
}

impl Default for SurfaceExtremaResult {
    fn default() -> Self {
        Self::new()
    }
}

impl SurfaceExtremaResult {
    pub fn new() -> Self {
        Self {
            status: Status::NoSolution,
            extrema: Vec::new(),
            infinite_square_distance: None,
        }
    }

    pub(crate) fn clear(&mut self) {
        self.status = Status::NoSolution;
        self.extrema.clear();
        self.infinite_square_distance = None;
    }

    /// True unless the query ended with no solution.
    pub fn is_done(&self) -> bool {
        self.status != Status::NoSolution
    }

    /// Index of the smallest-distance extremum.
    pub fn min_index(&self) -> Option<usize> {
        self.extrema
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.square_distance.total_cmp(&b.1.square_distance))
            .map(|(i, _)| i)
    }

    /// Index of the largest-distance extremum.
    pub fn max_index(&self) -> Option<usize> {
        self.extrema
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.square_distance.total_cmp(&b.1.square_distance))
            .map(|(i, _)| i)
    }

    /// Smallest squared distance over all extrema.
    pub fn min_square_distance(&self) -> Option<f64> {
        self.min_index().map(|i| self.extrema[i].square_distance)
    }

    /// Largest squared distance over all extrema.
    pub fn max_square_distance(&self) -> Option<f64> {
        self.max_index().map(|i| self.extrema[i].square_distance)
    }
}

/// Result of a point-surface query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointExtremaResult {
    pub status: Status,
    pub extrema: Vec<PointExtremum>,
    pub infinite_square_distance: Option<f64>,
}

impl Default for PointExtremaResult {
    fn default() -> Self {
        Self::new()
    }
}

impl PointExtremaResult {
    pub fn new() -> Self {
        Self {
            status: Status::NoSolution,
            extrema: Vec::new(),
            infinite_square_distance: None,
        }
    }

    pub(crate) fn clear(&mut self) {
        self.status = Status::NoSolution;
        self.extrema.clear();
        self.infinite_square_distance = None;
    }

    /// True unless the query ended with no solution.
    pub fn is_done(&self) -> bool {
        self.status != Status::NoSolution
    }

    /// Index of the smallest-distance extremum.
    pub fn min_index(&self) -> Option<usize> {
        self.extrema
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.square_distance.total_cmp(&b.1.square_distance))
            .map(|(i, _)| i)
    }

    /// Index of the largest-distance extremum.
    pub fn max_index(&self) -> Option<usize> {
        self.extrema
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.square_distance.total_cmp(&b.1.square_distance))
            .map(|(i, _)| i)
    }

    /// Smallest squared distance over all extrema.
    pub fn min_square_distance(&self) -> Option<f64> {
        self.min_index().map(|i| self.extrema[i].square_distance)
    }

    /// Largest squared distance over all extrema.
    pub fn max_square_distance(&self) -> Option<f64> {
        self.max_index().map(|i| self.extrema[i].square_distance)
    }
}

/// Relationship between two surface axes, computed once and matched
/// exhaustively by every pair solver.
#[derive(Debug, Clone, Copy)]
pub enum AxisRelationship {
    /// Axes share the same line.
    Coaxial,
    /// Axes parallel, separated by `distance` along `offset_dir`
    /// (unit vector perpendicular to both axes, from axis 1 to axis 2).
    Parallel { distance: f64, offset_dir: Dir },
    /// Axes meet (within tolerance) at parameters `t1`/`t2` from the two
    /// reference points; `cross` is the normalized common perpendicular.
    Intersecting { t1: f64, t2: f64, cross: Dir },
    /// General position: closest approach at `t1`/`t2`, separated by
    /// `distance` along `dir` (unit, from axis 1 point to axis 2 point).
    Skew {
        t1: f64,
        t2: f64,
        distance: f64,
        dir: Dir,
    },
}

/// Classify the relationship between two axis lines.
///
/// `p1`/`d1` and `p2`/`d2` are a reference point and unit direction per
/// axis; `tol` is the spatial tolerance deciding coaxial/intersecting.
pub fn classify_axes(p1: &Pnt, d1: &Dir, p2: &Pnt, d2: &Dir, tol: f64) -> AxisRelationship {
    let cross = d1.cross_dir(d2);
    let delta = *p2 - *p1;

    if d1.is_parallel(d2, ANGULAR_TOLERANCE) {
        // Parallel axes: offset is the component of delta perpendicular to d1
        let axial = d1.dot(&delta);
        let perp = delta - d1.as_vec().scaled(axial);
        let distance = perp.magnitude();
        return match perp.normalized() {
            Some(offset_dir) if distance >= tol => AxisRelationship::Parallel {
                distance,
                offset_dir,
            },
            _ => AxisRelationship::Coaxial,
        };
    }

    // Closest approach of the two axis lines: the standard 2x2 system from
    // the normal equations of |p1 + t1*d1 - p2 - t2*d2|^2.
    let a12 = d1.dot_dir(d2);
    let b1 = d1.dot(&delta);
    let b2 = d2.dot(&delta);
    let (t1, t2) = math::solve_2x2(
        1.0,
        -a12,
        a12,
        -1.0,
        b1,
        b2,
        ANGULAR_TOLERANCE * ANGULAR_TOLERANCE,
    )
    .unwrap_or((0.0, 0.0));

    let q1 = *p1 + d1.as_vec().scaled(t1);
    let q2 = *p2 + d2.as_vec().scaled(t2);
    let w = q2 - q1;
    let distance = w.magnitude();

    if distance < tol {
        // The common perpendicular direction survives even when the closest
        // approach degenerates to a point
        return match cross.normalized() {
            Some(cross_dir) => AxisRelationship::Intersecting {
                t1,
                t2,
                cross: cross_dir,
            },
            // Nearly parallel and nearly touching: same line within tolerance
            None => AxisRelationship::Coaxial,
        };
    }

    match w.normalized() {
        Some(dir) => AxisRelationship::Skew {
            t1,
            t2,
            distance,
            dir,
        },
        None => AxisRelationship::Coaxial,
    }
}

/// Normalize an angle to `[0, 2*PI)`.
pub fn normalize_angle(angle: f64) -> f64 {
    let two_pi = 2.0 * PI;
    let mut a = angle % two_pi;
    if a < 0.0 {
        a += two_pi;
    }
    if a >= two_pi {
        a = 0.0;
    }
    a
}

/// Angle of `dir` in the basis (`x`, `y`) via atan2, normalized to `[0, 2*PI)`.
pub(crate) fn frame_angle(dir: &Vec3, x: &Dir, y: &Dir) -> f64 {
    normalize_angle(y.dot(dir).atan2(x.dot(dir)))
}

/// True when two angular parameters agree within `tol`, modulo 2*PI.
pub(crate) fn angles_match(a: f64, b: f64, tol: f64) -> bool {
    let d = (a - b).abs();
    d < tol || (d - 2.0 * PI).abs() < tol
}

pub(crate) fn in_range(value: f64, min: f64, max: f64, tol: f64) -> bool {
    value >= min - tol && value <= max + tol
}

/// Range check for angular parameters, tolerating one wrap in either sense.
pub(crate) fn angular_in_range(value: f64, min: f64, max: f64, tol: f64) -> bool {
    in_range(value, min, max, tol)
        || in_range(value + 2.0 * PI, min, max, tol)
        || in_range(value - 2.0 * PI, min, max, tol)
}

/// Closed-form point vs. cylinder extrema: the near and far generators
/// through the point's radial direction. Returns (u, v, is_min) tuples.
pub(crate) fn point_cylinder_extrema(
    p: &Pnt,
    cyl: &crate::surface::Cylinder,
) -> Vec<(f64, f64, bool)> {
    let frame = cyl.position();
    let delta = *p - *frame.location();
    let v = frame.direction().dot(&delta);
    let perp = delta - frame.direction().as_vec().scaled(v);

    if perp.normalized().is_none() {
        // Point on the axis: every generator is equidistant
        return vec![(0.0, v, true)];
    }

    let u_near = frame_angle(&perp, frame.x_direction(), frame.y_direction());
    let u_far = frame_angle(&-perp, frame.x_direction(), frame.y_direction());
    vec![(u_near, v, true), (u_far, v, false)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::Dir;

    #[test]
    fn test_normalize_angle() {
        assert!((normalize_angle(-PI) - PI).abs() < 1e-12);
        assert!(normalize_angle(2.0 * PI).abs() < 1e-12);
        assert!((normalize_angle(5.0 * PI) - PI).abs() < 1e-12);
        assert!(normalize_angle(0.0).abs() < 1e-12);
    }

    #[test]
    fn test_classify_coaxial() {
        let rel = classify_axes(
            &Pnt::origin(),
            &Dir::z_axis(),
            &Pnt::new(0.0, 0.0, 7.0),
            &Dir::z_axis(),
            1e-7,
        );
        assert!(matches!(rel, AxisRelationship::Coaxial));
    }

    #[test]
    fn test_classify_parallel() {
        let rel = classify_axes(
            &Pnt::origin(),
            &Dir::z_axis(),
            &Pnt::new(5.0, 0.0, 3.0),
            &Dir::z_axis(),
            1e-7,
        );
        match rel {
            AxisRelationship::Parallel { distance, offset_dir } => {
                assert!((distance - 5.0).abs() < 1e-12);
                assert!((offset_dir.x() - 1.0).abs() < 1e-12);
            }
            other => panic!("expected Parallel, got {other:?}"),
        }
    }

    #[test]
    fn test_classify_intersecting() {
        // X axis through origin and Y axis through origin meet at the origin
        let rel = classify_axes(
            &Pnt::new(-3.0, 0.0, 0.0),
            &Dir::x_axis(),
            &Pnt::new(0.0, 2.0, 0.0),
            &Dir::y_axis(),
            1e-7,
        );
        match rel {
            AxisRelationship::Intersecting { t1, t2, .. } => {
                assert!((t1 - 3.0).abs() < 1e-9);
                assert!((t2 + 2.0).abs() < 1e-9);
            }
            other => panic!("expected Intersecting, got {other:?}"),
        }
    }

    #[test]
    fn test_classify_skew() {
        // Z axis through origin, X-directed line through (0, 5, 10)
        let rel = classify_axes(
            &Pnt::origin(),
            &Dir::z_axis(),
            &Pnt::new(0.0, 5.0, 10.0),
            &Dir::x_axis(),
            1e-7,
        );
        match rel {
            AxisRelationship::Skew { distance, dir, t1, .. } => {
                assert!((distance - 5.0).abs() < 1e-9);
                assert!((t1 - 10.0).abs() < 1e-9);
                assert!((dir.y() - 1.0).abs() < 1e-9);
            }
            other => panic!("expected Skew, got {other:?}"),
        }
    }

    #[test]
    fn test_angles_match_wraps() {
        let tol = 1e-6;
        assert!(angles_match(0.0, 2.0 * PI - 1e-9, tol));
        assert!(angles_match(1.0, 1.0, tol));
        assert!(!angles_match(0.0, PI, tol));
    }
}
