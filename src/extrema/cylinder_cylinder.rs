//! Extremal distances between two cylinders.
//!
//! Every axis configuration admits a closed form: parallel and coaxial axes
//! yield an infinite family (one representative is reported), intersecting
//! axes yield the four sign combinations of the common perpendicular, and
//! skew axes reduce to the line-line closest approach with radial
//! projections.

use log::debug;

use crate::extrema::{
    angles_match, angular_in_range, classify_axes, frame_angle, in_range, normalize_angle,
    point_cylinder_extrema, AxisRelationship, Domain4D, SearchMode, Status, SurfaceExtremaResult,
    SurfaceExtremum, BOUNDARY_SAMPLES,
};
use crate::geom::Dir;
use crate::surface::{Cylinder, Surface};

/// Extrema solver for a cylinder-cylinder pair.
///
/// The solver owns its result and scratch state; call [`perform`] or
/// [`perform_with_boundary`] and read the returned result reference.
///
/// [`perform`]: CylinderCylinderExtrema::perform
/// [`perform_with_boundary`]: CylinderCylinderExtrema::perform_with_boundary
pub struct CylinderCylinderExtrema {
    cyl1: Cylinder,
    cyl2: Cylinder,
    domain: Option<Domain4D>,
    result: SurfaceExtremaResult,
}

impl CylinderCylinderExtrema {
    /// Solver over the full (unbounded) parameter space.
    pub fn new(cyl1: Cylinder, cyl2: Cylinder) -> Self {
        Self {
            cyl1,
            cyl2,
            domain: None,
            result: SurfaceExtremaResult::new(),
        }
    }

    /// Solver restricted to the given parameter rectangles.
    pub fn with_domain(cyl1: Cylinder, cyl2: Cylinder, domain: Domain4D) -> Self {
        Self {
            cyl1,
            cyl2,
            domain: Some(domain),
            result: SurfaceExtremaResult::new(),
        }
    }

    /// The last computed result.
    pub fn result(&self) -> &SurfaceExtremaResult {
        &self.result
    }

    /// Interior extrema search.
    pub fn perform(&mut self, tol: f64, mode: SearchMode) -> &SurfaceExtremaResult {
        self.result.clear();
        self.compute(tol, mode);
        self.finish();
        &self.result
    }

    /// Interior search plus a scan of the domain boundary edges.
    ///
    /// Without a domain this is identical to [`perform`].
    ///
    /// [`perform`]: CylinderCylinderExtrema::perform
    pub fn perform_with_boundary(&mut self, tol: f64, mode: SearchMode) -> &SurfaceExtremaResult {
        self.result.clear();
        self.compute(tol, mode);
        if self.domain.is_some() {
            self.check_boundary_extrema(tol, mode);
        }
        self.finish();
        &self.result
    }

    fn finish(&mut self) {
        if self.result.status == Status::NoSolution && !self.result.extrema.is_empty() {
            self.result.status = Status::Ok;
        }
    }

    fn compute(&mut self, tol: f64, mode: SearchMode) {
        let relation = classify_axes(
            self.cyl1.location(),
            self.cyl1.axis(),
            self.cyl2.location(),
            self.cyl2.axis(),
            tol,
        );
        debug!("cylinder-cylinder axis relationship: {relation:?}");

        match relation {
            AxisRelationship::Coaxial => self.coaxial_case(tol, mode),
            AxisRelationship::Parallel { distance, offset_dir } => {
                self.parallel_case(distance, &offset_dir, tol, mode)
            }
            AxisRelationship::Intersecting { t1, t2, cross } => {
                self.intersecting_case(t1, t2, &cross, tol, mode)
            }
            AxisRelationship::Skew { t1, t2, distance, dir } => {
                self.skew_case(t1, t2, distance, &dir, tol, mode)
            }
        }
    }

    /// Coaxial axes: every U on the first cylinder is equally extremal.
    /// Reports one representative pair and the family distance.
    fn coaxial_case(&mut self, tol: f64, mode: SearchMode) {
        let r1 = self.cyl1.radius();
        let r2 = self.cyl2.radius();
        let min_dist = (r1 - r2).abs();

        self.result.status = Status::InfiniteSolutions;
        self.result.infinite_square_distance = Some(min_dist * min_dist);

        let radial = self.cyl1.position().x_direction().as_vec();
        let p1 = self.cyl1.value(0.0, 0.0);
        let frame2 = *self.cyl2.position();
        let v2 = frame2.direction().dot(&(p1 - *frame2.location()));

        if mode.wants_min() {
            let u2 = frame_angle(&radial, frame2.x_direction(), frame2.y_direction());
            self.add_extremum(0.0, 0.0, u2, v2, true, tol);
        }
        if mode.wants_max() {
            let u2 = frame_angle(&-radial, frame2.x_direction(), frame2.y_direction());
            self.add_extremum(0.0, 0.0, u2, v2, false, tol);
        }
    }

    /// Parallel, offset axes: still an infinite family (shift both points
    /// along the axes together). Representative points lie on the line
    /// through both axes.
    fn parallel_case(&mut self, distance: f64, offset_dir: &Dir, tol: f64, mode: SearchMode) {
        let r1 = self.cyl1.radius();
        let r2 = self.cyl2.radius();
        let min_dist = (distance - r1 - r2).abs();

        self.result.status = Status::InfiniteSolutions;
        self.result.infinite_square_distance = Some(min_dist * min_dist);

        let toward = offset_dir.as_vec();
        let frame1 = self.cyl1.position();
        let frame2 = self.cyl2.position();

        let u1_near = frame_angle(&toward, frame1.x_direction(), frame1.y_direction());
        let u1_far = frame_angle(&-toward, frame1.x_direction(), frame1.y_direction());
        let u2_near = frame_angle(&-toward, frame2.x_direction(), frame2.y_direction());
        let u2_far = frame_angle(&toward, frame2.x_direction(), frame2.y_direction());

        // Axially aligned: the second point sits at the height of the first
        let p1 = self.cyl1.value(u1_near, 0.0);
        let v2 = frame2.direction().dot(&(p1 - *frame2.location()));

        if mode.wants_min() {
            self.add_extremum(u1_near, 0.0, u2_near, v2, true, tol);
        }
        if mode.wants_max() {
            self.add_extremum(u1_far, 0.0, u2_far, v2, false, tol);
        }
    }

    /// Intersecting axes: four stationary pairs at the crossing point, one
    /// per sign combination of the common perpendicular. Same-sign pairs are
    /// minima, opposite-sign pairs maxima.
    fn intersecting_case(&mut self, t1: f64, t2: f64, cross: &Dir, tol: f64, mode: SearchMode) {
        let frame1 = *self.cyl1.position();
        let frame2 = *self.cyl2.position();

        for s1 in [1.0, -1.0] {
            for s2 in [1.0, -1.0] {
                let is_min = s1 == s2;
                if is_min && !mode.wants_min() {
                    continue;
                }
                if !is_min && !mode.wants_max() {
                    continue;
                }
                let d1 = cross.as_vec().scaled(s1);
                let d2 = cross.as_vec().scaled(s2);
                let u1 = frame_angle(&d1, frame1.x_direction(), frame1.y_direction());
                let u2 = frame_angle(&d2, frame2.x_direction(), frame2.y_direction());
                self.add_extremum(u1, t1, u2, t2, is_min, tol);
            }
        }
    }

    /// Skew axes: the closest-approach segment of the two axes carries both
    /// extremal pairs; each cylinder contributes its radius projected onto
    /// the segment direction.
    fn skew_case(&mut self, t1: f64, t2: f64, _distance: f64, dir: &Dir, tol: f64, mode: SearchMode) {
        let frame1 = self.cyl1.position();
        let frame2 = self.cyl2.position();

        // Component of the separation direction in each radial plane; for
        // cylinders this is the full direction since it is the common
        // perpendicular of the axes.
        let axial1 = frame1.direction().dot(&dir.as_vec());
        let perp1 = dir.as_vec() - frame1.direction().as_vec().scaled(axial1);
        let axial2 = frame2.direction().dot(&dir.as_vec());
        let perp2 = dir.as_vec() - frame2.direction().as_vec().scaled(axial2);

        let (Some(_), Some(_)) = (perp1.normalized(), perp2.normalized()) else {
            // Separation direction parallel to an axis cannot happen for
            // skew cylinders; treat as no stationary pair
            return;
        };

        let u1_near = frame_angle(&perp1, frame1.x_direction(), frame1.y_direction());
        let u1_far = frame_angle(&-perp1, frame1.x_direction(), frame1.y_direction());
        let u2_near = frame_angle(&-perp2, frame2.x_direction(), frame2.y_direction());
        let u2_far = frame_angle(&perp2, frame2.x_direction(), frame2.y_direction());

        if mode.wants_min() {
            self.add_extremum(u1_near, t1, u2_near, t2, true, tol);
        }
        if mode.wants_max() {
            self.add_extremum(u1_far, t1, u2_far, t2, false, tol);
        }
    }

    /// Sample the domain boundary of each cylinder and solve the point
    /// vs. opposite-cylinder problem in closed form at every sample.
    fn check_boundary_extrema(&mut self, tol: f64, mode: SearchMode) {
        let Some(domain) = self.domain else { return };

        let d1 = domain.domain1;
        let d2 = domain.domain2;

        let mut candidates: Vec<(f64, f64, f64, f64, bool)> = Vec::new();

        // Edges of the first cylinder's rectangle against the second cylinder
        for i in 0..=BOUNDARY_SAMPLES {
            let f = i as f64 / BOUNDARY_SAMPLES as f64;
            let u = d1.u_min + f * (d1.u_max - d1.u_min);
            let v = d1.v_min + f * (d1.v_max - d1.v_min);
            for (bu, bv) in [
                (u, d1.v_min),
                (u, d1.v_max),
                (d1.u_min, v),
                (d1.u_max, v),
            ] {
                let p = self.cyl1.value(bu, bv);
                for (u2, v2, is_min) in point_cylinder_extrema(&p, &self.cyl2) {
                    candidates.push((bu, bv, u2, v2, is_min));
                }
            }
        }

        // Edges of the second cylinder's rectangle against the first
        for i in 0..=BOUNDARY_SAMPLES {
            let f = i as f64 / BOUNDARY_SAMPLES as f64;
            let u = d2.u_min + f * (d2.u_max - d2.u_min);
            let v = d2.v_min + f * (d2.v_max - d2.v_min);
            for (bu, bv) in [
                (u, d2.v_min),
                (u, d2.v_max),
                (d2.u_min, v),
                (d2.u_max, v),
            ] {
                let p = self.cyl2.value(bu, bv);
                for (u1, v1, is_min) in point_cylinder_extrema(&p, &self.cyl1) {
                    candidates.push((u1, v1, bu, bv, is_min));
                }
            }
        }

        for (u1, v1, u2, v2, is_min) in candidates {
            if is_min && !mode.wants_min() {
                continue;
            }
            if !is_min && !mode.wants_max() {
                continue;
            }
            self.add_extremum(u1, v1, u2, v2, is_min, tol);
        }
    }

    /// Record an extremum after domain filtering and deduplication.
    fn add_extremum(&mut self, u1: f64, v1: f64, u2: f64, v2: f64, is_min: bool, tol: f64) {
        let u1 = normalize_angle(u1);
        let u2 = normalize_angle(u2);

        if let Some(domain) = &self.domain {
            if !angular_in_range(u1, domain.domain1.u_min, domain.domain1.u_max, tol)
                || !in_range(v1, domain.domain1.v_min, domain.domain1.v_max, tol)
                || !angular_in_range(u2, domain.domain2.u_min, domain.domain2.u_max, tol)
                || !in_range(v2, domain.domain2.v_min, domain.domain2.v_max, tol)
            {
                return;
            }
        }

        let point1 = self.cyl1.value(u1, v1);
        let point2 = self.cyl2.value(u2, v2);
        let square_distance = point1.square_distance(&point2);

        for existing in &self.result.extrema {
            if (existing.square_distance - square_distance).abs() <= tol * tol
                && angles_match(existing.u1, u1, tol)
                && (existing.v1 - v1).abs() <= tol
                && angles_match(existing.u2, u2, tol)
                && (existing.v2 - v2).abs() <= tol
            {
                return;
            }
        }

        self.result.extrema.push(SurfaceExtremum {
            u1,
            v1,
            u2,
            v2,
            point1,
            point2,
            square_distance,
            is_minimum: is_min,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extrema::Domain2D;
    use crate::geom::{Ax3, Dir, Pnt};
    use std::f64::consts::PI;

    fn z_cylinder(x: f64, y: f64, r: f64) -> Cylinder {
        Cylinder::new(Ax3::new(Pnt::new(x, y, 0.0), Dir::z_axis()), r).unwrap()
    }

    #[test]
    fn test_parallel_axes_min_max() {
        // Axes 7 apart, radii 1 and 3: min gap 3, max span 11
        let c1 = z_cylinder(0.0, 0.0, 1.0);
        let c2 = z_cylinder(7.0, 0.0, 3.0);
        let mut solver = CylinderCylinderExtrema::new(c1, c2);
        let result = solver.perform(1e-7, SearchMode::MinMax);

        assert_eq!(result.status, Status::InfiniteSolutions);
        assert!((result.infinite_square_distance.unwrap() - 9.0).abs() < 1e-9);
        assert!((result.min_square_distance().unwrap() - 9.0).abs() < 1e-9);
        assert!((result.max_square_distance().unwrap() - 121.0).abs() < 1e-9);
    }

    #[test]
    fn test_parallel_representative_points() {
        let c1 = z_cylinder(0.0, 0.0, 1.0);
        let c2 = z_cylinder(7.0, 0.0, 3.0);
        let mut solver = CylinderCylinderExtrema::new(c1, c2);
        let result = solver.perform(1e-7, SearchMode::Min).clone();

        let e = &result.extrema[result.min_index().unwrap()];
        assert!(e.is_minimum);
        assert!(e.point1.is_equal(&Pnt::new(1.0, 0.0, 0.0), 1e-9));
        assert!(e.point2.is_equal(&Pnt::new(4.0, 0.0, 0.0), 1e-9));
        // Round trip: stored parameters reproduce the stored points
        assert!(c1_value(&solver, e).is_equal(&e.point1, 1e-9));
    }

    fn c1_value(solver: &CylinderCylinderExtrema, e: &SurfaceExtremum) -> Pnt {
        solver.cyl1.value(e.u1, e.v1)
    }

    #[test]
    fn test_coaxial_min() {
        // Coaxial radii 2 and 10: radial gap 8
        let c1 = z_cylinder(0.0, 0.0, 2.0);
        let c2 = z_cylinder(0.0, 0.0, 10.0);
        let mut solver = CylinderCylinderExtrema::new(c1, c2);
        let result = solver.perform(1e-7, SearchMode::MinMax);

        assert_eq!(result.status, Status::InfiniteSolutions);
        assert!((result.infinite_square_distance.unwrap() - 64.0).abs() < 1e-9);
        assert!((result.min_square_distance().unwrap() - 64.0).abs() < 1e-9);
        assert!((result.max_square_distance().unwrap() - 144.0).abs() < 1e-9);
    }

    #[test]
    fn test_skew_axes() {
        // Z axis vs X-directed axis offset 10 in Y: axis gap 10, radii 1 and 2
        let c1 = z_cylinder(0.0, 0.0, 1.0);
        let c2 = Cylinder::new(
            Ax3::new(Pnt::new(0.0, 10.0, 5.0), Dir::x_axis()),
            2.0,
        )
        .unwrap();
        let mut solver = CylinderCylinderExtrema::new(c1, c2);
        let result = solver.perform(1e-7, SearchMode::MinMax);

        assert_eq!(result.status, Status::Ok);
        // min = 10 - 1 - 2 = 7, max = 10 + 1 + 2 = 13
        assert!((result.min_square_distance().unwrap() - 49.0).abs() < 1e-9);
        assert!((result.max_square_distance().unwrap() - 169.0).abs() < 1e-9);
    }

    #[test]
    fn test_intersecting_axes_four_extrema() {
        let c1 = z_cylinder(0.0, 0.0, 1.0);
        let c2 = Cylinder::new(Ax3::new(Pnt::origin(), Dir::x_axis()), 3.0).unwrap();
        let mut solver = CylinderCylinderExtrema::new(c1, c2);
        let result = solver.perform(1e-7, SearchMode::MinMax);

        assert_eq!(result.status, Status::Ok);
        assert_eq!(result.extrema.len(), 4);
        let minima = result.extrema.iter().filter(|e| e.is_minimum).count();
        assert_eq!(minima, 2);
        // Same-sign combos: |r1 - r2| = 2, opposite: r1 + r2 = 4
        assert!((result.min_square_distance().unwrap() - 4.0).abs() < 1e-9);
        assert!((result.max_square_distance().unwrap() - 16.0).abs() < 1e-9);
    }

    #[test]
    fn test_min_mode_reports_no_maxima() {
        let c1 = z_cylinder(0.0, 0.0, 1.0);
        let c2 = z_cylinder(7.0, 0.0, 3.0);
        let mut solver = CylinderCylinderExtrema::new(c1, c2);
        let result = solver.perform(1e-7, SearchMode::Min);
        assert!(result.extrema.iter().all(|e| e.is_minimum));
    }

    #[test]
    fn test_domain_filters_out_of_range() {
        let c1 = z_cylinder(0.0, 0.0, 1.0);
        let c2 = z_cylinder(7.0, 0.0, 3.0);
        // First cylinder restricted to the far half: the near-side
        // representative at u1 = 0 must be rejected
        let domain = Domain4D::new(
            Domain2D::new(PI / 2.0, 3.0 * PI / 2.0, -10.0, 10.0).unwrap(),
            Domain2D::new(0.0, 2.0 * PI, -10.0, 10.0).unwrap(),
        );
        let mut solver = CylinderCylinderExtrema::with_domain(c1, c2, domain);
        let result = solver.perform(1e-7, SearchMode::Min);
        assert!(result.extrema.is_empty());
    }

    #[test]
    fn test_boundary_scan_bounded_domain() {
        let c1 = z_cylinder(0.0, 0.0, 1.0);
        let c2 = z_cylinder(7.0, 0.0, 3.0);
        let domain = Domain4D::new(
            Domain2D::new(0.0, 2.0 * PI, -1.0, 1.0).unwrap(),
            Domain2D::new(0.0, 2.0 * PI, -1.0, 1.0).unwrap(),
        );
        let mut solver = CylinderCylinderExtrema::with_domain(c1, c2, domain);
        let result = solver.perform_with_boundary(1e-7, SearchMode::Min);
        assert!(result.is_done());
        assert!((result.min_square_distance().unwrap() - 9.0).abs() < 1e-6);
    }
}
