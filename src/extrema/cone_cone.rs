//! Extremal distances between two cones.
//!
//! The axis classification mirrors the cylinder-cylinder solver, but a
//! cone's cross-section radius varies with V, so only the parallel and
//! coaxial configurations stay closed-form (a 2D line problem in the
//! axial plane). Intersecting and skew axes go through coarse sampling
//! along both axes followed by fixed-step gradient descent on the
//! squared distance.

use log::debug;

use crate::extrema::{
    angles_match, angular_in_range, classify_axes, frame_angle, in_range, normalize_angle,
    AxisRelationship, Domain4D, SearchMode, Status, SurfaceExtremaResult, SurfaceExtremum,
    BOUNDARY_SAMPLES, DESCENT_STEPS, GRADIENT_EPSILON,
};
use crate::geom::{Dir, Pnt};
use crate::math;
use crate::surface::{Cone, Surface};

/// Samples per axis in the coarse sweep of the general case.
const SWEEP_SAMPLES: usize = 41;

/// Extrema solver for a cone-cone pair.
pub struct ConeConeExtrema {
    cone1: Cone,
    cone2: Cone,
    domain: Option<Domain4D>,
    result: SurfaceExtremaResult,
    // cached geometry
    apex1: Pnt,
    apex2: Pnt,
}

impl ConeConeExtrema {
    /// Solver over the full (unbounded) parameter space.
    pub fn new(cone1: Cone, cone2: Cone) -> Self {
        let apex1 = cone1.apex();
        let apex2 = cone2.apex();
        Self {
            cone1,
            cone2,
            domain: None,
            result: SurfaceExtremaResult::new(),
            apex1,
            apex2,
        }
    }

    /// Solver restricted to the given parameter rectangles.
    pub fn with_domain(cone1: Cone, cone2: Cone, domain: Domain4D) -> Self {
        let mut solver = Self::new(cone1, cone2);
        solver.domain = Some(domain);
        solver
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
            &self.apex1,
            self.cone1.axis(),
            &self.apex2,
            self.cone2.axis(),
            tol,
        );
        debug!("cone-cone axis relationship: {relation:?}");

        match relation {
            AxisRelationship::Coaxial => self.coaxial_case(tol, mode),
            AxisRelationship::Parallel { distance, offset_dir } => {
                self.parallel_case(distance, &offset_dir, tol, mode)
            }
            AxisRelationship::Intersecting { t1, t2, cross } => {
                self.intersecting_case(t1, t2, &cross, tol, mode)
            }
            AxisRelationship::Skew { t1, t2, distance, .. } => {
                self.general_case(t1, t2, distance, tol, mode)
            }
        }
    }

    /// Coaxial cones. In the axial cross-section plane each cone is a pair
    /// of generator lines through its apex; two unbounded double cones on
    /// a shared axis always cross, so the minimum is zero on a full circle
    /// of contact.
    fn coaxial_case(&mut self, tol: f64, mode: SearchMode) {
        let axis = *self.cone1.axis();
        let sense = axis.dot_dir(self.cone2.axis());
        let h = axis.dot(&(self.apex2 - self.apex1));

        let sin1 = self.cone1.semi_angle().sin();
        let cos1 = self.cone1.semi_angle().cos();
        let sin2 = self.cone2.semi_angle().sin();
        let cos2 = self.cone2.semi_angle().cos();

        self.result.status = Status::InfiniteSolutions;
        self.result.infinite_square_distance = Some(0.0);

        if !mode.wants_min() {
            return;
        }

        // Cross-section coordinates: xi along frame1 X, z along the shared
        // axis, both measured from apex1. Generator lines:
        //   cone1: v1 * (s1*sin1, cos1)
        //   cone2: (0, h) + v2 * (s2*sin2, sense*cos2)
        let x1 = *self.cone1.position().x_direction();
        for s1 in [1.0, -1.0] {
            for s2 in [1.0, -1.0] {
                let solved = math::solve_2x2(
                    s1 * sin1,
                    -s2 * sin2,
                    cos1,
                    -sense * cos2,
                    0.0,
                    h,
                    1e-14,
                );
                let Some((v1, v2)) = solved else { continue };

                let u1 = cross_section_u(&x1, self.cone1.position(), s1);
                let u2 = cross_section_u(&x1, self.cone2.position(), s2);
                self.add_extremum(u1, v1, u2, v2, true, tol);
                return;
            }
        }
    }

    /// Parallel, offset axes. The plane through both axes cuts each cone in
    /// two generator lines; line-line intersections give contact points
    /// (unbounded cones widen past any fixed offset, so the minimum is zero
    /// unless every line pair is parallel).
    fn parallel_case(&mut self, distance: f64, offset_dir: &Dir, tol: f64, mode: SearchMode) {
        if !mode.wants_min() {
            return;
        }

        let axis = *self.cone1.axis();
        let sense = axis.dot_dir(self.cone2.axis());
        let h = axis.dot(&(self.apex2 - self.apex1));

        let sin1 = self.cone1.semi_angle().sin();
        let cos1 = self.cone1.semi_angle().cos();
        let sin2 = self.cone2.semi_angle().sin();
        let cos2 = self.cone2.semi_angle().cos();

        // Cross-section coordinates: xi along offset_dir, z along axis1,
        // origin at apex1; apex2 sits at (distance, h).
        let mut best: Option<(f64, f64, f64, f64, f64)> = None;
        for s1 in [1.0, -1.0] {
            for s2 in [1.0, -1.0] {
                let candidate = match math::solve_2x2(
                    s1 * sin1,
                    -s2 * sin2,
                    cos1,
                    -sense * cos2,
                    distance,
                    h,
                    1e-14,
                ) {
                    Some((v1, v2)) => (0.0, s1, s2, v1, v2),
                    None => {
                        // Parallel generator lines: perpendicular offset of
                        // apex2 from the cone1 line
                        let d = (distance * cos1 - h * s1 * sin1).abs();
                        let v1 = distance * s1 * sin1 + h * cos1;
                        (d * d, s1, s2, v1, 0.0)
                    }
                };
                let better = match &best {
                    Some((sq, ..)) => candidate.0 < *sq,
                    None => true,
                };
                if better {
                    best = Some(candidate);
                }
            }
        }

        if let Some((_, s1, s2, v1, v2)) = best {
            let u1 = cross_section_u(offset_dir, self.cone1.position(), s1);
            let u2 = cross_section_u(offset_dir, self.cone2.position(), s2);
            self.add_extremum(u1, v1, u2, v2, true, tol);
        }
    }

    /// Intersecting axes: seed the four sign combinations of the common
    /// perpendicular at the crossing point, refine the minima by gradient
    /// descent (the cones usually interpenetrate near the crossing).
    fn intersecting_case(&mut self, t1: f64, t2: f64, cross: &Dir, tol: f64, mode: SearchMode) {
        let cos1 = self.cone1.semi_angle().cos();
        let cos2 = self.cone2.semi_angle().cos();
        let v1 = t1 / cos1;
        let v2 = t2 / cos2;

        for s1 in [1.0, -1.0] {
            for s2 in [1.0, -1.0] {
                let is_min = s1 == s2;
                if is_min && !mode.wants_min() {
                    continue;
                }
                if !is_min && !mode.wants_max() {
                    continue;
                }
                let w1 = cross.as_vec().scaled(s1 * v1.signum());
                let w2 = cross.as_vec().scaled(s2 * v2.signum());
                let frame1 = self.cone1.position();
                let frame2 = self.cone2.position();
                let u1 = frame_angle(&w1, frame1.x_direction(), frame1.y_direction());
                let u2 = frame_angle(&w2, frame2.x_direction(), frame2.y_direction());
                if is_min {
                    let refined = self.refine_extremum([u1, v1, u2, v2], tol);
                    self.add_extremum(refined[0], refined[1], refined[2], refined[3], true, tol);
                } else {
                    self.add_extremum(u1, v1, u2, v2, false, tol);
                }
            }
        }
    }

    /// Skew axes: coarse sweep of axial stations on both cones, facing each
    /// station pair radially, then gradient descent from the best sample.
    fn general_case(&mut self, t1: f64, t2: f64, distance: f64, tol: f64, mode: SearchMode) {
        if !mode.wants_min() {
            // The away-facing configuration is not a stationary point of an
            // unbounded cone; maxima are only meaningful on bounded domains
            // and are handled by the boundary scan
            return;
        }

        let (v1_range, v2_range) = self.sweep_ranges(t1, t2, distance);

        let mut best: Option<([f64; 4], f64)> = None;
        for i in 0..SWEEP_SAMPLES {
            let f1 = i as f64 / (SWEEP_SAMPLES - 1) as f64;
            let v1 = v1_range.0 + f1 * (v1_range.1 - v1_range.0);
            let c1 = self.axis_station1(v1);
            for j in 0..SWEEP_SAMPLES {
                let f2 = j as f64 / (SWEEP_SAMPLES - 1) as f64;
                let v2 = v2_range.0 + f2 * (v2_range.1 - v2_range.0);
                let c2 = self.axis_station2(v2);

                let Some((u1, u2)) = self.facing_angles(&c1, &c2, v1, v2) else {
                    continue;
                };
                let sq = self
                    .cone1
                    .value(u1, v1)
                    .square_distance(&self.cone2.value(u2, v2));
                let better = match &best {
                    Some((_, best_sq)) => sq < *best_sq,
                    None => true,
                };
                if better {
                    best = Some(([u1, v1, u2, v2], sq));
                }
            }
        }

        if let Some((start, _)) = best {
            let refined = self.refine_extremum(start, tol);
            self.add_extremum(refined[0], refined[1], refined[2], refined[3], true, tol);
        }
    }

    /// Axial sweep ranges: the domain's V ranges when bounded, otherwise a
    /// span scaled to the axis geometry.
    fn sweep_ranges(&self, t1: f64, t2: f64, distance: f64) -> ((f64, f64), (f64, f64)) {
        if let Some(domain) = &self.domain {
            return (
                (domain.domain1.v_min, domain.domain1.v_max),
                (domain.domain2.v_min, domain.domain2.v_max),
            );
        }
        let reach = 2.0 * (t1.abs() + t2.abs() + distance + 1.0);
        ((-reach, reach), (-reach, reach))
    }

    /// Point on the first cone's axis at the axial station of parameter v.
    fn axis_station1(&self, v: f64) -> Pnt {
        let cos_a = self.cone1.semi_angle().cos();
        self.apex1 + self.cone1.axis().as_vec().scaled(v * cos_a)
    }

    /// Point on the second cone's axis at the axial station of parameter v.
    fn axis_station2(&self, v: f64) -> Pnt {
        let cos_a = self.cone2.semi_angle().cos();
        self.apex2 + self.cone2.axis().as_vec().scaled(v * cos_a)
    }

    /// U angles turning the two cross-circles toward each other. None when
    /// the stations coincide or the direction degenerates onto an axis.
    fn facing_angles(&self, c1: &Pnt, c2: &Pnt, v1: f64, v2: f64) -> Option<(f64, f64)> {
        let w = *c2 - *c1;
        let frame1 = self.cone1.position();
        let frame2 = self.cone2.position();

        let perp1 = w - frame1.direction().as_vec().scaled(frame1.direction().dot(&w));
        let perp2 = w - frame2.direction().as_vec().scaled(frame2.direction().dot(&w));
        perp1.normalized()?;
        perp2.normalized()?;

        // A negative v flips the radial term, so face with the signed radial
        let w1 = perp1.scaled(v1.signum());
        let w2 = (-perp2).scaled(v2.signum());
        let u1 = frame_angle(&w1, frame1.x_direction(), frame1.y_direction());
        let u2 = frame_angle(&w2, frame2.x_direction(), frame2.y_direction());
        Some((u1, u2))
    }

    /// Fixed-step gradient descent on the squared distance over
    /// (u1, v1, u2, v2), with a numeric-difference gradient.
    fn refine_extremum(&self, start: [f64; 4], tol: f64) -> [f64; 4] {
        let f = |x: &[f64; 4]| {
            self.cone1
                .value(x[0], x[1])
                .square_distance(&self.cone2.value(x[2], x[3]))
        };

        let mut x = start;
        let mut fx = f(&x);
        let mut step = 0.1;

        for _ in 0..DESCENT_STEPS {
            let mut grad = [0.0; 4];
            let mut norm_sq = 0.0;
            for k in 0..4 {
                let mut plus = x;
                plus[k] += GRADIENT_EPSILON;
                let mut minus = x;
                minus[k] -= GRADIENT_EPSILON;
                grad[k] = (f(&plus) - f(&minus)) / (2.0 * GRADIENT_EPSILON);
                norm_sq += grad[k] * grad[k];
            }
            let norm = norm_sq.sqrt();
            if norm < tol * 1e-3 {
                break;
            }

            let mut trial = x;
            for k in 0..4 {
                trial[k] -= step * grad[k] / norm;
            }
            let ft = f(&trial);
            if ft < fx {
                x = trial;
                fx = ft;
                step *= 1.2;
            } else {
                step *= 0.5;
                if step < tol * 1e-3 {
                    break;
                }
            }
        }
        x
    }

    /// Sample the domain boundary of each cone and project every sample
    /// onto the opposite cone's generator lines in its axial plane.
    fn check_boundary_extrema(&mut self, tol: f64, mode: SearchMode) {
        let Some(domain) = self.domain else { return };
        let d1 = domain.domain1;
        let d2 = domain.domain2;

        let mut candidates: Vec<(f64, f64, f64, f64, bool)> = Vec::new();

        for i in 0..=BOUNDARY_SAMPLES {
            let f = i as f64 / BOUNDARY_SAMPLES as f64;
            let u = d1.u_min + f * (d1.u_max - d1.u_min);
            let v = d1.v_min + f * (d1.v_max - d1.v_min);
            for (bu, bv) in [(u, d1.v_min), (u, d1.v_max), (d1.u_min, v), (d1.u_max, v)] {
                let p = self.cone1.value(bu, bv);
                for (u2, v2, is_min) in point_cone_extrema(&p, &self.cone2) {
                    candidates.push((bu, bv, u2, v2, is_min));
                }
            }
        }

        for i in 0..=BOUNDARY_SAMPLES {
            let f = i as f64 / BOUNDARY_SAMPLES as f64;
            let u = d2.u_min + f * (d2.u_max - d2.u_min);
            let v = d2.v_min + f * (d2.v_max - d2.v_min);
            for (bu, bv) in [(u, d2.v_min), (u, d2.v_max), (d2.u_min, v), (d2.u_max, v)] {
                let p = self.cone2.value(bu, bv);
                for (u1, v1, is_min) in point_cone_extrema(&p, &self.cone1) {
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

        let point1 = self.cone1.value(u1, v1);
        let point2 = self.cone2.value(u2, v2);
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

/// U angle selecting the generator line with signed radial `s` along the
/// cross-section direction `xi` in the given frame.
fn cross_section_u(xi: &Dir, frame: &crate::geom::Ax3, s: f64) -> f64 {
    let w = xi.as_vec().scaled(s);
    frame_angle(&w, frame.x_direction(), frame.y_direction())
}

/// Closed-form point vs. cone extrema: orthogonal projections onto the two
/// generator lines in the axial half-plane through the point.
fn point_cone_extrema(p: &Pnt, cone: &Cone) -> Vec<(f64, f64, bool)> {
    let apex = cone.apex();
    let frame = cone.position();
    let delta = *p - apex;
    let z = frame.direction().dot(&delta);
    let radial = delta - frame.direction().as_vec().scaled(z);
    let rho = radial.magnitude();

    let sin_a = cone.semi_angle().sin();
    let cos_a = cone.semi_angle().cos();

    let Some(radial_dir) = radial.normalized() else {
        // Point on the axis: every generator is equidistant; project onto
        // the u = 0 generator
        let v = z * cos_a;
        return vec![(0.0, v, true)];
    };

    let u_near = frame_angle(
        &radial_dir.as_vec(),
        frame.x_direction(),
        frame.y_direction(),
    );
    let u_far = frame_angle(
        &-radial_dir.as_vec(),
        frame.x_direction(),
        frame.y_direction(),
    );

    // Projections of (rho, z) onto the lines t*(sin, cos) and t*(-sin, cos)
    let v_near = rho * sin_a + z * cos_a;
    let v_far = -rho * sin_a + z * cos_a;

    let p_near = cone.value(u_near, v_near);
    let p_far = cone.value(u_far, v_far);
    let near_closer = p.square_distance(&p_near) <= p.square_distance(&p_far);

    vec![
        (u_near, v_near, near_closer),
        (u_far, v_far, !near_closer),
    ]
}
