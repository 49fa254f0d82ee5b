//! Extremal distances between a cylinder and a torus.
//!
//! Coaxial configurations reduce to a 2D circle-line problem in the axial
//! half-plane. Parallel offset axes seed four side combinations of tube
//! circle against generator line. Everything else sweeps the torus
//! parameter grid coarsely and refines the best sample with the Powell
//! derivative-free optimizer.

use log::debug;
use nalgebra::Vector4;

use crate::extrema::{
    angles_match, angular_in_range, classify_axes, frame_angle, in_range, normalize_angle,
    point_cylinder_extrema, AxisRelationship, Domain4D, SearchMode, Status, SurfaceExtremaResult,
    SurfaceExtremum, BOUNDARY_SAMPLES,
};
use crate::geom::{Dir, Pnt};
use crate::math;
use crate::surface::{Cylinder, Surface, Torus};

/// Major-circle samples in the coarse torus sweep.
const SWEEP_U_SAMPLES: usize = 36;

/// Tube-circle samples in the coarse torus sweep.
const SWEEP_V_SAMPLES: usize = 18;

/// Extrema solver for a cylinder-torus pair.
///
/// The pair can be constructed in either argument order; results are always
/// reported in the caller's order (`u1/v1/point1` belong to the first
/// argument of the constructor).
pub struct CylinderTorusExtrema {
    cyl: Cylinder,
    torus: Torus,
    swapped: bool,
    /// Stored in cylinder-first order regardless of construction order.
    domain: Option<Domain4D>,
    result: SurfaceExtremaResult,
}

impl CylinderTorusExtrema {
    /// Solver with the cylinder as the first surface.
    pub fn new(cyl: Cylinder, torus: Torus) -> Self {
        Self {
            cyl,
            torus,
            swapped: false,
            domain: None,
            result: SurfaceExtremaResult::new(),
        }
    }

    /// Solver with the torus as the first surface.
    pub fn new_swapped(torus: Torus, cyl: Cylinder) -> Self {
        Self {
            cyl,
            torus,
            swapped: true,
            domain: None,
            result: SurfaceExtremaResult::new(),
        }
    }

    /// Bounded solver, cylinder first; `domain` is in the caller's order.
    pub fn with_domain(cyl: Cylinder, torus: Torus, domain: Domain4D) -> Self {
        let mut solver = Self::new(cyl, torus);
        solver.domain = Some(domain);
        solver
    }

    /// Bounded solver, torus first; `domain` is in the caller's order.
    pub fn with_domain_swapped(torus: Torus, cyl: Cylinder, domain: Domain4D) -> Self {
        let mut solver = Self::new_swapped(torus, cyl);
        solver.domain = Some(domain.swapped());
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
            self.cyl.location(),
            self.cyl.axis(),
            self.torus.location(),
            self.torus.axis(),
            tol,
        );
        debug!("cylinder-torus axis relationship: {relation:?}");

        match relation {
            AxisRelationship::Coaxial => self.coaxial_case(tol, mode),
            AxisRelationship::Parallel { distance, offset_dir } => {
                self.parallel_case(distance, &offset_dir, tol, mode)
            }
            AxisRelationship::Intersecting { .. } | AxisRelationship::Skew { .. } => {
                self.general_case(tol, mode)
            }
        }
    }

    /// Shared axis: in the (radius, height) half-plane the cylinder is a
    /// vertical line and the tube a circle, so the whole family of extrema
    /// is one rotation orbit.
    fn coaxial_case(&mut self, tol: f64, mode: SearchMode) {
        let rc = self.cyl.radius();
        let big_r = self.torus.major_radius();
        let rt = self.torus.minor_radius();
        let delta = rc - big_r;

        // Tube angle facing the cylinder wall, and the radial gap there
        let (v_torus, min_dist) = if delta.abs() <= rt && rt > 0.0 {
            // Tube crosses the cylinder wall
            ((delta / rt).acos(), 0.0)
        } else if delta > 0.0 {
            (0.0, delta.abs() - rt)
        } else {
            (std::f64::consts::PI, delta.abs() - rt)
        };

        self.result.status = Status::InfiniteSolutions;
        self.result.infinite_square_distance = Some(min_dist * min_dist);

        let radial = self.cyl.position().x_direction().as_vec();
        let tframe = *self.torus.position();

        if mode.wants_min() {
            let u_t = frame_angle(&radial, tframe.x_direction(), tframe.y_direction());
            let p2 = self.torus.value(u_t, v_torus);
            let v1 = self.cyl.axis().dot(&(p2 - *self.cyl.location()));
            self.add_extremum(0.0, v1, u_t, v_torus, true, tol);
        }
        if mode.wants_max() {
            // Far side of the outer equator at matched height
            let u_t = frame_angle(&-radial, tframe.x_direction(), tframe.y_direction());
            let p2 = self.torus.value(u_t, 0.0);
            let v1 = self.cyl.axis().dot(&(p2 - *self.cyl.location()));
            self.add_extremum(0.0, v1, u_t, 0.0, false, tol);
        }
    }

    /// Parallel, offset axes: try the four side combinations of generator
    /// line against tube circle, refine the nearest with Powell and keep
    /// the farthest as the reported maximum.
    fn parallel_case(&mut self, _distance: f64, offset_dir: &Dir, tol: f64, mode: SearchMode) {
        let cframe = self.cyl.position();
        let tframe = self.torus.position();
        let rc = self.cyl.radius();
        let big_r = self.torus.major_radius();

        let mut best_min: Option<([f64; 4], f64)> = None;
        let mut best_max: Option<([f64; 4], f64)> = None;

        for s_c in [1.0, -1.0] {
            for s_t in [1.0, -1.0] {
                let side_c = offset_dir.as_vec().scaled(s_c);
                let side_t = offset_dir.as_vec().scaled(s_t);
                let u1 = frame_angle(&side_c, cframe.x_direction(), cframe.y_direction());
                let u_t = frame_angle(&side_t, tframe.x_direction(), tframe.y_direction());

                // Generator line through the chosen cylinder side
                let g0 = *cframe.location() + side_c.scaled(rc);
                let c2 = *tframe.location() + side_t.scaled(big_r);
                let v1 = cframe.direction().dot(&(c2 - g0));
                let p_line = g0 + cframe.direction().as_vec().scaled(v1);

                let w = p_line - c2;
                let Some(w_dir) = w.normalized() else { continue };
                // Tube angle facing the generator
                let radial_t = self.torus.tube_radial(u_t);
                let v_t = tframe
                    .direction()
                    .dot(&w_dir.as_vec())
                    .atan2(w_dir.dot(&radial_t));

                let params = [u1, v1, u_t, v_t];
                let sq = self
                    .cyl
                    .value(u1, v1)
                    .square_distance(&self.torus.value(u_t, v_t));
                if best_min.as_ref().map_or(true, |(_, s)| sq < *s) {
                    best_min = Some((params, sq));
                }
                // Away-facing tube angle for the far configuration
                let far = [u1, v1, u_t, v_t + std::f64::consts::PI];
                let far_sq = self
                    .cyl
                    .value(far[0], far[1])
                    .square_distance(&self.torus.value(far[2], far[3]));
                if best_max.as_ref().map_or(true, |(_, s)| far_sq > *s) {
                    best_max = Some((far, far_sq));
                }
            }
        }

        if mode.wants_min() {
            if let Some((start, _)) = best_min {
                let refined = self.refine_min(start, tol);
                self.add_extremum(refined[0], refined[1], refined[2], refined[3], true, tol);
            }
        }
        if mode.wants_max() {
            if let Some((p, _)) = best_max {
                self.add_extremum(p[0], p[1], p[2], p[3], false, tol);
            }
        }
    }

    /// General axis position: coarse sweep of the torus parameter grid,
    /// projecting each sample onto the cylinder in closed form, then Powell
    /// refinement of the best sample.
    fn general_case(&mut self, tol: f64, mode: SearchMode) {
        let two_pi = 2.0 * std::f64::consts::PI;
        let mut best_min: Option<([f64; 4], f64)> = None;
        let mut best_max: Option<([f64; 4], f64)> = None;

        for i in 0..SWEEP_U_SAMPLES {
            let u_t = two_pi * i as f64 / SWEEP_U_SAMPLES as f64;
            for j in 0..SWEEP_V_SAMPLES {
                let v_t = two_pi * j as f64 / SWEEP_V_SAMPLES as f64;
                let p2 = self.torus.value(u_t, v_t);
                for (u1, v1, is_min) in point_cylinder_extrema(&p2, &self.cyl) {
                    let sq = self.cyl.value(u1, v1).square_distance(&p2);
                    let params = [u1, v1, u_t, v_t];
                    if is_min {
                        if best_min.as_ref().map_or(true, |(_, s)| sq < *s) {
                            best_min = Some((params, sq));
                        }
                    } else if best_max.as_ref().map_or(true, |(_, s)| sq > *s) {
                        best_max = Some((params, sq));
                    }
                }
            }
        }

        if mode.wants_min() {
            if let Some((start, _)) = best_min {
                let refined = self.refine_min(start, tol);
                self.add_extremum(refined[0], refined[1], refined[2], refined[3], true, tol);
            }
        }
        if mode.wants_max() {
            if let Some((p, _)) = best_max {
                self.add_extremum(p[0], p[1], p[2], p[3], false, tol);
            }
        }
    }

    /// Powell refinement of a minimum candidate over (u1, v1, u2, v2).
    /// Falls back to the unrefined start on optimizer failure.
    fn refine_min(&self, start: [f64; 4], tol: f64) -> [f64; 4] {
        let objective = |x: &Vector4<f64>| {
            self.cyl
                .value(x[0], x[1])
                .square_distance(&self.torus.value(x[2], x[3]))
        };
        let config = math::Config::new((tol * 1e-3).max(1e-12), 60);
        match math::powell(&objective, Vector4::new(start[0], start[1], start[2], start[3]), config)
        {
            Some(sol) => [sol[0], sol[1], sol[2], sol[3]],
            None => start,
        }
    }

    /// Sample the domain boundary of each surface and solve the point
    /// vs. opposite-surface problem in closed form at every sample.
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
                let p = self.cyl.value(bu, bv);
                for (u2, v2, is_min) in point_torus_extrema(&p, &self.torus) {
                    candidates.push((bu, bv, u2, v2, is_min));
                }
            }
        }

        for i in 0..=BOUNDARY_SAMPLES {
            let f = i as f64 / BOUNDARY_SAMPLES as f64;
            let u = d2.u_min + f * (d2.u_max - d2.u_min);
            let v = d2.v_min + f * (d2.v_max - d2.v_min);
            for (bu, bv) in [(u, d2.v_min), (u, d2.v_max), (d2.u_min, v), (d2.u_max, v)] {
                let p = self.torus.value(bu, bv);
                for (u1, v1, is_min) in point_cylinder_extrema(&p, &self.cyl) {
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

    /// Record an extremum (parameters in cylinder-first order) after domain
    /// filtering and deduplication. Swapped construction order is restored
    /// here so the caller sees its own argument order.
    fn add_extremum(&mut self, u1: f64, v1: f64, u2: f64, v2: f64, is_min: bool, tol: f64) {
        let u1 = normalize_angle(u1);
        let u2 = normalize_angle(u2);
        let v2 = normalize_angle(v2);

        if let Some(domain) = &self.domain {
            if !angular_in_range(u1, domain.domain1.u_min, domain.domain1.u_max, tol)
                || !in_range(v1, domain.domain1.v_min, domain.domain1.v_max, tol)
                || !angular_in_range(u2, domain.domain2.u_min, domain.domain2.u_max, tol)
                || !angular_in_range(v2, domain.domain2.v_min, domain.domain2.v_max, tol)
            {
                return;
            }
        }

        let point1 = self.cyl.value(u1, v1);
        let point2 = self.torus.value(u2, v2);
        let square_distance = point1.square_distance(&point2);

        for existing in &self.result.extrema {
            let (eu1, ev1, eu2, ev2) = if self.swapped {
                (existing.u2, existing.v2, existing.u1, existing.v1)
            } else {
                (existing.u1, existing.v1, existing.u2, existing.v2)
            };
            if (existing.square_distance - square_distance).abs() <= tol * tol
                && angles_match(eu1, u1, tol)
                && (ev1 - v1).abs() <= tol
                && angles_match(eu2, u2, tol)
                && angles_match(ev2, v2, tol)
            {
                return;
            }
        }

        let extremum = if self.swapped {
            SurfaceExtremum {
                u1: u2,
                v1: v2,
                u2: u1,
                v2: v1,
                point1: point2,
                point2: point1,
                square_distance,
                is_minimum: is_min,
            }
        } else {
            SurfaceExtremum {
                u1,
                v1,
                u2,
                v2,
                point1,
                point2,
                square_distance,
                is_minimum: is_min,
            }
        };
        self.result.extrema.push(extremum);
    }
}

/// Closed-form point vs. torus extrema: the near and far tube circles in
/// the axial half-plane through the point. Returns (u, v, is_min) tuples.
fn point_torus_extrema(p: &Pnt, torus: &Torus) -> Vec<(f64, f64, bool)> {
    let frame = torus.position();
    let delta = *p - *frame.location();
    let z = frame.direction().dot(&delta);
    let horiz = delta - frame.direction().as_vec().scaled(z);

    let Some(horiz_dir) = horiz.normalized() else {
        // Point on the axis: one representative tube circle
        let c = torus.tube_center(0.0);
        let d = *p - c;
        let v = match d.normalized() {
            Some(dn) => frame
                .direction()
                .dot(&dn.as_vec())
                .atan2(dn.dot(&torus.tube_radial(0.0))),
            None => 0.0,
        };
        return vec![(0.0, v, true)];
    };

    let u_near = frame_angle(
        &horiz_dir.as_vec(),
        frame.x_direction(),
        frame.y_direction(),
    );
    let u_far = frame_angle(
        &-horiz_dir.as_vec(),
        frame.x_direction(),
        frame.y_direction(),
    );

    let mut out = Vec::with_capacity(2);

    let c_near = torus.tube_center(u_near);
    let d_near = *p - c_near;
    let v_near = match d_near.normalized() {
        Some(dn) => frame
            .direction()
            .dot(&dn.as_vec())
            .atan2(dn.dot(&torus.tube_radial(u_near))),
        None => 0.0,
    };
    out.push((u_near, v_near, true));

    let c_far = torus.tube_center(u_far);
    // Farthest tube point: radially away from the query point
    let away = c_far - *p;
    if let Some(dn) = away.normalized() {
        let v_far = frame
            .direction()
            .dot(&dn.as_vec())
            .atan2(dn.dot(&torus.tube_radial(u_far)));
        out.push((u_far, v_far, false));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::Ax3;

    #[test]
    fn test_coaxial_cylinder_inside_torus() {
        // Cylinder r=2 inside torus R=5, tube r=1: radial gap 3 - 1 = 2
        let cyl = Cylinder::new(Ax3::standard(), 2.0).unwrap();
        let torus = Torus::new(Ax3::standard(), 5.0, 1.0).unwrap();
        let mut solver = CylinderTorusExtrema::new(cyl, torus);
        let result = solver.perform(1e-7, SearchMode::MinMax);

        assert_eq!(result.status, Status::InfiniteSolutions);
        assert!((result.infinite_square_distance.unwrap() - 4.0).abs() < 1e-9);
        assert!((result.min_square_distance().unwrap() - 4.0).abs() < 1e-9);
        // Far side of the outer equator: 2 + 5 + 1 = 8
        assert!((result.max_square_distance().unwrap() - 64.0).abs() < 1e-9);
    }

    #[test]
    fn test_coaxial_tube_crossing_wall() {
        // Cylinder r=5 through the tube band [4, 6]: contact
        let cyl = Cylinder::new(Ax3::standard(), 5.0).unwrap();
        let torus = Torus::new(Ax3::standard(), 5.0, 1.0).unwrap();
        let mut solver = CylinderTorusExtrema::new(cyl, torus);
        let result = solver.perform(1e-7, SearchMode::Min);

        assert_eq!(result.status, Status::InfiniteSolutions);
        assert!(result.infinite_square_distance.unwrap() < 1e-12);
        let e = &result.extrema[0];
        assert!(e.point1.is_equal(&e.point2, 1e-7));
    }

    #[test]
    fn test_perpendicular_axes() {
        // Torus in the XY plane; cylinder along X at height 20, radius 2.
        // Closest pair: torus top ring (z = 1, ring radius 5) under the
        // axis line, gap 20 - 1 - 2 = 17.
        let torus = Torus::new(Ax3::standard(), 5.0, 1.0).unwrap();
        let cyl = Cylinder::new(
            Ax3::new(Pnt::new(0.0, 0.0, 20.0), Dir::x_axis()),
            2.0,
        )
        .unwrap();
        let mut solver = CylinderTorusExtrema::new(cyl, torus);
        let result = solver.perform(1e-7, SearchMode::Min);

        assert!(result.is_done());
        let min_sq = result.min_square_distance().unwrap();
        assert!((min_sq - 289.0).abs() < 1e-3, "min_sq = {min_sq}");
    }

    #[test]
    fn test_swapped_order_reports_torus_first() {
        let torus = Torus::new(Ax3::standard(), 5.0, 1.0).unwrap();
        let cyl = Cylinder::new(
            Ax3::new(Pnt::new(0.0, 0.0, 20.0), Dir::x_axis()),
            2.0,
        )
        .unwrap();
        let mut solver = CylinderTorusExtrema::new_swapped(torus, cyl);
        let result = solver.perform(1e-7, SearchMode::Min).clone();

        let e = &result.extrema[result.min_index().unwrap()];
        // point1 belongs to the torus: it must satisfy the torus equation
        assert!(torus.value(e.u1, e.v1).is_equal(&e.point1, 1e-9));
        assert!(cyl.value(e.u2, e.v2).is_equal(&e.point2, 1e-9));
    }

    #[test]
    fn test_point_torus_projection() {
        let torus = Torus::new(Ax3::standard(), 5.0, 1.0).unwrap();
        let p = Pnt::new(10.0, 0.0, 0.0);
        let extrema = point_torus_extrema(&p, &torus);
        let (u, v, is_min) = extrema[0];
        assert!(is_min);
        // Nearest point is the outer equator at u = 0
        assert!(torus.value(u, v).is_equal(&Pnt::new(6.0, 0.0, 0.0), 1e-9));
        // Farthest is the opposite outer equator point
        let (uf, vf, is_min_f) = extrema[1];
        assert!(!is_min_f);
        assert!(torus.value(uf, vf).is_equal(&Pnt::new(-6.0, 0.0, 0.0), 1e-9));
    }
}
