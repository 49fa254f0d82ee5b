//! Numerical building blocks: small linear solves, bounded 2D Newton
//! iteration on gradient-zero conditions, and a derivative-free Powell
//! minimizer over four parameters.
//!
//! All solvers report failure through flags or `Option`, never panics:
//! callers are expected to fall back to coarser strategies.

use nalgebra::Vector4;

/// Shared solver configuration.
#[derive(Debug, Clone, Copy)]
pub struct Config {
    pub tolerance: f64,
    pub max_iterations: usize,
}

impl Config {
    pub fn new(tolerance: f64, max_iterations: usize) -> Self {
        Self {
            tolerance,
            max_iterations,
        }
    }
}

/// Solve the 2x2 system `[[a, b], [c, d]] * [x, y] = [e, f]`.
///
/// None when the determinant is below `det_tol` (near-singular system).
pub fn solve_2x2(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64, det_tol: f64) -> Option<(f64, f64)> {
    let det = a * d - b * c;
    if det.abs() <= det_tol {
        return None;
    }
    Some(((e * d - b * f) / det, (a * f - e * c) / det))
}

/// A 2D gradient function with Hessian, as consumed by [`newton2d`].
pub trait Gradient2 {
    /// Gradient components (fu, fv) at (u, v).
    fn value(&self, u: f64, v: f64) -> (f64, f64);

    /// Gradient and Hessian entries (fu, fv, fuu, fuv, fvv) at (u, v).
    fn value_and_jacobian(&self, u: f64, v: f64) -> (f64, f64, f64, f64, f64);
}

/// Outcome of a bounded Newton solve. Non-convergence is a flag, not an error.
#[derive(Debug, Clone, Copy)]
pub struct NewtonResult {
    pub done: bool,
    pub u: f64,
    pub v: f64,
}

/// Bounded 2D Newton iteration on the gradient-zero condition of `func`.
///
/// Starts at `(start_u, start_v)`, clamps every step into the rectangle
/// `[u_min, u_max] x [v_min, v_max]`, and stops when the step or the
/// gradient norm drops below the configured tolerance. A singular Hessian
/// or iteration exhaustion yields `done == false`.
#[allow(clippy::too_many_arguments)]
pub fn newton2d<F: Gradient2>(
    func: &F,
    start_u: f64,
    start_v: f64,
    u_min: f64,
    u_max: f64,
    v_min: f64,
    v_max: f64,
    config: Config,
) -> NewtonResult {
    let mut u = start_u.clamp(u_min, u_max);
    let mut v = start_v.clamp(v_min, v_max);

    let det_tol = 1.0e-14;
    let grad_tol = config.tolerance;

    for _ in 0..config.max_iterations {
        let (fu, fv, fuu, fuv, fvv) = func.value_and_jacobian(u, v);

        if (fu * fu + fv * fv).sqrt() < grad_tol {
            return NewtonResult { done: true, u, v };
        }

        let Some((du, dv)) = solve_2x2(fuu, fuv, fuv, fvv, -fu, -fv, det_tol) else {
            return NewtonResult { done: false, u, v };
        };

        let new_u = (u + du).clamp(u_min, u_max);
        let new_v = (v + dv).clamp(v_min, v_max);
        let step = ((new_u - u).powi(2) + (new_v - v).powi(2)).sqrt();
        u = new_u;
        v = new_v;

        if step < config.tolerance {
            let (fu, fv) = func.value(u, v);
            let converged = (fu * fu + fv * fv).sqrt() < grad_tol * 10.0;
            return NewtonResult { done: converged, u, v };
        }
    }

    NewtonResult { done: false, u, v }
}

/// Objective over a 4-vector, as consumed by [`powell`].
pub trait Objective4 {
    fn value(&self, x: &Vector4<f64>) -> f64;
}

impl<F: Fn(&Vector4<f64>) -> f64> Objective4 for F {
    fn value(&self, x: &Vector4<f64>) -> f64 {
        self(x)
    }
}

/// Powell's direction-set minimization of `func` starting at `start`.
///
/// Derivative-free: each round line-minimizes along the current direction
/// set and replaces the direction of largest decrease with the overall
/// displacement. None when no round improves the objective enough to
/// converge within the iteration budget.
pub fn powell<F: Objective4>(func: &F, start: Vector4<f64>, config: Config) -> Option<Vector4<f64>> {
    let mut dirs = [
        Vector4::new(1.0, 0.0, 0.0, 0.0),
        Vector4::new(0.0, 1.0, 0.0, 0.0),
        Vector4::new(0.0, 0.0, 1.0, 0.0),
        Vector4::new(0.0, 0.0, 0.0, 1.0),
    ];

    let mut x = start;
    let mut fx = func.value(&x);

    for _ in 0..config.max_iterations {
        let x_round_start = x;
        let f_round_start = fx;
        let mut biggest_drop = 0.0;
        let mut biggest_idx = 0;

        for (i, dir) in dirs.iter().enumerate() {
            let f_before = fx;
            let (t, f_after) = line_minimize(func, &x, dir);
            x += dir.scale(t);
            fx = f_after;
            if f_before - f_after > biggest_drop {
                biggest_drop = f_before - f_after;
                biggest_idx = i;
            }
        }

        let round_drop = f_round_start - fx;
        if round_drop.abs() <= config.tolerance * (fx.abs() + config.tolerance) {
            return Some(x);
        }

        // Replace the direction of largest decrease with the net displacement
        let net = x - x_round_start;
        if net.norm() > config.tolerance {
            dirs[biggest_idx] = net.normalize();
            let (t, f_after) = line_minimize(func, &x, &dirs[biggest_idx]);
            x += dirs[biggest_idx].scale(t);
            fx = f_after;
        }
    }

    None
}

/// Golden-section line minimization of `func` along `dir` through `x`.
/// Returns the step length and the objective value there.
fn line_minimize<F: Objective4>(func: &F, x: &Vector4<f64>, dir: &Vector4<f64>) -> (f64, f64) {
    let eval = |t: f64| func.value(&(x + dir.scale(t)));

    // Bracket a minimum around t = 0 by stepping outward
    let mut a = -1.0;
    let mut b = 1.0;
    let f0 = eval(0.0);
    let mut expand = 1.0;
    for _ in 0..8 {
        if eval(a) > f0 && eval(b) > f0 {
            break;
        }
        expand *= 2.0;
        a = -expand;
        b = expand;
    }

    const INV_PHI: f64 = 0.618_033_988_749_894_9;
    let mut c = b - INV_PHI * (b - a);
    let mut d = a + INV_PHI * (b - a);
    let mut fc = eval(c);
    let mut fd = eval(d);

    for _ in 0..60 {
        if fc < fd {
            b = d;
            d = c;
            fd = fc;
            c = b - INV_PHI * (b - a);
            fc = eval(c);
        } else {
            a = c;
            c = d;
            fc = fd;
            d = a + INV_PHI * (b - a);
            fd = eval(d);
        }
        if (b - a).abs() < 1.0e-10 {
            break;
        }
    }

    let t = 0.5 * (a + b);
    (t, eval(t))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solve_2x2() {
        // x + y = 3, x - y = 1 => x = 2, y = 1
        let (x, y) = solve_2x2(1.0, 1.0, 1.0, -1.0, 3.0, 1.0, 1e-14).unwrap();
        assert!((x - 2.0).abs() < 1e-12);
        assert!((y - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_solve_2x2_singular() {
        assert!(solve_2x2(1.0, 2.0, 2.0, 4.0, 1.0, 2.0, 1e-14).is_none());
    }

    struct Paraboloid;

    impl Gradient2 for Paraboloid {
        fn value(&self, u: f64, v: f64) -> (f64, f64) {
            (2.0 * (u - 1.0), 4.0 * (v + 2.0))
        }

        fn value_and_jacobian(&self, u: f64, v: f64) -> (f64, f64, f64, f64, f64) {
            let (fu, fv) = self.value(u, v);
            (fu, fv, 2.0, 0.0, 4.0)
        }
    }

    #[test]
    fn test_newton2d_quadratic() {
        let res = newton2d(
            &Paraboloid,
            0.0,
            0.0,
            -10.0,
            10.0,
            -10.0,
            10.0,
            Config::new(1e-9, 50),
        );
        assert!(res.done);
        assert!((res.u - 1.0).abs() < 1e-8);
        assert!((res.v + 2.0).abs() < 1e-8);
    }

    #[test]
    fn test_newton2d_respects_bounds() {
        // Unconstrained minimum at (1, -2) lies outside the box
        let res = newton2d(
            &Paraboloid,
            0.0,
            0.0,
            -0.5,
            0.5,
            -0.5,
            0.5,
            Config::new(1e-9, 50),
        );
        assert!(res.u >= -0.5 && res.u <= 0.5);
        assert!(res.v >= -0.5 && res.v <= 0.5);
    }

    #[test]
    fn test_powell_quadratic_bowl() {
        let f = |x: &Vector4<f64>| {
            (x[0] - 1.0).powi(2)
                + 2.0 * (x[1] + 0.5).powi(2)
                + (x[2] - 2.0).powi(2)
                + (x[3]).powi(2)
        };
        let sol = powell(&f, Vector4::new(0.0, 0.0, 0.0, 1.0), Config::new(1e-10, 100)).unwrap();
        assert!((sol[0] - 1.0).abs() < 1e-4);
        assert!((sol[1] + 0.5).abs() < 1e-4);
        assert!((sol[2] - 2.0).abs() < 1e-4);
        assert!(sol[3].abs() < 1e-4);
    }
}
