//! Grid evaluator behavior through the public API: deterministic answers,
//! warm-started query sequences, and mode filtering.

use std::f64::consts::PI;

use extrema::{Ax3, Cylinder, Domain2D, GridEvaluator, Pnt, SearchMode, Status, Surface, Torus};

const TOL: f64 = 1e-7;

fn torus_grid(torus: &Torus) -> GridEvaluator {
    let mut eval = GridEvaluator::new();
    let u = GridEvaluator::uniform_params(0.0, 2.0 * PI, 33);
    let v = GridEvaluator::uniform_params(0.0, 2.0 * PI, 33);
    eval.build_grid(torus, &u, &v).unwrap();
    eval
}

fn torus_domain() -> Domain2D {
    Domain2D::new(0.0, 2.0 * PI, 0.0, 2.0 * PI).unwrap()
}

#[test]
fn test_deterministic_across_instances() {
    let torus = Torus::new(Ax3::standard(), 5.0, 1.0).unwrap();
    let p = Pnt::new(8.0, 3.0, 2.0);

    let mut a = torus_grid(&torus);
    let mut b = torus_grid(&torus);
    let ra = a.perform(&torus, &p, &torus_domain(), TOL, SearchMode::MinMax).clone();
    let rb = b.perform(&torus, &p, &torus_domain(), TOL, SearchMode::MinMax).clone();

    assert_eq!(ra.extrema.len(), rb.extrema.len());
    for (x, y) in ra.extrema.iter().zip(&rb.extrema) {
        assert!((x.square_distance - y.square_distance).abs() < 1e-12);
        assert!((x.u - y.u).abs() < 1e-12);
        assert!((x.v - y.v).abs() < 1e-12);
    }
}

#[test]
fn test_minmax_reports_both_kinds() {
    let torus = Torus::new(Ax3::standard(), 5.0, 1.0).unwrap();
    let mut eval = torus_grid(&torus);
    let result = eval
        .perform(
            &torus,
            &Pnt::new(10.0, 0.0, 0.0),
            &torus_domain(),
            TOL,
            SearchMode::MinMax,
        )
        .clone();

    assert_eq!(result.status, Status::Ok);
    assert!(result.extrema.iter().any(|e| e.is_minimum));
    assert!(result.extrema.iter().any(|e| !e.is_minimum));
    assert!((result.min_square_distance().unwrap() - 16.0).abs() < 1e-6);
    assert!((result.max_square_distance().unwrap() - 256.0).abs() < 1e-6);
}

#[test]
fn test_marching_queries_stay_accurate() {
    // A query point marching along a line: the warm-started evaluator must
    // track the analytic answer at every step
    let torus = Torus::new(Ax3::standard(), 5.0, 1.0).unwrap();
    let mut eval = torus_grid(&torus);
    let domain = torus_domain();

    for k in 0..10 {
        let x = 9.0 + 0.15 * k as f64;
        let p = Pnt::new(x, 0.0, 0.0);
        let min_sq = eval
            .perform(&torus, &p, &domain, TOL, SearchMode::Min)
            .min_square_distance()
            .unwrap();
        let expected = (x - 6.0) * (x - 6.0);
        assert!(
            (min_sq - expected).abs() < 1e-6,
            "step {k}: got {min_sq}, expected {expected}"
        );
    }
}

#[test]
fn test_cylinder_grid_min() {
    let cyl = Cylinder::new(Ax3::standard(), 2.0).unwrap();
    let mut eval = GridEvaluator::new();
    let u = GridEvaluator::uniform_params(0.0, 2.0 * PI, 25);
    let v = GridEvaluator::uniform_params(-10.0, 10.0, 21);
    eval.build_grid(&cyl, &u, &v).unwrap();

    let domain = Domain2D::new(0.0, 2.0 * PI, -10.0, 10.0).unwrap();
    let result = eval
        .perform(&cyl, &Pnt::new(7.0, 0.0, 3.0), &domain, TOL, SearchMode::Min)
        .clone();

    assert_eq!(result.status, Status::Ok);
    // Nearest cylinder point is (2, 0, 3): distance 5
    assert!((result.min_square_distance().unwrap() - 25.0).abs() < 1e-6);
    let e = &result.extrema[result.min_index().unwrap()];
    assert!(cyl.value(e.u, e.v).is_equal(&e.point, TOL));
}

#[test]
fn test_rebuild_invalidates_cache() {
    let torus_a = Torus::new(Ax3::standard(), 5.0, 1.0).unwrap();
    let torus_b = Torus::new(Ax3::standard(), 3.0, 1.0).unwrap();
    let p = Pnt::new(10.0, 0.0, 0.0);
    let domain = torus_domain();

    let mut eval = torus_grid(&torus_a);
    eval.perform(&torus_a, &p, &domain, TOL, SearchMode::Min);

    // New surface, new grid: the old cached solution must not leak through
    let u = GridEvaluator::uniform_params(0.0, 2.0 * PI, 33);
    let v = GridEvaluator::uniform_params(0.0, 2.0 * PI, 33);
    eval.build_grid(&torus_b, &u, &v).unwrap();
    let min_sq = eval
        .perform(&torus_b, &p, &domain, TOL, SearchMode::Min)
        .min_square_distance()
        .unwrap();
    // Nearest point on the smaller torus is (4, 0, 0): distance 6
    assert!((min_sq - 36.0).abs() < 1e-6);
}

#[test]
fn test_restricted_domain_clamps_solution() {
    let torus = Torus::new(Ax3::standard(), 5.0, 1.0).unwrap();
    let mut eval = torus_grid(&torus);
    // Only the quarter away from the query point is allowed
    let domain = Domain2D::new(PI / 2.0, PI, 0.0, 2.0 * PI).unwrap();
    let result = eval
        .perform(
            &torus,
            &Pnt::new(10.0, 0.0, 0.0),
            &domain,
            TOL,
            SearchMode::Min,
        )
        .clone();

    for e in &result.extrema {
        assert!(e.u >= PI / 2.0 - TOL && e.u <= PI + TOL);
    }
}
