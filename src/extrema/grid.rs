//! Point vs. arbitrary parametric surface through a persistent sampled grid.
//!
//! The evaluator is built once per surface sampling ([`GridEvaluator::build_grid`])
//! and then queried many times ([`GridEvaluator::perform`]). Each query scans
//! the grid for cells bracketing a stationary point of the squared-distance
//! function, refines candidates with bounded Newton iteration, and remembers
//! the last three solutions in a ring buffer so that spatially coherent query
//! sequences (e.g. points marching along a curve) resolve with a single
//! warm-started Newton solve.

use log::{debug, trace};

use crate::extrema::{Domain2D, PointExtremaResult, PointExtremum, SearchMode, Status};
use crate::geom::{Pnt, Vec3};
use crate::math::{self, Config, Gradient2};
use crate::surface::Surface;
use crate::{ExtremaError, Result};

/// Ring-buffer capacity of the solution cache.
const CACHE_SIZE: usize = 3;

/// Spatial coherence threshold: a new query farther than this from the last
/// cached query point skips the fast path (model units).
const COHERENCE_THRESHOLD: f64 = 1.0;

/// Trajectory extrapolation gates: consecutive query steps must have a
/// magnitude ratio within this band and a direction cosine above the floor.
const TRAJECTORY_MIN_RATIO: f64 = 0.5;
const TRAJECTORY_MAX_RATIO: f64 = 2.0;
const TRAJECTORY_MIN_COS: f64 = 0.7;

/// Residual-gradient acceptance is this many times looser than `tol`.
const GRADIENT_TOL_FACTOR: f64 = 1.0e3;

/// Scale of the near-zero-gradient candidate trigger in `scan_grid`.
const DISTANCE_SCALE_RATIO: f64 = 1.0e-6;

/// Candidate distances within this relative band sort by gradient instead.
const RELATIVE_TOLERANCE: f64 = 0.05;

/// Early-exit margin for candidate refinement: relative factor plus an
/// absolute floor on the estimated-distance gap.
const MAX_SKIP_THRESHOLD: f64 = 0.5;
const MIN_SKIP_MARGIN: f64 = 0.5;

/// A fallback polish result must beat the current best minimum by this
/// factor to be added.
const MIN_FALLBACK_FACTOR: f64 = 0.999_999;

/// Newton cell bounds are widened by this fraction of a cell per side.
const CELL_EXPAND_RATIO: f64 = 0.5;

const NEWTON_ITERATIONS: usize = 100;

/// One sampled surface position with its first derivatives. Built once per
/// grid build, immutable afterwards.
#[derive(Debug, Clone, Copy)]
pub struct GridPoint {
    pub u: f64,
    pub v: f64,
    pub point: Pnt,
    pub du: Vec3,
    pub dv: Vec3,
}

/// Per-query data at a grid node.
#[derive(Debug, Clone, Copy, Default)]
struct NodeData {
    fu: f64,
    fv: f64,
    dist_sq: f64,
}

/// A grid cell flagged as containing a stationary point, with a Newton
/// starting guess and ranking keys.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    cell_u: usize,
    cell_v: usize,
    start_u: f64,
    start_v: f64,
    est_dist_sq: f64,
    grad_sq: f64,
}

#[derive(Debug, Clone, Copy)]
struct CachedSolution {
    query: Pnt,
    u: f64,
    v: f64,
}

/// Gradient of the squared-distance objective `|S(u,v) - P|^2 / 2`.
struct DistanceFunction<'a, S: Surface> {
    surface: &'a S,
    query: &'a Pnt,
}

impl<S: Surface> Gradient2 for DistanceFunction<'_, S> {
    fn value(&self, u: f64, v: f64) -> (f64, f64) {
        let d1 = self.surface.d1(u, v);
        let diff = d1.point - *self.query;
        (diff.dot(&d1.du), diff.dot(&d1.dv))
    }

    fn value_and_jacobian(&self, u: f64, v: f64) -> (f64, f64, f64, f64, f64) {
        let d2 = self.surface.d2(u, v);
        let diff = d2.point - *self.query;
        let fu = diff.dot(&d2.du);
        let fv = diff.dot(&d2.dv);
        let fuu = d2.du.dot(&d2.du) + diff.dot(&d2.duu);
        let fuv = d2.du.dot(&d2.dv) + diff.dot(&d2.duv);
        let fvv = d2.dv.dot(&d2.dv) + diff.dot(&d2.dvv);
        (fu, fv, fuu, fuv, fvv)
    }
}

/// Persistent point-surface extrema engine.
pub struct GridEvaluator {
    nb_u: usize,
    nb_v: usize,
    u_params: Vec<f64>,
    v_params: Vec<f64>,
    grid: Vec<GridPoint>,
    // per-call scratch, cleared and reused across calls
    node_data: Vec<NodeData>,
    candidates: Vec<Candidate>,
    found: Vec<(f64, f64)>,
    result: PointExtremaResult,
    // solution ring buffer, newest last
    cache: Vec<CachedSolution>,
}

impl Default for GridEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl GridEvaluator {
    /// An evaluator with no grid; [`build_grid`] must be called before
    /// [`perform`].
    ///
    /// [`build_grid`]: GridEvaluator::build_grid
    /// [`perform`]: GridEvaluator::perform
    pub fn new() -> Self {
        Self {
            nb_u: 0,
            nb_v: 0,
            u_params: Vec::new(),
            v_params: Vec::new(),
            grid: Vec::new(),
            node_data: Vec::new(),
            candidates: Vec::new(),
            found: Vec::new(),
            result: PointExtremaResult::new(),
            cache: Vec::new(),
        }
    }

    /// `count` evenly spaced parameters spanning `[min, max]`.
    pub fn uniform_params(min: f64, max: f64, count: usize) -> Vec<f64> {
        if count < 2 {
            return vec![min];
        }
        (0..count)
            .map(|i| min + (max - min) * i as f64 / (count - 1) as f64)
            .collect()
    }

    /// True once a grid has been built.
    pub fn is_built(&self) -> bool {
        !self.grid.is_empty()
    }

    /// The sampled grid node at (i, j), if built.
    pub fn grid_point(&self, i: usize, j: usize) -> Option<&GridPoint> {
        if i < self.nb_u && j < self.nb_v {
            self.grid.get(i * self.nb_v + j)
        } else {
            None
        }
    }

    /// Evaluate position and first derivatives at every parameter
    /// combination. Invalidates the solution cache (the surface or its
    /// sampling changed).
    pub fn build_grid<S: Surface>(
        &mut self,
        surface: &S,
        u_params: &[f64],
        v_params: &[f64],
    ) -> Result<()> {
        validate_params(u_params, "U")?;
        validate_params(v_params, "V")?;

        self.nb_u = u_params.len();
        self.nb_v = v_params.len();
        self.u_params = u_params.to_vec();
        self.v_params = v_params.to_vec();

        self.grid.clear();
        self.grid.reserve(self.nb_u * self.nb_v);
        for &u in u_params {
            for &v in v_params {
                let d1 = surface.d1(u, v);
                self.grid.push(GridPoint {
                    u,
                    v,
                    point: d1.point,
                    du: d1.du,
                    dv: d1.dv,
                });
            }
        }

        self.reset_cache();
        self.result.clear();
        debug!("grid built: {} x {} nodes", self.nb_u, self.nb_v);
        Ok(())
    }

    /// Forget cached solutions; the next query runs a full search.
    pub fn reset_cache(&mut self) {
        self.cache.clear();
    }

    /// Extremal distance query against the gridded surface.
    pub fn perform<S: Surface>(
        &mut self,
        surface: &S,
        point: &Pnt,
        domain: &Domain2D,
        tol: f64,
        mode: SearchMode,
    ) -> &PointExtremaResult {
        self.result.clear();
        self.found.clear();
        self.candidates.clear();

        if !self.is_built() {
            debug!("perform called before build_grid");
            return &self.result;
        }

        // Fast path: one warm-started Newton solve when the query point is
        // spatially coherent with the previous one. A single root cannot
        // serve both ends of a MinMax request.
        if mode != SearchMode::MinMax {
            if let Some(extremum) = self.try_from_cached_solution(surface, point, domain, tol, mode)
            {
                trace!("cache fast path hit at ({}, {})", extremum.u, extremum.v);
                let (u, v) = (extremum.u, extremum.v);
                self.result.extrema.push(extremum);
                self.result.status = Status::Ok;
                self.update_solution_cache(point, u, v);
                return &self.result;
            }
        }

        self.scan_grid(point, mode);
        self.add_cached_as_candidate(surface, point);
        let had_candidates = !self.candidates.is_empty();
        self.refine_candidates(surface, point, domain, tol, mode);
        if mode.wants_min() {
            self.add_grid_min_fallback(surface, point, domain, tol);
        }

        self.result.status = if !had_candidates && self.result.extrema.is_empty() {
            Status::NoSolution
        } else {
            Status::Ok
        };

        let cache_index = if mode == SearchMode::Max {
            self.result.max_index()
        } else {
            self.result.min_index()
        };
        if let Some(idx) = cache_index {
            let e = self.result.extrema[idx];
            self.update_solution_cache(point, e.u, e.v);
        }
        &self.result
    }

    /// One bounded Newton solve warm-started from the cached solutions.
    /// None on any gate failure; the caller falls through to full search.
    fn try_from_cached_solution<S: Surface>(
        &self,
        surface: &S,
        point: &Pnt,
        domain: &Domain2D,
        tol: f64,
        mode: SearchMode,
    ) -> Option<PointExtremum> {
        let last = self.cache.last()?;
        if point.square_distance(&last.query) > COHERENCE_THRESHOLD * COHERENCE_THRESHOLD {
            return None;
        }

        let (start_u, start_v) = self
            .trajectory_prediction()
            .unwrap_or((last.u, last.v));

        let func = DistanceFunction {
            surface,
            query: point,
        };
        let solved = math::newton2d(
            &func,
            start_u.clamp(domain.u_min, domain.u_max),
            start_v.clamp(domain.v_min, domain.v_max),
            domain.u_min,
            domain.u_max,
            domain.v_min,
            domain.v_max,
            Config::new(tol, NEWTON_ITERATIONS),
        );
        if !solved.done {
            return None;
        }

        let (fu, fv, fuu, fuv, fvv) = func.value_and_jacobian(solved.u, solved.v);
        if (fu * fu + fv * fv).sqrt() > tol * GRADIENT_TOL_FACTOR {
            return None;
        }
        let is_min = classify_hessian(fuu, fuv, fvv)?;
        let wanted = match mode {
            SearchMode::Min => is_min,
            SearchMode::Max => !is_min,
            SearchMode::MinMax => return None,
        };
        if !wanted {
            return None;
        }

        let p = surface.value(solved.u, solved.v);
        Some(PointExtremum {
            u: solved.u,
            v: solved.v,
            point: p,
            square_distance: p.square_distance(point),
            is_minimum: is_min,
        })
    }

    /// Predicted (u, v) start from the last three cached solutions, if the
    /// query trajectory is steady enough to extrapolate.
    fn trajectory_prediction(&self) -> Option<(f64, f64)> {
        if self.cache.len() < CACHE_SIZE {
            return None;
        }
        let [c0, c1, c2] = [
            &self.cache[self.cache.len() - 3],
            &self.cache[self.cache.len() - 2],
            &self.cache[self.cache.len() - 1],
        ];
        let step1 = c1.query - c0.query;
        let step2 = c2.query - c1.query;
        let m1 = step1.magnitude();
        let m2 = step2.magnitude();
        if m1 <= 0.0 || m2 <= 0.0 {
            return None;
        }
        let ratio = m2 / m1;
        if !(TRAJECTORY_MIN_RATIO..=TRAJECTORY_MAX_RATIO).contains(&ratio) {
            return None;
        }
        if step1.dot(&step2) / (m1 * m2) < TRAJECTORY_MIN_COS {
            return None;
        }
        // Steady trajectory: continue the parameter motion linearly
        Some((c2.u + (c2.u - c1.u), c2.v + (c2.v - c1.v)))
    }

    /// Precompute per-node gradient data, then flag cells that bracket a
    /// stationary point. The globally nearest and farthest cells are always
    /// candidates for the matching modes.
    fn scan_grid(&mut self, point: &Pnt, mode: SearchMode) {
        let nb_u = self.nb_u;
        let nb_v = self.nb_v;
        self.node_data.clear();
        self.node_data.resize(nb_u * nb_v, NodeData::default());

        let mut min_node = (0usize, 0usize, f64::MAX);
        let mut max_node = (0usize, 0usize, f64::MIN);
        for i in 0..nb_u {
            for j in 0..nb_v {
                let g = &self.grid[i * nb_v + j];
                let diff = g.point - *point;
                let data = NodeData {
                    fu: diff.dot(&g.du),
                    fv: diff.dot(&g.dv),
                    dist_sq: g.point.square_distance(point),
                };
                if data.dist_sq < min_node.2 {
                    min_node = (i, j, data.dist_sq);
                }
                if data.dist_sq > max_node.2 {
                    max_node = (i, j, data.dist_sq);
                }
                self.node_data[i * nb_v + j] = data;
            }
        }

        for i in 0..nb_u - 1 {
            for j in 0..nb_v - 1 {
                let corners = [
                    &self.node_data[i * nb_v + j],
                    &self.node_data[(i + 1) * nb_v + j],
                    &self.node_data[i * nb_v + j + 1],
                    &self.node_data[(i + 1) * nb_v + j + 1],
                ];

                let mut near_zero = false;
                let mut fu_min = f64::MAX;
                let mut fu_max = f64::MIN;
                let mut fv_min = f64::MAX;
                let mut fv_max = f64::MIN;
                let mut best_dist = f64::MAX;
                let mut best_grad = f64::MAX;
                for c in corners {
                    let grad_sq = c.fu * c.fu + c.fv * c.fv;
                    if grad_sq < DISTANCE_SCALE_RATIO * (1.0 + c.dist_sq) {
                        near_zero = true;
                    }
                    fu_min = fu_min.min(c.fu);
                    fu_max = fu_max.max(c.fu);
                    fv_min = fv_min.min(c.fv);
                    fv_max = fv_max.max(c.fv);
                    best_dist = best_dist.min(c.dist_sq);
                    best_grad = best_grad.min(grad_sq);
                }
                let brackets_root = fu_min <= 0.0 && fu_max >= 0.0 && fv_min <= 0.0 && fv_max >= 0.0;

                if near_zero || brackets_root {
                    self.push_cell_candidate(i, j, best_dist, best_grad);
                }
            }
        }

        if mode.wants_min() {
            let (i, j, d) = min_node;
            self.push_cell_candidate(i.min(nb_u - 2), j.min(nb_v - 2), d, f64::MAX);
        }
        if mode.wants_max() {
            let (i, j, d) = max_node;
            self.push_cell_candidate(i.min(nb_u - 2), j.min(nb_v - 2), d, f64::MAX);
        }
        trace!("scan_grid flagged {} candidate cells", self.candidates.len());
    }

    fn push_cell_candidate(&mut self, cell_u: usize, cell_v: usize, est_dist_sq: f64, grad_sq: f64) {
        let start_u = 0.5 * (self.u_params[cell_u] + self.u_params[cell_u + 1]);
        let start_v = 0.5 * (self.v_params[cell_v] + self.v_params[cell_v + 1]);
        self.candidates.push(Candidate {
            cell_u,
            cell_v,
            start_u,
            start_v,
            est_dist_sq,
            grad_sq,
        });
    }

    /// When the fast path was skipped but a coherent cached solution exists,
    /// keep it in play as a high-priority candidate for the full search.
    fn add_cached_as_candidate<S: Surface>(&mut self, surface: &S, point: &Pnt) {
        let Some(last) = self.cache.last() else { return };
        if point.square_distance(&last.query) > COHERENCE_THRESHOLD * COHERENCE_THRESHOLD {
            return;
        }
        let cell_u = locate_cell(&self.u_params, last.u);
        let cell_v = locate_cell(&self.v_params, last.v);
        let est = surface.value(last.u, last.v).square_distance(point);
        self.candidates.push(Candidate {
            cell_u,
            cell_v,
            start_u: last.u,
            start_v: last.v,
            est_dist_sq: est,
            grad_sq: 0.0,
        });
    }

    /// Newton-refine candidate cells in ranked order with early exit,
    /// corner fallbacks, Hessian classification, and root deduplication.
    fn refine_candidates<S: Surface>(
        &mut self,
        surface: &S,
        point: &Pnt,
        domain: &Domain2D,
        tol: f64,
        mode: SearchMode,
    ) {
        // Ranking: distance first, gradient magnitude when distances are
        // within a relative band of each other
        let descending = mode == SearchMode::Max;
        self.candidates.sort_by(|a, b| {
            let (x, y) = if descending { (b, a) } else { (a, b) };
            let scale = x.est_dist_sq.abs().max(y.est_dist_sq.abs()).max(1.0);
            if (x.est_dist_sq - y.est_dist_sq).abs() <= RELATIVE_TOLERANCE * scale {
                a.grad_sq.total_cmp(&b.grad_sq)
            } else {
                x.est_dist_sq.total_cmp(&y.est_dist_sq)
            }
        });

        let func = DistanceFunction {
            surface,
            query: point,
        };
        let candidates = std::mem::take(&mut self.candidates);

        let mut best_est: Option<f64> = None;
        for cand in &candidates {
            // Early exit: sorted order means no later candidate can close
            // the gap once it exceeds the skip margin
            if mode != SearchMode::MinMax {
                if let Some(best) = best_est {
                    let margin = MAX_SKIP_THRESHOLD * best.abs() + MIN_SKIP_MARGIN;
                    let gap = if descending {
                        best - cand.est_dist_sq
                    } else {
                        cand.est_dist_sq - best
                    };
                    if gap > margin {
                        trace!("early exit after {} refined roots", self.found.len());
                        break;
                    }
                }
            }

            let Some((u, v)) = self.refine_one(&func, cand, domain, tol) else {
                continue;
            };

            if self
                .found
                .iter()
                .any(|&(fu, fv)| (fu - u).abs() <= tol && (fv - v).abs() <= tol)
            {
                continue;
            }
            self.found.push((u, v));

            let (_, _, fuu, fuv, fvv) = func.value_and_jacobian(u, v);
            let Some(is_min) = classify_hessian(fuu, fuv, fvv) else {
                continue;
            };
            if is_min && !mode.wants_min() {
                continue;
            }
            if !is_min && !mode.wants_max() {
                continue;
            }

            let p = surface.value(u, v);
            let sq = p.square_distance(point);
            self.result.extrema.push(PointExtremum {
                u,
                v,
                point: p,
                square_distance: sq,
                is_minimum: is_min,
            });
            let better = match best_est {
                Some(best) => {
                    if descending {
                        sq > best
                    } else {
                        sq < best
                    }
                }
                None => true,
            };
            if better {
                best_est = Some(sq);
            }
        }
        self.candidates = candidates;
    }

    /// Newton inside the candidate's expanded cell, with the corner-point
    /// fallback ladder.
    fn refine_one<S: Surface>(
        &self,
        func: &DistanceFunction<'_, S>,
        cand: &Candidate,
        domain: &Domain2D,
        tol: f64,
    ) -> Option<(f64, f64)> {
        let cell_w = self.u_params[cand.cell_u + 1] - self.u_params[cand.cell_u];
        let cell_h = self.v_params[cand.cell_v + 1] - self.v_params[cand.cell_v];
        let u_min = (self.u_params[cand.cell_u] - CELL_EXPAND_RATIO * cell_w).max(domain.u_min);
        let u_max = (self.u_params[cand.cell_u + 1] + CELL_EXPAND_RATIO * cell_w).min(domain.u_max);
        let v_min = (self.v_params[cand.cell_v] - CELL_EXPAND_RATIO * cell_h).max(domain.v_min);
        let v_max = (self.v_params[cand.cell_v + 1] + CELL_EXPAND_RATIO * cell_h).min(domain.v_max);
        // Cell entirely outside the requested domain
        if u_min > u_max || v_min > v_max {
            return None;
        }

        let config = Config::new(tol, NEWTON_ITERATIONS);
        let solved = math::newton2d(
            func,
            cand.start_u,
            cand.start_v,
            u_min,
            u_max,
            v_min,
            v_max,
            config,
        );
        if solved.done {
            return Some((solved.u, solved.v));
        }

        // Fallback: best corner of the cell by gradient magnitude, with a
        // looser tolerance
        let corners = [
            (self.u_params[cand.cell_u], self.v_params[cand.cell_v]),
            (self.u_params[cand.cell_u + 1], self.v_params[cand.cell_v]),
            (self.u_params[cand.cell_u], self.v_params[cand.cell_v + 1]),
            (self.u_params[cand.cell_u + 1], self.v_params[cand.cell_v + 1]),
        ];
        let (cu, cv, corner_grad) = corners
            .iter()
            .map(|&(u, v)| {
                let (fu, fv) = func.value(u, v);
                (u, v, fu * fu + fv * fv)
            })
            .min_by(|a, b| a.2.total_cmp(&b.2))?;

        let loose = Config::new(tol * 10.0, NEWTON_ITERATIONS);
        let retried = math::newton2d(func, cu, cv, u_min, u_max, v_min, v_max, loose);
        if retried.done {
            return Some((retried.u, retried.v));
        }

        // Last resort: accept the corner itself if it is already stationary
        // to within the loose gradient tolerance
        if corner_grad.sqrt() <= tol * GRADIENT_TOL_FACTOR && domain.contains(cu, cv, tol) {
            return Some((cu, cv));
        }
        None
    }

    /// Independent Newton polish from the globally nearest grid sample; a
    /// guard against pruning having skipped the true minimum.
    fn add_grid_min_fallback<S: Surface>(
        &mut self,
        surface: &S,
        point: &Pnt,
        domain: &Domain2D,
        tol: f64,
    ) {
        let mut best: Option<&GridPoint> = None;
        let mut best_sq = f64::MAX;
        for g in &self.grid {
            let sq = g.point.square_distance(point);
            if sq < best_sq {
                best_sq = sq;
                best = Some(g);
            }
        }
        let Some(g) = best else { return };

        let func = DistanceFunction {
            surface,
            query: point,
        };
        let solved = math::newton2d(
            &func,
            g.u.clamp(domain.u_min, domain.u_max),
            g.v.clamp(domain.v_min, domain.v_max),
            domain.u_min,
            domain.u_max,
            domain.v_min,
            domain.v_max,
            Config::new(tol, NEWTON_ITERATIONS),
        );
        if !solved.done {
            return;
        }

        let p = surface.value(solved.u, solved.v);
        let sq = p.square_distance(point);
        let current_best = self
            .result
            .extrema
            .iter()
            .filter(|e| e.is_minimum)
            .map(|e| e.square_distance)
            .fold(f64::MAX, f64::min);
        if sq >= current_best * MIN_FALLBACK_FACTOR {
            return;
        }

        let (_, _, fuu, fuv, fvv) = func.value_and_jacobian(solved.u, solved.v);
        let Some(is_min) = classify_hessian(fuu, fuv, fvv) else {
            return;
        };
        if !is_min {
            return;
        }
        debug!("grid-min fallback improved the minimum: {sq}");
        self.found.push((solved.u, solved.v));
        self.result.extrema.push(PointExtremum {
            u: solved.u,
            v: solved.v,
            point: p,
            square_distance: sq,
            is_minimum: true,
        });
    }

    fn update_solution_cache(&mut self, point: &Pnt, u: f64, v: f64) {
        if self.cache.len() == CACHE_SIZE {
            self.cache.remove(0);
        }
        self.cache.push(CachedSolution {
            query: *point,
            u,
            v,
        });
    }
}

/// Some(true) for a minimum, Some(false) for a maximum, None for a saddle
/// or degenerate Hessian.
fn classify_hessian(fuu: f64, fuv: f64, fvv: f64) -> Option<bool> {
    let det = fuu * fvv - fuv * fuv;
    if det <= 0.0 {
        return None;
    }
    Some(fuu > 0.0)
}

/// Index of the cell containing `value` (clamped to valid cells).
fn locate_cell(params: &[f64], value: f64) -> usize {
    let n = params.len();
    let idx = params.partition_point(|&p| p <= value);
    idx.saturating_sub(1).min(n.saturating_sub(2))
}

fn validate_params(params: &[f64], label: &str) -> Result<()> {
    if params.len() < 2 {
        return Err(ExtremaError::InvalidSampling(format!(
            "{label} sampling needs at least 2 parameters, got {}",
            params.len()
        )));
    }
    if params.windows(2).any(|w| w[1] <= w[0]) {
        return Err(ExtremaError::InvalidSampling(format!(
            "{label} sampling parameters must be strictly increasing"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::Ax3;
    use crate::surface::Torus;
    use std::f64::consts::PI;

    fn torus_evaluator(torus: &Torus) -> GridEvaluator {
        let mut eval = GridEvaluator::new();
        let u = GridEvaluator::uniform_params(0.0, 2.0 * PI, 25);
        let v = GridEvaluator::uniform_params(0.0, 2.0 * PI, 25);
        eval.build_grid(torus, &u, &v).unwrap();
        eval
    }

    fn full_domain() -> Domain2D {
        Domain2D::new(0.0, 2.0 * PI, 0.0, 2.0 * PI).unwrap()
    }

    #[test]
    fn test_build_grid_rejects_bad_sampling() {
        let torus = Torus::new(Ax3::standard(), 5.0, 1.0).unwrap();
        let mut eval = GridEvaluator::new();
        assert!(eval.build_grid(&torus, &[0.0], &[0.0, 1.0]).is_err());
        assert!(eval.build_grid(&torus, &[0.0, 1.0], &[1.0, 0.5]).is_err());
        assert!(!eval.is_built());
    }

    #[test]
    fn test_min_against_torus() {
        let torus = Torus::new(Ax3::standard(), 5.0, 1.0).unwrap();
        let mut eval = torus_evaluator(&torus);
        let result = eval.perform(
            &torus,
            &Pnt::new(10.0, 0.0, 0.0),
            &full_domain(),
            1e-7,
            SearchMode::Min,
        );
        assert_eq!(result.status, Status::Ok);
        // Nearest point (6, 0, 0): distance 4
        let min_sq = result.min_square_distance().unwrap();
        assert!((min_sq - 16.0).abs() < 1e-6, "min_sq = {min_sq}");
        let e = &result.extrema[result.min_index().unwrap()];
        assert!(e.is_minimum);
        assert!(e.point.is_equal(&Pnt::new(6.0, 0.0, 0.0), 1e-5));
    }

    #[test]
    fn test_max_against_torus() {
        let torus = Torus::new(Ax3::standard(), 5.0, 1.0).unwrap();
        let mut eval = torus_evaluator(&torus);
        let result = eval.perform(
            &torus,
            &Pnt::new(10.0, 0.0, 0.0),
            &full_domain(),
            1e-7,
            SearchMode::Max,
        );
        // Farthest point (-6, 0, 0): distance 16
        let max_sq = result.max_square_distance().unwrap();
        assert!((max_sq - 256.0).abs() < 1e-6, "max_sq = {max_sq}");
        assert!(!result.extrema[result.max_index().unwrap()].is_minimum);
    }

    #[test]
    fn test_round_trip_parameters() {
        let torus = Torus::new(Ax3::standard(), 5.0, 1.0).unwrap();
        let mut eval = torus_evaluator(&torus);
        let result = eval
            .perform(
                &torus,
                &Pnt::new(3.0, 4.0, 2.0),
                &full_domain(),
                1e-7,
                SearchMode::MinMax,
            )
            .clone();
        assert!(result.is_done());
        for e in &result.extrema {
            assert!(e.square_distance >= 0.0);
            assert!(torus.value(e.u, e.v).is_equal(&e.point, 1e-7));
        }
    }

    #[test]
    fn test_repeat_query_is_stable() {
        let torus = Torus::new(Ax3::standard(), 5.0, 1.0).unwrap();
        let mut eval = torus_evaluator(&torus);
        let p = Pnt::new(10.0, 0.0, 0.0);
        let first = eval
            .perform(&torus, &p, &full_domain(), 1e-7, SearchMode::Min)
            .min_square_distance()
            .unwrap();
        // Second call takes the cache fast path; the answer must not drift
        let second = eval
            .perform(&torus, &p, &full_domain(), 1e-7, SearchMode::Min)
            .min_square_distance()
            .unwrap();
        assert!((first - second).abs() < 1e-9);
    }

    #[test]
    fn test_coherent_sequence_matches_cold_search() {
        let torus = Torus::new(Ax3::standard(), 5.0, 1.0).unwrap();
        let mut warm = torus_evaluator(&torus);
        let domain = full_domain();

        for k in 0..6 {
            let p = Pnt::new(10.0 + 0.1 * k as f64, 0.2 * k as f64, 0.0);
            let warm_sq = warm
                .perform(&torus, &p, &domain, 1e-7, SearchMode::Min)
                .min_square_distance()
                .unwrap();

            let mut cold = torus_evaluator(&torus);
            let cold_sq = cold
                .perform(&torus, &p, &domain, 1e-7, SearchMode::Min)
                .min_square_distance()
                .unwrap();
            assert!(
                (warm_sq - cold_sq).abs() < 1e-6,
                "step {k}: warm {warm_sq} vs cold {cold_sq}"
            );
        }
    }

    #[test]
    fn test_incoherent_jump_falls_back_to_full_search() {
        let torus = Torus::new(Ax3::standard(), 5.0, 1.0).unwrap();
        let mut eval = torus_evaluator(&torus);
        let domain = full_domain();

        eval.perform(&torus, &Pnt::new(10.0, 0.0, 0.0), &domain, 1e-7, SearchMode::Min);
        // Far jump to the other side: well outside the coherence threshold
        let result = eval.perform(
            &torus,
            &Pnt::new(-10.0, 0.0, 0.0),
            &domain,
            1e-7,
            SearchMode::Min,
        );
        let min_sq = result.min_square_distance().unwrap();
        assert!((min_sq - 16.0).abs() < 1e-6, "min_sq = {min_sq}");
    }

    #[test]
    fn test_reset_cache() {
        let torus = Torus::new(Ax3::standard(), 5.0, 1.0).unwrap();
        let mut eval = torus_evaluator(&torus);
        let domain = full_domain();
        let p = Pnt::new(10.0, 0.0, 0.0);
        eval.perform(&torus, &p, &domain, 1e-7, SearchMode::Min);
        eval.reset_cache();
        let min_sq = eval
            .perform(&torus, &p, &domain, 1e-7, SearchMode::Min)
            .min_square_distance()
            .unwrap();
        assert!((min_sq - 16.0).abs() < 1e-6);
    }

    #[test]
    fn test_unbuilt_evaluator_reports_no_solution() {
        let torus = Torus::new(Ax3::standard(), 5.0, 1.0).unwrap();
        let mut eval = GridEvaluator::new();
        let result = eval.perform(
            &torus,
            &Pnt::new(10.0, 0.0, 0.0),
            &full_domain(),
            1e-7,
            SearchMode::Min,
        );
        assert_eq!(result.status, Status::NoSolution);
        assert!(!result.is_done());
    }

    #[test]
    fn test_grid_point_accessor() {
        let torus = Torus::new(Ax3::standard(), 5.0, 1.0).unwrap();
        let eval = torus_evaluator(&torus);
        let g = eval.grid_point(0, 0).unwrap();
        assert!(g.point.is_equal(&Pnt::new(6.0, 0.0, 0.0), 1e-12));
        assert!(eval.grid_point(100, 0).is_none());
    }
}
