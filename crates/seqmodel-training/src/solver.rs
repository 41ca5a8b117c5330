//! Weighted L2-SVM solver (Modified Finite Newton).
//!
//! Solves `min_w 0.5*lambda*w'w + 0.5*sum_i c[i] * max(0, 1 - y[i]*w'x[i])^2`
//! where `c[i]` is a per-example cost (class-balance cost times the example's
//! prior-derived weight). The Newton step is computed by conjugate-gradient
//! least squares over the active set, followed by an exact line search over
//! the piecewise-quadratic objective.

use tracing::{debug, trace};

const BIG_EPSILON: f64 = 0.01;
const RELATIVE_STOP_EPS: f64 = 1e-9;

/// One training problem: dense rows (bias column included), signed labels and
/// per-example costs. Rows with zero cost take no part in the fit.
#[derive(Debug, Clone)]
pub struct TrainingProblem {
    /// `rows[i]` has `dims` entries; the final entry is the bias input (1.0).
    pub rows: Vec<Vec<f64>>,
    /// +1.0 or -1.0 per row.
    pub labels: Vec<f64>,
    /// Non-negative cost per row.
    pub costs: Vec<f64>,
}

impl TrainingProblem {
    #[must_use]
    pub fn dims(&self) -> usize {
        self.rows.first().map_or(0, Vec::len)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct SolverOptions {
    pub lambda: f64,
    pub epsilon: f64,
    pub cg_iter_max: usize,
    pub newton_iter_max: usize,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self { lambda: 1.0, epsilon: 1e-7, cg_iter_max: 10_000, newton_iter_max: 50 }
    }
}

/// Result of a solver run. `converged` distinguishes a genuine optimum from a
/// run that merely exhausted its Newton iteration budget.
#[derive(Debug, Clone)]
pub struct SolverOutcome {
    pub weights: Vec<f64>,
    pub outputs: Vec<f64>,
    pub converged: bool,
    pub iterations: usize,
}

/// Train the weighted L2-SVM.
pub fn solve(problem: &TrainingProblem, opts: &SolverOptions) -> SolverOutcome {
    let m = problem.len();
    let n = problem.dims();

    let mut w = vec![0.0; n];
    let mut o = vec![0.0; m];

    let mut f_old = 0.5 * opts.lambda * dot(&w, &w);
    let mut active = active_set(problem, &o);
    let mut f = f_old + loss(problem, &active, &o);

    let mut w_bar = vec![0.0; n];
    let mut o_bar = vec![0.0; m];

    let mut converged = false;
    let mut iterations = 0;

    for iter in 0..opts.newton_iter_max {
        iterations = iter + 1;
        trace!(iter = iterations, active = active.len(), objective = f, "newton iteration");

        w_bar.copy_from_slice(&w);
        o_bar.copy_from_slice(&o);

        let epsilon = if iter == 0 { BIG_EPSILON } else { opts.epsilon };
        let cg_converged = cgls(problem, &active, opts, &mut w_bar, &mut o_bar);

        // outputs for *all* rows under the trial weights
        for (i, row) in problem.rows.iter().enumerate() {
            o_bar[i] = dot(&w_bar, row);
        }

        if cg_converged && optimal(problem, &active, &o_bar, epsilon) {
            if epsilon > opts.epsilon {
                // loose first pass converged; redo with the strict tolerance
                continue;
            }
            w.copy_from_slice(&w_bar);
            o.copy_from_slice(&o_bar);
            converged = true;
            debug!(iterations, "solver converged on optimality conditions");
            break;
        }

        let step = line_search(problem, opts.lambda, &w, &w_bar, &o, &o_bar);

        f_old = f;
        for j in 0..n {
            w[j] = (1.0 - step) * w[j] + step * w_bar[j];
        }
        for i in 0..m {
            o[i] = (1.0 - step) * o[i] + step * o_bar[i];
        }

        active = active_set(problem, &o);
        f = 0.5 * opts.lambda * dot(&w, &w) + loss(problem, &active, &o);

        if (f - f_old).abs() < RELATIVE_STOP_EPS * f_old.abs() {
            converged = true;
            debug!(iterations, "solver converged on relative improvement");
            break;
        }
    }

    SolverOutcome { weights: w, outputs: o, converged, iterations }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Rows with positive cost currently inside the margin.
fn active_set(problem: &TrainingProblem, outputs: &[f64]) -> Vec<usize> {
    (0..problem.len())
        .filter(|&i| problem.costs[i] > 0.0 && problem.labels[i] * outputs[i] < 1.0)
        .collect()
}

fn loss(problem: &TrainingProblem, active: &[usize], outputs: &[f64]) -> f64 {
    active
        .iter()
        .map(|&i| {
            let margin = 1.0 - problem.labels[i] * outputs[i];
            if margin > 0.0 { 0.5 * problem.costs[i] * margin * margin } else { 0.0 }
        })
        .sum()
}

/// KKT check: active rows must not sit beyond the margin, inactive rows must
/// not have fallen inside it.
fn optimal(problem: &TrainingProblem, active: &[usize], outputs: &[f64], epsilon: f64) -> bool {
    let mut is_active = vec![false; problem.len()];
    for &i in active {
        is_active[i] = true;
        if problem.labels[i] * outputs[i] > 1.0 + epsilon {
            return false;
        }
    }
    for i in 0..problem.len() {
        if !is_active[i]
            && problem.costs[i] > 0.0
            && problem.labels[i] * outputs[i] < 1.0 - epsilon
        {
            return false;
        }
    }
    true
}

/// Conjugate-gradient least squares over the active rows:
/// `min_w 0.5*lambda*w'w + 0.5*sum_{i in active} c[i]*(y[i] - w'x[i])^2`.
///
/// Updates `weights` and the active entries of `outputs` in place; returns
/// whether the residual dropped below tolerance within the iteration budget.
fn cgls(
    problem: &TrainingProblem,
    active: &[usize],
    opts: &SolverOptions,
    weights: &mut [f64],
    outputs: &mut [f64],
) -> bool {
    let n = problem.dims();
    if active.is_empty() {
        return true;
    }

    // z[i] = c[i] * (y[i] - o[i]) over the active set
    let mut z: Vec<f64> = active
        .iter()
        .map(|&i| problem.costs[i] * (problem.labels[i] - outputs[i]))
        .collect();

    // r = X'z - lambda*w
    let mut r = vec![0.0; n];
    for (zi, &i) in z.iter().zip(active) {
        for (rj, xj) in r.iter_mut().zip(&problem.rows[i]) {
            *rj += zi * xj;
        }
    }
    for (rj, wj) in r.iter_mut().zip(weights.iter()) {
        *rj -= opts.lambda * wj;
    }

    let mut p = r.clone();
    let mut omega1 = dot(&r, &r);
    let mut omega_p = omega1;
    let epsilon2 = opts.epsilon * opts.epsilon;
    let mut q = vec![0.0; active.len()];

    for _ in 0..opts.cg_iter_max {
        for (qi, &i) in q.iter_mut().zip(active) {
            *qi = dot(&problem.rows[i], &p);
        }

        let omega_q: f64 = active
            .iter()
            .zip(&q)
            .map(|(&i, qi)| problem.costs[i] * qi * qi)
            .sum();

        let denom = opts.lambda * omega_p + omega_q;
        if denom <= 0.0 {
            return true; // zero direction, nothing left to improve
        }
        let gamma = omega1 / denom;

        for (wj, pj) in weights.iter_mut().zip(&p) {
            *wj += gamma * pj;
        }
        for ((&i, qi), zi) in active.iter().zip(&q).zip(&mut z) {
            outputs[i] += gamma * qi;
            *zi -= gamma * problem.costs[i] * qi;
        }

        r.fill(0.0);
        for (zi, &i) in z.iter().zip(active) {
            for (rj, xj) in r.iter_mut().zip(&problem.rows[i]) {
                *rj += zi * xj;
            }
        }
        for (rj, wj) in r.iter_mut().zip(weights.iter()) {
            *rj -= opts.lambda * wj;
        }

        let omega1_new = dot(&r, &r);
        if omega1_new < epsilon2 * dot(&z, &z) {
            return true;
        }

        let beta = omega1_new / omega1;
        for (pj, rj) in p.iter_mut().zip(&r) {
            *pj = rj + beta * *pj;
        }
        omega1 = omega1_new;
        omega_p = dot(&p, &p);
    }

    false
}

/// Exact line search along `w -> w_bar` for the piecewise-quadratic
/// objective. Returns the step in [0, 1].
fn line_search(
    problem: &TrainingProblem,
    lambda: f64,
    w: &[f64],
    w_bar: &[f64],
    o: &[f64],
    o_bar: &[f64],
) -> f64 {
    let mut left = 0.0;
    let mut right = 0.0;
    for j in 0..w.len() {
        let diff = w_bar[j] - w[j];
        left += w[j] * diff;
        right += w_bar[j] * diff;
    }
    left *= lambda;
    right *= lambda;

    // breakpoints where a row enters or leaves the margin
    struct Breakpoint {
        delta: f64,
        index: usize,
        sign: f64,
    }
    let mut breakpoints = Vec::new();

    for i in 0..problem.len() {
        let cost = problem.costs[i];
        if cost == 0.0 {
            continue;
        }
        let y = problem.labels[i];
        let along = y * (o_bar[i] - o[i]);

        if y * o[i] < 1.0 {
            let d2 = cost * (o_bar[i] - o[i]);
            left += (o[i] - y) * d2;
            right += (o_bar[i] - y) * d2;
            if along > 0.0 {
                breakpoints.push(Breakpoint {
                    delta: (1.0 - y * o[i]) / along,
                    index: i,
                    sign: -1.0,
                });
            }
        } else if along < 0.0 {
            breakpoints.push(Breakpoint {
                delta: (1.0 - y * o[i]) / along,
                index: i,
                sign: 1.0,
            });
        }
    }

    breakpoints.sort_by(|a, b| a.delta.total_cmp(&b.delta));

    for bp in &breakpoints {
        if left + bp.delta * (right - left) >= 0.0 {
            break;
        }
        let i = bp.index;
        let diff = bp.sign * problem.costs[i] * (o_bar[i] - o[i]);
        left += diff * (o[i] - problem.labels[i]);
        right += diff * (o_bar[i] - problem.labels[i]);
    }

    if (right - left).abs() < 1e-12 {
        0.0
    } else {
        (-left / (right - left)).clamp(0.0, 1.0)
    }
}
