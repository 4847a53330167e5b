//! Changepoint candidates and the sparsity-promoting least squares fit.
//!
//! Candidates sit on an even grid over the interior of the series. Each one
//! contributes a hinge column `max(0, t - t_j)`; an L1 penalty on the hinge
//! coefficients drives most of them to exactly zero.

use faer::linalg::solvers::Solve;
use faer::{Col, Mat, Side};

/// Fraction of the series excluded from changepoint placement at each end.
pub const BOUNDARY_FRACTION: f64 = 0.1;

/// Evenly spaced candidate positions in the interior of an `n`-day series.
///
/// The count is `fraction * n` capped at `max_count`; positions within
/// [`BOUNDARY_FRACTION`] of either end are never used.
pub fn candidate_positions(n: usize, fraction: f64, max_count: usize) -> Vec<usize> {
    if n < 3 {
        return vec![];
    }

    let count = ((fraction * n as f64).floor() as usize).min(max_count);
    if count == 0 {
        return vec![];
    }

    let last = (n - 1) as f64;
    let lo = ((BOUNDARY_FRACTION * last).ceil() as usize).max(1);
    let hi = ((last - BOUNDARY_FRACTION * last).floor() as usize).min(n - 2);
    if lo > hi {
        return vec![];
    }

    let mut positions: Vec<usize> = if count == 1 {
        vec![(lo + hi) / 2]
    } else {
        let span = (hi - lo) as f64;
        (0..count)
            .map(|k| lo + (k as f64 * span / (count - 1) as f64).round() as usize)
            .collect()
    };
    positions.dedup();
    positions
}

/// Hinge column of a changepoint at `position`, in time scaled to `[0, 1]`.
pub fn hinge_column(n: usize, position: usize) -> Vec<f64> {
    let scale = (n.max(2) - 1) as f64;
    (0..n)
        .map(|i| (i as f64 - position as f64).max(0.0) / scale)
        .collect()
}

/// Outcome of [`fit_sparse_least_squares`].
#[derive(Debug, Clone)]
pub struct SparseFit {
    pub intercept: f64,
    /// One coefficient per design column, in original column units.
    pub coefficients: Vec<f64>,
    pub converged: bool,
    pub iterations: usize,
}

/// Settings of the coordinate descent solver.
#[derive(Debug, Clone, Copy)]
pub struct SparseFitOptions {
    /// L1 penalty applied to standardized penalized coefficients.
    pub lambda: f64,
    pub max_iterations: usize,
    /// Convergence threshold on the largest standardized coefficient update.
    pub tolerance: f64,
}

/// Minimise `(1/2n) ||y - b0 - X b||² + lambda Σ_{penalized j} |b_j|`.
///
/// Columns are standardized internally, so `lambda` acts on coefficients of
/// unit-variance columns. Zero-variance columns get a zero coefficient.
/// `warm_start` holds initial coefficients in original units.
pub fn fit_sparse_least_squares(
    y: &[f64],
    columns: &[Vec<f64>],
    penalized: &[bool],
    warm_start: &[f64],
    options: SparseFitOptions,
) -> SparseFit {
    let n = y.len();
    let k = columns.len();
    let nf = n as f64;

    let y_mean = y.iter().sum::<f64>() / nf;

    let mut means = vec![0.0; k];
    let mut sds = vec![0.0; k];
    let mut standardized: Vec<Vec<f64>> = Vec::with_capacity(k);
    for (j, col) in columns.iter().enumerate() {
        let mean = col.iter().sum::<f64>() / nf;
        let var = col.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / nf;
        let sd = var.sqrt();
        means[j] = mean;
        sds[j] = sd;
        if sd > 1e-12 {
            standardized.push(col.iter().map(|v| (v - mean) / sd).collect());
        } else {
            standardized.push(Vec::new());
        }
    }

    let mut beta: Vec<f64> = (0..k)
        .map(|j| {
            if standardized[j].is_empty() {
                0.0
            } else {
                warm_start.get(j).copied().unwrap_or(0.0) * sds[j]
            }
        })
        .collect();

    let mut residual: Vec<f64> = y.iter().map(|v| v - y_mean).collect();
    for (j, col) in standardized.iter().enumerate() {
        if beta[j] != 0.0 {
            for (r, x) in residual.iter_mut().zip(col) {
                *r -= x * beta[j];
            }
        }
    }

    let centered: Vec<f64> = y.iter().map(|v| v - y_mean).collect();
    let is_penalized = |j: usize| penalized.get(j).copied().unwrap_or(false);

    let mut converged = false;
    let mut iterations = 0;
    let mut previous_support: Vec<bool> = Vec::new();
    while iterations < options.max_iterations {
        iterations += 1;
        let mut max_update: f64 = 0.0;

        for (j, col) in standardized.iter().enumerate() {
            if col.is_empty() {
                continue;
            }
            let old = beta[j];
            let rho = col.iter().zip(&residual).map(|(x, r)| x * r).sum::<f64>() / nf + old;
            let new = if is_penalized(j) {
                soft_threshold(rho, options.lambda)
            } else {
                rho
            };
            let delta = new - old;
            if delta != 0.0 {
                for (r, x) in residual.iter_mut().zip(col) {
                    *r -= x * delta;
                }
                beta[j] = new;
                max_update = max_update.max(delta.abs());
            }
        }

        if max_update < options.tolerance {
            converged = true;
            break;
        }

        // Once the support settles, try to solve the active set exactly
        let support: Vec<bool> = beta.iter().map(|b| *b != 0.0).collect();
        if support == previous_support {
            if let Some(exact) =
                solve_active_set(&standardized, &centered, &beta, &is_penalized, options.lambda)
            {
                beta = exact;
                converged = true;
                break;
            }
        }
        previous_support = support;
    }

    let coefficients: Vec<f64> = (0..k)
        .map(|j| {
            if standardized[j].is_empty() {
                0.0
            } else {
                beta[j] / sds[j]
            }
        })
        .collect();
    let intercept = y_mean
        - coefficients
            .iter()
            .zip(&means)
            .map(|(b, m)| b * m)
            .sum::<f64>();

    let converged = converged && coefficients.iter().all(|c| c.is_finite());
    SparseFit {
        intercept,
        coefficients,
        converged,
        iterations,
    }
}

/// Solve the stationarity conditions on the current support with the signs
/// of `beta` fixed. Returns the solution only if it keeps those signs and
/// every excluded penalized column satisfies `|x_j' r| / n <= lambda`.
fn solve_active_set(
    standardized: &[Vec<f64>],
    centered: &[f64],
    beta: &[f64],
    is_penalized: &dyn Fn(usize) -> bool,
    lambda: f64,
) -> Option<Vec<f64>> {
    let n = centered.len();
    let nf = n as f64;
    let active: Vec<usize> = (0..beta.len())
        .filter(|&j| !standardized[j].is_empty() && (!is_penalized(j) || beta[j] != 0.0))
        .collect();

    let mut exact = vec![0.0; beta.len()];
    let mut residual = centered.to_vec();
    if !active.is_empty() {
        let m = active.len();
        let design = Mat::from_fn(n, m, |i, a| standardized[active[a]][i]);
        let target = Col::from_fn(n, |i| centered[i]);
        let xtx = design.transpose() * &design;
        let xty = design.transpose() * &target;

        let gram = Mat::from_fn(m, m, |a, b| xtx[(a, b)] / nf);
        let rhs = Col::from_fn(m, |a| {
            let j = active[a];
            let sign = if is_penalized(j) { beta[j].signum() } else { 0.0 };
            xty[a] / nf - lambda * sign
        });
        let solution = gram.llt(Side::Lower).ok()?.solve(&rhs);

        for (a, &j) in active.iter().enumerate() {
            let value = solution[a];
            if !value.is_finite() || (is_penalized(j) && value * beta[j] <= 0.0) {
                return None;
            }
            exact[j] = value;
        }

        let fitted = &design * &solution;
        for (i, r) in residual.iter_mut().enumerate() {
            *r -= fitted[i];
        }
    }

    let slack = lambda * (1.0 + 1e-9) + 1e-12;
    for j in 0..beta.len() {
        if standardized[j].is_empty() || !is_penalized(j) || exact[j] != 0.0 {
            continue;
        }
        let correlation = standardized[j]
            .iter()
            .zip(&residual)
            .map(|(x, r)| x * r)
            .sum::<f64>()
            / nf;
        if correlation.abs() > slack {
            return None;
        }
    }
    Some(exact)
}

fn soft_threshold(value: f64, threshold: f64) -> f64 {
    if value > threshold {
        value - threshold
    } else if value < -threshold {
        value + threshold
    } else {
        0.0
    }
}
