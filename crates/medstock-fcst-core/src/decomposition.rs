//! Joint trend and seasonality fit of a daily usage series.
//!
//! The design matrix holds a scaled time column, the Fourier columns of the
//! seasonal period and one hinge column per changepoint candidate. Only the
//! hinge coefficients are penalized. The response is scaled by its largest
//! absolute value so the penalty means the same thing for any usage volume.

use crate::changepoint::{
    candidate_positions, fit_sparse_least_squares, hinge_column, SparseFitOptions,
};
use crate::config::ForecastConfig;
use crate::seasonality::{fourier_columns, usable_harmonics, SeasonalComponent};
use crate::stats::residual_scale;
use crate::trend::{Changepoint, TrendModel};
use anofox_regression::prelude::*;
use tracing::{debug, warn};

/// Convergence threshold of the sparse fit on standardized coefficients.
pub const FIT_TOLERANCE: f64 = 1e-7;

/// Scaled slope deltas below this are treated as pruned.
const PRUNE_THRESHOLD: f64 = 1e-10;

/// Series length at which the changepoint penalty is doubled relative to
/// long histories.
const SHORT_SERIES_PENALTY_LENGTH: f64 = 30.0;

/// Result of fitting trend and seasonality to a history.
#[derive(Debug, Clone, PartialEq)]
pub struct Decomposition {
    pub trend: TrendModel,
    pub seasonal: SeasonalComponent,
    /// In-sample trend + seasonality.
    pub fitted: Vec<f64>,
    /// Observed minus fitted.
    pub residuals: Vec<f64>,
    /// Sample standard deviation of the residuals.
    pub residual_scale: f64,
    /// Largest absolute daily value of the history.
    pub data_scale: f64,
    /// Number of changepoint candidates offered to the fit.
    pub n_candidates: usize,
    /// The sparse fit did not converge and a global linear trend was used.
    pub trend_fallback: bool,
}

impl Decomposition {
    pub fn len(&self) -> usize {
        self.fitted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fitted.is_empty()
    }

    /// Active changepoints per historical day.
    pub fn changepoint_rate(&self) -> f64 {
        if self.fitted.len() < 2 {
            return 0.0;
        }
        self.trend.changepoints.len() as f64 / (self.fitted.len() - 1) as f64
    }

    /// Mean absolute slope delta of the active changepoints.
    pub fn mean_changepoint_magnitude(&self) -> f64 {
        let cps = &self.trend.changepoints;
        if cps.is_empty() {
            return 0.0;
        }
        cps.iter().map(|cp| cp.magnitude.abs()).sum::<f64>() / cps.len() as f64
    }

    /// Trend + seasonality at day index `t` (0 = first day of the history).
    pub fn evaluate(&self, t: f64) -> f64 {
        self.trend.evaluate(t) + self.seasonal.evaluate(t)
    }
}

/// Effective L1 penalty for a series of length `n`.
pub fn effective_penalty(strength: f64, n: usize) -> f64 {
    strength * (1.0 + SHORT_SERIES_PENALTY_LENGTH / n.max(1) as f64)
}

/// Fit the piecewise-linear trend and the seasonal component jointly.
///
/// `values` must hold at least two days. The fit never fails: when the sparse
/// solver does not converge, a global linear trend with the same seasonal
/// terms is used and `trend_fallback` is set.
pub fn decompose(values: &[f64], config: &ForecastConfig) -> Decomposition {
    let n = values.len();
    let data_scale = values.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
    let y_scale = if data_scale > 0.0 { data_scale } else { 1.0 };
    let y: Vec<f64> = values.iter().map(|v| v / y_scale).collect();

    let span = (n.max(2) - 1) as f64;
    let t_col: Vec<f64> = (0..n).map(|i| i as f64 / span).collect();

    let period = config.seasonality_period;
    let harmonics = usable_harmonics(n, period, config.max_harmonics);
    let candidates = candidate_positions(
        n,
        config.changepoint_count_fraction,
        config.max_changepoints,
    );

    let mut base_columns = Vec::with_capacity(1 + 2 * harmonics);
    base_columns.push(t_col);
    base_columns.extend(fourier_columns(n, period, harmonics));
    let n_base = base_columns.len();

    let ols = fit_ols(&y, &base_columns);

    let mut columns = base_columns.clone();
    columns.extend(candidates.iter().map(|&pos| hinge_column(n, pos)));
    let penalized: Vec<bool> = (0..columns.len()).map(|j| j >= n_base).collect();
    let mut warm_start = vec![0.0; columns.len()];
    if let Some((_, coefs)) = &ols {
        warm_start[..n_base].copy_from_slice(coefs);
    }

    let options = SparseFitOptions {
        lambda: effective_penalty(config.regularization_strength, n),
        max_iterations: config.max_fit_iterations,
        tolerance: FIT_TOLERANCE,
    };
    let sparse = fit_sparse_least_squares(&y, &columns, &penalized, &warm_start, options);

    let (intercept, coefficients, trend_fallback) = if sparse.converged {
        debug!(
            n,
            candidates = candidates.len(),
            iterations = sparse.iterations,
            "sparse trend fit converged"
        );
        (sparse.intercept, sparse.coefficients, false)
    } else {
        warn!(
            n,
            candidates = candidates.len(),
            iterations = sparse.iterations,
            "sparse trend fit did not converge, using a global linear trend"
        );
        let (intercept, mut coefs) = ols.unwrap_or_else(|| simple_linear_fit(&y, n_base));
        coefs.resize(columns.len(), 0.0);
        (intercept, coefs, true)
    };

    let base_slope = coefficients[0] * y_scale / span;
    let changepoints: Vec<Changepoint> = candidates
        .iter()
        .zip(&coefficients[n_base..])
        .filter(|(_, delta)| delta.abs() >= PRUNE_THRESHOLD)
        .map(|(&position, &delta)| Changepoint {
            position,
            magnitude: delta * y_scale / span,
        })
        .collect();
    let trend = TrendModel {
        base_rate: intercept * y_scale,
        base_slope,
        changepoints,
    };

    let terms: Vec<(f64, f64)> = coefficients[1..n_base]
        .chunks_exact(2)
        .map(|pair| (pair[0] * y_scale, pair[1] * y_scale))
        .collect();
    let seasonal = SeasonalComponent::from_cartesian(period, &terms);

    let fitted: Vec<f64> = (0..n)
        .map(|i| trend.evaluate(i as f64) + seasonal.evaluate(i as f64))
        .collect();
    let residuals: Vec<f64> = values.iter().zip(&fitted).map(|(v, f)| v - f).collect();
    let scale = residual_scale(&residuals);

    debug!(
        n,
        changepoints = trend.changepoints.len(),
        harmonics,
        residual_scale = scale,
        "decomposition fitted"
    );

    Decomposition {
        trend,
        seasonal,
        fitted,
        residuals,
        residual_scale: scale,
        data_scale,
        n_candidates: candidates.len(),
        trend_fallback,
    }
}

/// Ordinary least squares with intercept via anofox-regression.
///
/// Returns `None` if the regression fails, the system is not overdetermined,
/// or any coefficient is not finite.
fn fit_ols(y: &[f64], x: &[Vec<f64>]) -> Option<(f64, Vec<f64>)> {
    let n = y.len();
    let k = x.len();
    if k == 0 || n <= k + 1 {
        return None;
    }

    let x_mat = faer::Mat::from_fn(n, k, |i, j| x[j][i]);
    let y_col = faer::Col::from_fn(n, |i| y[i]);

    let fitted = OlsRegressor::builder()
        .with_intercept(true)
        .build()
        .fit(&x_mat, &y_col)
        .ok()?;

    let intercept = fitted.intercept().unwrap_or(0.0);
    let coeffs_col = fitted.coefficients();
    let coefs: Vec<f64> = (0..coeffs_col.nrows()).map(|i| coeffs_col[i]).collect();

    if coefs.len() != k || !intercept.is_finite() || coefs.iter().any(|c| !c.is_finite()) {
        return None;
    }
    Some((intercept, coefs))
}

/// Closed-form line through `y` against scaled time, padded with zero
/// seasonal coefficients to `n_base` columns.
fn simple_linear_fit(y: &[f64], n_base: usize) -> (f64, Vec<f64>) {
    let n = y.len();
    let span = (n.max(2) - 1) as f64;
    let t_mean = (0..n).map(|i| i as f64 / span).sum::<f64>() / n as f64;
    let y_mean = y.iter().sum::<f64>() / n as f64;

    let (mut sxy, mut sxx) = (0.0, 0.0);
    for (i, v) in y.iter().enumerate() {
        let dt = i as f64 / span - t_mean;
        sxy += dt * (v - y_mean);
        sxx += dt * dt;
    }
    let slope = if sxx > 0.0 { sxy / sxx } else { 0.0 };

    let mut coefs = vec![0.0; n_base.max(1)];
    coefs[0] = slope;
    (y_mean - slope * t_mean, coefs)
}
