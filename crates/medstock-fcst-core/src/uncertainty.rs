//! Prediction interval half-widths for future days.
//!
//! Two sources of uncertainty are combined in quadrature: residual noise of
//! the in-sample fit, and future trend changes simulated by an ensemble of
//! random trajectories that behave like the historical changepoints.

use crate::decomposition::Decomposition;
use crate::stats::{normal_critical_value, sorted_quantile};
use rand::prelude::*;
use serde::Serialize;
use statrs::distribution::Laplace;
use tracing::debug;

/// Residual scale, relative to the data scale, at which a history is
/// considered noise-free.
pub const ZERO_VARIANCE_RATIO: f64 = 1e-9;

/// Why an interval collapsed onto the point estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CollapseReason {
    /// No trajectories were requested.
    EmptyEnsemble,
    /// The fit left no residual variance.
    ZeroVariance,
}

/// Settings of one interval estimate.
#[derive(Debug, Clone, Copy)]
pub struct IntervalSettings {
    pub confidence_level: f64,
    pub ensemble_size: usize,
    pub seed: u64,
}

/// Non-negative distances below and above the point estimate, one per
/// future step. Both sequences are non-decreasing.
#[derive(Debug, Clone, PartialEq)]
pub struct IntervalBands {
    pub below: Vec<f64>,
    pub above: Vec<f64>,
    pub collapsed: Option<CollapseReason>,
}

impl IntervalBands {
    fn collapsed(steps: usize, reason: CollapseReason) -> Self {
        Self {
            below: vec![0.0; steps],
            above: vec![0.0; steps],
            collapsed: Some(reason),
        }
    }

    pub fn len(&self) -> usize {
        self.below.len()
    }

    pub fn is_empty(&self) -> bool {
        self.below.is_empty()
    }

    /// Total interval width at `step` (0-based).
    pub fn width(&self, step: usize) -> f64 {
        self.below[step] + self.above[step]
    }
}

/// Interval half-widths for `steps` days following the history.
pub fn estimate_intervals(
    decomposition: &Decomposition,
    steps: usize,
    settings: IntervalSettings,
) -> IntervalBands {
    if settings.ensemble_size == 0 {
        return IntervalBands::collapsed(steps, CollapseReason::EmptyEnsemble);
    }
    let sigma = decomposition.residual_scale;
    if sigma <= ZERO_VARIANCE_RATIO * decomposition.data_scale.max(1.0) {
        return IntervalBands::collapsed(steps, CollapseReason::ZeroVariance);
    }

    let noise = normal_critical_value(settings.confidence_level) * sigma;
    let alpha = 1.0 - settings.confidence_level;
    let offsets = simulate_trend_offsets(
        steps,
        decomposition.changepoint_rate(),
        decomposition.mean_changepoint_magnitude(),
        settings,
    );

    let mut below = Vec::with_capacity(steps);
    let mut above = Vec::with_capacity(steps);
    let (mut max_below, mut max_above) = (0.0_f64, 0.0_f64);
    for step_offsets in &offsets {
        let (lo, hi) = if step_offsets.is_empty() {
            (0.0, 0.0)
        } else {
            (
                sorted_quantile(step_offsets, alpha / 2.0),
                sorted_quantile(step_offsets, 1.0 - alpha / 2.0),
            )
        };
        let down = (-lo).max(0.0).hypot(noise);
        let up = hi.max(0.0).hypot(noise);
        max_below = max_below.max(down);
        max_above = max_above.max(up);
        below.push(max_below);
        above.push(max_above);
    }

    debug!(
        steps,
        ensemble = settings.ensemble_size,
        residual_scale = sigma,
        "interval bands estimated"
    );

    IntervalBands {
        below,
        above,
        collapsed: None,
    }
}

/// Sorted trend level offsets per future step, one entry per trajectory.
///
/// Each trajectory draws a slope change on every day with probability
/// `rate`, with a Laplace-distributed magnitude of scale `magnitude`. Slope
/// changes accumulate into level offsets. With no historical changepoints
/// every step is empty.
fn simulate_trend_offsets(
    steps: usize,
    rate: f64,
    magnitude: f64,
    settings: IntervalSettings,
) -> Vec<Vec<f64>> {
    if rate <= 0.0 || !rate.is_finite() {
        return vec![Vec::new(); steps];
    }
    let Ok(jump) = Laplace::new(0.0, magnitude) else {
        return vec![Vec::new(); steps];
    };
    let rate = rate.min(1.0);

    let mut rng = StdRng::seed_from_u64(settings.seed);
    let mut offsets = vec![Vec::with_capacity(settings.ensemble_size); steps];
    for _ in 0..settings.ensemble_size {
        let mut slope = 0.0;
        let mut level = 0.0;
        for step in offsets.iter_mut() {
            if rng.gen_bool(rate) {
                let change = jump.sample(&mut rng);
                if change.is_finite() {
                    slope += change;
                }
            }
            level += slope;
            step.push(level);
        }
    }

    for step in offsets.iter_mut() {
        step.sort_by(|a, b| a.total_cmp(b));
    }
    offsets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ForecastConfig;
    use crate::decomposition::decompose;

    fn settings(ensemble_size: usize) -> IntervalSettings {
        IntervalSettings {
            confidence_level: 0.8,
            ensemble_size,
            seed: 7,
        }
    }

    fn noisy_series() -> Vec<f64> {
        (0..90)
            .map(|i| {
                let wobble = ((i * 37) % 11) as f64 / 11.0 - 0.5;
                let base = if i < 45 { 3.0 } else { 3.0 + 0.05 * (i - 45) as f64 };
                base + wobble
            })
            .collect()
    }

    #[test]
    fn test_width_never_shrinks() {
        let dec = decompose(&noisy_series(), &ForecastConfig::default());
        let bands = estimate_intervals(&dec, 120, settings(300));

        assert_eq!(bands.len(), 120);
        assert!(bands.collapsed.is_none());
        for step in 1..bands.len() {
            assert!(bands.width(step) >= bands.width(step - 1));
            assert!(bands.below[step] >= 0.0);
            assert!(bands.above[step] >= 0.0);
        }
        assert!(bands.width(0) > 0.0);
    }

    #[test]
    fn test_seeded_bands_are_reproducible() {
        let dec = decompose(&noisy_series(), &ForecastConfig::default());
        let a = estimate_intervals(&dec, 30, settings(200));
        let b = estimate_intervals(&dec, 30, settings(200));
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_ensemble_collapses() {
        let dec = decompose(&noisy_series(), &ForecastConfig::default());
        let bands = estimate_intervals(&dec, 10, settings(0));
        assert_eq!(bands.collapsed, Some(CollapseReason::EmptyEnsemble));
        assert!(bands.below.iter().chain(&bands.above).all(|&w| w == 0.0));
    }

    #[test]
    fn test_zero_variance_collapses() {
        let dec = decompose(&[4.0; 21], &ForecastConfig::default());
        let bands = estimate_intervals(&dec, 10, settings(100));
        assert_eq!(bands.collapsed, Some(CollapseReason::ZeroVariance));
        assert_eq!(bands.width(9), 0.0);
    }

    #[test]
    fn test_offsets_without_changepoints_are_empty() {
        let offsets = simulate_trend_offsets(5, 0.0, 1.0, settings(50));
        assert_eq!(offsets.len(), 5);
        assert!(offsets.iter().all(|o| o.is_empty()));
    }

    #[test]
    fn test_offsets_spread_with_horizon() {
        let offsets = simulate_trend_offsets(60, 0.1, 0.5, settings(400));
        let spread =
            |o: &Vec<f64>| sorted_quantile(o, 0.9) - sorted_quantile(o, 0.1);
        assert!(spread(&offsets[59]) > spread(&offsets[5]));
        assert!(offsets[59].windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_offsets_follow_changepoint_magnitude() {
        // Every trajectory changes slope on day one
        let offsets = simulate_trend_offsets(1, 1.0, 2.0, settings(20_000));
        let draws = &offsets[0];
        let mean = draws.iter().sum::<f64>() / draws.len() as f64;
        let mean_abs = draws.iter().map(|d| d.abs()).sum::<f64>() / draws.len() as f64;
        assert!(mean.abs() < 0.1);
        assert!((mean_abs - 2.0).abs() < 0.1);
    }

    #[test]
    fn test_offsets_reject_invalid_magnitude() {
        assert!(simulate_trend_offsets(3, 0.5, 0.0, settings(10))
            .iter()
            .all(|o| o.is_empty()));
        assert!(simulate_trend_offsets(3, 0.5, f64::NAN, settings(10))
            .iter()
            .all(|o| o.is_empty()));
    }
}
