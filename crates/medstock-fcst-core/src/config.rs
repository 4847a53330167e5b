//! Engine configuration.
//!
//! Every tunable knob of the pipeline lives in [`ForecastConfig`]. Values are
//! validated once at the entry point; the fitting stages assume a valid
//! configuration.

use crate::error::{ForecastError, Result};
use serde::{Deserialize, Serialize};

/// Day thresholds that map "days until depletion" to an urgency tier.
///
/// A depletion that is `critical_days` or fewer days away is CRITICAL, then
/// HIGH up to `high_days`, and so on. Anything beyond `low_days` is NONE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UrgencyThresholds {
    pub critical_days: i64,
    pub high_days: i64,
    pub medium_days: i64,
    pub low_days: i64,
}

impl Default for UrgencyThresholds {
    fn default() -> Self {
        Self {
            critical_days: 3,
            high_days: 7,
            medium_days: 14,
            low_days: 30,
        }
    }
}

impl UrgencyThresholds {
    /// Thresholds must be non-negative and non-decreasing.
    pub fn validate(&self) -> Result<()> {
        if self.critical_days < 0 {
            return Err(ForecastError::configuration(
                "urgency.critical_days",
                self.critical_days,
                "must be non-negative",
            ));
        }
        let ordered = [
            ("urgency.high_days", self.critical_days, self.high_days),
            ("urgency.medium_days", self.high_days, self.medium_days),
            ("urgency.low_days", self.medium_days, self.low_days),
        ];
        for (param, previous, current) in ordered {
            if current < previous {
                return Err(ForecastError::configuration(
                    param,
                    current,
                    format!("must be at least the previous threshold ({})", previous),
                ));
            }
        }
        Ok(())
    }
}

/// Remaining-stock levels that put a medicine on the buy list.
///
/// Stock at or below `red` is RED, then ORANGE up to `orange` and YELLOW up
/// to `yellow`. Medicines above `yellow` are not listed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StockLevelThresholds {
    pub red: f64,
    pub orange: f64,
    pub yellow: f64,
}

impl Default for StockLevelThresholds {
    fn default() -> Self {
        Self {
            red: 29.0,
            orange: 30.0,
            yellow: 40.0,
        }
    }
}

impl StockLevelThresholds {
    /// Levels must be finite, non-negative and non-decreasing.
    pub fn validate(&self) -> Result<()> {
        if !self.red.is_finite() || self.red < 0.0 {
            return Err(ForecastError::configuration(
                "stock_levels.red",
                self.red,
                "must be a finite non-negative quantity",
            ));
        }
        let ordered = [
            ("stock_levels.orange", self.red, self.orange),
            ("stock_levels.yellow", self.orange, self.yellow),
        ];
        for (param, previous, current) in ordered {
            if !current.is_finite() || current < previous {
                return Err(ForecastError::configuration(
                    param,
                    current,
                    format!("must be at least the previous level ({})", previous),
                ));
            }
        }
        Ok(())
    }
}

/// Configuration of the forecasting pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    /// Number of candidate changepoints as a fraction of the series length.
    pub changepoint_count_fraction: f64,
    /// Hard cap on candidate changepoints.
    pub max_changepoints: usize,
    /// L1 penalty on changepoint slope deltas (in scaled units).
    pub regularization_strength: f64,
    /// Coordinate descent sweeps before falling back to a global linear trend.
    pub max_fit_iterations: usize,
    /// Seasonal period in days.
    pub seasonality_period: usize,
    /// Maximum number of Fourier harmonics of the seasonal period.
    pub max_harmonics: usize,
    /// Default two-sided confidence level of prediction intervals.
    pub confidence_level: f64,
    /// Number of simulated future trend trajectories.
    pub ensemble_size: usize,
    /// Seed of the trajectory sampler.
    pub seed: u64,
    /// Largest accepted forecast horizon in days.
    pub horizon_cap: usize,
    /// Capacity of the fit memoization cache (0 disables it).
    pub cache_capacity: usize,
    /// Urgency tier thresholds.
    pub urgency: UrgencyThresholds,
    /// Buy list stock levels.
    pub stock_levels: StockLevelThresholds,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            changepoint_count_fraction: 0.2,
            max_changepoints: 25,
            regularization_strength: 0.01,
            max_fit_iterations: 5000,
            seasonality_period: 7,
            max_harmonics: 3,
            confidence_level: 0.8,
            ensemble_size: 500,
            seed: 0x6d65_6473_746f_636b,
            horizon_cap: 365,
            cache_capacity: 256,
            urgency: UrgencyThresholds::default(),
            stock_levels: StockLevelThresholds::default(),
        }
    }
}

impl ForecastConfig {
    pub fn with_changepoint_count_fraction(mut self, fraction: f64) -> Self {
        self.changepoint_count_fraction = fraction;
        self
    }

    pub fn with_max_changepoints(mut self, max: usize) -> Self {
        self.max_changepoints = max;
        self
    }

    pub fn with_regularization_strength(mut self, strength: f64) -> Self {
        self.regularization_strength = strength;
        self
    }

    pub fn with_max_fit_iterations(mut self, iterations: usize) -> Self {
        self.max_fit_iterations = iterations;
        self
    }

    pub fn with_seasonality(mut self, period: usize, max_harmonics: usize) -> Self {
        self.seasonality_period = period;
        self.max_harmonics = max_harmonics;
        self
    }

    pub fn with_confidence_level(mut self, level: f64) -> Self {
        self.confidence_level = level;
        self
    }

    pub fn with_ensemble_size(mut self, size: usize) -> Self {
        self.ensemble_size = size;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_horizon_cap(mut self, cap: usize) -> Self {
        self.horizon_cap = cap;
        self
    }

    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    pub fn with_urgency(mut self, urgency: UrgencyThresholds) -> Self {
        self.urgency = urgency;
        self
    }

    pub fn with_stock_levels(mut self, stock_levels: StockLevelThresholds) -> Self {
        self.stock_levels = stock_levels;
        self
    }

    /// Check every field, returning the first violation.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.changepoint_count_fraction) {
            return Err(ForecastError::configuration(
                "changepoint_count_fraction",
                self.changepoint_count_fraction,
                "must be between 0 and 1",
            ));
        }
        if !self.regularization_strength.is_finite() || self.regularization_strength < 0.0 {
            return Err(ForecastError::configuration(
                "regularization_strength",
                self.regularization_strength,
                "must be a finite non-negative number",
            ));
        }
        if self.max_fit_iterations == 0 {
            return Err(ForecastError::configuration(
                "max_fit_iterations",
                self.max_fit_iterations,
                "must be positive",
            ));
        }
        if self.seasonality_period == 0 {
            return Err(ForecastError::configuration(
                "seasonality_period",
                self.seasonality_period,
                "must be a positive number of days",
            ));
        }
        validate_confidence_level(self.confidence_level)?;
        if self.horizon_cap == 0 {
            return Err(ForecastError::configuration(
                "horizon_cap",
                self.horizon_cap,
                "must be positive",
            ));
        }
        self.urgency.validate()?;
        self.stock_levels.validate()
    }
}

/// A confidence level must lie strictly between 0 and 1.
pub fn validate_confidence_level(level: f64) -> Result<()> {
    if level > 0.0 && level < 1.0 {
        Ok(())
    } else {
        Err(ForecastError::configuration(
            "confidence_level",
            level,
            "must be in (0, 1)",
        ))
    }
}

/// A horizon must be a positive number of days no larger than `cap`.
pub fn validate_horizon(horizon_days: i64, cap: usize) -> Result<usize> {
    if horizon_days <= 0 {
        return Err(ForecastError::configuration(
            "horizon_days",
            horizon_days,
            "must be a positive number of days",
        ));
    }
    let horizon = horizon_days as usize;
    if horizon > cap {
        return Err(ForecastError::configuration(
            "horizon_days",
            horizon_days,
            format!("exceeds the configured cap of {} days", cap),
        ));
    }
    Ok(horizon)
}
