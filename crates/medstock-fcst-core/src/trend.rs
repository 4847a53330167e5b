//! Piecewise-linear trend model.

use serde::Serialize;

/// A day index after which the trend slope shifts by `magnitude` units/day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Changepoint {
    pub position: usize,
    pub magnitude: f64,
}

/// Trend value `base_rate + base_slope * t + Σ magnitude_j * max(0, t - position_j)`.
///
/// Past the last changepoint the final segment's slope is extrapolated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendModel {
    /// Trend value at index 0.
    pub base_rate: f64,
    /// Slope of the first segment, units/day.
    pub base_slope: f64,
    /// Active changepoints ordered by position.
    pub changepoints: Vec<Changepoint>,
}

impl TrendModel {
    /// A single global line.
    pub fn linear(base_rate: f64, base_slope: f64) -> Self {
        Self {
            base_rate,
            base_slope,
            changepoints: Vec::new(),
        }
    }

    /// Trend value at day index `t`.
    pub fn evaluate(&self, t: f64) -> f64 {
        let shifts: f64 = self
            .changepoints
            .iter()
            .map(|cp| cp.magnitude * (t - cp.position as f64).max(0.0))
            .sum();
        self.base_rate + self.base_slope * t + shifts
    }

    /// Slope in effect at day index `t`.
    pub fn slope_at(&self, t: f64) -> f64 {
        self.base_slope
            + self
                .changepoints
                .iter()
                .filter(|cp| t > cp.position as f64)
                .map(|cp| cp.magnitude)
                .sum::<f64>()
    }

    /// Slope used for extrapolation beyond the history.
    pub fn final_slope(&self) -> f64 {
        self.base_slope + self.changepoints.iter().map(|cp| cp.magnitude).sum::<f64>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_linear_trend() {
        let trend = TrendModel::linear(2.0, 0.5);
        assert_relative_eq!(trend.evaluate(0.0), 2.0);
        assert_relative_eq!(trend.evaluate(10.0), 7.0);
        assert_relative_eq!(trend.final_slope(), 0.5);
    }

    #[test]
    fn test_piecewise_trend_extrapolates_last_segment() {
        let trend = TrendModel {
            base_rate: 1.0,
            base_slope: 1.0,
            changepoints: vec![Changepoint {
                position: 10,
                magnitude: -1.0,
            }],
        };
        assert_relative_eq!(trend.evaluate(10.0), 11.0);
        // Flat after the changepoint
        assert_relative_eq!(trend.evaluate(25.0), 11.0);
        assert_relative_eq!(trend.evaluate(400.0), 11.0);
        assert_relative_eq!(trend.slope_at(5.0), 1.0);
        assert_relative_eq!(trend.slope_at(11.0), 0.0);
        assert_relative_eq!(trend.final_slope(), 0.0);
    }
}
