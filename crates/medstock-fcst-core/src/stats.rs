//! Small statistical helpers shared by the fitting stages.

use statrs::distribution::{ContinuousCDF, Normal};
use statrs::statistics::Statistics;

/// Sample standard deviation of residuals, 0 for fewer than two values or
/// a non-finite result.
pub fn residual_scale(residuals: &[f64]) -> f64 {
    if residuals.len() < 2 {
        return 0.0;
    }
    let sd = residuals.iter().std_dev();
    if sd.is_finite() {
        sd.max(0.0)
    } else {
        0.0
    }
}

/// Two-sided standard normal critical value for `confidence` in (0, 1).
pub fn normal_critical_value(confidence: f64) -> f64 {
    let alpha = 1.0 - confidence;
    match Normal::new(0.0, 1.0) {
        Ok(normal) => normal.inverse_cdf(1.0 - alpha / 2.0),
        Err(_) => 1.281_551_565_545,
    }
}

/// Linearly interpolated quantile of already sorted data.
pub fn sorted_quantile(sorted_data: &[f64], quantile: f64) -> f64 {
    if sorted_data.is_empty() {
        return f64::NAN;
    }

    if quantile <= 0.0 {
        return sorted_data[0];
    }

    if quantile >= 1.0 {
        return sorted_data[sorted_data.len() - 1];
    }

    let n = sorted_data.len();
    let index = quantile * (n - 1) as f64;
    let lower_idx = index.floor() as usize;
    let upper_idx = (lower_idx + 1).min(n - 1);
    let fraction = index - lower_idx as f64;

    sorted_data[lower_idx] * (1.0 - fraction) + sorted_data[upper_idx] * fraction
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_residual_scale() {
        assert_eq!(residual_scale(&[]), 0.0);
        assert_eq!(residual_scale(&[3.0]), 0.0);
        assert_eq!(residual_scale(&[1.0, 1.0, 1.0]), 0.0);
        assert_relative_eq!(residual_scale(&[1.0, -1.0]), 2.0_f64.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn test_normal_critical_value() {
        assert_relative_eq!(normal_critical_value(0.95), 1.959964, epsilon = 1e-5);
        assert_relative_eq!(normal_critical_value(0.80), 1.281552, epsilon = 1e-5);
    }

    #[test]
    fn test_sorted_quantile() {
        let data = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_relative_eq!(sorted_quantile(&data, 0.5), 3.0);
        assert_relative_eq!(sorted_quantile(&data, 0.25), 2.0);
        assert_relative_eq!(sorted_quantile(&data, 0.1), 1.4, epsilon = 1e-12);
        assert_eq!(sorted_quantile(&data, 0.0), 1.0);
        assert_eq!(sorted_quantile(&data, 1.0), 5.0);
        assert!(sorted_quantile(&[], 0.5).is_nan());
    }
}
