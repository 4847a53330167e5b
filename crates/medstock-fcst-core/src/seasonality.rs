//! Periodic usage patterns as a bounded Fourier expansion.
//!
//! Harmonic `h` of period `P` contributes `a_h cos(2πhi/P) + b_h sin(2πhi/P)`,
//! stored in polar form `R_h sin(2πhi/P + φ_h)`.

use serde::Serialize;
use std::f64::consts::PI;

/// Fitted periodic component.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeasonalComponent {
    /// Period in days.
    pub period_length: usize,
    /// `(amplitude, phase)` per harmonic, harmonic 1 first.
    pub coefficients: Vec<(f64, f64)>,
}

impl SeasonalComponent {
    /// A component with no harmonics; evaluates to 0 everywhere.
    pub fn none(period_length: usize) -> Self {
        Self {
            period_length,
            coefficients: Vec::new(),
        }
    }

    /// Build from cartesian `(cos, sin)` coefficients.
    pub fn from_cartesian(period_length: usize, terms: &[(f64, f64)]) -> Self {
        let coefficients = terms
            .iter()
            .map(|&(a, b)| ((a * a + b * b).sqrt(), a.atan2(b)))
            .collect();
        Self {
            period_length,
            coefficients,
        }
    }

    pub fn n_harmonics(&self) -> usize {
        self.coefficients.len()
    }

    /// Periodic offset at day index `t` (0 = first day of the history).
    pub fn evaluate(&self, t: f64) -> f64 {
        let p = self.period_length as f64;
        self.coefficients
            .iter()
            .enumerate()
            .map(|(h, &(amplitude, phase))| {
                let omega = 2.0 * PI * (h + 1) as f64 / p;
                amplitude * (omega * t + phase).sin()
            })
            .sum()
    }
}

/// Number of harmonics that can be fit on `n` days.
///
/// Zero when the history spans fewer than two full periods. Capped at
/// `(period - 1) / 2` so no harmonic aliases onto another or onto the
/// intercept.
pub fn usable_harmonics(n: usize, period: usize, max_harmonics: usize) -> usize {
    if period == 0 || n < 2 * period {
        return 0;
    }
    max_harmonics.min((period - 1) / 2)
}

/// Fourier design columns: `[cos_1, sin_1, cos_2, sin_2, ...]`, one value
/// per index `0..n`.
pub fn fourier_columns(n: usize, period: usize, harmonics: usize) -> Vec<Vec<f64>> {
    let p = period as f64;
    let mut columns = Vec::with_capacity(2 * harmonics);
    for h in 1..=harmonics {
        let omega = 2.0 * PI * h as f64 / p;
        columns.push((0..n).map(|i| (omega * i as f64).cos()).collect());
        columns.push((0..n).map(|i| (omega * i as f64).sin()).collect());
    }
    columns
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_usable_harmonics() {
        assert_eq!(usable_harmonics(13, 7, 3), 0);
        assert_eq!(usable_harmonics(14, 7, 3), 3);
        assert_eq!(usable_harmonics(100, 7, 5), 3);
        assert_eq!(usable_harmonics(100, 7, 1), 1);
        assert_eq!(usable_harmonics(100, 2, 3), 0);
        assert_eq!(usable_harmonics(100, 0, 3), 0);
    }

    #[test]
    fn test_polar_form_matches_cartesian() {
        let terms = [(1.5, -0.5), (0.25, 2.0)];
        let component = SeasonalComponent::from_cartesian(7, &terms);
        let columns = fourier_columns(21, 7, 2);

        for i in 0..21 {
            let cartesian = terms[0].0 * columns[0][i]
                + terms[0].1 * columns[1][i]
                + terms[1].0 * columns[2][i]
                + terms[1].1 * columns[3][i];
            assert_relative_eq!(component.evaluate(i as f64), cartesian, epsilon = 1e-10);
        }
    }

    #[test]
    fn test_periodic_extrapolation() {
        let component = SeasonalComponent::from_cartesian(7, &[(2.0, 1.0)]);
        for i in 0..7 {
            let t = i as f64;
            assert_relative_eq!(
                component.evaluate(t),
                component.evaluate(t + 7.0 * 52.0),
                epsilon = 1e-9
            );
        }
    }

    #[test]
    fn test_empty_component_is_zero() {
        let component = SeasonalComponent::none(7);
        assert_eq!(component.n_harmonics(), 0);
        assert_eq!(component.evaluate(3.0), 0.0);
    }
}
