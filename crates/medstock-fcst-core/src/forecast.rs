//! Dated forecasts and the end-to-end forecasting pipeline.

use crate::config::{validate_confidence_level, validate_horizon, ForecastConfig};
use crate::decomposition::{decompose, Decomposition};
use crate::depletion::{compute_depletion, validate_stock, DepletionAlert};
use crate::error::Result;
use crate::normalize::{normalize, NormalizedSeries, ObservationPoint};
use crate::uncertainty::{estimate_intervals, CollapseReason, IntervalSettings};
use chrono::{Days, NaiveDate};
use serde::Serialize;
use tracing::{debug, warn};

/// Predicted consumption for one future day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ForecastPoint {
    pub timestamp: NaiveDate,
    pub point_estimate: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
}

impl ForecastPoint {
    pub fn width(&self) -> f64 {
        self.upper_bound - self.lower_bound
    }
}

/// A reason a forecast is less trustworthy than usual.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Degradation {
    /// The changepoint fit did not converge; a global linear trend was used.
    TrendFallback,
    /// Prediction intervals collapsed onto the point estimate.
    IntervalCollapsed { reason: CollapseReason },
}

/// Quality flags attached to a report.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ForecastConfidence {
    pub degraded: bool,
    pub reasons: Vec<Degradation>,
}

impl ForecastConfidence {
    pub fn from_reasons(reasons: Vec<Degradation>) -> Self {
        Self {
            degraded: !reasons.is_empty(),
            reasons,
        }
    }
}

/// Forecast and depletion outlook for one medicine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastReport {
    pub medicine_id: String,
    pub forecast_points: Vec<ForecastPoint>,
    pub depletion_alert: DepletionAlert,
    pub confidence: ForecastConfidence,
}

/// Per-call parameters of a forecast.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForecastRequest {
    /// Number of future days to return.
    pub horizon_days: i64,
    /// Two-sided confidence level of the prediction intervals.
    pub confidence_level: f64,
}

impl ForecastRequest {
    pub fn new(horizon_days: i64, confidence_level: f64) -> Self {
        Self {
            horizon_days,
            confidence_level,
        }
    }

    /// Validated horizon in days.
    pub fn validate(&self, config: &ForecastConfig) -> Result<usize> {
        let horizon = validate_horizon(self.horizon_days, config.horizon_cap)?;
        validate_confidence_level(self.confidence_level)?;
        Ok(horizon)
    }
}

/// Output of [`compose_forecast`].
#[derive(Debug, Clone, PartialEq)]
pub struct ComposedForecast {
    pub points: Vec<ForecastPoint>,
    pub collapsed: Option<CollapseReason>,
}

/// Dated forecast for `horizon` days after `max(last observed day, today)`.
///
/// Days between the last observation and `today` are simulated so the
/// uncertainty accumulated over them is carried into the returned points,
/// but are not returned.
pub fn compose_forecast(
    series: &NormalizedSeries,
    decomposition: &Decomposition,
    today: NaiveDate,
    horizon: usize,
    settings: IntervalSettings,
) -> ComposedForecast {
    let last = series.end();
    let trailing_gap = if today > last {
        (today - last).num_days() as usize
    } else {
        0
    };
    let steps = trailing_gap + horizon;
    let bands = estimate_intervals(decomposition, steps, settings);
    let last_index = (series.len() - 1) as f64;

    let mut points = Vec::with_capacity(horizon);
    let mut previous_width = 0.0_f64;
    for step in trailing_gap..steps {
        let ahead = step + 1;
        let raw = decomposition.evaluate(last_index + ahead as f64);

        let lower_bound = (raw - bands.below[step]).max(0.0);
        let point_estimate = raw.max(0.0);
        let mut upper_bound = (raw + bands.above[step]).max(point_estimate);
        if upper_bound - lower_bound < previous_width {
            upper_bound = lower_bound + previous_width;
        }
        previous_width = upper_bound - lower_bound;

        points.push(ForecastPoint {
            timestamp: last + Days::new(ahead as u64),
            point_estimate,
            lower_bound,
            upper_bound,
        });
    }

    ComposedForecast {
        points,
        collapsed: bands.collapsed,
    }
}

/// Run the whole pipeline over an in-memory history.
///
/// `today` anchors the forecast start and the depletion countdown.
pub fn forecast_history(
    medicine_id: &str,
    observations: &[ObservationPoint],
    on_hand: f64,
    today: NaiveDate,
    request: &ForecastRequest,
    config: &ForecastConfig,
) -> Result<ForecastReport> {
    config.validate()?;
    request.validate(config)?;
    validate_stock(on_hand)?;

    let series = normalize(observations)?;
    let decomposition = decompose(series.values(), config);
    build_report(
        medicine_id,
        &series,
        &decomposition,
        on_hand,
        today,
        request,
        config,
    )
}

/// Compose the forecast and depletion alert from an existing fit.
///
/// The request and stock must already be validated.
pub(crate) fn build_report(
    medicine_id: &str,
    series: &NormalizedSeries,
    decomposition: &Decomposition,
    on_hand: f64,
    today: NaiveDate,
    request: &ForecastRequest,
    config: &ForecastConfig,
) -> Result<ForecastReport> {
    let horizon = request.validate(config)?;
    let settings = IntervalSettings {
        confidence_level: request.confidence_level,
        ensemble_size: config.ensemble_size,
        seed: config.seed,
    };
    let composed = compose_forecast(series, decomposition, today, horizon, settings);
    let mut depletion_alert =
        compute_depletion(&composed.points, on_hand, today, &config.urgency)?;

    let mut reasons = Vec::new();
    if decomposition.trend_fallback {
        reasons.push(Degradation::TrendFallback);
    }
    if let Some(reason) = composed.collapsed {
        reasons.push(Degradation::IntervalCollapsed { reason });
    }
    let confidence = ForecastConfidence::from_reasons(reasons);
    if confidence.degraded {
        warn!(medicine_id, reasons = ?confidence.reasons, "forecast degraded");
        depletion_alert.low_confidence = true;
    }

    debug!(
        medicine_id,
        horizon,
        tier = ?depletion_alert.urgency_tier,
        "forecast report built"
    );

    Ok(ForecastReport {
        medicine_id: medicine_id.to_string(),
        forecast_points: composed.points,
        depletion_alert,
        confidence,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::depletion::UrgencyTier;
    use crate::error::ForecastError;
    use approx::assert_relative_eq;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn constant_history(days: u64, rate: f64) -> Vec<ObservationPoint> {
        let start = date(2024, 1, 1);
        (0..days)
            .map(|i| ObservationPoint::new(start + Days::new(i), rate))
            .collect()
    }

    fn noisy_history(days: u64) -> Vec<ObservationPoint> {
        let start = date(2024, 1, 1);
        (0..days)
            .map(|i| {
                let wobble = ((i * 7) % 11) as f64 * 0.3;
                ObservationPoint::new(start + Days::new(i), 2.0 + wobble)
            })
            .collect()
    }

    #[test]
    fn test_constant_usage_depletes_on_day_ten() {
        let history = constant_history(30, 2.0);
        let today = date(2024, 1, 30);
        let report = forecast_history(
            "amoxicillin",
            &history,
            20.0,
            today,
            &ForecastRequest::new(30, 0.8),
            &ForecastConfig::default(),
        )
        .unwrap();

        assert_eq!(report.forecast_points.len(), 30);
        assert_eq!(report.forecast_points[0].timestamp, date(2024, 1, 31));
        let alert = &report.depletion_alert;
        assert_eq!(alert.predicted_depletion_date, Some(date(2024, 2, 9)));
        assert_eq!(alert.days_until_depletion, Some(10));
        assert_eq!(alert.urgency_tier, UrgencyTier::Medium);
    }

    #[test]
    fn test_zero_variance_is_degraded() {
        let report = forecast_history(
            "saline",
            &constant_history(30, 2.0),
            100.0,
            date(2024, 1, 30),
            &ForecastRequest::new(14, 0.8),
            &ForecastConfig::default(),
        )
        .unwrap();

        assert!(report.confidence.degraded);
        assert!(report.confidence.reasons.contains(&Degradation::IntervalCollapsed {
            reason: CollapseReason::ZeroVariance
        }));
        for p in &report.forecast_points {
            assert_relative_eq!(p.lower_bound, p.point_estimate, epsilon = 1e-9);
            assert_relative_eq!(p.upper_bound, p.point_estimate, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_collapsed_interval_marks_alert_low_confidence() {
        let report = forecast_history(
            "amoxicillin",
            &constant_history(30, 2.0),
            20.0,
            date(2024, 1, 30),
            &ForecastRequest::new(30, 0.8),
            &ForecastConfig::default(),
        )
        .unwrap();

        assert!(report.confidence.degraded);
        assert_eq!(report.depletion_alert.urgency_tier, UrgencyTier::Medium);
        assert!(report.depletion_alert.low_confidence);
    }

    #[test]
    fn test_trend_fallback_reaches_report() {
        let start = date(2024, 1, 1);
        let history: Vec<ObservationPoint> = (0..80)
            .map(|i| {
                let rate = if i < 40 { 5.0 } else { 5.0 - 0.1 * (i - 40) as f64 };
                ObservationPoint::new(start + Days::new(i), rate)
            })
            .collect();
        let config = ForecastConfig::default().with_max_fit_iterations(1);
        let report = forecast_history(
            "povidone",
            &history,
            200.0,
            date(2024, 3, 20),
            &ForecastRequest::new(14, 0.8),
            &config,
        )
        .unwrap();

        assert!(report.confidence.degraded);
        assert!(report.confidence.reasons.contains(&Degradation::TrendFallback));
        assert!(report.depletion_alert.low_confidence);
        assert_eq!(report.forecast_points.len(), 14);
    }

    #[test]
    fn test_trailing_gap_is_skipped() {
        let history = noisy_history(40);
        let last = date(2024, 2, 9);
        let today = date(2024, 2, 19);
        let config = ForecastConfig::default();
        let request = ForecastRequest::new(7, 0.8);

        let report = forecast_history("ibuprofen", &history, 50.0, today, &request, &config).unwrap();
        assert_eq!(report.forecast_points.len(), 7);
        assert_eq!(report.forecast_points[0].timestamp, date(2024, 2, 20));

        // Intervals include the uncertainty accumulated over the gap
        let same_day = forecast_history("ibuprofen", &history, 50.0, last, &request, &config).unwrap();
        assert!(report.forecast_points[0].width() >= same_day.forecast_points[0].width());
    }

    #[test]
    fn test_bounds_are_ordered_and_clamped() {
        // Declining usage that extrapolates below zero
        let start = date(2024, 1, 1);
        let history: Vec<ObservationPoint> = (0..40)
            .map(|i| {
                let wobble = ((i * 5) % 3) as f64 * 0.2;
                ObservationPoint::new(start + Days::new(i), (8.0 - 0.2 * i as f64).max(0.0) + wobble)
            })
            .collect();
        let report = forecast_history(
            "cough syrup",
            &history,
            30.0,
            date(2024, 2, 9),
            &ForecastRequest::new(60, 0.9),
            &ForecastConfig::default(),
        )
        .unwrap();

        let points = &report.forecast_points;
        for p in points {
            assert!(p.lower_bound >= 0.0);
            assert!(p.point_estimate >= 0.0);
            assert!(p.lower_bound <= p.point_estimate);
            assert!(p.point_estimate <= p.upper_bound);
        }
        for w in points.windows(2) {
            assert!(w[1].width() >= w[0].width() - 1e-12);
        }
    }

    #[test]
    fn test_request_validation() {
        let history = constant_history(10, 1.0);
        let today = date(2024, 1, 10);
        let config = ForecastConfig::default();

        for request in [
            ForecastRequest::new(0, 0.8),
            ForecastRequest::new(366, 0.8),
            ForecastRequest::new(7, 1.0),
            ForecastRequest::new(7, 0.0),
        ] {
            let result = forecast_history("x", &history, 5.0, today, &request, &config);
            assert!(matches!(result, Err(ForecastError::Configuration { .. })));
        }
    }

    #[test]
    fn test_invalid_inputs_are_rejected() {
        let today = date(2024, 1, 10);
        let config = ForecastConfig::default();
        let request = ForecastRequest::new(7, 0.8);

        let one_day = constant_history(1, 1.0);
        assert!(matches!(
            forecast_history("x", &one_day, 5.0, today, &request, &config),
            Err(ForecastError::InsufficientData { needed: 2, got: 1 })
        ));

        let mut negative = constant_history(10, 1.0);
        negative[4].quantity_consumed = -1.0;
        assert!(matches!(
            forecast_history("x", &negative, 5.0, today, &request, &config),
            Err(ForecastError::DataIntegrity(_))
        ));

        assert!(matches!(
            forecast_history("x", &constant_history(10, 1.0), -5.0, today, &request, &config),
            Err(ForecastError::DataIntegrity(_))
        ));
    }

    #[test]
    fn test_report_serializes_with_stable_names() {
        let report = forecast_history(
            "paracetamol",
            &noisy_history(21),
            10.0,
            date(2024, 1, 21),
            &ForecastRequest::new(3, 0.8),
            &ForecastConfig::default(),
        )
        .unwrap();

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["medicine_id"], "paracetamol");
        assert!(json["forecast_points"][0]["point_estimate"].is_number());
        assert!(json["forecast_points"][0]["timestamp"].is_string());
        assert!(json["depletion_alert"]["urgency_tier"].is_string());
        assert!(json["confidence"]["degraded"].is_boolean());
    }

    #[test]
    fn test_degradation_serialization() {
        let json = serde_json::to_value(Degradation::IntervalCollapsed {
            reason: CollapseReason::EmptyEnsemble,
        })
        .unwrap();
        assert_eq!(json["kind"], "interval_collapsed");
        assert_eq!(json["reason"], "empty_ensemble");
        let json = serde_json::to_value(Degradation::TrendFallback).unwrap();
        assert_eq!(json["kind"], "trend_fallback");
    }
}
