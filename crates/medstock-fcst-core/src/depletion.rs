//! Depletion date and restock urgency from a forecast and the stock on hand.

use crate::config::UrgencyThresholds;
use crate::error::{ForecastError, Result};
use crate::forecast::ForecastPoint;
use chrono::NaiveDate;
use serde::Serialize;
use tracing::warn;

/// Relative tolerance of the cumulative consumption comparison.
pub const DEPLETION_TOLERANCE: f64 = 1e-9;

/// How soon a medicine needs restocking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UrgencyTier {
    None,
    Low,
    Medium,
    High,
    Critical,
}

impl UrgencyTier {
    /// Tier for a depletion `days` days from today.
    pub fn from_days(days: i64, thresholds: &UrgencyThresholds) -> Self {
        if days <= thresholds.critical_days {
            UrgencyTier::Critical
        } else if days <= thresholds.high_days {
            UrgencyTier::High
        } else if days <= thresholds.medium_days {
            UrgencyTier::Medium
        } else if days <= thresholds.low_days {
            UrgencyTier::Low
        } else {
            UrgencyTier::None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UrgencyTier::None => "NONE",
            UrgencyTier::Low => "LOW",
            UrgencyTier::Medium => "MEDIUM",
            UrgencyTier::High => "HIGH",
            UrgencyTier::Critical => "CRITICAL",
        }
    }

    /// Numeric code for FFI, 0 (NONE) to 4 (CRITICAL).
    pub fn to_code(&self) -> i32 {
        *self as i32
    }
}

impl std::fmt::Display for UrgencyTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Predicted run-out of a medicine.
///
/// A `None` date means the stock lasts beyond the forecast horizon. Dates
/// satisfy `confidence_low_date <= predicted_depletion_date <=
/// confidence_high_date`, with `None` ordered after every date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DepletionAlert {
    pub predicted_depletion_date: Option<NaiveDate>,
    /// Earliest plausible depletion, from the upper consumption bound.
    pub confidence_low_date: Option<NaiveDate>,
    /// Latest plausible depletion, from the lower consumption bound.
    pub confidence_high_date: Option<NaiveDate>,
    pub urgency_tier: UrgencyTier,
    pub days_until_depletion: Option<i64>,
    /// Some forecast values were not finite and were counted as zero.
    pub low_confidence: bool,
}

impl DepletionAlert {
    /// The stock is already gone.
    pub fn depleted(today: NaiveDate) -> Self {
        Self {
            predicted_depletion_date: Some(today),
            confidence_low_date: Some(today),
            confidence_high_date: Some(today),
            urgency_tier: UrgencyTier::Critical,
            days_until_depletion: Some(0),
            low_confidence: false,
        }
    }
}

/// Stock must be a finite, non-negative quantity.
pub fn validate_stock(on_hand: f64) -> Result<()> {
    if !on_hand.is_finite() {
        return Err(ForecastError::DataIntegrity(format!(
            "non-finite stock level {}",
            on_hand
        )));
    }
    if on_hand < 0.0 {
        return Err(ForecastError::DataIntegrity(format!(
            "negative stock level {}",
            on_hand
        )));
    }
    Ok(())
}

/// Walk the forecast until cumulative consumption reaches `on_hand`.
pub fn compute_depletion(
    points: &[ForecastPoint],
    on_hand: f64,
    today: NaiveDate,
    thresholds: &UrgencyThresholds,
) -> Result<DepletionAlert> {
    validate_stock(on_hand)?;
    if on_hand == 0.0 {
        return Ok(DepletionAlert::depleted(today));
    }

    let (predicted, point_skipped) = walk(points, on_hand, |p| p.point_estimate);
    let (fastest, upper_skipped) = walk(points, on_hand, |p| p.upper_bound);
    let (slowest, lower_skipped) = walk(points, on_hand, |p| p.lower_bound);
    let low_confidence = point_skipped || upper_skipped || lower_skipped;
    if low_confidence {
        warn!("non-finite forecast values counted as zero consumption");
    }

    let confidence_low_date = earliest(fastest, predicted);
    let confidence_high_date = latest(slowest, predicted);

    let days_until_depletion = predicted.map(|d| (d - today).num_days());
    let urgency_tier = days_until_depletion
        .map(|days| UrgencyTier::from_days(days, thresholds))
        .unwrap_or(UrgencyTier::None);

    Ok(DepletionAlert {
        predicted_depletion_date: predicted,
        confidence_low_date,
        confidence_high_date,
        urgency_tier,
        days_until_depletion,
        low_confidence,
    })
}

/// First date at which the running total of `value` reaches `stock`, and
/// whether any non-finite value was skipped.
fn walk<F>(points: &[ForecastPoint], stock: f64, value: F) -> (Option<NaiveDate>, bool)
where
    F: Fn(&ForecastPoint) -> f64,
{
    let target = stock - DEPLETION_TOLERANCE * stock.max(1.0);
    let mut total = 0.0;
    let mut skipped = false;
    for point in points {
        let v = value(point);
        if v.is_finite() {
            total += v.max(0.0);
        } else {
            skipped = true;
        }
        if total >= target {
            return (Some(point.timestamp), skipped);
        }
    }
    (None, skipped)
}

fn earliest(a: Option<NaiveDate>, b: Option<NaiveDate>) -> Option<NaiveDate> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (Some(d), None) | (None, Some(d)) => Some(d),
        (None, None) => None,
    }
}

fn latest(a: Option<NaiveDate>, b: Option<NaiveDate>) -> Option<NaiveDate> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.max(b)),
        _ => None,
    }
}
