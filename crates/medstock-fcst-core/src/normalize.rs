//! Conversion of an irregular consumption log into a gap-free daily series.

use crate::error::{ForecastError, Result};
use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Minimum number of distinct days needed to fit anything.
pub const MIN_DISTINCT_DAYS: usize = 2;

/// Units of a medicine consumed on one calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObservationPoint {
    pub timestamp: NaiveDate,
    pub quantity_consumed: f64,
}

impl ObservationPoint {
    pub fn new(timestamp: NaiveDate, quantity_consumed: f64) -> Self {
        Self {
            timestamp,
            quantity_consumed,
        }
    }
}

/// A daily usage series with one value for every day in `[start, end]`.
///
/// Days without a recorded value carry an interpolated estimate and are
/// marked as not observed.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedSeries {
    start: NaiveDate,
    values: Vec<f64>,
    observed: Vec<bool>,
}

impl NormalizedSeries {
    /// First day of the series.
    pub fn start(&self) -> NaiveDate {
        self.start
    }

    /// Last day of the series.
    pub fn end(&self) -> NaiveDate {
        self.date_at(self.values.len() - 1)
    }

    /// Date of the point at `index` (index 0 is `start`).
    pub fn date_at(&self, index: usize) -> NaiveDate {
        self.start + Days::new(index as u64)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Daily consumption values, imputed days included.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Whether each day carried a recorded value.
    pub fn observed(&self) -> &[bool] {
        &self.observed
    }

    /// Number of days that carried a recorded value.
    pub fn n_observed(&self) -> usize {
        self.observed.iter().filter(|&&o| o).count()
    }

    /// The series as dated points.
    pub fn points(&self) -> Vec<ObservationPoint> {
        self.values
            .iter()
            .enumerate()
            .map(|(i, &v)| ObservationPoint::new(self.date_at(i), v))
            .collect()
    }
}

/// Reject negative or non-finite quantities.
pub fn validate_observations(observations: &[ObservationPoint]) -> Result<()> {
    for obs in observations {
        let q = obs.quantity_consumed;
        if !q.is_finite() {
            return Err(ForecastError::DataIntegrity(format!(
                "non-finite quantity {} on {}",
                q, obs.timestamp
            )));
        }
        if q < 0.0 {
            return Err(ForecastError::DataIntegrity(format!(
                "negative quantity {} on {}",
                q, obs.timestamp
            )));
        }
    }
    Ok(())
}

/// Build a [`NormalizedSeries`] from observations in any order.
///
/// Observations on the same day are summed. Missing interior days are
/// filled by linear interpolation between their recorded neighbours.
pub fn normalize(observations: &[ObservationPoint]) -> Result<NormalizedSeries> {
    validate_observations(observations)?;

    // Canonical order so same-day sums are identical for any input ordering
    let mut sorted = observations.to_vec();
    sorted.sort_by(|a, b| {
        a.timestamp
            .cmp(&b.timestamp)
            .then(a.quantity_consumed.total_cmp(&b.quantity_consumed))
    });

    let mut daily: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for obs in &sorted {
        *daily.entry(obs.timestamp).or_insert(0.0) += obs.quantity_consumed;
    }
    if let Some((date, total)) = daily.iter().find(|(_, total)| !total.is_finite()) {
        return Err(ForecastError::DataIntegrity(format!(
            "daily total {total} on {date} is not finite"
        )));
    }

    let insufficient = ForecastError::InsufficientData {
        needed: MIN_DISTINCT_DAYS,
        got: daily.len(),
    };
    if daily.len() < MIN_DISTINCT_DAYS {
        return Err(insufficient);
    }
    let (Some(&start), Some(&end)) = (daily.keys().next(), daily.keys().next_back()) else {
        return Err(insufficient);
    };

    let gridded = fill_daily_gaps(&daily, start, end);
    let observed = gridded.iter().map(|v| v.is_some()).collect();
    let values = interpolate_interior(&gridded);

    Ok(NormalizedSeries {
        start,
        values,
        observed,
    })
}

/// Lay daily totals onto a day grid, with `None` on days without a record.
fn fill_daily_gaps(
    daily: &BTreeMap<NaiveDate, f64>,
    start: NaiveDate,
    end: NaiveDate,
) -> Vec<Option<f64>> {
    let n = (end - start).num_days() as usize + 1;

    let mut gridded = vec![None; n];
    for (date, &total) in daily {
        let idx = (*date - start).num_days() as usize;
        gridded[idx] = Some(total);
    }
    gridded
}

/// Linear interpolation across `None` runs. The first and last entries
/// must be present.
fn interpolate_interior(values: &[Option<f64>]) -> Vec<f64> {
    let mut result = vec![0.0; values.len()];
    let mut prev_idx = 0;
    let mut prev_val = values[0].unwrap_or(0.0);
    result[0] = prev_val;

    for (i, v) in values.iter().enumerate().skip(1) {
        if let Some(v) = *v {
            let gap = i - prev_idx;
            if gap > 1 {
                let slope = (v - prev_val) / gap as f64;
                for j in 1..gap {
                    result[prev_idx + j] = prev_val + slope * j as f64;
                }
            }
            result[i] = v;
            prev_idx = i;
            prev_val = v;
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    #[test]
    fn test_fill_interior_gap() {
        let obs = vec![
            ObservationPoint::new(day(1), 1.0),
            ObservationPoint::new(day(4), 4.0),
        ];
        let series = normalize(&obs).unwrap();

        assert_eq!(series.len(), 4);
        assert_eq!(series.start(), day(1));
        assert_eq!(series.end(), day(4));
        assert_relative_eq!(series.values()[1], 2.0, epsilon = 1e-12);
        assert_relative_eq!(series.values()[2], 3.0, epsilon = 1e-12);
        assert_eq!(series.observed(), &[true, false, false, true]);
        assert_eq!(series.n_observed(), 2);
    }

    #[test]
    fn test_length_matches_date_span() {
        let obs = vec![
            ObservationPoint::new(day(20), 2.0),
            ObservationPoint::new(day(2), 5.0),
            ObservationPoint::new(day(11), 3.0),
        ];
        let series = normalize(&obs).unwrap();
        assert_eq!(series.len() as i64, (day(20) - day(2)).num_days() + 1);
        let points = series.points();
        assert!(points.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    }

    #[test]
    fn test_same_day_events_are_summed() {
        let obs = vec![
            ObservationPoint::new(day(1), 1.5),
            ObservationPoint::new(day(1), 2.5),
            ObservationPoint::new(day(2), 1.0),
        ];
        let series = normalize(&obs).unwrap();
        assert_eq!(series.len(), 2);
        assert_relative_eq!(series.values()[0], 4.0);
    }

    #[test]
    fn test_order_independent() {
        let obs = vec![
            ObservationPoint::new(day(1), 0.1),
            ObservationPoint::new(day(1), 0.7),
            ObservationPoint::new(day(3), 0.2),
            ObservationPoint::new(day(1), 0.3),
        ];
        let mut reversed = obs.clone();
        reversed.reverse();
        assert_eq!(normalize(&obs).unwrap(), normalize(&reversed).unwrap());
    }

    #[test]
    fn test_single_day_is_insufficient() {
        let obs = vec![
            ObservationPoint::new(day(5), 1.0),
            ObservationPoint::new(day(5), 2.0),
        ];
        assert_eq!(
            normalize(&obs),
            Err(ForecastError::InsufficientData { needed: 2, got: 1 })
        );
        assert!(matches!(
            normalize(&[]),
            Err(ForecastError::InsufficientData { got: 0, .. })
        ));
    }

    #[test]
    fn test_negative_quantity_rejected() {
        let obs = vec![
            ObservationPoint::new(day(1), 1.0),
            ObservationPoint::new(day(2), -2.0),
            ObservationPoint::new(day(3), 1.0),
        ];
        assert!(matches!(
            normalize(&obs),
            Err(ForecastError::DataIntegrity(_))
        ));
    }

    #[test]
    fn test_non_finite_quantity_rejected() {
        let obs = vec![
            ObservationPoint::new(day(1), f64::NAN),
            ObservationPoint::new(day(2), 1.0),
        ];
        assert!(matches!(
            normalize(&obs),
            Err(ForecastError::DataIntegrity(_))
        ));
    }

    #[test]
    fn test_overflowing_daily_total_rejected() {
        let obs = vec![
            ObservationPoint::new(day(1), 1e308),
            ObservationPoint::new(day(1), 1e308),
            ObservationPoint::new(day(2), 1.0),
        ];
        let err = normalize(&obs).unwrap_err();
        assert!(matches!(err, ForecastError::DataIntegrity(_)));
        assert!(err.to_string().contains("not finite"));
    }

    #[test]
    fn test_recorded_zero_is_kept() {
        let obs = vec![
            ObservationPoint::new(day(1), 4.0),
            ObservationPoint::new(day(2), 0.0),
            ObservationPoint::new(day(3), 4.0),
        ];
        let series = normalize(&obs).unwrap();
        assert_eq!(series.values(), &[4.0, 0.0, 4.0]);
        assert_eq!(series.n_observed(), 3);
    }
}
