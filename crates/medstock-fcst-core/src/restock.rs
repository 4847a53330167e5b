//! Restock planning from stock levels and average usage.
//!
//! Two views sit beside the forecast: a buy list ranked by remaining stock,
//! and a run-out estimate from the average daily usage that works from a
//! single usage entry.

use crate::config::StockLevelThresholds;
use crate::depletion::validate_stock;
use crate::error::{ForecastError, Result};
use crate::normalize::{validate_observations, ObservationPoint};
use chrono::{Days, NaiveDate};
use serde::Serialize;

/// Buy list colour of a medicine, most urgent first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StockLevel {
    Red,
    Orange,
    Yellow,
}

impl StockLevel {
    /// Level of `remaining` units, `None` when the stock is comfortable.
    pub fn classify(remaining: f64, thresholds: &StockLevelThresholds) -> Option<Self> {
        if remaining <= thresholds.red {
            Some(StockLevel::Red)
        } else if remaining <= thresholds.orange {
            Some(StockLevel::Orange)
        } else if remaining <= thresholds.yellow {
            Some(StockLevel::Yellow)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StockLevel::Red => "red",
            StockLevel::Orange => "orange",
            StockLevel::Yellow => "yellow",
        }
    }
}

impl std::fmt::Display for StockLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line of the buy list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RestockItem {
    pub medicine_id: String,
    pub remaining: f64,
    pub level: StockLevel,
}

/// Medicines that need buying, RED first and lowest stock first within a
/// level. Ties are broken by id.
pub fn buy_list<I>(stocks: I, thresholds: &StockLevelThresholds) -> Vec<RestockItem>
where
    I: IntoIterator<Item = (String, f64)>,
{
    let mut items: Vec<RestockItem> = stocks
        .into_iter()
        .filter_map(|(medicine_id, remaining)| {
            StockLevel::classify(remaining, thresholds).map(|level| RestockItem {
                medicine_id,
                remaining,
                level,
            })
        })
        .collect();
    items.sort_by(|a, b| {
        a.level
            .cmp(&b.level)
            .then(a.remaining.total_cmp(&b.remaining))
            .then_with(|| a.medicine_id.cmp(&b.medicine_id))
    });
    items
}

/// Run-out estimate from the average daily usage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AverageDepletion {
    /// No usage was ever logged.
    NoUsage,
    /// Nothing is left.
    Depleted,
    /// Usage at `daily_average` runs the stock out in `days` days.
    Projected {
        /// `None` when the day falls past the end of the calendar.
        date: Option<NaiveDate>,
        days: f64,
        daily_average: f64,
    },
}

/// Estimate run-out from total usage divided by the days since the first
/// usage entry (at least one). The date is `today` plus the whole days of
/// stock left.
pub fn average_depletion(
    history: &[ObservationPoint],
    on_hand: f64,
    today: NaiveDate,
) -> Result<AverageDepletion> {
    validate_observations(history)?;
    validate_stock(on_hand)?;

    let used = history.iter().filter(|obs| obs.quantity_consumed > 0.0);
    let Some(first) = used.clone().map(|obs| obs.timestamp).min() else {
        return Ok(AverageDepletion::NoUsage);
    };
    if on_hand == 0.0 {
        return Ok(AverageDepletion::Depleted);
    }

    let total: f64 = used.map(|obs| obs.quantity_consumed).sum();
    if !total.is_finite() {
        return Err(ForecastError::DataIntegrity(format!(
            "total usage since {first} is not finite"
        )));
    }
    let span = (today - first).num_days().max(1);
    let daily_average = total / span as f64;
    let days = on_hand / daily_average;
    let date = today.checked_add_days(Days::new(days.floor() as u64));

    Ok(AverageDepletion::Projected {
        date,
        days,
        daily_average,
    })
}

/// Stock position of one medicine with its average-usage run-out.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RestockSummary {
    pub medicine_id: String,
    pub on_hand: f64,
    pub reorder_threshold: f64,
    pub estimate: AverageDepletion,
}

impl RestockSummary {
    pub fn needs_reorder(&self) -> bool {
        self.on_hand <= self.reorder_threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    #[test]
    fn test_stock_level_boundaries() {
        let levels = StockLevelThresholds::default();
        assert_eq!(StockLevel::classify(0.0, &levels), Some(StockLevel::Red));
        assert_eq!(StockLevel::classify(29.0, &levels), Some(StockLevel::Red));
        assert_eq!(StockLevel::classify(29.5, &levels), Some(StockLevel::Orange));
        assert_eq!(StockLevel::classify(30.0, &levels), Some(StockLevel::Orange));
        assert_eq!(StockLevel::classify(30.5, &levels), Some(StockLevel::Yellow));
        assert_eq!(StockLevel::classify(40.0, &levels), Some(StockLevel::Yellow));
        assert_eq!(StockLevel::classify(40.1, &levels), None);
        assert_eq!(StockLevel::classify(f64::NAN, &levels), None);
    }

    #[test]
    fn test_buy_list_orders_by_level_then_stock() {
        let stocks = vec![
            ("saline".to_string(), 35.0),
            ("gauze".to_string(), 90.0),
            ("iodine".to_string(), 25.0),
            ("peroxide".to_string(), 30.0),
            ("betadine".to_string(), 3.0),
            ("alcohol".to_string(), 25.0),
        ];
        let items = buy_list(stocks, &StockLevelThresholds::default());

        let order: Vec<(&str, StockLevel)> = items
            .iter()
            .map(|item| (item.medicine_id.as_str(), item.level))
            .collect();
        assert_eq!(
            order,
            vec![
                ("betadine", StockLevel::Red),
                ("alcohol", StockLevel::Red),
                ("iodine", StockLevel::Red),
                ("peroxide", StockLevel::Orange),
                ("saline", StockLevel::Yellow),
            ]
        );
    }

    #[test]
    fn test_average_depletion_projects_from_first_usage() {
        let history = vec![
            ObservationPoint::new(day(5), 10.0),
            ObservationPoint::new(day(1), 10.0),
            ObservationPoint::new(day(3), 0.0),
        ];
        let estimate = average_depletion(&history, 80.0, day(11)).unwrap();

        let AverageDepletion::Projected {
            date,
            days,
            daily_average,
        } = estimate
        else {
            panic!("expected a projection, got {estimate:?}");
        };
        assert_relative_eq!(daily_average, 2.0);
        assert_relative_eq!(days, 40.0);
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 7, 21));
    }

    #[test]
    fn test_average_depletion_same_day_counts_as_one_day() {
        let history = vec![ObservationPoint::new(day(10), 3.0)];
        let estimate = average_depletion(&history, 10.0, day(10)).unwrap();
        assert!(matches!(
            estimate,
            AverageDepletion::Projected { date: Some(d), .. } if d == day(13)
        ));
    }

    #[test]
    fn test_average_depletion_edge_cases() {
        assert_eq!(
            average_depletion(&[], 50.0, day(10)).unwrap(),
            AverageDepletion::NoUsage
        );
        let history = vec![ObservationPoint::new(day(1), 4.0)];
        assert_eq!(
            average_depletion(&history, 0.0, day(10)).unwrap(),
            AverageDepletion::Depleted
        );
        assert!(matches!(
            average_depletion(&history, -1.0, day(10)),
            Err(ForecastError::DataIntegrity(_))
        ));
        let overflowing = vec![
            ObservationPoint::new(day(1), 1e308),
            ObservationPoint::new(day(2), 1e308),
        ];
        assert!(matches!(
            average_depletion(&overflowing, 10.0, day(10)),
            Err(ForecastError::DataIntegrity(_))
        ));
    }

    #[test]
    fn test_estimate_serializes_with_status_tag() {
        let json = serde_json::to_value(AverageDepletion::NoUsage).unwrap();
        assert_eq!(json["status"], "no_usage");
        let json = serde_json::to_value(StockLevel::Orange).unwrap();
        assert_eq!(json, "orange");
    }
}
