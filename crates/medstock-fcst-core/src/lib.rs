//! Core usage forecasting and depletion prediction for medicine inventories.
//!
//! The pipeline turns an irregular consumption log into a daily series,
//! fits a piecewise-linear trend with weekly seasonality, simulates future
//! trend changes for prediction intervals and walks the forecast against
//! the stock on hand to predict a depletion date and restock urgency.
//! Across medicines it ranks a buy list by remaining stock and estimates
//! run-out from average daily usage.

pub mod cache;
pub mod changepoint;
pub mod config;
pub mod decomposition;
pub mod depletion;
pub mod engine;
pub mod error;
pub mod forecast;
pub mod normalize;
pub mod restock;
pub mod seasonality;
pub mod source;
pub mod stats;
pub mod trend;
pub mod uncertainty;

// Re-exports for convenience
pub use cache::{FitCache, FitKey};
pub use changepoint::{candidate_positions, fit_sparse_least_squares, SparseFit, SparseFitOptions};
pub use config::{
    validate_confidence_level, validate_horizon, ForecastConfig, StockLevelThresholds,
    UrgencyThresholds,
};
pub use decomposition::{decompose, Decomposition};
pub use depletion::{compute_depletion, validate_stock, DepletionAlert, UrgencyTier};
pub use engine::{Clock, FixedClock, ForecastEngine, MedicineOutlook, SystemClock};
pub use error::{ForecastError, Result};
pub use forecast::{
    compose_forecast, forecast_history, ComposedForecast, Degradation, ForecastConfidence,
    ForecastPoint, ForecastReport, ForecastRequest,
};
pub use normalize::{normalize, NormalizedSeries, ObservationPoint, MIN_DISTINCT_DAYS};
pub use restock::{
    average_depletion, buy_list, AverageDepletion, RestockItem, RestockSummary, StockLevel,
};
pub use seasonality::SeasonalComponent;
pub use source::{
    ConsumptionSource, InMemoryLedger, LedgerEntry, DEFAULT_INITIAL_CAPACITY,
    DEFAULT_REORDER_THRESHOLD,
};
pub use trend::{Changepoint, TrendModel};
pub use uncertainty::{estimate_intervals, CollapseReason, IntervalBands, IntervalSettings};
