//! Forecasting entry point bound to a consumption source.

use crate::cache::{FitCache, FitKey};
use crate::config::ForecastConfig;
use crate::decomposition::decompose;
use crate::depletion::validate_stock;
use crate::error::Result;
use crate::forecast::{build_report, ForecastReport, ForecastRequest};
use crate::normalize::normalize;
use crate::restock::{average_depletion, buy_list, RestockItem, RestockSummary};
use crate::source::ConsumptionSource;
use chrono::NaiveDate;
use tracing::{debug, info};

/// Source of "today".
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

/// Local calendar date of the host.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        chrono::Local::now().date_naive()
    }
}

/// A clock stuck on one date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

/// Forecast outcome of one medicine in a batch run.
#[derive(Debug, Clone, PartialEq)]
pub struct MedicineOutlook {
    pub medicine_id: String,
    pub report: Result<ForecastReport>,
}

/// Forecasts medicines read from a [`ConsumptionSource`].
///
/// The engine is `Send + Sync` when its source and clock are and can be
/// shared across worker threads; requests are independent apart from the
/// fit cache.
#[derive(Debug)]
pub struct ForecastEngine<S, C = SystemClock> {
    source: S,
    clock: C,
    config: ForecastConfig,
    cache: FitCache,
}

impl<S: ConsumptionSource> ForecastEngine<S, SystemClock> {
    /// Engine on the system clock.
    pub fn new(source: S, config: ForecastConfig) -> Result<Self> {
        Self::with_clock(source, SystemClock, config)
    }
}

impl<S: ConsumptionSource, C: Clock> ForecastEngine<S, C> {
    pub fn with_clock(source: S, clock: C, config: ForecastConfig) -> Result<Self> {
        config.validate()?;
        let cache = FitCache::new(config.cache_capacity);
        Ok(Self {
            source,
            clock,
            config,
            cache,
        })
    }

    pub fn config(&self) -> &ForecastConfig {
        &self.config
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn cache(&self) -> &FitCache {
        &self.cache
    }

    /// Forecast `horizon_days` of usage for a medicine and predict when its
    /// stock runs out.
    pub fn forecast(
        &self,
        medicine_id: &str,
        horizon_days: i64,
        confidence_level: f64,
    ) -> Result<ForecastReport> {
        let request = ForecastRequest::new(horizon_days, confidence_level);
        request.validate(&self.config)?;

        let observations = self.source.consumption_history(medicine_id)?;
        let on_hand = self.source.on_hand_stock(medicine_id)?;
        validate_stock(on_hand)?;

        let series = normalize(&observations)?;
        let key = FitKey::new(medicine_id, &series, &self.config);
        let decomposition = self
            .cache
            .get_or_fit(key, || decompose(series.values(), &self.config));

        let today = self.clock.today();
        debug!(medicine_id, days = series.len(), %today, "forecasting");
        build_report(
            medicine_id,
            &series,
            &decomposition,
            on_hand,
            today,
            &request,
            &self.config,
        )
    }

    /// Forecast with the configured default confidence level.
    pub fn forecast_default(&self, medicine_id: &str, horizon_days: i64) -> Result<ForecastReport> {
        self.forecast(medicine_id, horizon_days, self.config.confidence_level)
    }

    /// Forecast every medicine of the source.
    ///
    /// An invalid request fails the whole call. A medicine that cannot be
    /// forecast carries its error in its own outlook and the rest still run.
    pub fn forecast_all(
        &self,
        horizon_days: i64,
        confidence_level: f64,
    ) -> Result<Vec<MedicineOutlook>> {
        ForecastRequest::new(horizon_days, confidence_level).validate(&self.config)?;

        let outlooks: Vec<MedicineOutlook> = self
            .source
            .medicines()?
            .into_iter()
            .map(|medicine_id| {
                let report = self.forecast(&medicine_id, horizon_days, confidence_level);
                if let Err(error) = &report {
                    debug!(medicine_id, %error, "medicine not forecast");
                }
                MedicineOutlook {
                    medicine_id,
                    report,
                }
            })
            .collect();
        let failed = outlooks.iter().filter(|o| o.report.is_err()).count();
        info!(medicines = outlooks.len(), failed, "batch forecast finished");
        Ok(outlooks)
    }

    /// Medicines whose remaining stock puts them on the buy list.
    pub fn buy_list(&self) -> Result<Vec<RestockItem>> {
        let mut stocks = Vec::new();
        for medicine_id in self.source.medicines()? {
            let on_hand = self.source.on_hand_stock(&medicine_id)?;
            stocks.push((medicine_id, on_hand));
        }
        Ok(buy_list(stocks, &self.config.stock_levels))
    }

    /// Stock, reorder threshold and average-usage run-out of every medicine.
    pub fn restock_summary(&self) -> Result<Vec<RestockSummary>> {
        let today = self.clock.today();
        self.source
            .medicines()?
            .into_iter()
            .map(|medicine_id| {
                let history = self.source.consumption_history(&medicine_id)?;
                let on_hand = self.source.on_hand_stock(&medicine_id)?;
                let reorder_threshold = self.source.reorder_threshold(&medicine_id)?;
                let estimate = average_depletion(&history, on_hand, today)?;
                Ok(RestockSummary {
                    medicine_id,
                    on_hand,
                    reorder_threshold,
                    estimate,
                })
            })
            .collect()
    }
}
