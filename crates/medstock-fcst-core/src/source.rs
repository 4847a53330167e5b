//! Access to consumption history and stock levels.
//!
//! The engine reads through [`ConsumptionSource`]; storage lives outside
//! this crate. [`InMemoryLedger`] keeps a usage/restock ledger per medicine
//! for tests, demos and embedders without their own store.

use crate::error::{ForecastError, Result};
use crate::normalize::ObservationPoint;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::warn;

/// Stock a medicine starts with when registered without one.
pub const DEFAULT_INITIAL_CAPACITY: f64 = 100.0;

/// Reorder threshold of a newly registered medicine.
pub const DEFAULT_REORDER_THRESHOLD: f64 = 20.0;

/// Read side of the storage collaborator.
pub trait ConsumptionSource: Send + Sync {
    /// Recorded usage events of a medicine, in any order.
    fn consumption_history(&self, medicine_id: &str) -> Result<Vec<ObservationPoint>>;

    /// Current stock of a medicine.
    fn on_hand_stock(&self, medicine_id: &str) -> Result<f64>;

    /// Ids of every tracked medicine, sorted.
    fn medicines(&self) -> Result<Vec<String>>;

    /// Stock at or below which a medicine should be reordered.
    fn reorder_threshold(&self, medicine_id: &str) -> Result<f64>;
}

/// One ledger line. Positive quantities are usage, negative ones restocks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LedgerEntry {
    pub date: NaiveDate,
    pub quantity: f64,
}

#[derive(Debug, Clone)]
struct MedicineLedger {
    initial_capacity: f64,
    reorder_threshold: f64,
    entries: Vec<LedgerEntry>,
}

impl Default for MedicineLedger {
    fn default() -> Self {
        Self {
            initial_capacity: DEFAULT_INITIAL_CAPACITY,
            reorder_threshold: DEFAULT_REORDER_THRESHOLD,
            entries: Vec::new(),
        }
    }
}

/// Ledger of usage and restock entries kept in memory.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    medicines: RwLock<HashMap<String, MedicineLedger>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a medicine with the given starting stock. Registering an existing
    /// medicine resets its capacity and keeps its entries and threshold.
    pub fn register(&self, medicine_id: &str, initial_capacity: f64) -> Result<()> {
        if !initial_capacity.is_finite() || initial_capacity < 0.0 {
            return Err(ForecastError::DataIntegrity(format!(
                "invalid initial capacity {} for {}",
                initial_capacity, medicine_id
            )));
        }
        let mut medicines = self.write()?;
        medicines
            .entry(medicine_id.to_string())
            .or_default()
            .initial_capacity = initial_capacity;
        Ok(())
    }

    /// Change the reorder threshold of a registered medicine.
    pub fn set_reorder_threshold(&self, medicine_id: &str, threshold: f64) -> Result<()> {
        if !threshold.is_finite() || threshold < 0.0 {
            return Err(ForecastError::DataIntegrity(format!(
                "invalid reorder threshold {} for {}",
                threshold, medicine_id
            )));
        }
        let mut medicines = self.write()?;
        medicines
            .get_mut(medicine_id)
            .ok_or_else(|| ForecastError::UnknownMedicine(medicine_id.to_string()))?
            .reorder_threshold = threshold;
        Ok(())
    }

    /// Log units used on `date`.
    pub fn log_usage(&self, medicine_id: &str, date: NaiveDate, quantity: f64) -> Result<()> {
        check_quantity(medicine_id, quantity)?;
        self.append(medicine_id, LedgerEntry { date, quantity })
    }

    /// Log units added to stock on `date`.
    pub fn log_restock(&self, medicine_id: &str, date: NaiveDate, quantity: f64) -> Result<()> {
        check_quantity(medicine_id, quantity)?;
        self.append(
            medicine_id,
            LedgerEntry {
                date,
                quantity: -quantity,
            },
        )
    }

    /// All entries of a medicine in logging order.
    pub fn entries(&self, medicine_id: &str) -> Result<Vec<LedgerEntry>> {
        let medicines = self.read()?;
        medicines
            .get(medicine_id)
            .map(|ledger| ledger.entries.clone())
            .ok_or_else(|| ForecastError::UnknownMedicine(medicine_id.to_string()))
    }

    fn append(&self, medicine_id: &str, entry: LedgerEntry) -> Result<()> {
        let mut medicines = self.write()?;
        medicines
            .get_mut(medicine_id)
            .ok_or_else(|| ForecastError::UnknownMedicine(medicine_id.to_string()))?
            .entries
            .push(entry);
        Ok(())
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, HashMap<String, MedicineLedger>>> {
        self.medicines
            .read()
            .map_err(|_| ForecastError::Source("ledger lock poisoned".to_string()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<String, MedicineLedger>>> {
        self.medicines
            .write()
            .map_err(|_| ForecastError::Source("ledger lock poisoned".to_string()))
    }
}

fn check_quantity(medicine_id: &str, quantity: f64) -> Result<()> {
    if !quantity.is_finite() || quantity <= 0.0 {
        return Err(ForecastError::DataIntegrity(format!(
            "ledger quantity for {} must be a positive number, got {}",
            medicine_id, quantity
        )));
    }
    Ok(())
}

impl ConsumptionSource for InMemoryLedger {
    fn consumption_history(&self, medicine_id: &str) -> Result<Vec<ObservationPoint>> {
        Ok(self
            .entries(medicine_id)?
            .into_iter()
            .filter(|entry| entry.quantity > 0.0)
            .map(|entry| ObservationPoint::new(entry.date, entry.quantity))
            .collect())
    }

    fn on_hand_stock(&self, medicine_id: &str) -> Result<f64> {
        let medicines = self.read()?;
        let ledger = medicines
            .get(medicine_id)
            .ok_or_else(|| ForecastError::UnknownMedicine(medicine_id.to_string()))?;

        let net_usage: f64 = ledger.entries.iter().map(|entry| entry.quantity).sum();
        let remaining = ledger.initial_capacity - net_usage;
        if remaining < 0.0 {
            warn!(
                medicine_id,
                remaining, "logged usage exceeds stock, treating stock as empty"
            );
            return Ok(0.0);
        }
        Ok(remaining)
    }

    fn medicines(&self) -> Result<Vec<String>> {
        let medicines = self.read()?;
        let mut ids: Vec<String> = medicines.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    fn reorder_threshold(&self, medicine_id: &str) -> Result<f64> {
        let medicines = self.read()?;
        medicines
            .get(medicine_id)
            .map(|ledger| ledger.reorder_threshold)
            .ok_or_else(|| ForecastError::UnknownMedicine(medicine_id.to_string()))
    }
}
