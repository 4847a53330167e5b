//! Memoization of decompositions.
//!
//! Fits are keyed by medicine id and a SHA-256 digest of the normalized
//! series together with every configuration field that affects the fit, so
//! a hit returns exactly what a fresh fit would.

use crate::config::ForecastConfig;
use crate::decomposition::Decomposition;
use crate::normalize::NormalizedSeries;
use lru::LruCache;
use sha2::{Digest, Sha256};
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Identity of one fit.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FitKey {
    pub medicine_id: String,
    pub digest: [u8; 32],
}

impl FitKey {
    pub fn new(medicine_id: &str, series: &NormalizedSeries, config: &ForecastConfig) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(series.start().to_string().as_bytes());
        for (value, observed) in series.values().iter().zip(series.observed()) {
            hasher.update(value.to_bits().to_le_bytes());
            hasher.update([u8::from(*observed)]);
        }
        hasher.update(config.changepoint_count_fraction.to_bits().to_le_bytes());
        hasher.update((config.max_changepoints as u64).to_le_bytes());
        hasher.update(config.regularization_strength.to_bits().to_le_bytes());
        hasher.update((config.max_fit_iterations as u64).to_le_bytes());
        hasher.update((config.seasonality_period as u64).to_le_bytes());
        hasher.update((config.max_harmonics as u64).to_le_bytes());

        let mut digest = [0u8; 32];
        digest.copy_from_slice(&hasher.finalize());
        Self {
            medicine_id: medicine_id.to_string(),
            digest,
        }
    }
}

/// Bounded LRU cache of fits shared across threads.
///
/// A capacity of zero disables caching; every lookup fits afresh.
pub struct FitCache {
    inner: Option<Mutex<LruCache<FitKey, Arc<Decomposition>>>>,
}

impl FitCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: NonZeroUsize::new(capacity).map(|cap| Mutex::new(LruCache::new(cap))),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    pub fn len(&self) -> usize {
        match &self.inner {
            Some(cache) => cache.lock().unwrap_or_else(|e| e.into_inner()).len(),
            None => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look up `key`, fitting with `fit` on a miss.
    ///
    /// The fit runs without holding the lock; two threads missing on the same
    /// key both fit and store identical values.
    pub fn get_or_fit<F>(&self, key: FitKey, fit: F) -> Arc<Decomposition>
    where
        F: FnOnce() -> Decomposition,
    {
        let Some(cache) = &self.inner else {
            return Arc::new(fit());
        };

        if let Some(hit) = cache.lock().unwrap_or_else(|e| e.into_inner()).get(&key) {
            debug!(medicine_id = %key.medicine_id, "fit cache hit");
            return Arc::clone(hit);
        }

        let fitted = Arc::new(fit());
        cache
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .put(key, Arc::clone(&fitted));
        fitted
    }

    pub fn clear(&self) {
        if let Some(cache) = &self.inner {
            cache.lock().unwrap_or_else(|e| e.into_inner()).clear();
        }
    }
}

impl std::fmt::Debug for FitCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FitCache")
            .field("enabled", &self.is_enabled())
            .field("len", &self.len())
            .finish()
    }
}
