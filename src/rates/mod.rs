//! Canonical exchange rate model and the components that resolve it.

pub mod cache;
pub mod chain;
pub mod cross;
pub mod market;
pub mod table;
pub mod ticker;

// Re-export main types for cleaner imports
pub use cache::{RateCache, RateRefresher, SnapshotSource};
pub use chain::{FallbackChain, RateSource};
pub use table::{FiatTable, TableFormat, TableSource};

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

/// One resolved conversion: the smallest-unit value of one base coin in
/// `currency_code`, scaled by [`crate::fixed::RATE_DECIMALS`].
///
/// Stored rates are always strictly positive; a provider quoting zero or a
/// negative amount is treated as having no data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExchangeRate {
    pub currency_code: String,
    pub rate: i64,
    /// Host or name of the provider that produced this rate.
    pub source: String,
}

impl ExchangeRate {
    pub fn new(currency_code: &str, rate: i64, source: &str) -> Self {
        Self {
            currency_code: currency_code.to_uppercase(),
            rate,
            source: source.to_string(),
        }
    }
}

/// The complete rate set produced by one successful refresh cycle.
///
/// Snapshots are immutable and replaced wholesale; readers holding an old
/// snapshot keep a fully consistent view while a new one is swapped in.
#[derive(Debug, Clone, Serialize)]
pub struct RateSnapshot {
    rates: HashMap<String, ExchangeRate>,
    last_updated: DateTime<Utc>,
}

impl RateSnapshot {
    pub(crate) fn new(rates: HashMap<String, ExchangeRate>) -> Self {
        Self {
            rates,
            last_updated: Utc::now(),
        }
    }

    pub fn last_updated(&self) -> DateTime<Utc> {
        self.last_updated
    }

    pub fn get(&self, currency_code: &str) -> Option<&ExchangeRate> {
        self.rates.get(currency_code)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ExchangeRate> {
        self.rates.values()
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }
}
