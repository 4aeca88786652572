//! Cross-rate derivation from an anchor rate and an anchor→fiat table.

use crate::fixed;
use crate::rates::ExchangeRate;
use crate::rates::table::FiatTable;
use std::collections::HashMap;
use tracing::debug;

/// Derives coin→fiat rates from `base` (coin→anchor) and `table`
/// (anchor→fiat), attributing them to `source`.
///
/// Codes already present in `resolved` keep their directly fetched value
/// and are never overwritten by a derived one; the base currency itself is
/// never derived. Products that round to zero are dropped.
pub fn derive_fiat_rates(
    base: &ExchangeRate,
    table: &FiatTable,
    source: &str,
    resolved: &HashMap<String, ExchangeRate>,
) -> Vec<ExchangeRate> {
    let mut derived = Vec::new();
    for (code, anchor_to_fiat) in table {
        if *code == base.currency_code || resolved.contains_key(code) {
            continue;
        }

        let rate = fixed::mul_scaled(base.rate, *anchor_to_fiat);
        if rate <= 0 {
            debug!("derived {code} rate rounds to zero, dropped");
            continue;
        }
        derived.push(ExchangeRate::new(code, rate, source));
    }
    derived
}
