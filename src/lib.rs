//! Multi-source exchange rate and wallet balance aggregation.
//!
//! The crate resolves coin exchange rates through ordered fallback chains of
//! interchangeable quote services, derives cross-rates through an anchor
//! currency, and caches the resulting snapshot with a freshness policy.
//! Independently, it fetches unspent output sets for an address from
//! interchangeable block explorer backends.

pub mod balance;
pub mod config;
pub mod error;
pub mod explorers;
pub mod fixed;
pub mod log;
pub mod rates;

pub use balance::{BalanceError, BalanceFetcher};
pub use error::AdapterError;
pub use explorers::{HEIGHT_UNKNOWN, Utxo};
pub use rates::{ExchangeRate, RateCache, RateSnapshot};

use crate::config::{AppConfig, ProvidersConfig};
use crate::explorers::{CryptoidApi, ExplorerApi, InsightApi};
use crate::rates::cache::RateRefresher;
use crate::rates::chain::{FallbackChain, RateSource};
use crate::rates::market::MarketSource;
use crate::rates::table::{FiatTable, TableSource};
use crate::rates::ticker::TickerSource;
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;

/// Connect and read timeout applied to every provider request.
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(15);

pub(crate) const USER_AGENT: &str = concat!("coinfeed/", env!("CARGO_PKG_VERSION"));

/// Listing mode requested from path-addressed explorer backends.
const UTXO_METHOD: &str = "utxo";

pub(crate) fn http_client() -> std::result::Result<reqwest::Client, AdapterError> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(HTTP_TIMEOUT)
        .timeout(HTTP_TIMEOUT)
        .build()
        .map_err(AdapterError::from)
}

/// Host of a configured endpoint, doubling as URL validation at assembly.
fn host_of(url: &str) -> Result<String> {
    let parsed = reqwest::Url::parse(url).with_context(|| format!("invalid provider url: {url}"))?;
    let host = parsed
        .host_str()
        .with_context(|| format!("provider url has no host: {url}"))?;
    Ok(host.to_string())
}

/// Builds the fallback chain resolving the coin's rate in `code`: the market
/// API (coin priced through BTC) first, the plain ticker second.
fn direct_chain(code: &str, providers: &ProvidersConfig, coin: &str) -> Result<FallbackChain<i64>> {
    let fiat = code.to_lowercase();
    let coin = coin.to_lowercase();

    let mut sources: Vec<Box<dyn RateSource<Quote = i64>>> = Vec::new();
    if let Some(market) = &providers.market {
        sources.push(Box::new(MarketSource::new(
            &host_of(&market.base_url)?,
            &format!("{}/btc_{fiat}", market.base_url),
            &format!("{}/{coin}_btc", market.base_url),
        )));
    }
    if let Some(ticker) = &providers.ticker {
        sources.push(Box::new(TickerSource::new(
            &host_of(&ticker.base_url)?,
            &format!("{}/{coin}_{fiat}/ticker", ticker.base_url),
            &["avg", "last"],
        )));
    }
    Ok(FallbackChain::new(code, sources))
}

fn table_chain(providers: &ProvidersConfig) -> Result<FallbackChain<FiatTable>> {
    let mut sources: Vec<Box<dyn RateSource<Quote = FiatTable>>> = Vec::new();
    for table in &providers.tables {
        sources.push(Box::new(TableSource::new(
            &host_of(&table.url)?,
            &table.url,
            table.format,
        )));
    }
    Ok(FallbackChain::new("fiat table", sources))
}

/// Wires the whole engine from configuration: rate chains, cross-derivation,
/// cache, and balance fetcher. Configuration problems (malformed endpoint
/// URLs, no explorer backends) are fatal here and never surface at runtime.
pub fn assemble(config: &AppConfig) -> Result<(RateCache, BalanceFetcher)> {
    let providers = &config.providers;

    let direct = config
        .direct_currencies
        .iter()
        .map(|code| direct_chain(code, providers, &config.coin_symbol))
        .collect::<Result<Vec<_>>>()?;
    let refresher = RateRefresher::new(direct, &config.anchor_currency, table_chain(providers)?);

    let cache = RateCache::new(
        Box::new(refresher),
        Duration::from_secs(config.refresh_interval_secs),
        config.locale_currency.clone(),
        &config.default_currency,
    );

    let mut explorer_apis: Vec<Arc<dyn ExplorerApi>> = Vec::new();
    if let Some(insight) = &providers.insight {
        host_of(&insight.base_url)?;
        explorer_apis.push(Arc::new(InsightApi::new(&insight.base_url)));
    }
    if let Some(cryptoid) = &providers.cryptoid {
        host_of(&cryptoid.base_url)?;
        explorer_apis.push(Arc::new(CryptoidApi::new(
            &cryptoid.base_url,
            &cryptoid.api_key,
        )));
    }
    let fetcher = BalanceFetcher::new(explorer_apis, UTXO_METHOD)?;

    Ok((cache, fetcher))
}
