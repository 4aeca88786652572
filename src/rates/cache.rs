//! Refresh orchestration and the freshness-gated snapshot cache.

use crate::rates::chain::FallbackChain;
use crate::rates::cross::derive_fiat_rates;
use crate::rates::table::FiatTable;
use crate::rates::{ExchangeRate, RateSnapshot};
use async_trait::async_trait;
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Default minimum interval between refresh attempts.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Produces the complete currency→rate mapping of one refresh cycle.
///
/// `None` means the cycle yielded nothing usable and the previous snapshot
/// must stay in place.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn fetch_all(&self) -> Option<HashMap<String, ExchangeRate>>;
}

/// Resolves every configured direct chain, then fills the gaps with rates
/// derived from the anchor currency and the fiat table chain.
pub struct RateRefresher {
    direct: Vec<FallbackChain<i64>>,
    anchor: String,
    tables: FallbackChain<FiatTable>,
}

impl RateRefresher {
    /// `direct` chains are each labelled with the currency code they
    /// resolve; `anchor` names the one whose rate seeds cross-derivation.
    pub fn new(direct: Vec<FallbackChain<i64>>, anchor: &str, tables: FallbackChain<FiatTable>) -> Self {
        Self {
            direct,
            anchor: anchor.to_uppercase(),
            tables,
        }
    }
}

#[async_trait]
impl SnapshotSource for RateRefresher {
    async fn fetch_all(&self) -> Option<HashMap<String, ExchangeRate>> {
        let resolutions = join_all(self.direct.iter().map(|chain| async move {
            (chain.label().to_string(), chain.resolve(|rate| *rate > 0).await)
        }))
        .await;

        let mut rates = HashMap::new();
        for (code, resolution) in resolutions {
            match resolution {
                Some((rate, source)) => {
                    rates.insert(code.to_uppercase(), ExchangeRate::new(&code, rate, &source));
                }
                None => info!("no {code} rate resolved this cycle"),
            }
        }

        if let Some(base) = rates.get(&self.anchor).cloned() {
            if let Some((table, source)) = self.tables.resolve(|table| !table.is_empty()).await {
                for rate in derive_fiat_rates(&base, &table, &source, &rates) {
                    rates.insert(rate.currency_code.clone(), rate);
                }
            }
        } else {
            debug!(
                "anchor {} unresolved, skipping cross-rate derivation",
                self.anchor
            );
        }

        if rates.is_empty() { None } else { Some(rates) }
    }
}

struct CacheState {
    snapshot: Option<Arc<RateSnapshot>>,
    refreshed_at: Option<Instant>,
}

/// Freshness-gated snapshot cache.
///
/// Constructed once per process; [`RateCache::list_rates`] and
/// [`RateCache::rate_for`] are its only accessors. Reads within
/// `refresh_interval` of the last successful refresh are served from memory.
/// Older reads attempt one refresh and, if it fails, keep serving the
/// previous snapshot indefinitely; the cache never clears itself, and it
/// never surfaces an error.
pub struct RateCache {
    source: Box<dyn SnapshotSource>,
    refresh_interval: Duration,
    locale_currency: Option<String>,
    default_currency: String,
    state: Mutex<CacheState>,
}

impl std::fmt::Debug for RateCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateCache")
            .field("refresh_interval", &self.refresh_interval)
            .field("locale_currency", &self.locale_currency)
            .field("default_currency", &self.default_currency)
            .finish_non_exhaustive()
    }
}

impl RateCache {
    pub fn new(
        source: Box<dyn SnapshotSource>,
        refresh_interval: Duration,
        locale_currency: Option<String>,
        default_currency: &str,
    ) -> Self {
        Self {
            source,
            refresh_interval,
            locale_currency,
            default_currency: default_currency.to_uppercase(),
            state: Mutex::new(CacheState {
                snapshot: None,
                refreshed_at: None,
            }),
        }
    }

    /// Current snapshot, refreshing first when the held one is stale.
    ///
    /// The whole check-refresh-swap sequence runs under the state lock, so
    /// concurrent readers trigger at most one refresh, and a reader either
    /// sees the old snapshot in full or the new one in full.
    pub async fn snapshot(&self) -> Option<Arc<RateSnapshot>> {
        let mut state = self.state.lock().await;

        let fresh = state
            .refreshed_at
            .is_some_and(|at| at.elapsed() <= self.refresh_interval);
        if !fresh {
            match self.source.fetch_all().await {
                Some(rates) => {
                    info!("refreshed {} exchange rates", rates.len());
                    state.snapshot = Some(Arc::new(RateSnapshot::new(rates)));
                    state.refreshed_at = Some(Instant::now());
                }
                None => warn!("rate refresh produced no data, keeping previous snapshot"),
            }
        }

        state.snapshot.clone()
    }

    /// All known rates, in no particular order.
    pub async fn list_rates(&self) -> Vec<ExchangeRate> {
        match self.snapshot().await {
            Some(snapshot) => snapshot.iter().cloned().collect(),
            None => Vec::new(),
        }
    }

    /// Rate for `code`, falling back to the locale currency and then the
    /// global default when the requested code is unknown. `None` only when
    /// every fallback misses.
    pub async fn rate_for(&self, code: &str) -> Option<ExchangeRate> {
        let snapshot = self.snapshot().await?;
        snapshot
            .get(code)
            .or_else(|| {
                self.locale_currency
                    .as_deref()
                    .and_then(|locale| snapshot.get(locale))
            })
            .or_else(|| snapshot.get(&self.default_currency))
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedSource {
        responses: std::sync::Mutex<VecDeque<Option<HashMap<String, ExchangeRate>>>>,
        calls: Arc<AtomicUsize>,
    }

    impl ScriptedSource {
        fn boxed(
            responses: Vec<Option<HashMap<String, ExchangeRate>>>,
            calls: &Arc<AtomicUsize>,
        ) -> Box<dyn SnapshotSource> {
            Box::new(Self {
                responses: std::sync::Mutex::new(responses.into()),
                calls: Arc::clone(calls),
            })
        }
    }

    #[async_trait]
    impl SnapshotSource for ScriptedSource {
        async fn fetch_all(&self) -> Option<HashMap<String, ExchangeRate>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses.lock().unwrap().pop_front().flatten()
        }
    }

    fn rates(codes: &[(&str, i64)]) -> HashMap<String, ExchangeRate> {
        codes
            .iter()
            .map(|(code, rate)| (code.to_string(), ExchangeRate::new(code, *rate, "test")))
            .collect()
    }

    const INTERVAL: Duration = Duration::from_secs(600);

    #[tokio::test(start_paused = true)]
    async fn test_fresh_read_serves_cached_snapshot() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = RateCache::new(
            ScriptedSource::boxed(vec![Some(rates(&[("USD", 5_000_000)]))], &calls),
            INTERVAL,
            None,
            "USD",
        );

        let first = cache.snapshot().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(INTERVAL - Duration::from_millis(1)).await;
        let second = cache.snapshot().await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_read_triggers_exactly_one_refresh() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = RateCache::new(
            ScriptedSource::boxed(
                vec![
                    Some(rates(&[("USD", 5_000_000)])),
                    Some(rates(&[("USD", 6_000_000)])),
                ],
                &calls,
            ),
            INTERVAL,
            None,
            "USD",
        );

        cache.snapshot().await.unwrap();
        tokio::time::advance(INTERVAL + Duration::from_millis(1)).await;

        let refreshed = cache.snapshot().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(refreshed.get("USD").unwrap().rate, 6_000_000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_refresh_keeps_previous_snapshot() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = RateCache::new(
            ScriptedSource::boxed(vec![Some(rates(&[("USD", 5_000_000)])), None], &calls),
            INTERVAL,
            None,
            "USD",
        );

        let first = cache.snapshot().await.unwrap();
        tokio::time::advance(INTERVAL + Duration::from_millis(1)).await;

        let second = cache.snapshot().await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.last_updated(), first.last_updated());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_reads_trigger_single_refresh() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = Arc::new(RateCache::new(
            ScriptedSource::boxed(vec![Some(rates(&[("USD", 5_000_000)]))], &calls),
            INTERVAL,
            None,
            "USD",
        ));

        let (a, b) = tokio::join!(cache.snapshot(), cache.snapshot());
        assert!(a.is_some() && b.is_some());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_cache_after_failed_first_refresh() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = RateCache::new(ScriptedSource::boxed(vec![None], &calls), INTERVAL, None, "USD");

        assert!(cache.snapshot().await.is_none());
        assert!(cache.list_rates().await.is_empty());
        assert!(cache.rate_for("USD").await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_lookup_falls_back_to_locale_then_default() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = RateCache::new(
            ScriptedSource::boxed(
                vec![Some(rates(&[("USD", 5_000_000), ("INR", 420_000_000)]))],
                &calls,
            ),
            INTERVAL,
            Some("INR".to_string()),
            "USD",
        );

        // Exact match
        assert_eq!(cache.rate_for("USD").await.unwrap().currency_code, "USD");
        // Unknown code falls back to the locale currency
        assert_eq!(cache.rate_for("EUR").await.unwrap().currency_code, "INR");

        // Without a locale match, the global default applies
        let cache = RateCache::new(
            ScriptedSource::boxed(vec![Some(rates(&[("USD", 5_000_000)]))], &calls),
            INTERVAL,
            Some("JPY".to_string()),
            "USD",
        );
        assert_eq!(cache.rate_for("EUR").await.unwrap().currency_code, "USD");

        // No fallback matches at all
        let cache = RateCache::new(
            ScriptedSource::boxed(vec![Some(rates(&[("INR", 420_000_000)]))], &calls),
            INTERVAL,
            None,
            "USD",
        );
        assert!(cache.rate_for("EUR").await.is_none());
    }

    mod refresher {
        use super::*;
        use crate::rates::chain::RateSource;
        use crate::error::AdapterError;

        struct FixedRate(i64);

        #[async_trait]
        impl RateSource for FixedRate {
            type Quote = i64;

            fn name(&self) -> &str {
                "direct.test"
            }

            async fn fetch(&self) -> Result<i64, AdapterError> {
                if self.0 > 0 {
                    Ok(self.0)
                } else {
                    Err(AdapterError::Io("down".to_string()))
                }
            }
        }

        struct FixedTable(Vec<(&'static str, i64)>);

        #[async_trait]
        impl RateSource for FixedTable {
            type Quote = FiatTable;

            fn name(&self) -> &str {
                "table.test"
            }

            async fn fetch(&self) -> Result<FiatTable, AdapterError> {
                Ok(self
                    .0
                    .iter()
                    .map(|(code, rate)| (code.to_string(), *rate))
                    .collect())
            }
        }

        fn chain(code: &str, rate: i64) -> FallbackChain<i64> {
            FallbackChain::new(code, vec![Box::new(FixedRate(rate))])
        }

        #[tokio::test]
        async fn test_refresher_merges_direct_and_derived() {
            let refresher = RateRefresher::new(
                vec![chain("USD", 5_000_000), chain("EUR", 4_800_000)],
                "USD",
                FallbackChain::new(
                    "fiat table",
                    vec![Box::new(FixedTable(vec![("EUR", 90_000_000), ("JPY", 15_000_000_000)]))],
                ),
            );

            let rates = refresher.fetch_all().await.unwrap();
            assert_eq!(rates.len(), 3);
            assert_eq!(rates["USD"].rate, 5_000_000);
            // Direct EUR beats the derived 0.045
            assert_eq!(rates["EUR"].rate, 4_800_000);
            assert_eq!(rates["EUR"].source, "direct.test");
            assert_eq!(rates["JPY"].rate, 750_000_000);
            assert_eq!(rates["JPY"].source, "table.test");
        }

        #[tokio::test]
        async fn test_refresher_without_anchor_keeps_direct_rates_only() {
            let refresher = RateRefresher::new(
                vec![chain("USD", 0), chain("EUR", 4_800_000)],
                "USD",
                FallbackChain::new(
                    "fiat table",
                    vec![Box::new(FixedTable(vec![("JPY", 15_000_000_000)]))],
                ),
            );

            let rates = refresher.fetch_all().await.unwrap();
            assert_eq!(rates.len(), 1);
            assert!(rates.contains_key("EUR"));
        }

        #[tokio::test]
        async fn test_refresher_yields_none_when_nothing_resolves() {
            let refresher = RateRefresher::new(
                vec![chain("USD", 0)],
                "USD",
                FallbackChain::new("fiat table", Vec::new()),
            );

            assert!(refresher.fetch_all().await.is_none());
        }
    }
}
