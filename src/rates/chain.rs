//! Ordered fallback across interchangeable quote sources.

use crate::error::AdapterError;
use async_trait::async_trait;
use tracing::{debug, info, warn};

/// One external quote source. `Quote` is whatever the source resolves: a
/// single scaled rate for ticker and market sources, a whole fiat table for
/// table sources.
#[async_trait]
pub trait RateSource: Send + Sync {
    type Quote: Send;

    /// Identifying name, recorded as the `source` of rates it produced.
    fn name(&self) -> &str;

    async fn fetch(&self) -> Result<Self::Quote, AdapterError>;
}

/// An ordered list of sources bound to one logical resource.
///
/// Sources are tried in sequence and the first usable result wins; sources
/// after the winner are never consulted. A source that failed is not retried
/// within the same resolution, only on the next one.
pub struct FallbackChain<Q: 'static> {
    label: String,
    sources: Vec<Box<dyn RateSource<Quote = Q>>>,
}

impl<Q: Send + 'static> FallbackChain<Q> {
    pub fn new(label: &str, sources: Vec<Box<dyn RateSource<Quote = Q>>>) -> Self {
        Self {
            label: label.to_string(),
            sources,
        }
    }

    /// The resource this chain resolves, e.g. the currency code.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Resolves the chain: the first fetched value passing `accept`, paired
    /// with the winning source's name. `None` when every source failed or
    /// returned unusable data; callers treat that as "unknown", not as an
    /// error.
    pub async fn resolve(&self, accept: impl Fn(&Q) -> bool + Send) -> Option<(Q, String)> {
        for source in &self.sources {
            match source.fetch().await {
                Ok(quote) if accept(&quote) => {
                    info!("resolved {} from {}", self.label, source.name());
                    return Some((quote, source.name().to_string()));
                }
                Ok(_) => {
                    debug!("unusable {} data from {}", self.label, source.name());
                }
                Err(AdapterError::NoData(detail)) => {
                    debug!("no {} data from {}: {detail}", self.label, source.name());
                }
                Err(err) => {
                    warn!("fetching {} from {} failed: {err}", self.label, source.name());
                }
            }
        }
        None
    }
}
