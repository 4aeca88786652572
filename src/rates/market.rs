//! Market-pair adapter pricing the coin through an intermediate asset.

use crate::error::AdapterError;
use crate::fixed;
use crate::rates::chain::RateSource;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

/// Derives a coin→fiat rate from two market legs: the coin's own market
/// against an intermediate asset (e.g. coin→BTC) and the intermediate
/// asset's fiat market (e.g. BTC→USD). Both legs use the
/// `data.last_trade.price` document shape.
pub struct MarketSource {
    name: String,
    quote_url: String,
    coin_url: String,
}

impl MarketSource {
    /// `quote_url` is the intermediate→fiat market, `coin_url` the
    /// coin→intermediate market.
    pub fn new(name: &str, quote_url: &str, coin_url: &str) -> Self {
        Self {
            name: name.to_string(),
            quote_url: quote_url.to_string(),
            coin_url: coin_url.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct MarketDoc {
    data: MarketData,
}

#[derive(Debug, Deserialize)]
struct MarketData {
    last_trade: LastTrade,
}

#[derive(Debug, Deserialize)]
struct LastTrade {
    price: Value,
}

fn parse_last_trade(body: &str) -> Result<i64, AdapterError> {
    let doc: MarketDoc = serde_json::from_str(body)?;
    match fixed::value_to_scaled(&doc.data.last_trade.price) {
        Some(price) if price > 0 => Ok(price),
        _ => Err(AdapterError::NoData(
            "last trade price is not a positive amount".to_string(),
        )),
    }
}

async fn fetch_last_trade(client: &reqwest::Client, url: &str) -> Result<i64, AdapterError> {
    debug!("requesting market trade from {url}");
    let response = client.get(url).send().await?;
    if !response.status().is_success() {
        return Err(AdapterError::http_status(response.status()));
    }
    parse_last_trade(&response.text().await?)
}

#[async_trait]
impl RateSource for MarketSource {
    type Quote = i64;

    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self) -> Result<i64, AdapterError> {
        let client = crate::http_client()?;
        let (quote, coin) = tokio::join!(
            fetch_last_trade(&client, &self.quote_url),
            fetch_last_trade(&client, &self.coin_url),
        );

        let rate = fixed::mul_scaled(coin?, quote?);
        if rate > 0 {
            Ok(rate)
        } else {
            Err(AdapterError::NoData(
                "converted market rate rounds to zero".to_string(),
            ))
        }
    }
}
