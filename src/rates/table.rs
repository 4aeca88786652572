//! Anchor→fiat rate table adapters.

use crate::error::AdapterError;
use crate::fixed;
use crate::rates::chain::RateSource;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

/// Anchor→fiat rates keyed by uppercase currency code, fixed-point scaled.
pub type FiatTable = HashMap<String, i64>;

/// Wire format of a table backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TableFormat {
    /// Flat JSON object of currency code → rate, either at the top level or
    /// under a `rates` key. `timestamp` and `error` keys are ignored.
    Map,
    /// Legacy spreadsheet feed: an array of entries whose `title.$t` holds
    /// the code and whose `content.$t` reads like `"_cpzh4: 0.92"`.
    Feed,
}

/// Fetches a whole anchor→fiat table from one quote service.
///
/// Entries that do not parse to a positive amount are dropped; a table with
/// nothing left is unusable data and falls through the chain.
pub struct TableSource {
    name: String,
    url: String,
    format: TableFormat,
}

impl TableSource {
    pub fn new(name: &str, url: &str, format: TableFormat) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
            format,
        }
    }
}

fn parse_map(doc: &Value) -> Result<FiatTable, AdapterError> {
    let entries = doc
        .get("rates")
        .and_then(Value::as_object)
        .or_else(|| doc.as_object())
        .ok_or_else(|| AdapterError::Parse("expected an object of currency rates".to_string()))?;

    let mut table = FiatTable::new();
    for (code, value) in entries {
        if code == "timestamp" || code == "error" {
            continue;
        }
        if let Some(rate) = fixed::value_to_scaled(value)
            && rate > 0
        {
            table.insert(code.to_uppercase(), rate);
        } else {
            debug!("dropping unusable table entry {code}");
        }
    }
    Ok(table)
}

fn parse_feed(doc: &Value) -> Result<FiatTable, AdapterError> {
    let entries = doc
        .as_array()
        .ok_or_else(|| AdapterError::Parse("expected an array of feed entries".to_string()))?;

    let mut table = FiatTable::new();
    for entry in entries {
        let Some(code) = entry.pointer("/title/$t").and_then(Value::as_str) else {
            continue;
        };
        let Some(content) = entry.pointer("/content/$t").and_then(Value::as_str) else {
            continue;
        };
        // Entry content reads like "_cpzh4: 0.92"; only the number matters.
        let Some(raw) = content.split(':').nth(1) else {
            continue;
        };
        if let Some(rate) = fixed::to_scaled(raw)
            && rate > 0
        {
            table.insert(code.to_uppercase(), rate);
        } else {
            debug!("dropping unusable feed entry {code}");
        }
    }
    Ok(table)
}

#[async_trait]
impl RateSource for TableSource {
    type Quote = FiatTable;

    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self) -> Result<FiatTable, AdapterError> {
        debug!("requesting rate table from {}", self.url);

        let client = crate::http_client()?;
        let response = client.get(&self.url).send().await?;
        if !response.status().is_success() {
            return Err(AdapterError::http_status(response.status()));
        }

        let doc: Value = serde_json::from_str(&response.text().await?)?;
        let table = match self.format {
            TableFormat::Map => parse_map(&doc)?,
            TableFormat::Feed => parse_feed(&doc)?,
        };

        if table.is_empty() {
            Err(AdapterError::NoData(
                "no usable entries in rate table".to_string(),
            ))
        } else {
            Ok(table)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_parse_flat_map() {
        let doc = serde_json::json!({
            "EUR": "0.92",
            "JPY": 151.2,
            "timestamp": 1700000000,
            "error": null
        });
        let table = parse_map(&doc).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table["EUR"], 92_000_000);
        assert_eq!(table["JPY"], 15_120_000_000);
    }

    #[test]
    fn test_parse_wrapped_map_drops_bad_entries() {
        let doc = serde_json::json!({
            "base": "USD",
            "rates": {"eur": "0.92", "GBP": "0", "AUD": "n/a"}
        });
        let table = parse_map(&doc).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table["EUR"], 92_000_000);
    }

    #[test]
    fn test_parse_feed_entries() {
        let doc = serde_json::json!([
            {"title": {"$t": "EUR"}, "content": {"$t": "_cpzh4: 0.92"}},
            {"title": {"$t": "AUD"}, "content": {"$t": "_cpzh4: 1.33"}},
            {"title": {"$t": "BAD"}, "content": {"$t": "no rate here"}},
            {"title": {"$t": "ZAR"}}
        ]);
        let table = parse_feed(&doc).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table["EUR"], 92_000_000);
        assert_eq!(table["AUD"], 133_000_000);
    }

    #[tokio::test]
    async fn test_successful_table_fetch() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/latest"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"{"rates": {"EUR": "0.92", "GBP": "0.79"}}"#),
            )
            .mount(&mock_server)
            .await;

        let source = TableSource::new(
            "table.test",
            &format!("{}/latest", mock_server.uri()),
            TableFormat::Map,
        );
        let table = source.fetch().await.unwrap();
        assert_eq!(table.len(), 2);
    }

    #[tokio::test]
    async fn test_empty_table_is_no_data() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/latest"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"rates": {"EUR": "0"}}"#))
            .mount(&mock_server)
            .await;

        let source = TableSource::new(
            "table.test",
            &format!("{}/latest", mock_server.uri()),
            TableFormat::Map,
        );
        assert!(matches!(
            source.fetch().await.unwrap_err(),
            AdapterError::NoData(_)
        ));
    }
}
