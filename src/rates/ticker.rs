//! Generic single-pair ticker adapter.

use crate::error::AdapterError;
use crate::fixed;
use crate::rates::chain::RateSource;
use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

/// Fetches one traded pair from a JSON ticker document.
///
/// Ticker backends disagree on where the price lives, so the descriptor
/// carries candidate field names tried in order anywhere in the document.
/// The first candidate parsing to a positive amount wins; unparseable or
/// non-positive values fall through to the next occurrence or field.
pub struct TickerSource {
    name: String,
    url: String,
    fields: Vec<String>,
}

impl TickerSource {
    pub fn new(name: &str, url: &str, fields: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
            fields: fields.iter().map(|f| f.to_string()).collect(),
        }
    }
}

fn find_candidate(value: &Value, field: &str) -> Option<i64> {
    match value {
        Value::Object(entries) => {
            if let Some(rate) = entries.get(field).and_then(fixed::value_to_scaled)
                && rate > 0
            {
                return Some(rate);
            }
            entries
                .iter()
                .filter(|(key, _)| *key != "timestamp" && *key != "error")
                .find_map(|(_, child)| find_candidate(child, field))
        }
        Value::Array(items) => items.iter().find_map(|item| find_candidate(item, field)),
        _ => None,
    }
}

fn parse_ticker(body: &str, fields: &[String]) -> Result<i64, AdapterError> {
    let doc: Value = serde_json::from_str(body)?;
    if !doc.is_object() {
        return Err(AdapterError::Parse(
            "expected a JSON object at the top level".to_string(),
        ));
    }

    fields
        .iter()
        .find_map(|field| find_candidate(&doc, field))
        .ok_or_else(|| AdapterError::NoData(format!("no positive rate in fields {fields:?}")))
}

#[async_trait]
impl RateSource for TickerSource {
    type Quote = i64;

    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self) -> Result<i64, AdapterError> {
        debug!("requesting ticker from {}", self.url);

        let client = crate::http_client()?;
        let response = client.get(&self.url).send().await?;
        if !response.status().is_success() {
            return Err(AdapterError::http_status(response.status()));
        }

        let body = response.text().await?;
        parse_ticker(&body, &self.fields)
    }
}
