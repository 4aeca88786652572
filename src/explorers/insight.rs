//! Insight-style explorer backend.

use super::{ExplorerApi, HEIGHT_UNKNOWN, Utxo, coerce_u64, decode_script, decode_tx_hash};
use crate::error::AdapterError;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;

/// Explorer addressing resources by path segments
/// (`/addr/<address>/<method>`, `/block/<hash>`, `/tx/<hash>`). UTXO
/// listings arrive as a bare JSON array.
pub struct InsightApi {
    base_url: String,
}

impl InsightApi {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct InsightOutput {
    txid: String,
    vout: u32,
    #[serde(rename = "scriptPubKey")]
    script_pub_key: String,
    satoshis: Value,
    height: Option<i64>,
}

impl ExplorerApi for InsightApi {
    fn name(&self) -> &str {
        "insight"
    }

    fn address_url(&self, address: &str, method: &str) -> String {
        if method.is_empty() {
            format!("{}/addr/{address}", self.base_url)
        } else {
            format!("{}/addr/{address}/{method}", self.base_url)
        }
    }

    fn block_by_hash_url(&self, hash: &str) -> String {
        format!("{}/block/{hash}", self.base_url)
    }

    fn block_by_height_url(&self, height: u32) -> String {
        format!("{}/block-index/{height}", self.base_url)
    }

    fn transaction_url(&self, hash: &str) -> Option<String> {
        Some(format!("{}/tx/{hash}", self.base_url))
    }

    fn parse_utxos(&self, body: &str) -> Result<HashSet<Utxo>, AdapterError> {
        let outputs: Vec<InsightOutput> = serde_json::from_str(body)?;

        let mut utxos = HashSet::with_capacity(outputs.len());
        for output in outputs {
            let value = coerce_u64(&output.satoshis).ok_or_else(|| {
                AdapterError::Parse(format!(
                    "satoshis field of {}:{}",
                    output.txid, output.vout
                ))
            })?;
            utxos.insert(Utxo::new(
                decode_tx_hash(&output.txid)?,
                output.vout,
                value,
                output.height.unwrap_or(HEIGHT_UNKNOWN),
                decode_script(&output.script_pub_key)?,
            ));
        }
        Ok(utxos)
    }
}
