//! Cryptoid-style explorer backend.

use super::{ExplorerApi, HEIGHT_UNKNOWN, Utxo, coerce_u64, decode_script, decode_tx_hash};
use crate::error::AdapterError;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;

/// Explorer with a single endpoint where the resource is selected by query
/// parameters. UTXO listings live under `unspent_outputs` and carry no
/// block height.
pub struct CryptoidApi {
    base_url: String,
    api_key: String,
}

impl CryptoidApi {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct UnspentDoc {
    #[serde(default)]
    unspent_outputs: Option<Vec<UnspentOutput>>,
}

#[derive(Debug, Deserialize)]
struct UnspentOutput {
    tx_hash: String,
    // The backend spells this field without the second "t".
    #[serde(rename = "tx_ouput_n")]
    tx_output_n: u32,
    script: String,
    value: Value,
}

impl ExplorerApi for CryptoidApi {
    fn name(&self) -> &str {
        "cryptoid"
    }

    /// The listing mode is fixed by `q=unspent`, so the `method` hint does
    /// not apply here.
    fn address_url(&self, address: &str, _method: &str) -> String {
        format!(
            "{}?active={address}&key={}&q=unspent",
            self.base_url, self.api_key
        )
    }

    fn block_by_hash_url(&self, hash: &str) -> String {
        format!("{}?q=getblockheight&hash={hash}", self.base_url)
    }

    fn block_by_height_url(&self, height: u32) -> String {
        format!("{}?q=getblockhash&height={height}", self.base_url)
    }

    fn transaction_url(&self, _hash: &str) -> Option<String> {
        None
    }

    fn parse_utxos(&self, body: &str) -> Result<HashSet<Utxo>, AdapterError> {
        let doc: UnspentDoc = serde_json::from_str(body)?;

        let mut utxos = HashSet::new();
        for output in doc.unspent_outputs.unwrap_or_default() {
            let value = coerce_u64(&output.value).ok_or_else(|| {
                AdapterError::Parse(format!(
                    "value field of {}:{}",
                    output.tx_hash, output.tx_output_n
                ))
            })?;
            utxos.insert(Utxo::new(
                decode_tx_hash(&output.tx_hash)?,
                output.tx_output_n,
                value,
                HEIGHT_UNKNOWN,
                decode_script(&output.script)?,
            ));
        }
        Ok(utxos)
    }
}
