//! Block explorer adapters and the canonical unspent output model.

pub mod cryptoid;
pub mod insight;

// Re-export main types for cleaner imports
pub use cryptoid::CryptoidApi;
pub use insight::InsightApi;

use crate::error::AdapterError;
use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, info};

/// Block height marker for outputs whose containing block is unknown.
pub const HEIGHT_UNKNOWN: i64 = -1;

/// One unspent transaction output, normalized from whatever shape the
/// explorer backend returns. Identified by `(tx_hash, index)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Utxo {
    pub tx_hash: [u8; 32],
    pub index: u32,
    /// Amount in the smallest coin unit.
    pub value: u64,
    pub height: i64,
    /// Adapters only ever return unspent outputs, so this is always false.
    pub spent: bool,
    /// Raw locking script bytes.
    pub script: Vec<u8>,
}

impl Utxo {
    pub fn new(tx_hash: [u8; 32], index: u32, value: u64, height: i64, script: Vec<u8>) -> Self {
        Self {
            tx_hash,
            index,
            value,
            height,
            spent: false,
            script,
        }
    }
}

/// Capability surface of one explorer backend: request building for each
/// resource it knows, plus normalization of its UTXO listing.
pub trait ExplorerApi: Send + Sync {
    fn name(&self) -> &str;

    /// Address resource URL. An empty `method` selects the backend's
    /// default listing mode.
    fn address_url(&self, address: &str, method: &str) -> String;

    fn block_by_hash_url(&self, hash: &str) -> String;

    fn block_by_height_url(&self, height: u32) -> String;

    /// `None` when the backend exposes no transaction resource.
    fn transaction_url(&self, hash: &str) -> Option<String>;

    fn parse_utxos(&self, body: &str) -> Result<HashSet<Utxo>, AdapterError>;
}

pub(crate) fn decode_tx_hash(hex_hash: &str) -> Result<[u8; 32], AdapterError> {
    let bytes = hex::decode(hex_hash)
        .map_err(|e| AdapterError::Parse(format!("transaction hash {hex_hash:?}: {e}")))?;
    bytes
        .try_into()
        .map_err(|_| AdapterError::Parse(format!("transaction hash {hex_hash:?} is not 32 bytes")))
}

pub(crate) fn decode_script(hex_script: &str) -> Result<Vec<u8>, AdapterError> {
    hex::decode(hex_script).map_err(|e| AdapterError::Parse(format!("locking script: {e}")))
}

/// Coerces value fields that arrive as either JSON numbers or decimal
/// strings, as explorer backends use both.
pub(crate) fn coerce_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// One request/parse cycle for the unspent output listing of `address`.
pub async fn fetch_unspent(
    api: &dyn ExplorerApi,
    address: &str,
    method: &str,
) -> Result<HashSet<Utxo>, AdapterError> {
    let url = api.address_url(address, method);
    debug!("requesting unspent outputs from {url}");

    let client = crate::http_client()?;
    let response = client.get(&url).send().await?;
    if !response.status().is_success() {
        return Err(AdapterError::http_status(response.status()));
    }

    let utxos = api.parse_utxos(&response.text().await?)?;
    info!("fetched {} unspent outputs from {}", utxos.len(), api.name());
    Ok(utxos)
}
