//! Wallet balance retrieval through a randomly selected explorer backend.

use crate::error::AdapterError;
use crate::explorers::{ExplorerApi, Utxo, fetch_unspent};
use rand::Rng;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Failure surfaced to the balance caller. These three kinds are the whole
/// outward surface; adapters cannot leak anything else through it.
#[derive(Debug, Error)]
pub enum BalanceError {
    #[error("http error {code}: {message}")]
    Http { code: u16, message: String },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("i/o error: {0}")]
    Network(String),
}

impl From<AdapterError> for BalanceError {
    fn from(err: AdapterError) -> Self {
        match err {
            AdapterError::Http { status, message } => BalanceError::Http {
                code: status,
                message,
            },
            AdapterError::Parse(detail) => BalanceError::Parse(detail),
            AdapterError::Io(detail) => BalanceError::Network(detail),
            // Explorer listings report "nothing unspent" as an empty set, so
            // a NoData here means the document was not what we expected.
            AdapterError::NoData(detail) => BalanceError::Parse(detail),
        }
    }
}

/// Fetches the unspent output set of an address through one of the
/// configured explorer backends.
///
/// Each request picks a single backend at random and reports its outcome
/// as-is; a failing backend is not retried against another one within the
/// same call.
pub struct BalanceFetcher {
    explorers: Vec<Arc<dyn ExplorerApi>>,
    method: String,
}

impl std::fmt::Debug for BalanceFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BalanceFetcher")
            .field("explorers", &self.explorers.len())
            .field("method", &self.method)
            .finish()
    }
}

impl BalanceFetcher {
    /// `method` is the listing-mode hint passed to backends that address
    /// resources by path; the empty string selects their default mode.
    pub fn new(explorers: Vec<Arc<dyn ExplorerApi>>, method: &str) -> anyhow::Result<Self> {
        anyhow::ensure!(
            !explorers.is_empty(),
            "at least one explorer backend is required"
        );
        Ok(Self {
            explorers,
            method: method.to_string(),
        })
    }

    /// Issues the request on the background runtime and returns the handle
    /// carrying its outcome. Await it from whatever context should observe
    /// the result; dropping it abandons the result without cancelling the
    /// request.
    pub fn request(&self, address: &str) -> JoinHandle<Result<HashSet<Utxo>, BalanceError>> {
        let index = rand::thread_rng().gen_range(0..self.explorers.len());
        let api = Arc::clone(&self.explorers[index]);
        let address = address.to_string();
        let method = self.method.clone();

        tokio::spawn(async move {
            debug!("requesting balance of {address} via {}", api.name());
            fetch_unspent(api.as_ref(), &address, &method)
                .await
                .map_err(|err| {
                    warn!("balance request via {} failed: {err}", api.name());
                    BalanceError::from(err)
                })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::explorers::{CryptoidApi, InsightApi};
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const ADDRESS: &str = "SNoVgGqsgdcgW2zZqxEqnmkkZBHwkg5mSA";

    fn insight_fetcher(base_url: &str) -> BalanceFetcher {
        BalanceFetcher::new(vec![Arc::new(InsightApi::new(base_url))], "utxo").unwrap()
    }

    #[test]
    fn test_empty_explorer_set_is_rejected() {
        assert!(BalanceFetcher::new(Vec::new(), "utxo").is_err());
    }

    #[tokio::test]
    async fn test_successful_fetch_delivers_utxo_set() {
        let mock_server = MockServer::start().await;
        let txid = "aa".repeat(32);
        let body = format!(
            r#"[{{"txid": "{txid}", "vout": 0, "scriptPubKey": "76a914", "satoshis": "100000", "height": 10}}]"#
        );
        Mock::given(method("GET"))
            .and(path(format!("/addr/{ADDRESS}/utxo")))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&mock_server)
            .await;

        let fetcher = insight_fetcher(&mock_server.uri());
        let utxos = fetcher.request(ADDRESS).await.unwrap().unwrap();
        assert_eq!(utxos.len(), 1);
        assert_eq!(utxos.iter().next().unwrap().value, 100000);
    }

    #[tokio::test]
    async fn test_http_failure_reports_status_and_message() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/addr/{ADDRESS}/utxo")))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let fetcher = insight_fetcher(&mock_server.uri());
        let err = fetcher.request(ADDRESS).await.unwrap().unwrap_err();
        match err {
            BalanceError::Http { code, message } => {
                assert_eq!(code, 500);
                assert_eq!(message, "Internal Server Error");
            }
            other => panic!("expected http error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unparseable_body_reports_parse_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/addr/{ADDRESS}/utxo")))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>busy</html>"))
            .mount(&mock_server)
            .await;

        let fetcher = insight_fetcher(&mock_server.uri());
        let err = fetcher.request(ADDRESS).await.unwrap().unwrap_err();
        assert!(matches!(err, BalanceError::Parse(_)));
    }

    #[tokio::test]
    async fn test_each_request_consults_exactly_one_backend() {
        let mock_server = MockServer::start().await;
        let insight_path = format!("/insight/addr/{ADDRESS}/utxo");
        Mock::given(method("GET"))
            .and(path(insight_path))
            .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/cryptoid/api.dws"))
            .and(query_param("q", "unspent"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"unspent_outputs": []}"#))
            .mount(&mock_server)
            .await;

        let fetcher = BalanceFetcher::new(
            vec![
                Arc::new(InsightApi::new(&format!("{}/insight", mock_server.uri()))),
                Arc::new(CryptoidApi::new(
                    &format!("{}/cryptoid/api.dws", mock_server.uri()),
                    "k3y",
                )),
            ],
            "utxo",
        )
        .unwrap();

        let rounds = 20;
        for _ in 0..rounds {
            let utxos = fetcher.request(ADDRESS).await.unwrap().unwrap();
            assert!(utxos.is_empty());
        }

        let received = mock_server.received_requests().await.unwrap();
        assert_eq!(received.len(), rounds);
    }
}
