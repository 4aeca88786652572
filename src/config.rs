use crate::rates::table::TableFormat;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};
use tracing::debug;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EndpointConfig {
    pub base_url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TableEndpoint {
    pub url: String,
    pub format: TableFormat,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ExplorerConfig {
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProvidersConfig {
    /// Market API quoting `data.last_trade.price` per trading pair.
    pub market: Option<EndpointConfig>,
    /// Plain ticker API, one document per trading pair.
    pub ticker: Option<EndpointConfig>,
    /// Anchor→fiat table services, in fallback order.
    #[serde(default = "default_tables")]
    pub tables: Vec<TableEndpoint>,
    pub insight: Option<ExplorerConfig>,
    pub cryptoid: Option<ExplorerConfig>,
}

fn default_tables() -> Vec<TableEndpoint> {
    vec![
        TableEndpoint {
            url: "https://spreadsheets.google.com/feeds/list/0Av2v4lMxiJ1AdE9laEZJdzhmMzdmcGhvd3pCaC1CWEE/2/public/basic?alt=json".to_string(),
            format: TableFormat::Feed,
        },
        TableEndpoint {
            url: "https://api.exchangerate.host/latest?base=USD".to_string(),
            format: TableFormat::Map,
        },
        TableEndpoint {
            url: "https://open.er-api.com/v6/latest/USD".to_string(),
            format: TableFormat::Map,
        },
    ]
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        ProvidersConfig {
            market: Some(EndpointConfig {
                base_url: "https://api.cryptsy.com/api/v2/markets".to_string(),
            }),
            ticker: Some(EndpointConfig {
                base_url: "https://btc-e.com/api/2".to_string(),
            }),
            tables: default_tables(),
            insight: Some(ExplorerConfig {
                base_url: "https://insight.sexcoin.info/api".to_string(),
                api_key: String::new(),
            }),
            cryptoid: Some(ExplorerConfig {
                base_url: "https://chainz.cryptoid.info/sxc/api.dws".to_string(),
                api_key: String::new(),
            }),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub providers: ProvidersConfig,
    /// Ticker symbol of the coin whose rates are aggregated.
    #[serde(default = "default_coin_symbol")]
    pub coin_symbol: String,
    /// Currencies resolved through their own fallback chain; everything else
    /// is derived from the anchor.
    #[serde(default = "default_direct_currencies")]
    pub direct_currencies: Vec<String>,
    /// Currency whose resolved rate seeds cross-rate derivation.
    #[serde(default = "default_currency")]
    pub anchor_currency: String,
    /// Preferred currency of the local user, if known.
    #[serde(default)]
    pub locale_currency: Option<String>,
    /// Last-resort currency for rate lookups.
    #[serde(default = "default_currency")]
    pub default_currency: String,
    /// Minimum seconds between rate refresh attempts.
    #[serde(default = "default_refresh_secs")]
    pub refresh_interval_secs: u64,
}

fn default_coin_symbol() -> String {
    "SXC".to_string()
}

fn default_direct_currencies() -> Vec<String> {
    vec!["USD".to_string(), "EUR".to_string()]
}

fn default_currency() -> String {
    "USD".to_string()
}

fn default_refresh_secs() -> u64 {
    crate::rates::cache::DEFAULT_REFRESH_INTERVAL.as_secs()
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            providers: ProvidersConfig::default(),
            coin_symbol: default_coin_symbol(),
            direct_currencies: default_direct_currencies(),
            anchor_currency: default_currency(),
            locale_currency: None,
            default_currency: default_currency(),
            refresh_interval_secs: default_refresh_secs(),
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("io", "coinfeed", "coinfeed")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }
}
