use std::env;
use std::time::Duration;

use serde::Deserialize;

use crate::address::is_valid_address;
use crate::error::Error;

/// Default polling interval shared by the detection and currency pollers.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(180);

/// Default timeout for every outbound request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Chain id on which detection runs.
pub const MAINNET_CHAIN_ID: u64 = 1;

/// Deployed balance-checker contract on mainnet.
pub const BALANCE_CHECKER_ADDRESS: &str = "0xb1f8e55c7f64d203c1400b9d8555d050f94adf39";

/// Indexing-service settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IndexerConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    #[serde(with = "secs")]
    pub timeout: Duration,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.opensea.io/api/v1".to_string(),
            api_key: None,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// JSON-RPC node settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RpcConfig {
    pub url: String,
    pub balance_checker_address: String,
    #[serde(with = "secs")]
    pub timeout: Duration,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8545".to_string(),
            balance_checker_address: BALANCE_CHECKER_ADDRESS.to_string(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// Detection poller settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    #[serde(with = "secs")]
    pub interval: Duration,
    /// Detection only runs while this chain is selected.
    pub primary_chain_id: u64,
    pub disabled: bool,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            primary_chain_id: MAINNET_CHAIN_ID,
            disabled: false,
        }
    }
}

/// Currency rate poller settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CurrencyRateConfig {
    #[serde(with = "secs")]
    pub interval: Duration,
    pub current_currency: String,
    pub native_currency: String,
    pub include_usd_rate: bool,
    pub disabled: bool,
    pub price_api_url: String,
    #[serde(with = "secs")]
    pub timeout: Duration,
}

impl Default for CurrencyRateConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            current_currency: "usd".to_string(),
            native_currency: "ETH".to_string(),
            include_usd_rate: false,
            disabled: false,
            price_api_url: "https://min-api.cryptocompare.com/data/price".to_string(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// Configuration for every controller in the crate.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub indexer: IndexerConfig,
    pub rpc: RpcConfig,
    pub detection: DetectionConfig,
    pub currency_rate: CurrencyRateConfig,
    pub ipfs_gateway: Option<String>,
}

impl Config {
    /// Defaults overridden by `WALLET_ASSETS_*` environment variables.
    pub fn from_env() -> Result<Self, Error> {
        let mut config = Config::default();

        if let Ok(url) = env::var("WALLET_ASSETS_INDEXER_URL") {
            config.indexer.base_url = url;
        }
        config.indexer.api_key = env::var("WALLET_ASSETS_INDEXER_API_KEY").ok();
        if let Ok(url) = env::var("WALLET_ASSETS_RPC_URL") {
            config.rpc.url = url;
        }
        if let Ok(addr) = env::var("WALLET_ASSETS_BALANCE_CHECKER") {
            config.rpc.balance_checker_address = addr;
        }
        if let Some(secs) = env_parse::<u64>("WALLET_ASSETS_DETECTION_INTERVAL_SECS")? {
            config.detection.interval = Duration::from_secs(secs);
        }
        if let Some(chain_id) = env_parse::<u64>("WALLET_ASSETS_PRIMARY_CHAIN_ID")? {
            config.detection.primary_chain_id = chain_id;
        }
        if let Some(disabled) = env_parse::<bool>("WALLET_ASSETS_DETECTION_DISABLED")? {
            config.detection.disabled = disabled;
        }
        if let Some(secs) = env_parse::<u64>("WALLET_ASSETS_RATE_INTERVAL_SECS")? {
            config.currency_rate.interval = Duration::from_secs(secs);
        }
        if let Ok(currency) = env::var("WALLET_ASSETS_CURRENCY") {
            config.currency_rate.current_currency = currency;
        }
        if let Ok(native) = env::var("WALLET_ASSETS_NATIVE_CURRENCY") {
            config.currency_rate.native_currency = native;
        }
        if let Some(include) = env_parse::<bool>("WALLET_ASSETS_INCLUDE_USD_RATE")? {
            config.currency_rate.include_usd_rate = include;
        }
        if let Ok(url) = env::var("WALLET_ASSETS_PRICE_API_URL") {
            config.currency_rate.price_api_url = url;
        }
        config.ipfs_gateway = env::var("WALLET_ASSETS_IPFS_GATEWAY").ok();

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.indexer.base_url.trim().is_empty() {
            return Err(Error::Config("indexer base_url is empty".to_string()));
        }
        if self.rpc.url.trim().is_empty() {
            return Err(Error::Config("rpc url is empty".to_string()));
        }
        if !is_valid_address(&self.rpc.balance_checker_address) {
            return Err(Error::Config(format!(
                "invalid balance checker address {}",
                self.rpc.balance_checker_address
            )));
        }
        if self.currency_rate.price_api_url.trim().is_empty() {
            return Err(Error::Config("price_api_url is empty".to_string()));
        }
        if self.detection.interval.is_zero() || self.currency_rate.interval.is_zero() {
            return Err(Error::Config("poll intervals must be > 0".to_string()));
        }
        if self.indexer.api_key.is_none() {
            tracing::warn!("No indexer API key configured; requests may be rate limited");
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>, Error> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| Error::Config(format!("{key} has an invalid value: {raw}"))),
        Err(_) => Ok(None),
    }
}

/// Durations are written as whole seconds in config files.
mod secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
