//! Wallet asset controllers.
//!
//! Tracks the ERC-20 tokens and ERC-721 collectibles a wallet shows per
//! account and chain, detects holdings in the background, handles
//! site-initiated "watch asset" suggestions and keeps a native-to-fiat
//! exchange rate current.

pub mod abi;
pub mod address;
pub mod config;
pub mod contract;
pub mod contract_map;
pub mod currency_rate;
pub mod detection;
pub mod error;
#[cfg(feature = "http")]
pub mod http;
pub mod indexer;
pub mod metadata;
pub mod poll;
pub mod registry;
pub mod state;
pub mod suggestion;
pub mod types;

// Re-exports for convenience
pub use config::Config;
pub use currency_rate::{CurrencyRateController, CurrencyRateState, RateSource};
pub use detection::AssetDetection;
pub use error::Error;
pub use metadata::{MetadataResolver, MetadataSource};
pub use registry::AssetRegistry;
pub use state::{AssetsState, Selection};
pub use suggestion::{PendingSuggestion, SuggestionWorkflow};
pub use types::{Collectible, CollectibleContract, SuggestedAssetMeta, Token, WatchedAsset};

/// Every controller, wired to the HTTP-backed services.
#[cfg(feature = "http")]
#[derive(Debug, Clone)]
pub struct Controllers {
    pub registry: std::sync::Arc<AssetRegistry>,
    pub suggestions: std::sync::Arc<SuggestionWorkflow>,
    pub detection: std::sync::Arc<AssetDetection>,
    pub currency_rate: std::sync::Arc<CurrencyRateController>,
}

/// Build the controllers from configuration.
///
/// Metadata resolves through the indexer first and falls back to reading the
/// contract itself. Pollers are not started.
#[cfg(feature = "http")]
pub fn build(config: &Config) -> Result<Controllers, Error> {
    use std::sync::Arc;

    use contract::{ContractReader, HttpUriFetcher, RpcContractReader};
    use indexer::IndexerClient;
    use metadata::OnChainSource;

    config.validate()?;

    let indexer = Arc::new(IndexerClient::new(&config.indexer));
    let reader: Arc<dyn ContractReader> = Arc::new(RpcContractReader::new(&config.rpc));
    let mut on_chain = OnChainSource::new(reader.clone(), Arc::new(HttpUriFetcher::new(config.rpc.timeout)));
    if let Some(gateway) = &config.ipfs_gateway {
        on_chain = on_chain.with_ipfs_gateway(gateway.clone());
    }

    let resolver = MetadataResolver::new(vec![indexer.clone() as Arc<dyn MetadataSource>, Arc::new(on_chain)]);
    let registry = Arc::new(AssetRegistry::new(resolver));
    let rates = Arc::new(currency_rate::CryptoCompare::new(&config.currency_rate));

    Ok(Controllers {
        suggestions: Arc::new(SuggestionWorkflow::new(registry.clone())),
        detection: Arc::new(AssetDetection::new(registry.clone(), indexer, reader, &config.detection)),
        currency_rate: Arc::new(CurrencyRateController::new(rates, &config.currency_rate)),
        registry,
    })
}
