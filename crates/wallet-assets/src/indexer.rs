//! Collectible indexing service.
//!
//! Endpoints (relative to the configured base URL):
//! - `GET /asset/{contract}/{token_id}` → collectible metadata
//! - `GET /asset_contract/{contract}` → contract metadata
//! - `GET /assets?owner={address}&limit=300` → collectibles held by an account

use async_trait::async_trait;
use num_bigint::BigUint;
use serde::Deserialize;
use tracing::warn;

use crate::address::to_checksum_address;
use crate::error::Error;
use crate::types::{CollectibleInfo, ContractInfo};

/// Maximum page size the owned-assets endpoint accepts.
pub const OWNED_ASSETS_LIMIT: usize = 300;

/// Header carrying the indexer API key.
pub const API_KEY_HEADER: &str = "X-API-KEY";

/// A collectible the indexer reports as held by an account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedCollectible {
    /// Checksummed contract address.
    pub address: String,
    pub token_id: BigUint,
    pub info: CollectibleInfo,
}

/// Lists the collectibles an account holds.
#[async_trait]
pub trait CollectibleIndex: Send + Sync {
    async fn owned_collectibles(&self, owner: &str) -> Result<Vec<OwnedCollectible>, Error>;
}

#[derive(Debug, Deserialize)]
struct ApiAsset {
    token_id: serde_json::Value,
    #[serde(default)]
    image_original_url: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    asset_contract: ApiAssetContractRef,
}

#[derive(Debug, Deserialize)]
struct ApiAssetContractRef {
    address: String,
}

#[derive(Debug, Deserialize)]
struct ApiAssetsResponse {
    #[serde(default)]
    assets: Vec<ApiAsset>,
}

#[derive(Debug, Deserialize)]
struct ApiCollectible {
    #[serde(default)]
    image_original_url: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiContract {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    symbol: Option<String>,
    #[serde(default)]
    image_url: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    total_supply: Option<serde_json::Value>,
}

impl From<ApiCollectible> for CollectibleInfo {
    fn from(api: ApiCollectible) -> Self {
        CollectibleInfo {
            name: api.name,
            image: api.image_original_url,
            description: api.description,
        }
    }
}

impl From<ApiContract> for ContractInfo {
    fn from(api: ApiContract) -> Self {
        ContractInfo {
            name: api.name,
            symbol: api.symbol,
            logo: api.image_url,
            description: api.description,
            total_supply: api.total_supply.as_ref().and_then(decimal_value),
        }
    }
}

/// Numbers and numeric strings both appear in indexer payloads.
fn decimal_value(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn into_owned(response: ApiAssetsResponse) -> Vec<OwnedCollectible> {
    response
        .assets
        .into_iter()
        .filter_map(|asset| {
            let token_id = decimal_value(&asset.token_id).and_then(|s| s.parse::<BigUint>().ok());
            let address = to_checksum_address(&asset.asset_contract.address).ok();
            match (address, token_id) {
                (Some(address), Some(token_id)) => Some(OwnedCollectible {
                    address,
                    token_id,
                    info: CollectibleInfo {
                        name: asset.name,
                        image: asset.image_original_url,
                        description: asset.description,
                    },
                }),
                _ => {
                    warn!(
                        contract = %asset.asset_contract.address,
                        token_id = %asset.token_id,
                        "Skipping malformed indexer asset"
                    );
                    None
                }
            }
        })
        .collect()
}

#[cfg(feature = "http")]
pub use client::IndexerClient;

#[cfg(feature = "http")]
mod client {
    use std::time::Duration;

    use async_trait::async_trait;
    use num_bigint::BigUint;

    use super::{
        into_owned, ApiAssetsResponse, ApiCollectible, ApiContract, CollectibleIndex, OwnedCollectible,
        API_KEY_HEADER, OWNED_ASSETS_LIMIT,
    };
    use crate::config::IndexerConfig;
    use crate::error::Error;
    use crate::http;
    use crate::metadata::MetadataSource;
    use crate::types::{CollectibleInfo, ContractInfo};

    /// HTTP client for the indexing service.
    #[derive(Debug, Clone)]
    pub struct IndexerClient {
        client: reqwest::Client,
        base_url: String,
        api_key: Option<String>,
        timeout: Duration,
    }

    impl IndexerClient {
        pub fn new(config: &IndexerConfig) -> Self {
            Self {
                client: reqwest::Client::new(),
                base_url: config.base_url.trim_end_matches('/').to_string(),
                api_key: config.api_key.clone(),
                timeout: config.timeout,
            }
        }

        async fn get<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
            let url = format!("{}{}", self.base_url, path);
            let headers: Vec<(&str, &str)> = self
                .api_key
                .as_deref()
                .map(|key| (API_KEY_HEADER, key))
                .into_iter()
                .collect();
            Ok(http::get_json(&self.client, &url, &headers, self.timeout).await?)
        }
    }

    #[async_trait]
    impl MetadataSource for IndexerClient {
        fn label(&self) -> &'static str {
            "indexer"
        }

        async fn collectible_info(&self, address: &str, token_id: &BigUint) -> Result<CollectibleInfo, Error> {
            let api: ApiCollectible = self.get(&format!("/asset/{address}/{token_id}")).await?;
            Ok(api.into())
        }

        async fn contract_info(&self, address: &str) -> Result<ContractInfo, Error> {
            let api: ApiContract = self.get(&format!("/asset_contract/{address}")).await?;
            Ok(api.into())
        }
    }

    #[async_trait]
    impl CollectibleIndex for IndexerClient {
        async fn owned_collectibles(&self, owner: &str) -> Result<Vec<OwnedCollectible>, Error> {
            let response: ApiAssetsResponse = self
                .get(&format!("/assets?owner={owner}&limit={OWNED_ASSETS_LIMIT}"))
                .await?;
            Ok(into_owned(response))
        }
    }
}
