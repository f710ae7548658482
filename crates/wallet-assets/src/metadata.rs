//! Collectible and contract metadata resolution.
//!
//! A [`MetadataResolver`] asks each configured [`MetadataSource`] in order and
//! stops at the first non-empty answer. Source errors are logged and skipped;
//! if every source misses the resolver returns empty metadata.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use num_bigint::BigUint;
use tracing::debug;

use crate::contract::{ContractReader, UriFetcher};
use crate::error::{Error, FetchError};
use crate::types::{CollectibleInfo, ContractInfo};

/// One place metadata can come from (indexer API, chain, static table...).
#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// Short label used in logs.
    fn label(&self) -> &'static str;

    async fn collectible_info(&self, address: &str, token_id: &BigUint) -> Result<CollectibleInfo, Error>;

    async fn contract_info(&self, address: &str) -> Result<ContractInfo, Error>;
}

/// Ordered chain of metadata sources.
#[derive(Clone, Default)]
pub struct MetadataResolver {
    sources: Vec<Arc<dyn MetadataSource>>,
}

impl MetadataResolver {
    pub fn new(sources: Vec<Arc<dyn MetadataSource>>) -> Self {
        Self { sources }
    }

    /// Append a lower-priority source.
    pub fn with_source(mut self, source: Arc<dyn MetadataSource>) -> Self {
        self.sources.push(source);
        self
    }

    /// Resolve collectible metadata. Never fails; total misses yield empty info.
    pub async fn resolve_collectible_info(&self, address: &str, token_id: &BigUint) -> CollectibleInfo {
        for source in &self.sources {
            match source.collectible_info(address, token_id).await {
                Ok(info) if !info.is_empty() => return info,
                Ok(_) => debug!(source = source.label(), %address, %token_id, "empty collectible metadata"),
                Err(err) => debug!(source = source.label(), %address, %token_id, %err, "collectible metadata lookup failed"),
            }
        }
        CollectibleInfo::default()
    }

    /// Resolve contract metadata. Never fails; total misses yield empty info.
    pub async fn resolve_contract_info(&self, address: &str) -> ContractInfo {
        for source in &self.sources {
            match source.contract_info(address).await {
                Ok(info) if !info.is_empty() => return info,
                Ok(_) => debug!(source = source.label(), %address, "empty contract metadata"),
                Err(err) => debug!(source = source.label(), %address, %err, "contract metadata lookup failed"),
            }
        }
        ContractInfo::default()
    }
}

impl std::fmt::Debug for MetadataResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.sources.iter().map(|s| s.label()))
            .finish()
    }
}

/// Metadata read straight from the contract: `name()`/`symbol()` for the
/// contract and the JSON document behind `tokenURI(id)` for a collectible.
pub struct OnChainSource {
    reader: Arc<dyn ContractReader>,
    fetcher: Arc<dyn UriFetcher>,
    ipfs_gateway: Option<String>,
}

impl OnChainSource {
    pub fn new(reader: Arc<dyn ContractReader>, fetcher: Arc<dyn UriFetcher>) -> Self {
        Self {
            reader,
            fetcher,
            ipfs_gateway: None,
        }
    }

    /// Rewrite `ipfs://` token URIs through this HTTP gateway.
    pub fn with_ipfs_gateway(mut self, gateway: impl Into<String>) -> Self {
        self.ipfs_gateway = Some(gateway.into());
        self
    }

    fn fetchable_uri(&self, uri: &str) -> String {
        match (uri.strip_prefix("ipfs://"), &self.ipfs_gateway) {
            (Some(path), Some(gateway)) => {
                let path = path.strip_prefix("ipfs/").unwrap_or(path);
                format!("{}/{}", gateway.trim_end_matches('/'), path)
            }
            _ => uri.to_string(),
        }
    }
}

#[async_trait]
impl MetadataSource for OnChainSource {
    fn label(&self) -> &'static str {
        "on-chain"
    }

    async fn collectible_info(&self, address: &str, token_id: &BigUint) -> Result<CollectibleInfo, Error> {
        let uri = self.reader.token_uri(address, token_id).await?;
        let document = self.fetcher.fetch_json(&self.fetchable_uri(&uri)).await?;
        let object = document
            .as_object()
            .ok_or_else(|| FetchError::InvalidResponse("token metadata is not an object".to_string()))?;

        let field = |key: &str| object.get(key).and_then(|v| v.as_str()).map(str::to_string);
        Ok(CollectibleInfo {
            name: field("name"),
            image: field("image").or_else(|| field("image_url")),
            description: None,
        })
    }

    async fn contract_info(&self, address: &str) -> Result<ContractInfo, Error> {
        let name = self.reader.name(address).await;
        let symbol = self.reader.symbol(address).await;
        if let (Err(err), Err(_)) = (&name, &symbol) {
            return Err(FetchError::InvalidResponse(format!("no name or symbol for {address}: {err}")).into());
        }
        Ok(ContractInfo {
            name: name.ok(),
            symbol: symbol.ok(),
            ..Default::default()
        })
    }
}

/// In-memory metadata source for testing.
#[derive(Debug, Default)]
pub struct StaticMetadataSource {
    collectibles: HashMap<(String, BigUint), CollectibleInfo>,
    contracts: HashMap<String, ContractInfo>,
}

impl StaticMetadataSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_collectible(&mut self, address: &str, token_id: BigUint, info: CollectibleInfo) {
        self.collectibles.insert((address.to_lowercase(), token_id), info);
    }

    pub fn insert_contract(&mut self, address: &str, info: ContractInfo) {
        self.contracts.insert(address.to_lowercase(), info);
    }
}

#[async_trait]
impl MetadataSource for StaticMetadataSource {
    fn label(&self) -> &'static str {
        "static"
    }

    async fn collectible_info(&self, address: &str, token_id: &BigUint) -> Result<CollectibleInfo, Error> {
        Ok(self
            .collectibles
            .get(&(address.to_lowercase(), token_id.clone()))
            .cloned()
            .unwrap_or_default())
    }

    async fn contract_info(&self, address: &str) -> Result<ContractInfo, Error> {
        Ok(self
            .contracts
            .get(&address.to_lowercase())
            .cloned()
            .unwrap_or_default())
    }
}
