use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

/// Metadata for one collectible, as resolved from the indexer or the token URI.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectibleInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl CollectibleInfo {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.image.is_none() && self.description.is_none()
    }
}

/// Metadata for a collectible contract.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,

    /// Image URL of the collection.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Decimal string; supplies can exceed any fixed-width integer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_supply: Option<String>,
}

impl ContractInfo {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.symbol.is_none()
            && self.logo.is_none()
            && self.description.is_none()
            && self.total_supply.is_none()
    }
}

/// A collectible contract tracked for one account on one chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectibleContract {
    /// Checksummed contract address.
    pub address: String,

    #[serde(flatten)]
    pub info: ContractInfo,
}

impl CollectibleContract {
    pub fn new(address: impl Into<String>, info: ContractInfo) -> Self {
        Self {
            address: address.into(),
            info,
        }
    }
}

/// A single collectible, unique by `(address, token_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collectible {
    /// Checksummed contract address.
    pub address: String,

    #[serde(with = "decimal_string")]
    pub token_id: BigUint,

    #[serde(flatten)]
    pub info: CollectibleInfo,
}

impl Collectible {
    pub fn new(address: impl Into<String>, token_id: BigUint, info: CollectibleInfo) -> Self {
        Self {
            address: address.into(),
            token_id,
            info,
        }
    }

    pub fn matches(&self, address: &str, token_id: &BigUint) -> bool {
        self.address == address && &self.token_id == token_id
    }
}

/// Token ids travel as decimal strings, the way indexers return them.
mod decimal_string {
    use num_bigint::BigUint;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(id: &BigUint, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(id)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BigUint, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}
