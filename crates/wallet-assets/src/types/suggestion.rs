use serde::{Deserialize, Serialize};

use crate::address::is_valid_address;
use crate::error::ValidationError;

const MAX_SYMBOL_LENGTH: usize = 11;
const MAX_DECIMALS: i64 = 36;

/// ERC-20 payload of a watch-asset request.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Erc20Asset {
    #[serde(default)]
    pub address: String,

    #[serde(default)]
    pub symbol: String,

    /// Sites send this as a number or a numeric string.
    #[serde(default, deserialize_with = "lenient_decimals")]
    pub decimals: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl Erc20Asset {
    fn validate(&self) -> Result<(), ValidationError> {
        let decimals = match self.decimals {
            Some(d) if !self.address.is_empty() && !self.symbol.is_empty() => d,
            _ => return Err(ValidationError::MissingFields),
        };
        if self.symbol.chars().count() > MAX_SYMBOL_LENGTH {
            return Err(ValidationError::InvalidSymbol(self.symbol.clone()));
        }
        if !(0..=MAX_DECIMALS).contains(&decimals) {
            return Err(ValidationError::InvalidDecimals(decimals));
        }
        if !is_valid_address(&self.address) {
            return Err(ValidationError::InvalidAddress(self.address.clone()));
        }
        Ok(())
    }
}

fn lenient_decimals<'de, D: serde::Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(i64),
        Text(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Number(n)) => Ok(Some(n)),
        Some(Raw::Text(text)) if text.trim().is_empty() => Ok(None),
        Some(Raw::Text(text)) => text
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("decimals \"{text}\" is not an integer"))),
    }
}

/// An asset a site asks the user to watch, tagged by kind.
///
/// Serialized in the `watchAsset` request shape:
/// `{ "type": "ERC20", "options": { "address": ..., "symbol": ..., "decimals": ... } }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "options")]
pub enum WatchedAsset {
    #[serde(rename = "ERC20")]
    Erc20(Erc20Asset),
}

impl WatchedAsset {
    /// Build from a string-tagged request, refusing kinds this wallet cannot track.
    pub fn from_request(kind: &str, options: serde_json::Value) -> Result<Self, ValidationError> {
        match kind {
            "ERC20" => serde_json::from_value(options)
                .map(WatchedAsset::Erc20)
                .map_err(|err| ValidationError::Malformed(err.to_string())),
            other => Err(ValidationError::UnsupportedKind(other.to_string())),
        }
    }

    /// The request tag for this kind.
    pub fn kind(&self) -> &'static str {
        match self {
            WatchedAsset::Erc20(_) => "ERC20",
        }
    }

    pub fn address(&self) -> &str {
        match self {
            WatchedAsset::Erc20(asset) => &asset.address,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            WatchedAsset::Erc20(asset) => asset.validate(),
        }
    }
}

/// Lifecycle of a suggestion. Every state other than `Pending` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionStatus {
    Pending,
    Accepted,
    Rejected,
    Failed,
}

impl SuggestionStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, SuggestionStatus::Pending)
    }
}

/// A watch-asset request awaiting (or past) user confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestedAssetMeta {
    pub id: String,

    /// Creation time in unix milliseconds.
    pub time: i64,

    #[serde(flatten)]
    pub asset: WatchedAsset,

    pub status: SuggestionStatus,

    /// Present iff `status` is `Failed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SuggestedAssetMeta {
    pub fn new(id: String, time: i64, asset: WatchedAsset) -> Self {
        Self {
            id,
            time,
            asset,
            status: SuggestionStatus::Pending,
            error: None,
        }
    }

    /// Move a pending suggestion to a terminal state. Returns false if it was already terminal.
    pub fn settle(&mut self, status: SuggestionStatus, error: Option<String>) -> bool {
        if self.status.is_terminal() || !status.is_terminal() {
            return false;
        }
        self.status = status;
        self.error = if status == SuggestionStatus::Failed { error } else { None };
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn erc20(address: &str, symbol: &str, decimals: Option<i64>) -> WatchedAsset {
        WatchedAsset::Erc20(Erc20Asset {
            address: address.to_string(),
            symbol: symbol.to_string(),
            decimals,
            image: None,
        })
    }

    const DAI: &str = "0x6B175474E89094C44Da98b954EedeAC495271d0F";

    #[test]
    fn test_validate_ok() {
        assert!(erc20(DAI, "DAI", Some(18)).validate().is_ok());
        assert!(erc20(DAI, "ABCDEFGHIJK", Some(0)).validate().is_ok());
        assert!(erc20(DAI, "DAI", Some(36)).validate().is_ok());
    }

    #[test]
    fn test_validate_errors() {
        assert_eq!(erc20("", "DAI", Some(18)).validate(), Err(ValidationError::MissingFields));
        assert_eq!(erc20(DAI, "", Some(18)).validate(), Err(ValidationError::MissingFields));
        assert_eq!(erc20(DAI, "DAI", None).validate(), Err(ValidationError::MissingFields));
        assert_eq!(
            erc20(DAI, "ABCDEFGHIJKL", Some(18)).validate(),
            Err(ValidationError::InvalidSymbol("ABCDEFGHIJKL".to_string()))
        );
        assert_eq!(
            erc20(DAI, "DAI", Some(37)).validate(),
            Err(ValidationError::InvalidDecimals(37))
        );
        assert_eq!(
            erc20("0x1234", "DAI", Some(18)).validate(),
            Err(ValidationError::InvalidAddress("0x1234".to_string()))
        );
    }

    #[test]
    fn test_request_shape() {
        let asset: WatchedAsset = serde_json::from_value(serde_json::json!({
            "type": "ERC20",
            "options": { "address": DAI, "symbol": "DAI", "decimals": 18, "image": "https://dai.png" }
        }))
        .unwrap();
        assert_eq!(asset.kind(), "ERC20");
        assert_eq!(asset.address(), DAI);

        let from_tag = WatchedAsset::from_request(
            "ERC20",
            serde_json::json!({ "address": DAI, "symbol": "DAI", "decimals": 18, "image": "https://dai.png" }),
        )
        .unwrap();
        assert_eq!(from_tag, asset);

        assert_eq!(
            WatchedAsset::from_request("ERC721", serde_json::json!({})),
            Err(ValidationError::UnsupportedKind("ERC721".to_string()))
        );
    }

    #[test]
    fn test_decimals_as_string_or_negative() {
        let asset = WatchedAsset::from_request(
            "ERC20",
            serde_json::json!({ "address": DAI, "symbol": "DAI", "decimals": "18" }),
        )
        .unwrap();
        assert_eq!(asset, erc20(DAI, "DAI", Some(18)));
        assert!(asset.validate().is_ok());

        let negative = WatchedAsset::from_request(
            "ERC20",
            serde_json::json!({ "address": DAI, "symbol": "DAI", "decimals": -1 }),
        )
        .unwrap();
        assert_eq!(negative.validate(), Err(ValidationError::InvalidDecimals(-1)));

        let missing = WatchedAsset::from_request("ERC20", serde_json::json!({ "address": DAI, "symbol": "DAI" }))
            .unwrap();
        assert_eq!(missing.validate(), Err(ValidationError::MissingFields));

        assert!(matches!(
            WatchedAsset::from_request(
                "ERC20",
                serde_json::json!({ "address": DAI, "symbol": "DAI", "decimals": "eighteen" }),
            ),
            Err(ValidationError::Malformed(_))
        ));
    }

    #[test]
    fn test_settle_is_terminal() {
        let mut meta = SuggestedAssetMeta::new("a".to_string(), 0, erc20(DAI, "DAI", Some(18)));
        assert!(!meta.settle(SuggestionStatus::Pending, None));
        assert!(meta.settle(SuggestionStatus::Failed, Some("boom".to_string())));
        assert_eq!(meta.error.as_deref(), Some("boom"));
        assert!(!meta.settle(SuggestionStatus::Accepted, None));
        assert_eq!(meta.status, SuggestionStatus::Failed);
    }
}
