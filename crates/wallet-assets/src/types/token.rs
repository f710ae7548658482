use serde::{Deserialize, Serialize};

/// A fungible token tracked for one account on one chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// Checksummed contract address.
    pub address: String,

    pub symbol: String,

    pub decimals: u8,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl Token {
    pub fn new(address: impl Into<String>, symbol: impl Into<String>, decimals: u8) -> Self {
        Self {
            address: address.into(),
            symbol: symbol.into(),
            decimals,
            image: None,
        }
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }
}
