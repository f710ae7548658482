//! Read-only contract access.
//!
//! [`ContractReader`] is the seam between the controllers and the chain; the
//! JSON-RPC implementation encodes calls with [`crate::abi`] and sends them as
//! `eth_call` against the latest block.

use std::collections::HashMap;

use async_trait::async_trait;
use num_bigint::BigUint;

use crate::abi::AbiValue;
use crate::address::to_checksum_address;
use crate::error::{DecodeError, Error};

/// On-chain reads used for metadata fallback and token detection.
#[async_trait]
pub trait ContractReader: Send + Sync {
    async fn name(&self, contract: &str) -> Result<String, Error>;

    async fn symbol(&self, contract: &str) -> Result<String, Error>;

    /// ERC-721 `tokenURI(tokenId)`.
    async fn token_uri(&self, contract: &str, token_id: &BigUint) -> Result<String, Error>;

    async fn balance_of(&self, contract: &str, owner: &str) -> Result<BigUint, Error>;

    /// Balances of `owner` for every token in `tokens`, in one balance-checker call.
    ///
    /// Keys are checksummed token addresses; zero balances are omitted.
    async fn balances_in_single_call(
        &self,
        owner: &str,
        tokens: &[String],
    ) -> Result<HashMap<String, BigUint>, Error>;
}

/// Fetches the JSON document a token URI points at.
#[async_trait]
pub trait UriFetcher: Send + Sync {
    async fn fetch_json(&self, uri: &str) -> Result<serde_json::Value, Error>;
}

/// Pair the balance checker's flat result with the queried token list.
fn nonzero_balances(
    tokens: &[String],
    values: Vec<AbiValue>,
) -> Result<HashMap<String, BigUint>, Error> {
    if values.len() != tokens.len() {
        return Err(DecodeError::InvalidEncoding(format!(
            "balance checker returned {} balances for {} tokens",
            values.len(),
            tokens.len()
        ))
        .into());
    }

    let mut balances = HashMap::new();
    for (token, value) in tokens.iter().zip(values) {
        let balance = value.into_uint()?;
        if balance != BigUint::ZERO {
            balances.insert(to_checksum_address(token)?, balance);
        }
    }
    Ok(balances)
}

#[cfg(feature = "http")]
pub use rpc::{HttpUriFetcher, RpcContractReader};

#[cfg(feature = "http")]
mod rpc {
    use std::collections::HashMap;
    use std::time::Duration;

    use async_trait::async_trait;
    use num_bigint::BigUint;
    use serde::Deserialize;
    use tracing::debug;

    use super::{nonzero_balances, ContractReader, UriFetcher};
    use crate::abi::{self, AbiValue};
    use crate::address::parse_address;
    use crate::config::RpcConfig;
    use crate::error::{DecodeError, Error, FetchError};
    use crate::http;

    #[derive(Debug, Deserialize)]
    struct RpcResponse {
        result: Option<String>,
        error: Option<RpcErrorBody>,
    }

    #[derive(Debug, Deserialize)]
    struct RpcErrorBody {
        code: i64,
        message: String,
    }

    /// [`ContractReader`] backed by a JSON-RPC node.
    #[derive(Debug, Clone)]
    pub struct RpcContractReader {
        client: reqwest::Client,
        rpc_url: String,
        balance_checker: String,
        timeout: Duration,
    }

    impl RpcContractReader {
        pub fn new(config: &RpcConfig) -> Self {
            Self {
                client: reqwest::Client::new(),
                rpc_url: config.url.clone(),
                balance_checker: config.balance_checker_address.clone(),
                timeout: config.timeout,
            }
        }

        async fn eth_call(&self, to: &str, data: Vec<u8>) -> Result<Vec<u8>, Error> {
            let body = serde_json::json!({
                "jsonrpc": "2.0",
                "id": 1,
                "method": "eth_call",
                "params": [{ "to": to, "data": format!("0x{}", hex::encode(data)) }, "latest"],
            });
            let response: RpcResponse =
                http::post_json(&self.client, &self.rpc_url, &body, self.timeout).await?;

            if let Some(err) = response.error {
                return Err(FetchError::Rpc {
                    code: err.code,
                    message: err.message,
                }
                .into());
            }
            let result = response
                .result
                .ok_or_else(|| FetchError::InvalidResponse("eth_call returned no result".to_string()))?;
            hex::decode(result.trim_start_matches("0x"))
                .map_err(|e| FetchError::InvalidResponse(format!("non-hex eth_call result: {e}")).into())
        }

        async fn call(
            &self,
            contract: &str,
            signature: &str,
            args: &[AbiValue],
            outputs: &str,
        ) -> Result<AbiValue, Error> {
            let sig = abi::parse_signature(signature)?;
            let data = abi::encode_call(&sig, args)?;
            let raw = self.eth_call(contract, data).await?;
            debug!(%contract, method = %sig.canonical, len = raw.len(), "eth_call");

            abi::decode_output(&abi::parse_param_list(outputs)?, &raw)?
                .into_iter()
                .next()
                .ok_or_else(|| DecodeError::UnexpectedValue("one return value").into())
        }
    }

    #[async_trait]
    impl ContractReader for RpcContractReader {
        async fn name(&self, contract: &str) -> Result<String, Error> {
            Ok(self.call(contract, "name()", &[], "string").await?.into_string()?)
        }

        async fn symbol(&self, contract: &str) -> Result<String, Error> {
            Ok(self.call(contract, "symbol()", &[], "string").await?.into_string()?)
        }

        async fn token_uri(&self, contract: &str, token_id: &BigUint) -> Result<String, Error> {
            let args = [AbiValue::Uint(token_id.clone())];
            Ok(self
                .call(contract, "tokenURI(uint256)", &args, "string")
                .await?
                .into_string()?)
        }

        async fn balance_of(&self, contract: &str, owner: &str) -> Result<BigUint, Error> {
            let args = [AbiValue::Address(parse_address(owner)?)];
            Ok(self
                .call(contract, "balanceOf(address)", &args, "uint256")
                .await?
                .into_uint()?)
        }

        async fn balances_in_single_call(
            &self,
            owner: &str,
            tokens: &[String],
        ) -> Result<HashMap<String, BigUint>, Error> {
            if tokens.is_empty() {
                return Ok(HashMap::new());
            }

            let token_args = tokens
                .iter()
                .map(|t| parse_address(t).map(AbiValue::Address))
                .collect::<Result<Vec<_>, _>>()?;
            let args = [
                AbiValue::Array(vec![AbiValue::Address(parse_address(owner)?)]),
                AbiValue::Array(token_args),
            ];
            let values = self
                .call(&self.balance_checker, "balances(address[],address[])", &args, "uint256[]")
                .await?
                .into_array()?;
            nonzero_balances(tokens, values)
        }
    }

    /// [`UriFetcher`] over plain HTTP(S).
    #[derive(Debug, Clone)]
    pub struct HttpUriFetcher {
        client: reqwest::Client,
        timeout: Duration,
    }

    impl HttpUriFetcher {
        pub fn new(timeout: Duration) -> Self {
            Self {
                client: reqwest::Client::new(),
                timeout,
            }
        }
    }

    #[async_trait]
    impl UriFetcher for HttpUriFetcher {
        async fn fetch_json(&self, uri: &str) -> Result<serde_json::Value, Error> {
            Ok(http::get_json(&self.client, uri, &[], self.timeout).await?)
        }
    }
}
