use thiserror::Error;

use crate::types::SuggestedAssetMeta;

/// Unified error type for the wallet asset controllers.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("suggestion error: {0}")]
    Suggestion(#[from] SuggestionError),

    #[error("config error: {0}")]
    Config(String),
}

/// Errors while decoding ABI return data.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid function signature: {0}")]
    InvalidSignature(String),

    #[error("return data too short: expected at least {expected} bytes, got {actual}")]
    DataTooShort { expected: usize, actual: usize },

    #[error("invalid ABI encoding: {0}")]
    InvalidEncoding(String),

    #[error("unexpected value: expected {0}")]
    UnexpectedValue(&'static str),
}

/// Errors talking to an HTTP API or a JSON-RPC node.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("request to {url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error("request to {url} timed out after {secs}s")]
    Timeout { url: String, secs: u64 },

    #[error("could not parse response: {0}")]
    Parse(String),

    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Reasons a watch-asset payload is refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("must specify address, symbol, and decimals")]
    MissingFields,

    #[error("invalid address \"{0}\"")]
    InvalidAddress(String),

    #[error("invalid symbol \"{0}\": longer than 11 characters")]
    InvalidSymbol(String),

    #[error("invalid decimals \"{0}\": must be 0 <= 36")]
    InvalidDecimals(i64),

    #[error("malformed asset options: {0}")]
    Malformed(String),

    #[error("asset of type {0} not supported")]
    UnsupportedKind(String),
}

/// Outcomes of a watch-asset suggestion other than acceptance.
#[derive(Debug, Error)]
pub enum SuggestionError {
    /// The payload failed validation; the suggestion was recorded as failed.
    #[error("{source}")]
    Invalid {
        suggestion: Box<SuggestedAssetMeta>,
        source: ValidationError,
    },

    #[error("no pending suggestion with id {0}")]
    NotFound(String),

    #[error("user rejected to watch the asset")]
    Rejected,

    #[error("{0}")]
    Failed(String),

    #[error("suggestion {0} was dropped before it was resolved")]
    Dropped(String),
}
