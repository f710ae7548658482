//! Just enough Solidity ABI to talk to token contracts and the balance checker.
//!
//! Calls are described by a signature string such as `"balanceOf(address)"`;
//! arguments are encoded with [`encode_call`] and results decoded with
//! [`decode_output`].

use num_bigint::BigUint;
use tiny_keccak::{Hasher, Keccak};

use crate::error::DecodeError;

/// Parsed function signature.
#[derive(Debug, Clone)]
pub struct FunctionSignature {
    pub name: String,
    pub params: Vec<ParamType>,
    pub canonical: String,
    pub selector: [u8; 4],
}

/// ABI parameter types used by the controllers' contract reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamType {
    Address,
    Uint(usize),
    String,
    Array(Box<ParamType>),
}

impl ParamType {
    /// Whether this type is dynamically-sized in ABI encoding.
    pub fn is_dynamic(&self) -> bool {
        matches!(self, ParamType::String | ParamType::Array(_))
    }
}

/// An ABI value, used for both call arguments and decoded results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbiValue {
    Address([u8; 20]),
    Uint(BigUint),
    String(String),
    Array(Vec<AbiValue>),
}

impl AbiValue {
    fn is_dynamic(&self) -> bool {
        matches!(self, AbiValue::String(_) | AbiValue::Array(_))
    }

    pub fn into_uint(self) -> Result<BigUint, DecodeError> {
        match self {
            AbiValue::Uint(v) => Ok(v),
            _ => Err(DecodeError::UnexpectedValue("uint")),
        }
    }

    pub fn into_string(self) -> Result<String, DecodeError> {
        match self {
            AbiValue::String(s) => Ok(s),
            _ => Err(DecodeError::UnexpectedValue("string")),
        }
    }

    pub fn into_array(self) -> Result<Vec<AbiValue>, DecodeError> {
        match self {
            AbiValue::Array(items) => Ok(items),
            _ => Err(DecodeError::UnexpectedValue("array")),
        }
    }
}

/// Parse a function signature string into a `FunctionSignature`.
///
/// Example: `"balances(address[],address[])"` → name="balances", params=[Array(Address), Array(Address)]
pub fn parse_signature(sig: &str) -> Result<FunctionSignature, DecodeError> {
    let sig = sig.trim();
    let open = sig
        .find('(')
        .ok_or_else(|| DecodeError::InvalidSignature(format!("missing '(' in: {sig}")))?;

    if !sig.ends_with(')') {
        return Err(DecodeError::InvalidSignature(format!("missing ')' in: {sig}")));
    }

    let name = sig[..open].to_string();
    if name.is_empty() {
        return Err(DecodeError::InvalidSignature("empty function name".to_string()));
    }

    let params_str = &sig[open + 1..sig.len() - 1];
    let params = parse_param_list(params_str)?;

    let canonical = format!("{}({})", name, canonical_params(&params));
    let selector = selector_from_signature(&canonical);

    Ok(FunctionSignature {
        name,
        params,
        canonical,
        selector,
    })
}

/// Parse a comma-separated list of param types.
pub fn parse_param_list(s: &str) -> Result<Vec<ParamType>, DecodeError> {
    s.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(parse_param_type)
        .collect()
}

fn parse_param_type(s: &str) -> Result<ParamType, DecodeError> {
    if let Some(inner) = s.strip_suffix("[]") {
        return Ok(ParamType::Array(Box::new(parse_param_type(inner)?)));
    }

    match s {
        "address" => Ok(ParamType::Address),
        "string" => Ok(ParamType::String),
        _ if s.starts_with("uint") => {
            let bits = if s == "uint" {
                256
            } else {
                s[4..].parse::<usize>().map_err(|_| {
                    DecodeError::InvalidSignature(format!("invalid uint width: {s}"))
                })?
            };
            Ok(ParamType::Uint(bits))
        }
        _ => Err(DecodeError::InvalidSignature(format!("unsupported type: {s}"))),
    }
}

fn canonical_params(params: &[ParamType]) -> String {
    params
        .iter()
        .map(canonical_param)
        .collect::<Vec<_>>()
        .join(",")
}

fn canonical_param(p: &ParamType) -> String {
    match p {
        ParamType::Address => "address".to_string(),
        ParamType::Uint(bits) => format!("uint{bits}"),
        ParamType::String => "string".to_string(),
        ParamType::Array(inner) => format!("{}[]", canonical_param(inner)),
    }
}

/// Compute the 4-byte selector from a canonical function signature.
pub fn selector_from_signature(canonical: &str) -> [u8; 4] {
    let mut hasher = Keccak::v256();
    hasher.update(canonical.as_bytes());
    let mut hash = [0u8; 32];
    hasher.finalize(&mut hash);
    [hash[0], hash[1], hash[2], hash[3]]
}

/// Encode a call: selector followed by the ABI-encoded arguments.
pub fn encode_call(sig: &FunctionSignature, args: &[AbiValue]) -> Result<Vec<u8>, DecodeError> {
    if args.len() != sig.params.len() {
        return Err(DecodeError::InvalidEncoding(format!(
            "{} expects {} arguments, got {}",
            sig.canonical,
            sig.params.len(),
            args.len()
        )));
    }

    let mut out = sig.selector.to_vec();
    out.extend(encode_sequence(args));
    Ok(out)
}

/// Head/tail encoding of a value sequence (function arguments or array elements).
fn encode_sequence(values: &[AbiValue]) -> Vec<u8> {
    let head_size = 32 * values.len();
    let mut head = Vec::with_capacity(head_size);
    let mut tail = Vec::new();

    for value in values {
        if value.is_dynamic() {
            head.extend_from_slice(&usize_word(head_size + tail.len()));
            tail.extend(encode_dynamic(value));
        } else {
            head.extend_from_slice(&encode_static(value));
        }
    }

    head.extend(tail);
    head
}

fn encode_static(value: &AbiValue) -> [u8; 32] {
    let mut word = [0u8; 32];
    match value {
        AbiValue::Address(addr) => word[12..].copy_from_slice(addr),
        AbiValue::Uint(v) => {
            let bytes = v.to_bytes_be();
            let len = bytes.len().min(32);
            word[32 - len..].copy_from_slice(&bytes[bytes.len() - len..]);
        }
        AbiValue::String(_) | AbiValue::Array(_) => {}
    }
    word
}

fn encode_dynamic(value: &AbiValue) -> Vec<u8> {
    match value {
        AbiValue::String(s) => encode_packed_bytes(s.as_bytes()),
        AbiValue::Array(items) => {
            let mut out = usize_word(items.len()).to_vec();
            out.extend(encode_sequence(items));
            out
        }
        other => encode_static(other).to_vec(),
    }
}

fn encode_packed_bytes(bytes: &[u8]) -> Vec<u8> {
    let mut out = usize_word(bytes.len()).to_vec();
    out.extend_from_slice(bytes);
    let padding = (32 - bytes.len() % 32) % 32;
    out.extend(std::iter::repeat(0u8).take(padding));
    out
}

fn usize_word(n: usize) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[24..].copy_from_slice(&(n as u64).to_be_bytes());
    word
}

/// Decode return data for the given output types.
pub fn decode_output(outputs: &[ParamType], data: &[u8]) -> Result<Vec<AbiValue>, DecodeError> {
    let mut values = Vec::with_capacity(outputs.len());
    let mut offset = 0;
    for param in outputs {
        values.push(decode_value(param, data, offset)?);
        offset += 32;
    }
    Ok(values)
}

/// Decode a single value from ABI-encoded data.
fn decode_value(param: &ParamType, data: &[u8], head_offset: usize) -> Result<AbiValue, DecodeError> {
    if param.is_dynamic() {
        // Dynamic types: head contains offset to tail
        let offset = read_u256_as_usize(data, head_offset)?;
        decode_value_at(param, data, offset)
    } else {
        decode_value_at(param, data, head_offset)
    }
}

fn decode_value_at(param: &ParamType, data: &[u8], offset: usize) -> Result<AbiValue, DecodeError> {
    ensure_bytes(data, offset, 32)?;

    match param {
        ParamType::Address => {
            let mut addr = [0u8; 20];
            addr.copy_from_slice(&data[offset + 12..offset + 32]);
            Ok(AbiValue::Address(addr))
        }
        ParamType::Uint(_) => Ok(AbiValue::Uint(BigUint::from_bytes_be(&data[offset..offset + 32]))),
        ParamType::String => {
            let len = read_u256_as_usize(data, offset)?;
            let start = offset + 32;
            let end = ensure_bytes(data, start, len)?;
            let s = std::str::from_utf8(&data[start..end])
                .map_err(|e| DecodeError::InvalidEncoding(format!("invalid UTF-8: {e}")))?;
            Ok(AbiValue::String(s.to_string()))
        }
        ParamType::Array(inner) => {
            let len = read_u256_as_usize(data, offset)?;
            let start = offset + 32;
            // Every element has at least a 32-byte head word.
            let head_len = len
                .checked_mul(32)
                .ok_or_else(|| DecodeError::InvalidEncoding(format!("array length {len} overflows")))?;
            ensure_bytes(data, start, head_len)?;
            // Element offsets of dynamic members are relative to the start of the elements.
            let elements = &data[start..];
            let mut values = Vec::with_capacity(len);
            let mut elem_offset = 0;
            for _ in 0..len {
                values.push(decode_value(inner, elements, elem_offset)?);
                elem_offset += 32;
            }
            Ok(AbiValue::Array(values))
        }
    }
}

fn read_u256_as_usize(data: &[u8], offset: usize) -> Result<usize, DecodeError> {
    ensure_bytes(data, offset, 32)?;
    let word = &data[offset..offset + 32];
    // Check that high bytes are zero (offset should fit in usize)
    if word[..24].iter().any(|&b| b != 0) {
        return Err(DecodeError::InvalidEncoding(
            "offset too large for usize".to_string(),
        ));
    }
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&word[24..32]);
    usize::try_from(u64::from_be_bytes(bytes))
        .map_err(|_| DecodeError::InvalidEncoding("offset too large for usize".to_string()))
}

/// Check that `len` bytes are available at `offset` and return the end index.
fn ensure_bytes(data: &[u8], offset: usize, len: usize) -> Result<usize, DecodeError> {
    let end = offset
        .checked_add(len)
        .ok_or_else(|| DecodeError::InvalidEncoding(format!("length {len} at offset {offset} overflows")))?;
    if end > data.len() {
        return Err(DecodeError::DataTooShort {
            expected: end,
            actual: data.len(),
        });
    }
    Ok(end)
}
