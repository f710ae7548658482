//! EIP-55 address handling.
//!
//! Every address stored by the controllers goes through [`to_checksum_address`]
//! first, so lookups compare checksummed strings only.

use tiny_keccak::{Hasher, Keccak};

use crate::error::Error;

/// Parse a `0x`-prefixed 20-byte hex address, ignoring letter case.
pub fn parse_address(address: &str) -> Result<[u8; 20], Error> {
    let trimmed = address.trim();
    let hex_part = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .ok_or_else(|| Error::InvalidAddress(address.to_string()))?;

    if hex_part.len() != 40 {
        return Err(Error::InvalidAddress(address.to_string()));
    }

    let mut out = [0u8; 20];
    hex::decode_to_slice(hex_part, &mut out).map_err(|_| Error::InvalidAddress(address.to_string()))?;
    Ok(out)
}

/// EIP-55 mixed-case checksum encoding of raw address bytes.
pub fn checksum_bytes(addr: &[u8; 20]) -> String {
    let hex_addr = hex::encode(addr);
    let mut hasher = Keccak::v256();
    hasher.update(hex_addr.as_bytes());
    let mut hash = [0u8; 32];
    hasher.finalize(&mut hash);

    let mut result = String::with_capacity(42);
    result.push_str("0x");
    for (i, c) in hex_addr.chars().enumerate() {
        let hash_nibble = if i % 2 == 0 {
            (hash[i / 2] >> 4) & 0x0f
        } else {
            hash[i / 2] & 0x0f
        };
        if hash_nibble >= 8 {
            result.push(c.to_ascii_uppercase());
        } else {
            result.push(c);
        }
    }
    result
}

/// Checksum an address supplied in any casing.
pub fn to_checksum_address(address: &str) -> Result<String, Error> {
    parse_address(address).map(|bytes| checksum_bytes(&bytes))
}

/// Whether `address` is a well-formed hex address.
///
/// All-lowercase and all-uppercase inputs carry no checksum and are accepted;
/// mixed-case inputs must match their EIP-55 encoding.
pub fn is_valid_address(address: &str) -> bool {
    let Ok(bytes) = parse_address(address) else {
        return false;
    };
    let body = &address.trim()[2..];
    let has_lower = body.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = body.chars().any(|c| c.is_ascii_uppercase());
    if has_lower && has_upper {
        checksum_bytes(&bytes)[2..] == *body
    } else {
        true
    }
}

/// Compare two addresses regardless of casing. Invalid inputs never match.
pub fn same_address(a: &str, b: &str) -> bool {
    match (parse_address(a), parse_address(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
