//! Hex String Utilities
//!
//! 0x-prefix handling for addresses, signatures and raw transactions.
//! Addresses are compared case-insensitively (checksum casing varies).

use crate::error::{VethorError, VethorResult};

/// Add a 0x prefix if missing
pub fn add_prefix(hex_str: &str) -> String {
    if hex_str.starts_with("0x") || hex_str.starts_with("0X") {
        hex_str.to_string()
    } else {
        format!("0x{}", hex_str)
    }
}

/// Strip a leading 0x prefix if present
pub fn strip_prefix(hex_str: &str) -> &str {
    hex_str
        .strip_prefix("0x")
        .or_else(|| hex_str.strip_prefix("0X"))
        .unwrap_or(hex_str)
}

/// Decode a hex string with or without 0x prefix
pub fn decode(hex_str: &str) -> VethorResult<Vec<u8>> {
    hex::decode(strip_prefix(hex_str))
        .map_err(|e| VethorError::parse_error(format!("Invalid hex: {}", e)))
}

/// Decode a hex string into a fixed-size array
pub fn decode_fixed<const N: usize>(hex_str: &str) -> VethorResult<[u8; N]> {
    let bytes = decode(hex_str)?;
    bytes.try_into().map_err(|v: Vec<u8>| {
        VethorError::invalid_input(format!("Expected {} bytes, got {}", N, v.len()))
    })
}

/// Encode bytes as lowercase hex with 0x prefix
pub fn encode_prefixed(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Case-insensitive address comparison
pub fn compare_addresses(a: &str, b: &str) -> bool {
    strip_prefix(a).eq_ignore_ascii_case(strip_prefix(b))
}

/// Validate a 0x address (20 bytes)
pub fn is_valid_address(address: &str) -> bool {
    let body = strip_prefix(address);
    body.len() == 40 && body.chars().all(|c| c.is_ascii_hexdigit())
}
