//! VeChain Addresses
//!
//! VeChain addresses follow the Ethereum scheme: keccak256 of the
//! uncompressed public key, last 20 bytes, 0x prefix, EIP-55 checksum
//! casing for display.

use secp256k1::{PublicKey, Secp256k1, SecretKey};

use crate::error::{VethorError, VethorResult};
use crate::utils::crypto::{keccak256, to_checksum_address};
use crate::utils::hexutils;

/// Derive the address for a public key
pub fn address_from_public_key(public_key: &PublicKey) -> String {
    let uncompressed = public_key.serialize_uncompressed();
    // Drop the 0x04 tag, hash the 64-byte point, keep the last 20 bytes
    let hash = keccak256(&uncompressed[1..]);
    to_checksum_address(&hash[12..32])
}

/// Derive the address for a secret key
pub fn address_from_secret_key(secret_key: &SecretKey) -> String {
    let secp = Secp256k1::new();
    address_from_public_key(&PublicKey::from_secret_key(&secp, secret_key))
}

/// Parse a 0x address into its 20 raw bytes
pub fn address_bytes(address: &str) -> VethorResult<[u8; 20]> {
    if !hexutils::is_valid_address(address) {
        return Err(VethorError::new(
            crate::error::ErrorCode::InvalidAddress,
            format!("Invalid address: {}", address),
        ));
    }
    hexutils::decode_fixed(address)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_from_known_key() {
        // thor-devkit reference key
        let sk = SecretKey::from_slice(
            &hex::decode("7582be841ca040aa940fff6c05773129e135623e41acce3e0b8ba520dc1ae26a")
                .unwrap(),
        )
        .unwrap();
        let address = address_from_secret_key(&sk);
        assert!(crate::utils::hexutils::compare_addresses(
            &address,
            "0xd989829d88b0ed1b06edf5c50174ecfa64f14a64"
        ));
    }

    #[test]
    fn test_address_bytes_rejects_garbage() {
        assert!(address_bytes("0x1234").is_err());
        assert!(address_bytes("not an address").is_err());
        assert!(address_bytes("0x7567d83b7b8d80addcb281a71d54fc7b3364ffed").is_ok());
    }
}
