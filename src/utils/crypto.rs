//! Crypto Utilities
//!
//! Hashing helpers shared across the crate: keccak256 for addresses and
//! keystore MACs, blake2b256 for VeChain signing hashes.

use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use tiny_keccak::{Hasher, Keccak};

type Blake2b256 = Blake2b<U32>;

/// Keccak256 hash (Ethereum-style addresses and keystore MACs)
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    hasher.update(data);
    let mut out = [0u8; 32];
    hasher.finalize(&mut out);
    out
}

/// Blake2b-256 hash over the concatenation of the given slices
/// (VeChain signing hashes, transaction ids)
pub fn blake2b256(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Blake2b256::new();
    for part in parts {
        hasher.update(part);
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    out
}

/// Convert raw address bytes to a checksummed 0x address
pub fn to_checksum_address(address: &[u8]) -> String {
    let lower = hex::encode(address);
    let hash = keccak256(lower.as_bytes());

    let mut result = String::from("0x");
    for (i, ch) in lower.chars().enumerate() {
        let byte = hash[i / 2];
        let nibble = if i % 2 == 0 { byte >> 4 } else { byte & 0x0f };

        if ch.is_ascii_digit() {
            result.push(ch);
        } else if nibble >= 8 {
            result.push(ch.to_ascii_uppercase());
        } else {
            result.push(ch);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keccak256_empty_vector() {
        // Known keccak256("") digest
        assert_eq!(
            hex::encode(keccak256(b"")),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn test_blake2b256_vector() {
        // thor-devkit reference vector
        assert_eq!(
            hex::encode(blake2b256(&[b"hello world"])),
            "256c83b297114d201b30179f3f0ef0cace9783622da5974326b436178aeef610"
        );
    }

    #[test]
    fn test_blake2b256_concat_equals_single() {
        let joined = blake2b256(&[b"hello ", b"world"]);
        let single = blake2b256(&[b"hello world"]);
        assert_eq!(joined, single);
    }

    #[test]
    fn test_checksum_address() {
        let addr_bytes = hex::decode("5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed").unwrap();
        let checksummed = to_checksum_address(&addr_bytes);
        assert_eq!(checksummed, "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed");
    }
}
