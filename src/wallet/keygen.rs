//! Key and Mnemonic Generation
//!
//! New wallets start from a BIP-39 mnemonic (12 or 24 words) or a raw
//! secp256k1 private key. Generated material is wrapped in `Zeroizing`
//! so intermediate copies are wiped when dropped.

use bip39::{Language, Mnemonic};
use zeroize::Zeroizing;

use crate::error::{ErrorCode, VethorError, VethorResult};

/// Generate a new mnemonic with the given word count (12 or 24)
pub fn generate_mnemonic(word_count: usize) -> VethorResult<Zeroizing<String>> {
    if word_count != 12 && word_count != 24 {
        return Err(VethorError::new(
            ErrorCode::InvalidInput,
            format!("Unsupported mnemonic length: {} words", word_count),
        ));
    }
    let mnemonic = Mnemonic::generate_in(Language::English, word_count)?;
    Ok(Zeroizing::new(mnemonic.to_string()))
}

/// Parse and validate a mnemonic phrase
pub fn parse_mnemonic(phrase: &str) -> VethorResult<Mnemonic> {
    Mnemonic::parse_in_normalized(Language::English, phrase.trim()).map_err(|e| {
        VethorError::new(
            ErrorCode::InvalidMnemonic,
            format!("Invalid mnemonic: {}", e),
        )
    })
}

/// Whether a phrase is a valid BIP-39 mnemonic
pub fn is_valid_mnemonic(phrase: &str) -> bool {
    parse_mnemonic(phrase).is_ok()
}

/// Generate a fresh random private key, hex encoded
pub fn generate_private_key() -> Zeroizing<String> {
    let secret = secp256k1::SecretKey::new(&mut rand::thread_rng());
    Zeroizing::new(hex::encode(secret.secret_bytes()))
}

/// Parse a hex private key (with or without 0x prefix)
pub fn secret_from_hex(private_key: &str) -> VethorResult<secp256k1::SecretKey> {
    let bytes: Zeroizing<Vec<u8>> =
        Zeroizing::new(crate::utils::hexutils::decode(private_key.trim()).map_err(|_| {
            VethorError::new(ErrorCode::InvalidPrivateKey, "Private key is not valid hex")
        })?);
    secp256k1::SecretKey::from_slice(&bytes).map_err(|_| {
        VethorError::new(
            ErrorCode::InvalidPrivateKey,
            "Private key is not a valid secp256k1 scalar",
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_mnemonic_lengths() {
        let twelve = generate_mnemonic(12).unwrap();
        assert_eq!(twelve.split_whitespace().count(), 12);

        let twenty_four = generate_mnemonic(24).unwrap();
        assert_eq!(twenty_four.split_whitespace().count(), 24);

        assert!(generate_mnemonic(13).is_err());
    }

    #[test]
    fn test_parse_known_mnemonic() {
        let phrase =
            "denial kitchen pet squirrel other broom bar gas better priority spoil cross";
        assert!(is_valid_mnemonic(phrase));
        assert!(is_valid_mnemonic(&format!("  {}  ", phrase)));
        assert!(!is_valid_mnemonic("not a mnemonic at all"));
    }

    #[test]
    fn test_secret_from_hex() {
        let key = "7582be841ca040aa940fff6c05773129e135623e41acce3e0b8ba520dc1ae26a";
        assert!(secret_from_hex(key).is_ok());
        assert!(secret_from_hex(&format!("0x{}", key)).is_ok());
        assert!(secret_from_hex("zz").is_err());
        // all-zero scalar is invalid
        assert!(secret_from_hex(&"00".repeat(32)).is_err());
    }

    #[test]
    fn test_generated_key_parses_back() {
        let key = generate_private_key();
        assert!(secret_from_hex(&key).is_ok());
    }
}
