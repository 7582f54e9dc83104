//! Wallet Module
//!
//! Key material handling: mnemonic and private key generation, HD
//! account derivation, and V3 keystore import/export.

pub mod hdnode;
pub mod keygen;
pub mod keystore;

use secp256k1::SecretKey;

use crate::error::{ErrorCode, VethorError, VethorResult};
use crate::types::WalletSecret;

pub use hdnode::{derive_account_address, derive_account_key, root_address};
pub use keygen::{generate_mnemonic, generate_private_key, is_valid_mnemonic};
pub use keystore::Keystore;

/// Resolve the signing key for one account of a wallet secret
///
/// Mnemonic wallets derive the key at the account index; private key
/// wallets hold a single key and only expose account 0.
pub fn account_secret(secret: &WalletSecret, account_index: u32) -> VethorResult<SecretKey> {
    if let Some(mnemonic) = &secret.mnemonic {
        return derive_account_key(mnemonic, secret.derivation_path.as_deref(), account_index);
    }
    if let Some(private_key) = &secret.private_key {
        if account_index != 0 {
            return Err(VethorError::new(
                ErrorCode::InvalidInput,
                format!(
                    "Private key wallets only have account 0, requested {}",
                    account_index
                ),
            ));
        }
        return keygen::secret_from_hex(private_key);
    }
    Err(VethorError::new(
        ErrorCode::InvalidInput,
        "Wallet has neither a mnemonic nor a private key",
    ))
}
