//! HD Key Derivation
//!
//! BIP-32 derivation over BIP-39 seeds. VeChain accounts live on the
//! VET path m/44'/818'/0'/0 with one non-hardened child per account
//! index, so account N of a device is always the same key.

use bitcoin::bip32::{ChildNumber, DerivationPath, Xpriv};
use secp256k1::SecretKey;
use zeroize::Zeroizing;

use crate::error::{ErrorCode, VethorError, VethorResult};
use crate::thor::address::address_from_secret_key;
use crate::types::VET_DERIVATION_PATH;
use crate::wallet::keygen::parse_mnemonic;

/// Derive the private key for one account of a mnemonic wallet
///
/// `derivation_path` overrides the VET default for wallets imported from
/// other ecosystems; `index` selects the non-hardened child.
pub fn derive_account_key(
    mnemonic: &str,
    derivation_path: Option<&str>,
    index: u32,
) -> VethorResult<SecretKey> {
    let parsed = parse_mnemonic(mnemonic)?;
    let seed = Zeroizing::new(parsed.to_seed_normalized(""));

    // The network parameter only affects xprv serialization, not the math
    let master = Xpriv::new_master(bitcoin::Network::Bitcoin, seed.as_ref())?;

    let base = derivation_path.unwrap_or(VET_DERIVATION_PATH);
    let base: DerivationPath = base.parse().map_err(|e| {
        VethorError::new(
            ErrorCode::InvalidInput,
            format!("Invalid derivation path `{}`: {}", base, e),
        )
    })?;
    let path = base.child(ChildNumber::from_normal_idx(index)?);

    let secp = bitcoin::secp256k1::Secp256k1::new();
    let derived = master.derive_priv(&secp, &path)?;

    let key_bytes = Zeroizing::new(derived.private_key.secret_bytes());
    Ok(SecretKey::from_slice(key_bytes.as_ref())?)
}

/// Derive the checksummed address for one account of a mnemonic wallet
pub fn derive_account_address(
    mnemonic: &str,
    derivation_path: Option<&str>,
    index: u32,
) -> VethorResult<String> {
    let key = derive_account_key(mnemonic, derivation_path, index)?;
    Ok(address_from_secret_key(&key))
}

/// Address of account 0, used as the device root address
pub fn root_address(mnemonic: &str, derivation_path: Option<&str>) -> VethorResult<String> {
    derive_account_address(mnemonic, derivation_path, 0)
}
