//! Shared types for Vethor Core
//!
//! All data structures that cross module boundaries are defined here
//! for consistent serialization and FFI compatibility.

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::VethorError;

/// Default HD derivation path for VeChain accounts (SLIP-0044 coin 818).
/// Account keys are derived at `<path>/<index>` with non-hardened indices.
pub const VET_DERIVATION_PATH: &str = "m/44'/818'/0'/0";

// =============================================================================
// Network Types
// =============================================================================

/// VeChain networks the wallet can operate against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Network {
    Main,
    Test,
    Solo,
}

impl Network {
    /// Chain tag byte embedded in every transaction
    pub fn chain_tag(&self) -> u8 {
        match self {
            Network::Main => 0x4a,
            Network::Test => 0x27,
            Network::Solo => 0xf6,
        }
    }

    /// Default public node URL
    pub fn default_node_url(&self) -> &'static str {
        match self {
            Network::Main => "https://mainnet.vechain.org",
            Network::Test => "https://testnet.vechain.org",
            Network::Solo => "http://localhost:8669",
        }
    }

    /// Block explorer URL for a transaction id, if the network has one
    pub fn explorer_tx_url(&self, txid: &str) -> Option<String> {
        match self {
            Network::Main => Some(format!("https://explore.vechain.org/transactions/{}", txid)),
            Network::Test => Some(format!(
                "https://explore-testnet.vechain.org/transactions/{}",
                txid
            )),
            Network::Solo => None,
        }
    }

    pub fn is_testnet(&self) -> bool {
        matches!(self, Network::Test | Network::Solo)
    }
}

// =============================================================================
// Device & Account Model
// =============================================================================

/// Kind of key-material container backing a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceType {
    LocalMnemonic,
    LocalPrivateKey,
    Ledger,
    Watched,
}

impl DeviceType {
    /// Whether the device holds key material this process can sign with
    pub fn is_local(&self) -> bool {
        matches!(self, DeviceType::LocalMnemonic | DeviceType::LocalPrivateKey)
    }
}

/// Secret material for a local device
///
/// Exactly one of `mnemonic` / `private_key` is set, matching the device
/// type. Held in memory only while the store is unlocked; zeroized on drop.
#[derive(Debug, Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct WalletSecret {
    /// BIP-39 phrase for `LocalMnemonic` devices
    pub mnemonic: Option<String>,
    /// Hex private key for `LocalPrivateKey` devices
    pub private_key: Option<String>,
    /// Derivation path override; `VET_DERIVATION_PATH` when absent
    pub derivation_path: Option<String>,
}

/// A wallet device: one root key and the accounts derived from it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    /// Address of the root key; unique across the store
    pub root_address: String,
    pub alias: String,
    #[serde(rename = "type")]
    pub device_type: DeviceType,
    /// Present for local devices only
    pub wallet: Option<WalletSecret>,
}

/// An account derived from (and owned by) a device
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub address: String,
    /// Derivation index under the device's root key
    pub index: u32,
    /// Root address of the owning device
    pub root_address: String,
    pub alias: String,
    pub visible: bool,
}

// =============================================================================
// Signing & Delegation
// =============================================================================

/// How a signing operation treats the encrypted store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WalletMode {
    /// Store stays unlocked between operations
    Unlocked,
    /// Store is unlocked per signing operation and re-locked after
    AskToSign,
}

/// Outcome of a fee-delegation request. Transient, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelegationResult {
    /// Gas payer's 65-byte signature, hex with 0x prefix
    pub signature: String,
    /// Address recovered from the signature
    pub gas_payer: String,
}

// =============================================================================
// FFI Response Envelope
// =============================================================================

/// Uniform JSON envelope returned by every FFI function
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<VethorError>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(error: VethorError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            r#"{"success":false,"error":{"code":"internal","message":"Serialization failed"}}"#
                .to_string()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_tags() {
        assert_eq!(Network::Main.chain_tag(), 0x4a);
        assert_eq!(Network::Test.chain_tag(), 0x27);
        assert_eq!(Network::Solo.chain_tag(), 0xf6);
    }

    #[test]
    fn test_device_type_locality() {
        assert!(DeviceType::LocalMnemonic.is_local());
        assert!(DeviceType::LocalPrivateKey.is_local());
        assert!(!DeviceType::Ledger.is_local());
        assert!(!DeviceType::Watched.is_local());
    }

    #[test]
    fn test_api_response_roundtrip() {
        let ok: ApiResponse<u32> = ApiResponse::ok(7);
        let json = ok.to_json();
        assert!(json.contains("\"success\":true"));
        assert!(json.contains("\"data\":7"));

        let err: ApiResponse<()> = ApiResponse::err(crate::error::VethorError::not_found("x"));
        assert!(err.to_json().contains("not_found"));
    }

    #[test]
    fn test_device_type_serde_tags() {
        let json = serde_json::to_string(&DeviceType::LocalMnemonic).unwrap();
        assert_eq!(json, "\"local_mnemonic\"");
    }
}
