//! Unified error types for Vethor Core
//!
//! All errors flow through this module for consistent handling
//! and FFI-safe error reporting.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Main error type for all Vethor operations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VethorError {
    pub code: ErrorCode,
    pub message: String,
    pub details: Option<String>,
}

impl VethorError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    // Convenience constructors

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, msg)
    }

    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidRequest, msg)
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, msg)
    }

    pub fn crypto_error(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::CryptoError, msg)
    }

    pub fn signing_failed(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::SigningFailed, msg)
    }

    pub fn delegation_failed(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::DelegationFailed, msg)
    }

    pub fn network_error(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::NetworkError, msg)
    }

    pub fn broadcast_failed(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::BroadcastFailed, msg)
    }

    pub fn parse_error(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ParseError, msg)
    }

    pub fn store_locked(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::StoreLocked, msg)
    }

    pub fn incorrect_password(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::IncorrectPassword, msg)
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, msg)
    }
}

impl fmt::Display for VethorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)?;
        if let Some(ref details) = self.details {
            write!(f, " ({})", details)?;
        }
        Ok(())
    }
}

impl std::error::Error for VethorError {}

/// Error codes for categorization
///
/// The wallet surfaces three broad classes (not-found, invalid-request,
/// internal); the remaining codes refine them for logging and FFI clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    // Request errors
    NotFound,
    InvalidRequest,
    InvalidInput,
    InvalidAddress,
    InvalidMnemonic,
    InvalidPrivateKey,
    InvalidTransaction,

    // Store errors
    StoreLocked,
    IncorrectPassword,

    // Network errors
    NetworkError,
    Timeout,
    BroadcastFailed,
    DelegationFailed,

    // Crypto errors
    CryptoError,
    SigningFailed,

    // Parse errors
    ParseError,
    JsonError,
    HexError,

    // Internal
    Internal,
}

/// Result type alias for Vethor operations
pub type VethorResult<T> = Result<T, VethorError>;

// Conversions from common error types

impl From<serde_json::Error> for VethorError {
    fn from(e: serde_json::Error) -> Self {
        VethorError::new(ErrorCode::JsonError, e.to_string())
    }
}

impl From<hex::FromHexError> for VethorError {
    fn from(e: hex::FromHexError) -> Self {
        VethorError::new(ErrorCode::HexError, e.to_string())
    }
}

impl From<std::io::Error> for VethorError {
    fn from(e: std::io::Error) -> Self {
        VethorError::new(ErrorCode::Internal, e.to_string())
    }
}

impl From<reqwest::Error> for VethorError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            VethorError::new(ErrorCode::Timeout, "Request timed out")
        } else if e.is_connect() {
            VethorError::new(ErrorCode::NetworkError, "Connection failed")
        } else {
            VethorError::new(ErrorCode::NetworkError, e.to_string())
        }
    }
}

impl From<bitcoin::bip32::Error> for VethorError {
    fn from(e: bitcoin::bip32::Error) -> Self {
        VethorError::new(ErrorCode::CryptoError, format!("BIP32 error: {}", e))
    }
}

impl From<secp256k1::Error> for VethorError {
    fn from(e: secp256k1::Error) -> Self {
        VethorError::new(ErrorCode::CryptoError, format!("Secp256k1 error: {}", e))
    }
}

impl From<bip39::Error> for VethorError {
    fn from(e: bip39::Error) -> Self {
        VethorError::new(ErrorCode::InvalidMnemonic, format!("BIP39 error: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_serialization() {
        let err = VethorError::invalid_request("wallet_already_exists")
            .with_details("root address already registered");

        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("invalid_request"));
        assert!(json.contains("wallet_already_exists"));
    }

    #[test]
    fn test_display_includes_details() {
        let err = VethorError::not_found("No device for root address").with_details("0xabc");
        let rendered = err.to_string();
        assert!(rendered.contains("NotFound"));
        assert!(rendered.contains("0xabc"));
    }
}
