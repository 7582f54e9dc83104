//! Signing Module
//!
//! The signing service owns the path from "account N of device X" to a
//! recoverable signature. It never hands key material to callers: secrets
//! leave the store, produce a signature and are dropped inside one call.
//!
//! In ask-to-sign mode the store is unlocked for the duration of a single
//! operation and re-locked on every exit path, success or error.

pub mod delegation;

pub use delegation::DelegationClient;

use secp256k1::SecretKey;

use crate::error::{ErrorCode, VethorError, VethorResult};
use crate::{log_debug, log_error, log_warn};
use crate::store::DeviceStore;
use crate::thor::address::address_from_secret_key;
use crate::thor::certificate::Certificate;
use crate::thor::secp;
use crate::thor::transaction::Transaction;
use crate::types::{DelegationResult, WalletMode};
use crate::utils::hexutils::compare_addresses;
use crate::wallet;

const MODULE: &str = "signing";

/// Signing operations over an encrypted device store
pub struct SigningService<'a> {
    store: &'a mut DeviceStore,
    mode: WalletMode,
}

impl<'a> SigningService<'a> {
    pub fn new(store: &'a mut DeviceStore, mode: WalletMode) -> Self {
        Self { store, mode }
    }

    /// Sign an arbitrary 32-byte hash with one account of a device
    pub fn sign_hash(
        &mut self,
        root_address: &str,
        account_index: u32,
        hash: &[u8; 32],
        password: Option<&str>,
    ) -> VethorResult<[u8; 65]> {
        self.with_store(password, |store| {
            let key = account_key(store, root_address, account_index)?;
            secp::sign_hash(hash, &key)
        })
    }

    /// Sign an undelegated transaction in place
    pub fn sign_transaction(
        &mut self,
        tx: &mut Transaction,
        root_address: &str,
        account_index: u32,
        password: Option<&str>,
    ) -> VethorResult<()> {
        if tx.is_delegated() {
            return Err(refused(
                "Delegated transactions need a gas payer signature",
            ));
        }
        let signature = self.with_store(password, |store| {
            let key = account_key(store, root_address, account_index)?;
            secp::sign_hash(&tx.signing_hash()?, &key)
        })?;
        tx.set_signature(signature);
        log_debug!(MODULE, "Transaction signed", origin_root = root_address);
        Ok(())
    }

    /// Sign a delegated transaction, fetching the gas payer signature
    /// from a sponsor service
    pub fn sign_with_sponsor(
        &mut self,
        tx: &mut Transaction,
        root_address: &str,
        account_index: u32,
        sponsor: &DelegationClient,
        password: Option<&str>,
    ) -> VethorResult<DelegationResult> {
        if !tx.is_delegated() {
            return Err(refused(
                "Transaction does not have the delegation feature enabled",
            ));
        }
        self.with_store(password, |store| {
            let key = account_key(store, root_address, account_index)?;
            let origin = address_from_secret_key(&key);

            let delegation = sponsor.request_signature(tx, &origin)?;
            let payer_sig = decode_signature(&delegation.signature)?;

            let origin_sig = secp::sign_hash(&tx.signing_hash()?, &key)?;
            tx.set_delegated_signature(origin_sig, payer_sig);
            Ok(delegation)
        })
    }

    /// Sign a delegated transaction with a second local device as the
    /// gas payer (account delegation, no sponsor service involved)
    pub fn sign_with_local_payer(
        &mut self,
        tx: &mut Transaction,
        root_address: &str,
        account_index: u32,
        payer_root_address: &str,
        payer_account_index: u32,
        password: Option<&str>,
    ) -> VethorResult<DelegationResult> {
        if !tx.is_delegated() {
            return Err(refused(
                "Transaction does not have the delegation feature enabled",
            ));
        }
        self.with_store(password, |store| {
            let origin_key = account_key(store, root_address, account_index)?;
            let origin = address_from_secret_key(&origin_key);

            let payer_key = account_key(store, payer_root_address, payer_account_index)?;
            let payer_hash = tx.delegated_signing_hash(&origin)?;
            let payer_sig = secp::sign_hash(&payer_hash, &payer_key)?;

            let origin_sig = secp::sign_hash(&tx.signing_hash()?, &origin_key)?;
            tx.set_delegated_signature(origin_sig, payer_sig);

            Ok(DelegationResult {
                signature: crate::utils::hexutils::encode_prefixed(&payer_sig),
                gas_payer: address_from_secret_key(&payer_key),
            })
        })
    }

    /// Sign a VIP-192 certificate; the signer field must match the account
    pub fn sign_certificate(
        &mut self,
        certificate: &Certificate,
        root_address: &str,
        account_index: u32,
        password: Option<&str>,
    ) -> VethorResult<[u8; 65]> {
        self.with_store(password, |store| {
            let key = account_key(store, root_address, account_index)?;
            let address = address_from_secret_key(&key);
            if !compare_addresses(&address, &certificate.signer) {
                return Err(VethorError::new(
                    ErrorCode::InvalidInput,
                    "Certificate signer does not match the signing account",
                ));
            }
            secp::sign_hash(&certificate.signing_hash()?, &key)
        })
    }

    /// Run one operation against the store under the configured mode
    fn with_store<T>(
        &mut self,
        password: Option<&str>,
        operation: impl FnOnce(&DeviceStore) -> VethorResult<T>,
    ) -> VethorResult<T> {
        let result = self.run_operation(password, operation);
        if let Err(err) = &result {
            log_error!(
                MODULE,
                "Signing operation failed",
                code = format!("{:?}", err.code),
                error = err.message,
            );
        }
        result
    }

    fn run_operation<T>(
        &mut self,
        password: Option<&str>,
        operation: impl FnOnce(&DeviceStore) -> VethorResult<T>,
    ) -> VethorResult<T> {
        match self.mode {
            WalletMode::Unlocked => operation(self.store),
            WalletMode::AskToSign => {
                let password = password.ok_or_else(|| {
                    VethorError::new(
                        ErrorCode::InvalidInput,
                        "Password is required in ask-to-sign mode",
                    )
                })?;
                self.store.unlock(password)?;
                let result = operation(self.store);
                // Re-lock on every exit path
                self.store.lock();
                result
            }
        }
    }
}

/// Build the guard error for an operation the service will not run,
/// logging it on the way out
fn refused(message: &'static str) -> VethorError {
    log_warn!(MODULE, "Refusing to sign", error = message);
    VethorError::signing_failed(message)
}

/// Resolve the signing key for one account of a device
fn account_key(
    store: &DeviceStore,
    root_address: &str,
    account_index: u32,
) -> VethorResult<SecretKey> {
    let secret = store.signing_secret(root_address)?;
    wallet::account_secret(&secret, account_index)
}

fn decode_signature(hex_sig: &str) -> VethorResult<[u8; 65]> {
    crate::utils::hexutils::decode_fixed(hex_sig)
}
