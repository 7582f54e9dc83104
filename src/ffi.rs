//! C ABI for Mobile Hosts
//!
//! Every function takes a JSON request string and returns a freshly
//! allocated JSON response in the `ApiResponse` envelope. The caller
//! owns returned strings and must release them with
//! [`vethor_free_string`]. Panics are caught at the boundary and
//! reported as internal errors instead of unwinding into foreign code.

use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Mutex, OnceLock};

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::error::{VethorError, VethorResult};
use crate::node::NodeClient;
use crate::signing::{DelegationClient, SigningService};
use crate::store::DeviceStore;
use crate::thor::transaction::{Transaction, TransactionBody};
use crate::types::{ApiResponse, Network, WalletMode};
use crate::utils::hexutils;
use crate::wallet::{self, Keystore};

/// The single store session shared across FFI calls
static STORE: OnceLock<Mutex<Option<DeviceStore>>> = OnceLock::new();

fn store_slot() -> &'static Mutex<Option<DeviceStore>> {
    STORE.get_or_init(|| Mutex::new(None))
}

// =============================================================================
// Boundary plumbing
// =============================================================================

fn respond<T: Serialize>(result: VethorResult<T>) -> String {
    match result {
        Ok(data) => ApiResponse::ok(data).to_json(),
        Err(error) => ApiResponse::<T>::err(error).to_json(),
    }
}

fn to_c_string(s: String) -> *mut c_char {
    match CString::new(s) {
        Ok(c) => c.into_raw(),
        // Interior NUL cannot appear in serde_json output, but never unwind
        Err(_) => CString::new(
            r#"{"success":false,"error":{"code":"internal","message":"Invalid output"}}"#,
        )
        .map(CString::into_raw)
        .unwrap_or(std::ptr::null_mut()),
    }
}

fn parse_input<'a, T: Deserialize<'a>>(input: &'a str) -> VethorResult<T> {
    serde_json::from_str(input)
        .map_err(|e| VethorError::parse_error(format!("Invalid request JSON: {}", e)))
}

/// Run one handler inside the panic barrier
fn dispatch<F>(input: *const c_char, handler: F) -> *mut c_char
where
    F: FnOnce(&str) -> String,
{
    let result = catch_unwind(AssertUnwindSafe(|| {
        if input.is_null() {
            return respond::<()>(Err(VethorError::invalid_input("Input pointer is null")));
        }
        let input = unsafe { CStr::from_ptr(input) };
        match input.to_str() {
            Ok(s) => handler(s),
            Err(_) => respond::<()>(Err(VethorError::invalid_input("Input is not valid UTF-8"))),
        }
    }));
    let json = result.unwrap_or_else(|_| {
        respond::<()>(Err(VethorError::internal("Operation panicked")))
    });
    to_c_string(json)
}

fn with_store<T, F>(operation: F) -> String
where
    T: Serialize,
    F: FnOnce(&mut DeviceStore) -> VethorResult<T>,
{
    let mut guard = store_slot().lock().unwrap_or_else(|p| p.into_inner());
    match guard.as_mut() {
        Some(store) => respond(operation(store)),
        None => respond::<T>(Err(VethorError::invalid_request("No store is open"))),
    }
}

/// Release a string returned by any `vethor_` function
///
/// # Safety
/// `ptr` must be a pointer returned by this library, passed at most once.
#[no_mangle]
pub unsafe extern "C" fn vethor_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// =============================================================================
// Store lifecycle
// =============================================================================

#[derive(Deserialize)]
struct StoreCreateRequest {
    path: String,
    password: String,
}

#[no_mangle]
pub extern "C" fn vethor_store_create(input: *const c_char) -> *mut c_char {
    dispatch(input, |input| {
        let request: StoreCreateRequest = match parse_input(input) {
            Ok(r) => r,
            Err(e) => return respond::<()>(Err(e)),
        };
        let result = DeviceStore::create(&request.path, &request.password).map(|store| {
            let mut guard = store_slot().lock().unwrap_or_else(|p| p.into_inner());
            *guard = Some(store);
        });
        respond(result)
    })
}

#[derive(Deserialize)]
struct StoreOpenRequest {
    path: String,
}

#[no_mangle]
pub extern "C" fn vethor_store_open(input: *const c_char) -> *mut c_char {
    dispatch(input, |input| {
        let request: StoreOpenRequest = match parse_input(input) {
            Ok(r) => r,
            Err(e) => return respond::<()>(Err(e)),
        };
        let result = DeviceStore::open(&request.path).map(|store| {
            let mut guard = store_slot().lock().unwrap_or_else(|p| p.into_inner());
            *guard = Some(store);
        });
        respond(result)
    })
}

#[derive(Deserialize)]
struct PasswordRequest {
    password: String,
}

#[no_mangle]
pub extern "C" fn vethor_store_unlock(input: *const c_char) -> *mut c_char {
    dispatch(input, |input| {
        let request: PasswordRequest = match parse_input(input) {
            Ok(r) => r,
            Err(e) => return respond::<()>(Err(e)),
        };
        let password = Zeroizing::new(request.password);
        with_store(|store| store.unlock(&password))
    })
}

#[no_mangle]
pub extern "C" fn vethor_store_lock(input: *const c_char) -> *mut c_char {
    dispatch(input, |_| {
        with_store(|store| {
            store.lock();
            Ok(())
        })
    })
}

#[no_mangle]
pub extern "C" fn vethor_store_reset(input: *const c_char) -> *mut c_char {
    dispatch(input, |_| {
        let mut guard = store_slot().lock().unwrap_or_else(|p| p.into_inner());
        let result = match guard.as_mut() {
            Some(store) => store.reset(),
            None => Err(VethorError::invalid_request("No store is open")),
        };
        if result.is_ok() {
            *guard = None;
        }
        respond(result)
    })
}

#[derive(Deserialize)]
struct ChangePasswordRequest {
    old_password: String,
    new_password: String,
}

#[no_mangle]
pub extern "C" fn vethor_store_change_password(input: *const c_char) -> *mut c_char {
    dispatch(input, |input| {
        let request: ChangePasswordRequest = match parse_input(input) {
            Ok(r) => r,
            Err(e) => return respond::<()>(Err(e)),
        };
        let old = Zeroizing::new(request.old_password);
        let new = Zeroizing::new(request.new_password);
        with_store(|store| store.change_password(&old, &new))
    })
}

// =============================================================================
// Devices & accounts
// =============================================================================

#[derive(Deserialize)]
struct AddMnemonicDeviceRequest {
    mnemonic: String,
    alias: String,
    #[serde(default)]
    derivation_path: Option<String>,
}

#[no_mangle]
pub extern "C" fn vethor_device_add_mnemonic(input: *const c_char) -> *mut c_char {
    dispatch(input, |input| {
        let request: AddMnemonicDeviceRequest = match parse_input(input) {
            Ok(r) => r,
            Err(e) => return respond::<()>(Err(e)),
        };
        let mnemonic = Zeroizing::new(request.mnemonic);
        with_store(|store| {
            store.add_mnemonic_device(
                &mnemonic,
                &request.alias,
                request.derivation_path.as_deref(),
            )
        })
    })
}

#[derive(Deserialize)]
struct AddPrivateKeyDeviceRequest {
    private_key: String,
    alias: String,
}

#[no_mangle]
pub extern "C" fn vethor_device_add_private_key(input: *const c_char) -> *mut c_char {
    dispatch(input, |input| {
        let request: AddPrivateKeyDeviceRequest = match parse_input(input) {
            Ok(r) => r,
            Err(e) => return respond::<()>(Err(e)),
        };
        let key = Zeroizing::new(request.private_key);
        with_store(|store| store.add_private_key_device(&key, &request.alias))
    })
}

#[derive(Deserialize)]
struct AddLedgerDeviceRequest {
    root_address: String,
    alias: String,
}

#[no_mangle]
pub extern "C" fn vethor_device_add_ledger(input: *const c_char) -> *mut c_char {
    dispatch(input, |input| {
        let request: AddLedgerDeviceRequest = match parse_input(input) {
            Ok(r) => r,
            Err(e) => return respond::<()>(Err(e)),
        };
        with_store(|store| store.add_ledger_device(&request.root_address, &request.alias))
    })
}

#[derive(Deserialize)]
struct AddWatchedDeviceRequest {
    root_address: String,
    alias: String,
}

#[no_mangle]
pub extern "C" fn vethor_device_add_watched(input: *const c_char) -> *mut c_char {
    dispatch(input, |input| {
        let request: AddWatchedDeviceRequest = match parse_input(input) {
            Ok(r) => r,
            Err(e) => return respond::<()>(Err(e)),
        };
        with_store(|store| store.add_watched_device(&request.root_address, &request.alias))
    })
}

#[no_mangle]
pub extern "C" fn vethor_device_list(input: *const c_char) -> *mut c_char {
    dispatch(input, |_| with_store(|store| store.devices()))
}

#[derive(Deserialize)]
struct RenameRequest {
    root_address: String,
    alias: String,
}

#[no_mangle]
pub extern "C" fn vethor_device_rename(input: *const c_char) -> *mut c_char {
    dispatch(input, |input| {
        let request: RenameRequest = match parse_input(input) {
            Ok(r) => r,
            Err(e) => return respond::<()>(Err(e)),
        };
        with_store(|store| store.rename_device(&request.root_address, &request.alias))
    })
}

#[derive(Deserialize)]
struct RemoveDeviceRequest {
    root_address: String,
}

#[no_mangle]
pub extern "C" fn vethor_device_remove(input: *const c_char) -> *mut c_char {
    dispatch(input, |input| {
        let request: RemoveDeviceRequest = match parse_input(input) {
            Ok(r) => r,
            Err(e) => return respond::<()>(Err(e)),
        };
        with_store(|store| store.remove_device(&request.root_address))
    })
}

#[derive(Deserialize)]
struct AddAccountRequest {
    root_address: String,
    index: u32,
    alias: String,
    #[serde(default)]
    address: Option<String>,
}

#[no_mangle]
pub extern "C" fn vethor_account_add(input: *const c_char) -> *mut c_char {
    dispatch(input, |input| {
        let request: AddAccountRequest = match parse_input(input) {
            Ok(r) => r,
            Err(e) => return respond::<()>(Err(e)),
        };
        with_store(|store| {
            store.add_account(
                &request.root_address,
                request.index,
                &request.alias,
                request.address.as_deref(),
            )
        })
    })
}

#[derive(Deserialize)]
struct ListAccountsRequest {
    #[serde(default)]
    root_address: Option<String>,
}

#[no_mangle]
pub extern "C" fn vethor_account_list(input: *const c_char) -> *mut c_char {
    dispatch(input, |input| {
        let request: ListAccountsRequest = match parse_input(input) {
            Ok(r) => r,
            Err(e) => return respond::<()>(Err(e)),
        };
        with_store(|store| match request.root_address {
            Some(root) => store.accounts_for_device(&root),
            None => store.accounts(),
        })
    })
}

// =============================================================================
// Signing & broadcast
// =============================================================================

#[derive(Deserialize)]
struct SignHashRequest {
    root_address: String,
    account_index: u32,
    /// 32-byte hash, hex encoded
    hash: String,
    #[serde(default)]
    mode: Option<WalletMode>,
    #[serde(default)]
    password: Option<String>,
}

#[derive(Serialize)]
struct SignHashResponse {
    signature: String,
}

#[no_mangle]
pub extern "C" fn vethor_sign_hash(input: *const c_char) -> *mut c_char {
    dispatch(input, |input| {
        let request: SignHashRequest = match parse_input(input) {
            Ok(r) => r,
            Err(e) => return respond::<()>(Err(e)),
        };
        let password = request.password.map(Zeroizing::new);
        with_store(|store| {
            let hash: [u8; 32] = hexutils::decode_fixed(&request.hash)?;
            let mode = request.mode.unwrap_or(WalletMode::Unlocked);
            let mut service = SigningService::new(store, mode);
            let signature = service.sign_hash(
                &request.root_address,
                request.account_index,
                &hash,
                password.as_deref().map(String::as_str),
            )?;
            Ok(SignHashResponse {
                signature: hexutils::encode_prefixed(&signature),
            })
        })
    })
}

#[derive(Deserialize)]
struct SignTransactionRequest {
    body: TransactionBody,
    root_address: String,
    account_index: u32,
    #[serde(default)]
    mode: Option<WalletMode>,
    #[serde(default)]
    password: Option<String>,
    /// Sponsor endpoint for VIP-191 delegation
    #[serde(default)]
    delegation_url: Option<String>,
    /// Local gas payer device for account delegation
    #[serde(default)]
    payer_root_address: Option<String>,
    #[serde(default)]
    payer_account_index: u32,
}

#[derive(Serialize)]
struct SignTransactionResponse {
    raw: String,
    id: String,
    origin: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    gas_payer: Option<String>,
}

#[no_mangle]
pub extern "C" fn vethor_sign_transaction(input: *const c_char) -> *mut c_char {
    dispatch(input, |input| {
        let request: SignTransactionRequest = match parse_input(input) {
            Ok(r) => r,
            Err(e) => return respond::<()>(Err(e)),
        };
        let password = request.password.map(Zeroizing::new);
        with_store(|store| {
            let mut tx = Transaction::new(request.body);
            let mode = request.mode.unwrap_or(WalletMode::Unlocked);
            let password = password.as_deref().map(String::as_str);
            let mut service = SigningService::new(store, mode);

            let gas_payer = if let Some(url) = &request.delegation_url {
                tx.body.set_delegated();
                let sponsor = DelegationClient::new(url)?;
                let delegation = service.sign_with_sponsor(
                    &mut tx,
                    &request.root_address,
                    request.account_index,
                    &sponsor,
                    password,
                )?;
                Some(delegation.gas_payer)
            } else if let Some(payer_root) = &request.payer_root_address {
                tx.body.set_delegated();
                let delegation = service.sign_with_local_payer(
                    &mut tx,
                    &request.root_address,
                    request.account_index,
                    payer_root,
                    request.payer_account_index,
                    password,
                )?;
                Some(delegation.gas_payer)
            } else {
                service.sign_transaction(
                    &mut tx,
                    &request.root_address,
                    request.account_index,
                    password,
                )?;
                None
            };

            Ok(SignTransactionResponse {
                raw: hexutils::encode_prefixed(&tx.encode()?),
                id: tx.id()?,
                origin: tx.origin()?,
                gas_payer,
            })
        })
    })
}

#[derive(Deserialize)]
struct BroadcastRequest {
    network: Network,
    #[serde(default)]
    node_url: Option<String>,
    /// Signed raw transaction, hex encoded
    raw: String,
}

#[derive(Serialize)]
struct BroadcastResult {
    id: String,
}

#[no_mangle]
pub extern "C" fn vethor_broadcast(input: *const c_char) -> *mut c_char {
    dispatch(input, |input| {
        let request: BroadcastRequest = match parse_input(input) {
            Ok(r) => r,
            Err(e) => return respond::<()>(Err(e)),
        };
        let result = (|| {
            let client = match &request.node_url {
                Some(url) => NodeClient::with_url(url, request.network)?,
                None => NodeClient::new(request.network)?,
            };
            let raw = hexutils::decode(&request.raw)?;
            let tx = Transaction::decode(&raw)?;
            Ok(BroadcastResult {
                id: client.broadcast(&tx)?,
            })
        })();
        respond(result)
    })
}

// =============================================================================
// Key material helpers
// =============================================================================

#[derive(Deserialize)]
struct GenerateMnemonicRequest {
    #[serde(default = "default_word_count")]
    word_count: usize,
}

fn default_word_count() -> usize {
    12
}

#[derive(Serialize)]
struct GenerateMnemonicResponse {
    mnemonic: String,
}

#[no_mangle]
pub extern "C" fn vethor_generate_mnemonic(input: *const c_char) -> *mut c_char {
    dispatch(input, |input| {
        let request: GenerateMnemonicRequest = match parse_input(input) {
            Ok(r) => r,
            Err(e) => return respond::<()>(Err(e)),
        };
        let result = wallet::generate_mnemonic(request.word_count).map(|m| {
            GenerateMnemonicResponse {
                mnemonic: m.to_string(),
            }
        });
        respond(result)
    })
}

#[derive(Deserialize)]
struct ValidateMnemonicRequest {
    mnemonic: String,
}

#[derive(Serialize)]
struct ValidateMnemonicResponse {
    valid: bool,
}

#[no_mangle]
pub extern "C" fn vethor_validate_mnemonic(input: *const c_char) -> *mut c_char {
    dispatch(input, |input| {
        let request: ValidateMnemonicRequest = match parse_input(input) {
            Ok(r) => r,
            Err(e) => return respond::<()>(Err(e)),
        };
        let mnemonic = Zeroizing::new(request.mnemonic);
        respond(Ok(ValidateMnemonicResponse {
            valid: wallet::is_valid_mnemonic(&mnemonic),
        }))
    })
}

#[derive(Deserialize)]
struct KeystoreDecryptRequest {
    /// Full V3 keystore JSON
    keystore: serde_json::Value,
    password: String,
}

#[derive(Serialize)]
struct KeystoreDecryptResponse {
    private_key: String,
    address: String,
}

#[no_mangle]
pub extern "C" fn vethor_keystore_decrypt(input: *const c_char) -> *mut c_char {
    dispatch(input, |input| {
        let request: KeystoreDecryptRequest = match parse_input(input) {
            Ok(r) => r,
            Err(e) => return respond::<()>(Err(e)),
        };
        let password = Zeroizing::new(request.password);
        let result = (|| {
            let keystore: Keystore = serde_json::from_value(request.keystore)
                .map_err(|e| VethorError::parse_error(format!("Invalid keystore JSON: {}", e)))?;
            let secret = keystore.decrypt_to_secret(&password)?;
            Ok(KeystoreDecryptResponse {
                private_key: hex::encode(secret.secret_bytes()),
                address: crate::thor::address::address_from_secret_key(&secret),
            })
        })();
        respond(result)
    })
}

#[derive(Deserialize)]
struct KeystoreEncryptRequest {
    private_key: String,
    password: String,
}

#[no_mangle]
pub extern "C" fn vethor_keystore_encrypt(input: *const c_char) -> *mut c_char {
    dispatch(input, |input| {
        let request: KeystoreEncryptRequest = match parse_input(input) {
            Ok(r) => r,
            Err(e) => return respond::<()>(Err(e)),
        };
        let password = Zeroizing::new(request.password);
        let key = Zeroizing::new(request.private_key);
        let result = (|| {
            let secret = wallet::keygen::secret_from_hex(&key)?;
            Keystore::encrypt(&secret, &password)
        })();
        respond(result)
    })
}
