//! Encrypted Device Store
//!
//! The wallet's collection of devices and accounts, persisted as a single
//! encrypted file. Every mutation is a read-modify-write of the whole
//! file so the store on disk is always internally consistent.
//!
//! Invariants:
//! - device root addresses are unique (case-insensitive)
//! - the last device cannot be removed
//! - removing a device removes its accounts
//! - removing an unknown device is a no-op

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::error::{ErrorCode, VethorError, VethorResult};
use crate::log_info;
use crate::store::encryption::{self, Envelope, SALT_LEN};
use crate::thor::address::address_from_secret_key;
use crate::types::{Account, Device, DeviceType, WalletSecret};
use crate::utils::hexutils::{compare_addresses, is_valid_address};
use crate::wallet;

const MODULE: &str = "store";

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreData {
    devices: Vec<Device>,
    accounts: Vec<Account>,
}

/// Handle to an encrypted store file
pub struct DeviceStore {
    path: PathBuf,
    salt: [u8; SALT_LEN],
    key: Option<Zeroizing<[u8; 32]>>,
}

impl DeviceStore {
    /// Create a new store file; fails if one already exists
    pub fn create(path: impl AsRef<Path>, password: &str) -> VethorResult<Self> {
        let path = path.as_ref().to_path_buf();
        if path.exists() {
            return Err(VethorError::invalid_request(
                "Store file already exists",
            ));
        }
        use rand::RngCore;
        let mut salt = [0u8; SALT_LEN];
        rand::thread_rng().fill_bytes(&mut salt);

        let key = encryption::derive_key(password, &salt)?;
        let store = Self {
            path,
            salt,
            key: Some(key),
        };
        store.write(&StoreData::default())?;
        log_info!(MODULE, "Created device store");
        Ok(store)
    }

    /// Open an existing store file; starts locked
    pub fn open(path: impl AsRef<Path>) -> VethorResult<Self> {
        let path = path.as_ref().to_path_buf();
        let envelope = read_envelope(&path)?;
        let salt_bytes = encryption::envelope_salt(&envelope)?;
        let mut salt = [0u8; SALT_LEN];
        salt.copy_from_slice(&salt_bytes);
        Ok(Self {
            path,
            salt,
            key: None,
        })
    }

    /// Derive and cache the store key; validates the password by decrypting
    pub fn unlock(&mut self, password: &str) -> VethorResult<()> {
        let key = encryption::derive_key(password, &self.salt)?;
        let envelope = read_envelope(&self.path)?;
        encryption::open(&envelope, &key)?;
        self.key = Some(key);
        Ok(())
    }

    /// Drop the cached key; the `Zeroizing` wrapper wipes it
    pub fn lock(&mut self) {
        self.key = None;
    }

    pub fn is_unlocked(&self) -> bool {
        self.key.is_some()
    }

    /// Delete the store file and forget the key
    pub fn reset(&mut self) -> VethorResult<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        self.lock();
        log_info!(MODULE, "Device store reset");
        Ok(())
    }

    /// Re-encrypt the store under a new password
    pub fn change_password(&mut self, old_password: &str, new_password: &str) -> VethorResult<()> {
        self.unlock(old_password)?;
        let data = self.read()?;

        use rand::RngCore;
        let mut salt = [0u8; SALT_LEN];
        rand::thread_rng().fill_bytes(&mut salt);
        let key = encryption::derive_key(new_password, &salt)?;

        self.salt = salt;
        self.key = Some(key);
        self.write(&data)
    }

    // =========================================================================
    // Devices
    // =========================================================================

    pub fn devices(&self) -> VethorResult<Vec<Device>> {
        Ok(self.read()?.devices)
    }

    pub fn get_device(&self, root_address: &str) -> VethorResult<Device> {
        self.read()?
            .devices
            .into_iter()
            .find(|d| compare_addresses(&d.root_address, root_address))
            .ok_or_else(|| device_not_found(root_address))
    }

    /// Add a mnemonic device and its first account
    pub fn add_mnemonic_device(
        &self,
        mnemonic: &str,
        alias: &str,
        derivation_path: Option<&str>,
    ) -> VethorResult<Device> {
        let root = wallet::root_address(mnemonic, derivation_path)?;
        let device = Device {
            root_address: root,
            alias: clean_alias(alias)?,
            device_type: DeviceType::LocalMnemonic,
            wallet: Some(WalletSecret {
                mnemonic: Some(mnemonic.trim().to_string()),
                private_key: None,
                derivation_path: derivation_path.map(str::to_string),
            }),
        };
        self.insert_device(device)
    }

    /// Add a private key device and its single account
    pub fn add_private_key_device(&self, private_key: &str, alias: &str) -> VethorResult<Device> {
        let secret = wallet::keygen::secret_from_hex(private_key)?;
        let device = Device {
            root_address: address_from_secret_key(&secret),
            alias: clean_alias(alias)?,
            device_type: DeviceType::LocalPrivateKey,
            wallet: Some(WalletSecret {
                mnemonic: None,
                private_key: Some(
                    crate::utils::hexutils::strip_prefix(private_key.trim()).to_string(),
                ),
                derivation_path: None,
            }),
        };
        self.insert_device(device)
    }

    /// Add a Ledger device; accounts are added with explicit addresses
    pub fn add_ledger_device(&self, root_address: &str, alias: &str) -> VethorResult<Device> {
        require_address(root_address)?;
        let device = Device {
            root_address: root_address.to_string(),
            alias: clean_alias(alias)?,
            device_type: DeviceType::Ledger,
            wallet: None,
        };
        self.insert_device(device)
    }

    /// Add a watch-only device for an external address
    pub fn add_watched_device(&self, address: &str, alias: &str) -> VethorResult<Device> {
        require_address(address)?;
        let device = Device {
            root_address: address.to_string(),
            alias: clean_alias(alias)?,
            device_type: DeviceType::Watched,
            wallet: None,
        };
        self.insert_device(device)
    }

    fn insert_device(&self, device: Device) -> VethorResult<Device> {
        let mut data = self.read()?;
        if data
            .devices
            .iter()
            .any(|d| compare_addresses(&d.root_address, &device.root_address))
        {
            // Local key material duplicates surface as a wallet clash,
            // hardware devices as a device clash
            let message = if device.device_type.is_local() {
                "wallet_already_exists"
            } else {
                "device_already_exists"
            };
            return Err(VethorError::invalid_request(message));
        }

        // Local devices get their first account up front
        if device.device_type.is_local() {
            data.accounts.push(Account {
                address: device.root_address.clone(),
                index: 0,
                root_address: device.root_address.clone(),
                alias: "Account 1".to_string(),
                visible: true,
            });
        }

        data.devices.push(device.clone());
        self.write(&data)?;
        log_info!(MODULE, "Device added", root_address = device.root_address);
        Ok(device)
    }

    /// Rename a device; the alias is trimmed and must not end up empty
    pub fn rename_device(&self, root_address: &str, alias: &str) -> VethorResult<Device> {
        let alias = clean_alias(alias)?;
        let mut data = self.read()?;
        let device = data
            .devices
            .iter_mut()
            .find(|d| compare_addresses(&d.root_address, root_address))
            .ok_or_else(|| device_not_found(root_address))?;
        device.alias = alias;
        let renamed = device.clone();
        self.write(&data)?;
        Ok(renamed)
    }

    /// Remove a device and all of its accounts
    ///
    /// Unknown addresses are ignored; the last device cannot be removed.
    pub fn remove_device(&self, root_address: &str) -> VethorResult<()> {
        let mut data = self.read()?;
        let exists = data
            .devices
            .iter()
            .any(|d| compare_addresses(&d.root_address, root_address));
        if !exists {
            return Ok(());
        }
        if data.devices.len() == 1 {
            return Err(VethorError::invalid_request("cannot_remove_last_device"));
        }

        data.devices
            .retain(|d| !compare_addresses(&d.root_address, root_address));
        data.accounts
            .retain(|a| !compare_addresses(&a.root_address, root_address));
        self.write(&data)?;
        log_info!(MODULE, "Device removed", root_address = root_address);
        Ok(())
    }

    /// Drop every account owned by a device, keeping the device itself
    pub fn remove_accounts_for_device(&self, root_address: &str) -> VethorResult<()> {
        let mut data = self.read()?;
        data.accounts
            .retain(|a| !compare_addresses(&a.root_address, root_address));
        self.write(&data)
    }

    /// Key material for a local device; signing-path only
    pub fn signing_secret(&self, root_address: &str) -> VethorResult<WalletSecret> {
        let device = self.get_device(root_address)?;
        if !device.device_type.is_local() {
            return Err(VethorError::signing_failed(
                "Device has no local key material",
            ));
        }
        device.wallet.ok_or_else(|| {
            VethorError::internal("Local device is missing its wallet secret")
        })
    }

    // =========================================================================
    // Accounts
    // =========================================================================

    pub fn accounts(&self) -> VethorResult<Vec<Account>> {
        Ok(self.read()?.accounts)
    }

    pub fn accounts_for_device(&self, root_address: &str) -> VethorResult<Vec<Account>> {
        Ok(self
            .read()?
            .accounts
            .into_iter()
            .filter(|a| compare_addresses(&a.root_address, root_address))
            .collect())
    }

    pub fn get_account(&self, address: &str) -> VethorResult<Account> {
        self.read()?
            .accounts
            .into_iter()
            .find(|a| compare_addresses(&a.address, address))
            .ok_or_else(|| {
                VethorError::not_found(format!("No account for address {}", address))
            })
    }

    /// Add an account under a device
    ///
    /// For local devices the address is derived from the device's key
    /// material at `index`; for Ledger and watched devices the caller
    /// supplies the address.
    pub fn add_account(
        &self,
        root_address: &str,
        index: u32,
        alias: &str,
        address: Option<&str>,
    ) -> VethorResult<Account> {
        let mut data = self.read()?;
        let device = data
            .devices
            .iter()
            .find(|d| compare_addresses(&d.root_address, root_address))
            .ok_or_else(|| device_not_found(root_address))?;

        let account_address = if device.device_type.is_local() {
            let secret = device.wallet.as_ref().ok_or_else(|| {
                VethorError::internal("Local device is missing its wallet secret")
            })?;
            let derived = derived_account_address(secret, index)?;
            if let Some(given) = address {
                if !compare_addresses(given, &derived) {
                    return Err(VethorError::invalid_input(
                        "Provided address does not match the derived account",
                    ));
                }
            }
            derived
        } else {
            let given = address.ok_or_else(|| {
                VethorError::invalid_input("External devices need an explicit account address")
            })?;
            require_address(given)?;
            given.to_string()
        };

        let duplicate = data.accounts.iter().any(|a| {
            compare_addresses(&a.address, &account_address)
                || (compare_addresses(&a.root_address, root_address) && a.index == index)
        });
        if duplicate {
            return Err(VethorError::invalid_request("account_already_exists"));
        }

        let account = Account {
            address: account_address,
            index,
            root_address: device.root_address.clone(),
            alias: clean_alias(alias)?,
            visible: true,
        };
        data.accounts.push(account.clone());
        self.write(&data)?;
        Ok(account)
    }

    pub fn rename_account(&self, address: &str, alias: &str) -> VethorResult<Account> {
        let alias = clean_alias(alias)?;
        let mut data = self.read()?;
        let account = data
            .accounts
            .iter_mut()
            .find(|a| compare_addresses(&a.address, address))
            .ok_or_else(|| {
                VethorError::not_found(format!("No account for address {}", address))
            })?;
        account.alias = alias;
        let renamed = account.clone();
        self.write(&data)?;
        Ok(renamed)
    }

    pub fn set_account_visibility(&self, address: &str, visible: bool) -> VethorResult<()> {
        let mut data = self.read()?;
        let account = data
            .accounts
            .iter_mut()
            .find(|a| compare_addresses(&a.address, address))
            .ok_or_else(|| {
                VethorError::not_found(format!("No account for address {}", address))
            })?;
        account.visible = visible;
        self.write(&data)
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    fn require_key(&self) -> VethorResult<&Zeroizing<[u8; 32]>> {
        self.key
            .as_ref()
            .ok_or_else(|| VethorError::store_locked("Store is locked"))
    }

    fn read(&self) -> VethorResult<StoreData> {
        let key = self.require_key()?;
        let envelope = read_envelope(&self.path)?;
        let plaintext = encryption::open(&envelope, key)?;
        serde_json::from_slice(&plaintext)
            .map_err(|e| VethorError::parse_error(format!("Corrupted store data: {}", e)))
    }

    fn write(&self, data: &StoreData) -> VethorResult<()> {
        let key = self.require_key()?;
        let plaintext = Zeroizing::new(serde_json::to_vec(data)?);
        let envelope = encryption::seal(&plaintext, key, &self.salt)?;

        // Write-then-rename so a crash never leaves a half-written store
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, serde_json::to_vec(&envelope)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

fn read_envelope(path: &Path) -> VethorResult<Envelope> {
    let raw = fs::read_to_string(path)
        .map_err(|_| VethorError::not_found(format!("No store file at {}", path.display())))?;
    serde_json::from_str(&raw)
        .map_err(|e| VethorError::parse_error(format!("Corrupted store file: {}", e)))
}

fn derived_account_address(secret: &WalletSecret, index: u32) -> VethorResult<String> {
    let key = wallet::account_secret(secret, index)?;
    Ok(address_from_secret_key(&key))
}

fn clean_alias(alias: &str) -> VethorResult<String> {
    let trimmed = alias.trim();
    if trimmed.is_empty() {
        return Err(VethorError::invalid_input("Alias must not be empty"));
    }
    Ok(trimmed.to_string())
}

fn require_address(address: &str) -> VethorResult<()> {
    if !is_valid_address(address) {
        return Err(VethorError::new(
            ErrorCode::InvalidAddress,
            format!("Invalid address: {}", address),
        ));
    }
    Ok(())
}

fn device_not_found(root_address: &str) -> VethorError {
    VethorError::not_found(format!("No device for root address {}", root_address))
}
