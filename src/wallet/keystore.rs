//! V3 Keystore Files
//!
//! Import and export of the Ethereum V3 keystore format used for wallet
//! backups: scrypt key derivation, AES-128-CTR encryption and a keccak
//! MAC over the ciphertext. The MAC check doubles as the password check
//! and runs in constant time.

use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::error::{ErrorCode, VethorError, VethorResult};
use crate::thor::address::address_from_secret_key;
use crate::utils::crypto::keccak256;
use crate::utils::hexutils;

type Aes128Ctr = ctr::Ctr128BE<aes::Aes128>;

const CIPHER_AES_128_CTR: &str = "aes-128-ctr";
const KDF_SCRYPT: &str = "scrypt";

/// scrypt cost for exported keystores (2^17, the common wallet default)
const EXPORT_LOG_N: u8 = 17;
const EXPORT_R: u32 = 8;
const EXPORT_P: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Keystore {
    pub version: u32,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    pub crypto: Crypto,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Crypto {
    pub cipher: String,
    pub ciphertext: String,
    pub cipherparams: CipherParams,
    pub kdf: String,
    pub kdfparams: KdfParams,
    pub mac: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CipherParams {
    pub iv: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KdfParams {
    pub dklen: u32,
    pub n: u64,
    pub p: u32,
    pub r: u32,
    pub salt: String,
}

impl Keystore {
    pub fn parse(json: &str) -> VethorResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| VethorError::parse_error(format!("Invalid keystore JSON: {}", e)))
    }

    /// Decrypt the keystore, returning the raw 32-byte private key
    pub fn decrypt(&self, password: &str) -> VethorResult<Zeroizing<[u8; 32]>> {
        if self.version != 3 {
            return Err(VethorError::new(
                ErrorCode::InvalidInput,
                format!("Unsupported keystore version: {}", self.version),
            ));
        }
        if self.crypto.kdf != KDF_SCRYPT {
            return Err(VethorError::new(
                ErrorCode::InvalidInput,
                format!("Unsupported KDF: {}", self.crypto.kdf),
            ));
        }
        if self.crypto.cipher != CIPHER_AES_128_CTR {
            return Err(VethorError::new(
                ErrorCode::InvalidInput,
                format!("Unsupported cipher: {}", self.crypto.cipher),
            ));
        }

        let params = &self.crypto.kdfparams;
        if params.dklen != 32 {
            return Err(VethorError::new(
                ErrorCode::InvalidInput,
                format!("Unsupported dklen: {}", params.dklen),
            ));
        }
        let salt = hexutils::decode(&params.salt)?;
        let ciphertext = hexutils::decode(&self.crypto.ciphertext)?;
        let iv = hexutils::decode(&self.crypto.cipherparams.iv)?;
        let mac = hexutils::decode(&self.crypto.mac)?;

        let dk = derive_scrypt_key(password, &salt, params.n, params.r, params.p)?;

        // keccak256(dk[16..32] || ciphertext) must match the stored MAC
        let computed = keccak256(&[&dk[16..32], ciphertext.as_slice()].concat());
        if mac.len() != 32 || !bool::from(computed.ct_eq(&mac[..])) {
            return Err(VethorError::incorrect_password(
                "Keystore MAC mismatch: wrong password or corrupted file",
            ));
        }

        let mut plaintext = Zeroizing::new(ciphertext);
        apply_aes_128_ctr(&dk[..16], &iv, &mut plaintext)?;

        if plaintext.len() != 32 {
            return Err(VethorError::crypto_error(format!(
                "Decrypted key has {} bytes",
                plaintext.len()
            )));
        }
        let mut key = Zeroizing::new([0u8; 32]);
        key.copy_from_slice(&plaintext);

        self.check_address(&key)?;
        Ok(key)
    }

    /// Decrypt into a usable secp256k1 key
    pub fn decrypt_to_secret(&self, password: &str) -> VethorResult<secp256k1::SecretKey> {
        let key = self.decrypt(password)?;
        secp256k1::SecretKey::from_slice(key.as_ref()).map_err(|_| {
            VethorError::new(
                ErrorCode::InvalidPrivateKey,
                "Keystore does not contain a valid secp256k1 key",
            )
        })
    }

    /// Encrypt a private key into a fresh V3 keystore
    pub fn encrypt(private_key: &secp256k1::SecretKey, password: &str) -> VethorResult<Self> {
        Self::encrypt_with_cost(private_key, password, EXPORT_LOG_N)
    }

    fn encrypt_with_cost(
        private_key: &secp256k1::SecretKey,
        password: &str,
        log_n: u8,
    ) -> VethorResult<Self> {
        use rand::RngCore;
        let mut rng = rand::thread_rng();

        let mut salt = [0u8; 32];
        rng.fill_bytes(&mut salt);
        let mut iv = [0u8; 16];
        rng.fill_bytes(&mut iv);

        let dk = derive_scrypt_key(password, &salt, 1u64 << log_n, EXPORT_R, EXPORT_P)?;

        let mut ciphertext = private_key.secret_bytes().to_vec();
        apply_aes_128_ctr(&dk[..16], &iv, &mut ciphertext)?;

        let mac = keccak256(&[&dk[16..32], ciphertext.as_slice()].concat());
        let address = address_from_secret_key(private_key).to_lowercase();

        Ok(Keystore {
            version: 3,
            id: random_id(&mut rng),
            address: Some(hexutils::strip_prefix(&address).to_string()),
            crypto: Crypto {
                cipher: CIPHER_AES_128_CTR.to_string(),
                ciphertext: hex::encode(ciphertext),
                cipherparams: CipherParams {
                    iv: hex::encode(iv),
                },
                kdf: KDF_SCRYPT.to_string(),
                kdfparams: KdfParams {
                    dklen: 32,
                    n: 1u64 << log_n,
                    p: EXPORT_P,
                    r: EXPORT_R,
                    salt: hex::encode(salt),
                },
                mac: hex::encode(mac),
            },
        })
    }

    /// Cross-check the stored address against the decrypted key
    fn check_address(&self, key: &[u8; 32]) -> VethorResult<()> {
        let Some(stored) = &self.address else {
            return Ok(());
        };
        let secret = secp256k1::SecretKey::from_slice(key).map_err(|_| {
            VethorError::new(
                ErrorCode::InvalidPrivateKey,
                "Keystore does not contain a valid secp256k1 key",
            )
        })?;
        let derived = address_from_secret_key(&secret);
        if !hexutils::compare_addresses(&derived, stored) {
            return Err(VethorError::crypto_error(
                "Keystore address does not match decrypted key",
            ));
        }
        Ok(())
    }
}

fn derive_scrypt_key(
    password: &str,
    salt: &[u8],
    n: u64,
    r: u32,
    p: u32,
) -> VethorResult<Zeroizing<[u8; 32]>> {
    if n < 2 || !n.is_power_of_two() {
        return Err(VethorError::new(
            ErrorCode::InvalidInput,
            format!("scrypt n must be a power of two, got {}", n),
        ));
    }
    let log_n = n.trailing_zeros() as u8;
    let params = scrypt::Params::new(log_n, r, p, 32)
        .map_err(|e| VethorError::crypto_error(format!("Invalid scrypt parameters: {}", e)))?;

    let mut dk = Zeroizing::new([0u8; 32]);
    scrypt::scrypt(password.as_bytes(), salt, &params, dk.as_mut())
        .map_err(|e| VethorError::crypto_error(format!("scrypt failed: {}", e)))?;
    Ok(dk)
}

fn apply_aes_128_ctr(key: &[u8], iv: &[u8], data: &mut [u8]) -> VethorResult<()> {
    use ctr::cipher::{KeyIvInit, StreamCipher};
    let mut cipher = Aes128Ctr::new_from_slices(key, iv)
        .map_err(|_| VethorError::crypto_error("Invalid AES key or IV length"))?;
    cipher.apply_keystream(data);
    Ok(())
}

fn random_id(rng: &mut impl rand::RngCore) -> String {
    let mut bytes = [0u8; 16];
    rng.fill_bytes(&mut bytes);
    let h = hex::encode(bytes);
    format!(
        "{}-{}-{}-{}-{}",
        &h[0..8],
        &h[8..12],
        &h[12..16],
        &h[16..20],
        &h[20..32]
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_key() -> secp256k1::SecretKey {
        secp256k1::SecretKey::from_slice(
            &hex::decode("7582be841ca040aa940fff6c05773129e135623e41acce3e0b8ba520dc1ae26a")
                .unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        // Low cost keeps the test fast; the layout is identical
        let ks = Keystore::encrypt_with_cost(&sample_key(), "open sesame", 4).unwrap();
        assert_eq!(ks.version, 3);
        assert_eq!(ks.crypto.cipher, CIPHER_AES_128_CTR);

        let secret = ks.decrypt_to_secret("open sesame").unwrap();
        assert_eq!(secret, sample_key());
    }

    #[test]
    fn test_wrong_password_fails_mac() {
        let ks = Keystore::encrypt_with_cost(&sample_key(), "right", 4).unwrap();
        let err = ks.decrypt("wrong").unwrap_err();
        assert_eq!(err.code, ErrorCode::IncorrectPassword);
    }

    #[test]
    fn test_tampered_ciphertext_fails_mac() {
        let mut ks = Keystore::encrypt_with_cost(&sample_key(), "pw", 4).unwrap();
        let mut ct = hex::decode(&ks.crypto.ciphertext).unwrap();
        ct[0] ^= 0xff;
        ks.crypto.ciphertext = hex::encode(ct);
        assert!(ks.decrypt("pw").is_err());
    }

    #[test]
    fn test_address_mismatch_detected() {
        let mut ks = Keystore::encrypt_with_cost(&sample_key(), "pw", 4).unwrap();
        ks.address = Some("7567d83b7b8d80addcb281a71d54fc7b3364ffed".to_string());
        let err = ks.decrypt("pw").unwrap_err();
        assert_eq!(err.code, ErrorCode::CryptoError);
    }

    #[test]
    fn test_rejects_unsupported_fields() {
        let mut ks = Keystore::encrypt_with_cost(&sample_key(), "pw", 4).unwrap();
        ks.version = 2;
        assert!(ks.decrypt("pw").is_err());

        let mut ks = Keystore::encrypt_with_cost(&sample_key(), "pw", 4).unwrap();
        ks.crypto.kdf = "pbkdf2".to_string();
        assert!(ks.decrypt("pw").is_err());

        let mut ks = Keystore::encrypt_with_cost(&sample_key(), "pw", 4).unwrap();
        ks.crypto.kdfparams.n = 1000; // not a power of two
        assert!(ks.decrypt("pw").is_err());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(Keystore::parse("{}").is_err());
        assert!(Keystore::parse("not json").is_err());
    }

    #[test]
    fn test_json_roundtrip() {
        let ks = Keystore::encrypt_with_cost(&sample_key(), "pw", 4).unwrap();
        let json = serde_json::to_string(&ks).unwrap();
        let parsed = Keystore::parse(&json).unwrap();
        assert_eq!(parsed.crypto.mac, ks.crypto.mac);
        let secret = parsed.decrypt_to_secret("pw").unwrap();
        assert_eq!(secret, sample_key());
    }
}
