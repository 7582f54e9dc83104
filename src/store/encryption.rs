//! Store Encryption Envelope
//!
//! The device store is kept on disk as an AES-256-GCM envelope under an
//! Argon2id-derived key. The salt is fixed per store file so the derived
//! key can be cached across operations; the nonce is fresh per write.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::error::{ErrorCode, VethorError, VethorResult};

pub const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;
const ENVELOPE_VERSION: u32 = 1;

/// On-disk form of the encrypted store
#[derive(Debug, Serialize, Deserialize)]
pub struct Envelope {
    pub version: u32,
    pub kdf: String,
    pub salt: String,
    pub nonce: String,
    pub ciphertext: String,
}

/// Derive the store key from a password and the store salt
pub fn derive_key(password: &str, salt: &[u8]) -> VethorResult<Zeroizing<[u8; 32]>> {
    let mut key = Zeroizing::new([0u8; 32]);
    argon2::Argon2::default()
        .hash_password_into(password.as_bytes(), salt, key.as_mut())
        .map_err(|e| VethorError::crypto_error(format!("Key derivation failed: {}", e)))?;
    Ok(key)
}

/// Encrypt a payload under a derived key, producing the on-disk envelope
pub fn seal(plaintext: &[u8], key: &[u8; 32], salt: &[u8]) -> VethorResult<Envelope> {
    use rand::RngCore;
    let mut nonce = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce);

    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|_| VethorError::crypto_error("Invalid store key length"))?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|_| VethorError::crypto_error("Store encryption failed"))?;

    Ok(Envelope {
        version: ENVELOPE_VERSION,
        kdf: "argon2id".to_string(),
        salt: BASE64.encode(salt),
        nonce: BASE64.encode(nonce),
        ciphertext: BASE64.encode(ciphertext),
    })
}

/// Decrypt an envelope with a derived key
///
/// GCM authentication failure means a wrong password or a tampered file;
/// both surface as `IncorrectPassword`.
pub fn open(envelope: &Envelope, key: &[u8; 32]) -> VethorResult<Zeroizing<Vec<u8>>> {
    if envelope.version != ENVELOPE_VERSION {
        return Err(VethorError::new(
            ErrorCode::InvalidInput,
            format!("Unsupported store version: {}", envelope.version),
        ));
    }
    let nonce = decode_b64(&envelope.nonce, "nonce")?;
    let ciphertext = decode_b64(&envelope.ciphertext, "ciphertext")?;
    if nonce.len() != NONCE_LEN {
        return Err(VethorError::parse_error("Store nonce has wrong length"));
    }

    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|_| VethorError::crypto_error("Invalid store key length"))?;
    let plaintext = cipher
        .decrypt(Nonce::from_slice(&nonce), ciphertext.as_slice())
        .map_err(|_| {
            VethorError::incorrect_password("Store decryption failed: wrong password or corrupted file")
        })?;
    Ok(Zeroizing::new(plaintext))
}

/// Read the salt back out of an envelope
pub fn envelope_salt(envelope: &Envelope) -> VethorResult<Vec<u8>> {
    let salt = decode_b64(&envelope.salt, "salt")?;
    if salt.len() != SALT_LEN {
        return Err(VethorError::parse_error("Store salt has wrong length"));
    }
    Ok(salt)
}

fn decode_b64(value: &str, field: &str) -> VethorResult<Vec<u8>> {
    BASE64
        .decode(value)
        .map_err(|_| VethorError::parse_error(format!("Store {} is not valid base64", field)))
}
