//! Recoverable secp256k1 Signatures
//!
//! VeChain signatures are 65 bytes: r (32) | s (32) | recovery id (1),
//! with the recovery id stored as 0 or 1.

use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};

use crate::error::{ErrorCode, VethorError, VethorResult};
use crate::thor::address::address_from_public_key;

/// Sign a 32-byte hash, returning the 65-byte recoverable signature
pub fn sign_hash(hash: &[u8; 32], secret_key: &SecretKey) -> VethorResult<[u8; 65]> {
    let secp = Secp256k1::new();
    let message = Message::from_digest(*hash);
    let signature = secp.sign_ecdsa_recoverable(&message, secret_key);
    let (recovery_id, compact) = signature.serialize_compact();

    let mut out = [0u8; 65];
    out[..64].copy_from_slice(&compact);
    out[64] = recovery_id.to_i32() as u8;
    Ok(out)
}

/// Recover the signer's public key from a 65-byte signature
pub fn recover_public_key(hash: &[u8; 32], signature: &[u8]) -> VethorResult<PublicKey> {
    if signature.len() != 65 {
        return Err(VethorError::new(
            ErrorCode::InvalidInput,
            format!("Expected 65-byte signature, got {}", signature.len()),
        ));
    }
    let recovery_id = RecoveryId::from_i32(signature[64] as i32)?;
    let recoverable = RecoverableSignature::from_compact(&signature[..64], recovery_id)?;

    let secp = Secp256k1::new();
    let message = Message::from_digest(*hash);
    Ok(secp.recover_ecdsa(&message, &recoverable)?)
}

/// Recover the signer's checksummed address from a 65-byte signature
pub fn recover_address(hash: &[u8; 32], signature: &[u8]) -> VethorResult<String> {
    Ok(address_from_public_key(&recover_public_key(
        hash, signature,
    )?))
}
