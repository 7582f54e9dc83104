//! VeChain Transactions
//!
//! Canonical RLP encoding for transaction bodies, the signing hashes
//! (plain and VIP-191 delegated), signature attachment, and transaction
//! ids. Field encoding follows the chain's RLP profile: integers are
//! canonical (no leading zeros), `blockRef` is a compact 8-byte blob,
//! `dependsOn` a nullable fixed 32-byte blob, clause `to` a nullable
//! fixed 20-byte blob.

use rlp::{Rlp, RlpStream};
use serde::{Deserialize, Serialize};

use crate::error::{ErrorCode, VethorError, VethorResult};
use crate::thor::address::address_bytes;
use crate::thor::secp;
use crate::utils::crypto::blake2b256;
use crate::utils::hexutils;

/// Bit in `reserved.features` marking a VIP-191 fee-delegated transaction
pub const DELEGATION_FEATURE: u32 = 1;

/// Length of a single recoverable signature
pub const SIGNATURE_LEN: usize = 65;

// =============================================================================
// Body Types
// =============================================================================

/// A single clause: one transfer and/or contract call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clause {
    /// Recipient address; `None` deploys a contract
    pub to: Option<String>,
    /// Amount in wei, hex encoded
    #[serde(with = "serde_hex_u128")]
    pub value: u128,
    /// Call data
    #[serde(with = "serde_hex_bytes")]
    pub data: Vec<u8>,
}

/// Reserved field; only `features` is currently meaningful
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reserved {
    #[serde(default)]
    pub features: u32,
}

/// Unsigned transaction body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionBody {
    pub chain_tag: u8,
    /// First 8 bytes of a recent block id
    #[serde(with = "serde_hex_block_ref")]
    pub block_ref: [u8; 8],
    /// Lifetime in blocks, relative to `block_ref`
    pub expiration: u32,
    pub clauses: Vec<Clause>,
    pub gas_price_coef: u8,
    pub gas: u64,
    /// Transaction id this one depends on, if any
    #[serde(default, with = "serde_hex_depends_on")]
    pub depends_on: Option<[u8; 32]>,
    pub nonce: u64,
    #[serde(default)]
    pub reserved: Reserved,
}

/// A transaction: body plus an optional signature
///
/// Undelegated transactions carry a 65-byte origin signature; delegated
/// ones carry origin plus gas payer (130 bytes) and the feature bit set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub body: TransactionBody,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "serde_hex_opt_bytes")]
    pub signature: Option<Vec<u8>>,
}

impl TransactionBody {
    /// Whether the VIP-191 delegation feature bit is set
    pub fn is_delegated(&self) -> bool {
        self.reserved.features & DELEGATION_FEATURE != 0
    }

    /// Set the delegation feature bit
    pub fn set_delegated(&mut self) {
        self.reserved.features |= DELEGATION_FEATURE;
    }
}

impl Transaction {
    pub fn new(body: TransactionBody) -> Self {
        Self {
            body,
            signature: None,
        }
    }

    pub fn is_delegated(&self) -> bool {
        self.body.is_delegated()
    }

    // =========================================================================
    // Encoding
    // =========================================================================

    /// RLP encoding of the unsigned body (the sponsor-facing `raw` form);
    /// fails when a clause carries an invalid recipient
    pub fn encode_unsigned(&self) -> VethorResult<Vec<u8>> {
        let mut stream = RlpStream::new();
        self.rlp_append_body(&mut stream, false)?;
        Ok(stream.out().to_vec())
    }

    /// RLP encoding including the signature; fails when unsigned
    pub fn encode(&self) -> VethorResult<Vec<u8>> {
        if self.signature.is_none() {
            return Err(VethorError::new(
                ErrorCode::InvalidTransaction,
                "Cannot encode an unsigned transaction as raw",
            ));
        }
        let mut stream = RlpStream::new();
        self.rlp_append_body(&mut stream, true)?;
        Ok(stream.out().to_vec())
    }

    fn rlp_append_body(&self, stream: &mut RlpStream, with_signature: bool) -> VethorResult<()> {
        let body = &self.body;
        stream.begin_list(if with_signature { 10 } else { 9 });
        append_integer(stream, &[body.chain_tag]);
        append_integer(stream, &body.block_ref); // compact blob: zeros trimmed
        append_integer(stream, &body.expiration.to_be_bytes());

        stream.begin_list(body.clauses.len());
        for clause in &body.clauses {
            stream.begin_list(3);
            match &clause.to {
                // Nullable fixed blob: full 20 bytes or empty
                Some(to) => {
                    let bytes = address_bytes(to)?;
                    stream.append(&bytes.to_vec());
                }
                None => {
                    stream.append_empty_data();
                }
            }
            append_integer(stream, &clause.value.to_be_bytes());
            stream.append(&clause.data);
        }

        append_integer(stream, &[body.gas_price_coef]);
        append_integer(stream, &body.gas.to_be_bytes());
        match &body.depends_on {
            Some(id) => {
                stream.append(&id.to_vec());
            }
            None => {
                stream.append_empty_data();
            }
        }
        append_integer(stream, &body.nonce.to_be_bytes());

        // Reserved: trailing zero values are trimmed away entirely
        if body.reserved.features == 0 {
            stream.begin_list(0);
        } else {
            stream.begin_list(1);
            append_integer(stream, &body.reserved.features.to_be_bytes());
        }

        if with_signature {
            if let Some(sig) = &self.signature {
                stream.append(sig);
            }
        }
        Ok(())
    }

    /// Decode a raw transaction (signed or unsigned)
    pub fn decode(raw: &[u8]) -> VethorResult<Self> {
        let rlp = Rlp::new(raw);
        if !rlp.is_list() {
            return Err(invalid_tx("Raw transaction is not an RLP list"));
        }
        let item_count = rlp
            .item_count()
            .map_err(|e| invalid_tx(format!("RLP error: {}", e)))?;
        if item_count != 9 && item_count != 10 {
            return Err(invalid_tx(format!(
                "Expected 9 or 10 transaction fields, got {}",
                item_count
            )));
        }

        let chain_tag = decode_uint(&rlp, 0, 1)? as u8;
        let block_ref = decode_compact_blob::<8>(&rlp, 1)?;
        let expiration = decode_uint(&rlp, 2, 4)? as u32;

        let clauses_rlp = rlp.at(3).map_err(|e| invalid_tx(format!("RLP error: {}", e)))?;
        let clause_count = clauses_rlp
            .item_count()
            .map_err(|e| invalid_tx(format!("RLP error: {}", e)))?;
        let mut clauses = Vec::with_capacity(clause_count);
        for i in 0..clause_count {
            let clause_rlp = clauses_rlp
                .at(i)
                .map_err(|e| invalid_tx(format!("RLP error: {}", e)))?;
            let to_bytes = item_data(&clause_rlp, 0)?;
            let to = match to_bytes.len() {
                0 => None,
                20 => Some(hexutils::encode_prefixed(&to_bytes)),
                n => return Err(invalid_tx(format!("Clause `to` has {} bytes", n))),
            };
            let value_bytes = item_data(&clause_rlp, 1)?;
            let value = uint_from_be(&value_bytes, 16)?;
            let data = item_data(&clause_rlp, 2)?;
            clauses.push(Clause { to, value, data });
        }

        let gas_price_coef = decode_uint(&rlp, 4, 1)? as u8;
        let gas = decode_uint(&rlp, 5, 8)?;
        let depends_bytes = item_data(&rlp, 6)?;
        let depends_on = match depends_bytes.len() {
            0 => None,
            32 => {
                let mut id = [0u8; 32];
                id.copy_from_slice(&depends_bytes);
                Some(id)
            }
            n => return Err(invalid_tx(format!("`dependsOn` has {} bytes", n))),
        };
        let nonce = decode_uint(&rlp, 7, 8)?;

        let reserved_rlp = rlp.at(8).map_err(|e| invalid_tx(format!("RLP error: {}", e)))?;
        let reserved_count = reserved_rlp
            .item_count()
            .map_err(|e| invalid_tx(format!("RLP error: {}", e)))?;
        let features = if reserved_count > 0 {
            uint_from_be(&item_data(&reserved_rlp, 0)?, 4)? as u32
        } else {
            0
        };

        let signature = if item_count == 10 {
            let sig = item_data(&rlp, 9)?;
            validate_signature_len(&sig, features & DELEGATION_FEATURE != 0)?;
            Some(sig)
        } else {
            None
        };

        Ok(Transaction {
            body: TransactionBody {
                chain_tag,
                block_ref,
                expiration,
                clauses,
                gas_price_coef,
                gas,
                depends_on,
                nonce,
                reserved: Reserved { features },
            },
            signature,
        })
    }

    // =========================================================================
    // Hashes & Signatures
    // =========================================================================

    /// Hash the origin signs: blake2b256 of the unsigned encoding
    pub fn signing_hash(&self) -> VethorResult<[u8; 32]> {
        Ok(blake2b256(&[&self.encode_unsigned()?]))
    }

    /// Hash the gas payer signs for `delegate_for` (VIP-191)
    pub fn delegated_signing_hash(&self, delegate_for: &str) -> VethorResult<[u8; 32]> {
        let origin = address_bytes(delegate_for)?;
        Ok(blake2b256(&[&self.signing_hash()?, &origin]))
    }

    /// Attach the origin signature (undelegated transactions)
    pub fn set_signature(&mut self, signature: [u8; SIGNATURE_LEN]) {
        self.signature = Some(signature.to_vec());
    }

    /// Attach origin and gas payer signatures (delegated transactions)
    pub fn set_delegated_signature(
        &mut self,
        origin: [u8; SIGNATURE_LEN],
        gas_payer: [u8; SIGNATURE_LEN],
    ) {
        let mut sig = Vec::with_capacity(2 * SIGNATURE_LEN);
        sig.extend_from_slice(&origin);
        sig.extend_from_slice(&gas_payer);
        self.signature = Some(sig);
    }

    /// Address of the origin signer, recovered from the signature
    pub fn origin(&self) -> VethorResult<String> {
        let sig = self.require_signature()?;
        secp::recover_address(&self.signing_hash()?, &sig[..SIGNATURE_LEN])
    }

    /// Address of the gas payer for a delegated transaction
    pub fn gas_payer(&self) -> VethorResult<String> {
        if !self.is_delegated() {
            return Err(invalid_tx("Transaction is not delegated"));
        }
        let sig = self.require_signature()?;
        let origin = self.origin()?;
        let hash = self.delegated_signing_hash(&origin)?;
        secp::recover_address(&hash, &sig[SIGNATURE_LEN..])
    }

    /// Transaction id: blake2b256(signing hash, origin address)
    pub fn id(&self) -> VethorResult<String> {
        let origin = self.origin()?;
        let origin_bytes = address_bytes(&origin)?;
        Ok(hexutils::encode_prefixed(&blake2b256(&[
            &self.signing_hash()?,
            &origin_bytes,
        ])))
    }

    fn require_signature(&self) -> VethorResult<&[u8]> {
        let sig = self
            .signature
            .as_deref()
            .ok_or_else(|| invalid_tx("Transaction is not signed"))?;
        validate_signature_len(sig, self.is_delegated())?;
        Ok(sig)
    }
}

fn validate_signature_len(sig: &[u8], delegated: bool) -> VethorResult<()> {
    let expected = if delegated {
        2 * SIGNATURE_LEN
    } else {
        SIGNATURE_LEN
    };
    if sig.len() != expected {
        return Err(invalid_tx(format!(
            "Expected {}-byte signature, got {}",
            expected,
            sig.len()
        )));
    }
    Ok(())
}

fn invalid_tx(msg: impl Into<String>) -> VethorError {
    VethorError::new(ErrorCode::InvalidTransaction, msg)
}

// =============================================================================
// RLP Helpers
// =============================================================================

/// Append a canonical integer / compact blob: leading zeros trimmed
fn append_integer(stream: &mut RlpStream, bytes: &[u8]) {
    let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    stream.append(&bytes[start..].to_vec());
}

fn item_data(rlp: &Rlp, index: usize) -> VethorResult<Vec<u8>> {
    rlp.at(index)
        .and_then(|item| item.data().map(|d| d.to_vec()))
        .map_err(|e| invalid_tx(format!("RLP error: {}", e)))
}

/// Parse a canonical big-endian unsigned integer of at most `max_len` bytes
fn uint_from_be(bytes: &[u8], max_len: usize) -> VethorResult<u128> {
    if bytes.len() > max_len {
        return Err(invalid_tx(format!(
            "Integer field exceeds {} bytes",
            max_len
        )));
    }
    if !bytes.is_empty() && bytes[0] == 0 {
        return Err(invalid_tx("Integer field has leading zeros"));
    }
    let mut value: u128 = 0;
    for b in bytes {
        value = (value << 8) | *b as u128;
    }
    Ok(value)
}

fn decode_uint(rlp: &Rlp, index: usize, max_len: usize) -> VethorResult<u64> {
    Ok(uint_from_be(&item_data(rlp, index)?, max_len)? as u64)
}

/// Decode a compact fixed blob: left-pad trimmed zeros back to N bytes
fn decode_compact_blob<const N: usize>(rlp: &Rlp, index: usize) -> VethorResult<[u8; N]> {
    let bytes = item_data(rlp, index)?;
    if bytes.len() > N {
        return Err(invalid_tx(format!("Blob field exceeds {} bytes", N)));
    }
    let mut out = [0u8; N];
    out[N - bytes.len()..].copy_from_slice(&bytes);
    Ok(out)
}

// =============================================================================
// Serde Helpers (hex-string JSON forms)
// =============================================================================

mod serde_hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&crate::utils::hexutils::encode_prefixed(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(de)?;
        crate::utils::hexutils::decode(&s).map_err(serde::de::Error::custom)
    }
}

mod serde_hex_opt_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &Option<Vec<u8>>, ser: S) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(b) => ser.serialize_str(&crate::utils::hexutils::encode_prefixed(b)),
            None => ser.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Option<Vec<u8>>, D::Error> {
        let s: Option<String> = Option::deserialize(de)?;
        match s {
            Some(s) => crate::utils::hexutils::decode(&s)
                .map(Some)
                .map_err(serde::de::Error::custom),
            None => Ok(None),
        }
    }
}

mod serde_hex_u128 {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u128, ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&format!("0x{:x}", value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<u128, D::Error> {
        let s = String::deserialize(de)?;
        let body = crate::utils::hexutils::strip_prefix(&s);
        u128::from_str_radix(body, 16).map_err(serde::de::Error::custom)
    }
}

mod serde_hex_block_ref {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8; 8], ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&crate::utils::hexutils::encode_prefixed(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<[u8; 8], D::Error> {
        let s = String::deserialize(de)?;
        crate::utils::hexutils::decode_fixed(&s).map_err(serde::de::Error::custom)
    }
}

mod serde_hex_depends_on {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<[u8; 32]>, ser: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(id) => ser.serialize_str(&crate::utils::hexutils::encode_prefixed(id)),
            None => ser.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Option<[u8; 32]>, D::Error> {
        let s: Option<String> = Option::deserialize(de)?;
        match s {
            Some(s) => crate::utils::hexutils::decode_fixed(&s)
                .map(Some)
                .map_err(serde::de::Error::custom),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secp256k1::SecretKey;

    fn sample_body() -> TransactionBody {
        TransactionBody {
            chain_tag: 0xf6,
            block_ref: [0, 0, 0, 0, 0xaa, 0xbb, 0xcc, 0xdd],
            expiration: 32,
            clauses: vec![Clause {
                to: Some("0x7567d83b7b8d80addcb281a71d54fc7b3364ffed".to_string()),
                value: 10000,
                data: vec![],
            }],
            gas_price_coef: 0,
            gas: 21000,
            depends_on: None,
            nonce: 0xbc614e,
            reserved: Reserved::default(),
        }
    }

    fn sample_key() -> SecretKey {
        SecretKey::from_slice(
            &hex::decode("7582be841ca040aa940fff6c05773129e135623e41acce3e0b8ba520dc1ae26a")
                .unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_unsigned_encoding_vector() {
        let tx = Transaction::new(sample_body());
        // Hand-computed canonical encoding of the sample body
        let expected = "ed81f684aabbccdd20dad9947567d83b7b8d80addcb281a71d54fc7b3364ffed82271080808252088083bc614ec0";
        assert_eq!(hex::encode(tx.encode_unsigned().unwrap()), expected);
    }

    #[test]
    fn test_invalid_clause_recipient_rejected() {
        let mut body = sample_body();
        body.clauses[0].to = Some("0xdeadbeef".to_string());
        let tx = Transaction::new(body);

        let err = tx.encode_unsigned().unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidAddress);
        assert!(tx.signing_hash().is_err());
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let mut tx = Transaction::new(sample_body());
        let sig = secp::sign_hash(&tx.signing_hash().unwrap(), &sample_key()).unwrap();
        tx.set_signature(sig);

        let raw = tx.encode().unwrap();
        let decoded = Transaction::decode(&raw).unwrap();
        assert_eq!(decoded, tx);
    }

    #[test]
    fn test_encode_unsigned_raw_fails() {
        let tx = Transaction::new(sample_body());
        assert!(tx.encode().is_err());
    }

    #[test]
    fn test_origin_and_id_recoverable() {
        let mut tx = Transaction::new(sample_body());
        let key = sample_key();
        let sig = secp::sign_hash(&tx.signing_hash().unwrap(), &key).unwrap();
        tx.set_signature(sig);

        let origin = tx.origin().unwrap();
        assert!(crate::utils::hexutils::compare_addresses(
            &origin,
            &crate::thor::address::address_from_secret_key(&key)
        ));

        // id must be stable across calls
        assert_eq!(tx.id().unwrap(), tx.id().unwrap());
    }

    #[test]
    fn test_delegated_signature_and_gas_payer() {
        let mut body = sample_body();
        body.set_delegated();
        let mut tx = Transaction::new(body);
        assert!(tx.is_delegated());

        let origin_key = sample_key();
        let payer_key = SecretKey::from_slice(&[0x22u8; 32]).unwrap();
        let origin_addr = crate::thor::address::address_from_secret_key(&origin_key);

        let origin_sig = secp::sign_hash(&tx.signing_hash().unwrap(), &origin_key).unwrap();
        let payer_hash = tx.delegated_signing_hash(&origin_addr).unwrap();
        let payer_sig = secp::sign_hash(&payer_hash, &payer_key).unwrap();
        tx.set_delegated_signature(origin_sig, payer_sig);

        assert!(crate::utils::hexutils::compare_addresses(
            &tx.gas_payer().unwrap(),
            &crate::thor::address::address_from_secret_key(&payer_key)
        ));

        // Raw form carries the feature bit and both signatures
        let raw = tx.encode().unwrap();
        let decoded = Transaction::decode(&raw).unwrap();
        assert!(decoded.is_delegated());
        assert_eq!(decoded.signature.as_ref().unwrap().len(), 130);
    }

    #[test]
    fn test_single_signature_rejected_for_delegated() {
        let mut body = sample_body();
        body.set_delegated();
        let mut tx = Transaction::new(body);
        let sig = secp::sign_hash(&tx.signing_hash().unwrap(), &sample_key()).unwrap();
        tx.signature = Some(sig.to_vec());
        assert!(tx.origin().is_err());
    }

    #[test]
    fn test_json_body_roundtrip() {
        let body = sample_body();
        let json = serde_json::to_string(&body).unwrap();
        assert!(json.contains("\"blockRef\":\"0x00000000aabbccdd\""));
        assert!(json.contains("\"value\":\"0x2710\""));
        let parsed: TransactionBody = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, body);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(Transaction::decode(&[0x01, 0x02]).is_err());
        assert!(Transaction::decode(&hex::decode("c102").unwrap()).is_err());
    }
}
