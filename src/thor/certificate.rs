//! VIP-192 Certificates
//!
//! Self-signed certificates used for identification and agreement
//! (dApp sign-in). The signed payload is the deterministic JSON form:
//! keys sorted alphabetically, signer lowercased, no whitespace.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ErrorCode, VethorError, VethorResult};
use crate::thor::secp;
use crate::utils::crypto::blake2b256;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificatePayload {
    #[serde(rename = "type")]
    pub payload_type: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    /// "identification" or "agreement"
    pub purpose: String,
    pub payload: CertificatePayload,
    /// Origin of the requesting dApp
    pub domain: String,
    /// Unix seconds
    pub timestamp: u64,
    /// Address of the signer, lowercased in the signed form
    pub signer: String,
}

impl Certificate {
    /// Deterministic JSON encoding used for hashing
    pub fn encode(&self) -> VethorResult<String> {
        // Round-trip through Value so keys come out sorted
        let mut value = serde_json::to_value(self)?;
        if let Value::Object(ref mut map) = value {
            normalize_signer(map);
        }
        Ok(serde_json::to_string(&value)?)
    }

    /// blake2b256 of the deterministic encoding
    pub fn signing_hash(&self) -> VethorResult<[u8; 32]> {
        Ok(blake2b256(&[self.encode()?.as_bytes()]))
    }

    /// Sign the certificate, returning the 65-byte signature
    pub fn sign(&self, secret_key: &secp256k1::SecretKey) -> VethorResult<[u8; 65]> {
        secp::sign_hash(&self.signing_hash()?, secret_key)
    }

    /// Check a signature against the certificate's `signer` field
    pub fn verify(&self, signature: &[u8]) -> VethorResult<()> {
        let recovered = secp::recover_address(&self.signing_hash()?, signature)?;
        if !crate::utils::hexutils::compare_addresses(&recovered, &self.signer) {
            return Err(VethorError::new(
                ErrorCode::InvalidInput,
                "Certificate signature does not match signer",
            ));
        }
        Ok(())
    }
}

fn normalize_signer(map: &mut Map<String, Value>) {
    let lowered = match map.get("signer") {
        Some(Value::String(signer)) => signer.to_lowercase(),
        _ => return,
    };
    map.insert("signer".to_string(), Value::String(lowered));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thor::address::address_from_secret_key;
    use secp256k1::SecretKey;

    fn sample(signer: &str) -> Certificate {
        Certificate {
            purpose: "identification".to_string(),
            payload: CertificatePayload {
                payload_type: "text".to_string(),
                content: "fyi".to_string(),
            },
            domain: "example.com".to_string(),
            timestamp: 1545035330,
            signer: signer.to_string(),
        }
    }

    #[test]
    fn test_encoding_is_sorted_and_lowercased() {
        let cert = sample("0xAbCdEf0123456789aBcDeF0123456789AbCdEf01");
        let encoded = cert.encode().unwrap();

        assert!(encoded.contains("\"signer\":\"0xabcdef0123456789abcdef0123456789abcdef01\""));
        let domain_pos = encoded.find("\"domain\"").unwrap();
        let payload_pos = encoded.find("\"payload\"").unwrap();
        let purpose_pos = encoded.find("\"purpose\"").unwrap();
        assert!(domain_pos < payload_pos && payload_pos < purpose_pos);
    }

    #[test]
    fn test_signer_case_does_not_change_hash() {
        let lower = sample("0xabcdef0123456789abcdef0123456789abcdef01");
        let mixed = sample("0xAbCdEf0123456789aBcDeF0123456789AbCdEf01");
        assert_eq!(lower.signing_hash().unwrap(), mixed.signing_hash().unwrap());
    }

    #[test]
    fn test_sign_and_verify() {
        let sk = SecretKey::from_slice(&[0x44u8; 32]).unwrap();
        let cert = sample(&address_from_secret_key(&sk));

        let sig = cert.sign(&sk).unwrap();
        cert.verify(&sig).unwrap();

        let other = SecretKey::from_slice(&[0x55u8; 32]).unwrap();
        let wrong = cert.sign(&other).unwrap();
        assert!(cert.verify(&wrong).is_err());
    }
}
