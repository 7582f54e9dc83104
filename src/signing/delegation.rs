//! VIP-191 Fee Delegation Client
//!
//! Asks a sponsor service to co-sign a transaction's gas. The exchange
//! is a single POST of `{origin, raw}`; the sponsor answers with its
//! 65-byte signature over the delegated signing hash. One attempt, no
//! retries: the caller decides whether to fall back to self-paying.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{ErrorCode, VethorError, VethorResult};
use crate::thor::transaction::{Transaction, SIGNATURE_LEN};
use crate::thor::secp;
use crate::types::DelegationResult;
use crate::utils::hexutils;
use crate::utils::post_json;
use crate::{log_debug, log_error, log_info};

const MODULE: &str = "delegation";

#[derive(Debug, Serialize)]
struct SponsorRequest {
    origin: String,
    raw: String,
}

#[derive(Debug, Deserialize)]
struct SponsorResponse {
    #[serde(default)]
    signature: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Client for one sponsor endpoint
#[derive(Debug, Clone)]
pub struct DelegationClient {
    url: Url,
}

impl DelegationClient {
    pub fn new(url: &str) -> VethorResult<Self> {
        let parsed = Url::parse(url).map_err(|e| {
            VethorError::new(
                ErrorCode::InvalidInput,
                format!("Invalid delegation URL: {}", e),
            )
        })?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(VethorError::new(
                ErrorCode::InvalidInput,
                format!("Unsupported delegation URL scheme: {}", parsed.scheme()),
            ));
        }
        Ok(Self { url: parsed })
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    /// Request the sponsor's signature for a delegated transaction
    ///
    /// The transaction must already carry the delegation feature bit so
    /// the sponsor signs the same raw form the chain will see.
    pub fn request_signature(
        &self,
        tx: &Transaction,
        origin: &str,
    ) -> VethorResult<DelegationResult> {
        self.run_request(tx, origin).map_err(|err| {
            log_error!(
                MODULE,
                "Delegation request failed",
                code = format!("{:?}", err.code),
                error = err.message,
            );
            err
        })
    }

    fn run_request(&self, tx: &Transaction, origin: &str) -> VethorResult<DelegationResult> {
        if !tx.is_delegated() {
            return Err(VethorError::delegation_failed(
                "Transaction does not have the delegation feature enabled",
            ));
        }
        let origin_lower = origin.to_lowercase();
        let request = SponsorRequest {
            origin: origin_lower.clone(),
            raw: hexutils::encode_prefixed(&tx.encode_unsigned()?),
        };

        log_debug!(MODULE, "Requesting sponsor signature", origin = origin_lower);
        let response = post_json(self.url.as_str(), &request)?;
        let status = response.status();
        let body = response.text().map_err(VethorError::from)?;

        if !status.is_success() {
            return Err(VethorError::delegation_failed(format!(
                "Sponsor rejected the request with status {}",
                status.as_u16()
            ))
            .with_details(truncate(&body)));
        }

        let parsed: SponsorResponse = serde_json::from_str(&body).map_err(|_| {
            VethorError::delegation_failed("Sponsor returned an unparseable response")
                .with_details(truncate(&body))
        })?;
        if let Some(error) = parsed.error {
            return Err(VethorError::delegation_failed(error));
        }
        let signature_hex = parsed.signature.ok_or_else(|| {
            VethorError::delegation_failed("Sponsor response carries no signature")
        })?;

        let signature = hexutils::decode(&signature_hex)?;
        if signature.len() != SIGNATURE_LEN {
            return Err(VethorError::delegation_failed(format!(
                "Sponsor signature has {} bytes, expected {}",
                signature.len(),
                SIGNATURE_LEN
            )));
        }

        // The gas payer identifies itself through the signature alone
        let hash = tx.delegated_signing_hash(&origin_lower)?;
        let gas_payer = secp::recover_address(&hash, &signature)?;

        log_info!(MODULE, "Sponsor signature received", gas_payer = gas_payer);
        Ok(DelegationResult {
            signature: hexutils::encode_prefixed(&signature),
            gas_payer,
        })
    }
}

fn truncate(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() <= MAX {
        return body.to_string();
    }
    // Back off to a char boundary so multi-byte text cannot split
    let mut end = MAX;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}
