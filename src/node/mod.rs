//! Node Client
//!
//! Thin REST client for a VeChain Thor node: transaction broadcast plus
//! the best-block lookup needed to fill in `blockRef` when building.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{ErrorCode, VethorError, VethorResult};
use crate::thor::transaction::Transaction;
use crate::types::Network;
use crate::utils::hexutils;
use crate::utils::{get, post_json};
use crate::{log_debug, log_info};

const MODULE: &str = "node";

#[derive(Debug, Serialize)]
struct BroadcastRequest {
    raw: String,
}

#[derive(Debug, Deserialize)]
struct BroadcastResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct BestBlock {
    id: String,
}

/// Client for one Thor node
#[derive(Debug, Clone)]
pub struct NodeClient {
    base: Url,
    network: Network,
}

impl NodeClient {
    /// Client for the network's default public node
    pub fn new(network: Network) -> VethorResult<Self> {
        Self::with_url(network.default_node_url(), network)
    }

    pub fn with_url(url: &str, network: Network) -> VethorResult<Self> {
        let base = Url::parse(url).map_err(|e| {
            VethorError::new(ErrorCode::InvalidInput, format!("Invalid node URL: {}", e))
        })?;
        Ok(Self { base, network })
    }

    pub fn network(&self) -> Network {
        self.network
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base.as_str().trim_end_matches('/'), path)
    }

    /// Submit a signed transaction; returns the transaction id
    pub fn broadcast(&self, tx: &Transaction) -> VethorResult<String> {
        if tx.body.chain_tag != self.network.chain_tag() {
            return Err(VethorError::broadcast_failed(format!(
                "Transaction chain tag 0x{:02x} does not match network 0x{:02x}",
                tx.body.chain_tag,
                self.network.chain_tag()
            )));
        }
        let raw = tx.encode()?;
        let request = BroadcastRequest {
            raw: hexutils::encode_prefixed(&raw),
        };

        log_debug!(MODULE, "Broadcasting transaction", bytes = raw.len());
        let response = post_json(&self.endpoint("transactions"), &request)?;
        let status = response.status();
        let body = response.text().map_err(VethorError::from)?;

        if !status.is_success() {
            return Err(VethorError::broadcast_failed(format!(
                "Node rejected the transaction with status {}",
                status.as_u16()
            ))
            .with_details(body.trim().to_string()));
        }

        let parsed: BroadcastResponse = serde_json::from_str(&body).map_err(|_| {
            VethorError::broadcast_failed("Node returned an unparseable response")
                .with_details(body.trim().to_string())
        })?;
        log_info!(MODULE, "Transaction broadcast", txid = parsed.id);
        Ok(parsed.id)
    }

    /// First 8 bytes of the best block id, used as `blockRef`
    pub fn best_block_ref(&self) -> VethorResult<[u8; 8]> {
        let response = get(&self.endpoint("blocks/best"))?;
        let status = response.status();
        if !status.is_success() {
            return Err(VethorError::network_error(format!(
                "Best block lookup failed with status {}",
                status.as_u16()
            )));
        }
        let block: BestBlock = response.json().map_err(VethorError::from)?;

        let id: [u8; 32] = hexutils::decode_fixed(&block.id)?;
        let mut block_ref = [0u8; 8];
        block_ref.copy_from_slice(&id[..8]);
        Ok(block_ref)
    }
}
