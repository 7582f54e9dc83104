//! Vethor Core
//!
//! Native core of a VeChain mobile wallet: key management, the encrypted
//! device store, transaction signing with VIP-191 fee delegation, and a
//! thin node client. Mobile hosts consume it through the JSON C ABI in
//! [`ffi`]; the library API carries the same functionality for Rust
//! callers and tests.

pub mod error;
pub mod ffi;
pub mod node;
pub mod signing;
pub mod store;
pub mod thor;
pub mod types;
pub mod utils;
pub mod wallet;

pub use error::{ErrorCode, VethorError, VethorResult};
pub use node::NodeClient;
pub use signing::{DelegationClient, SigningService};
pub use store::DeviceStore;
pub use thor::{Certificate, Clause, Transaction, TransactionBody};
pub use types::{Account, Device, DeviceType, Network, WalletMode};

/// Crate version, surfaced to FFI hosts for diagnostics
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
