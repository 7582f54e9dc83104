//! VeChain Thor Primitives
//!
//! Chain-level building blocks: addresses, recoverable signatures,
//! transaction encoding and hashing, and VIP-192 certificates.

pub mod address;
pub mod certificate;
pub mod secp;
pub mod transaction;

pub use address::{address_from_public_key, address_from_secret_key};
pub use certificate::Certificate;
pub use transaction::{Clause, Transaction, TransactionBody};
