//! Utilities Module
//!
//! Common utilities used across the crate.

mod http;
pub mod crypto;
pub mod hexutils;
pub mod logging;

pub use crypto::*;
pub use http::*;
