//! Store Module
//!
//! Encrypted at-rest persistence for devices and accounts.

pub mod device_store;
pub mod encryption;

pub use device_store::DeviceStore;
