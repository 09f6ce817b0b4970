//! ContextPay Registry - Merchant and beacon whitelist
//!
//! The registry answers two questions for the rest of the system:
//! - Which merchant location does a beacon belong to?
//! - Which public key verifies a merchant's tokens?
//!
//! The production lookup service is external. [`MerchantRegistry`] is the seam
//! and [`InMemoryMerchantRegistry`] backs tests and the CLI.

pub mod registry;
pub mod whitelist;

pub use registry::*;
pub use whitelist::*;

use thiserror::Error;

/// Registry errors
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Failed to read whitelist {path}: {message}")]
    Io { path: String, message: String },

    #[error("Invalid whitelist JSON: {0}")]
    InvalidJson(String),

    #[error("Invalid public key for merchant {merchant_id}: {message}")]
    InvalidPublicKey { merchant_id: String, message: String },

    #[error("Duplicate beacon {0}")]
    DuplicateBeacon(String),
}

pub type RegistryResult<T> = Result<T, RegistryError>;
