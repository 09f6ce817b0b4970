//! ContextPay Crypto - Cryptographic primitives for context-bound tokens
//!
//! This crate provides:
//! - Key generation and management
//! - Digital signatures (Ed25519)
//! - Hashing (SHA-256) and key fingerprints
//! - Session key provisioning
//!
//! # Security Invariant
//!
//! **Session signing keys NEVER leave the vault as raw bytes.** Callers get a
//! [`SessionKey`] handle that can sign but does not expose its secret.

pub mod keys;
pub mod signature;
pub mod hash;
pub mod vault;

pub use keys::*;
pub use signature::*;
pub use hash::*;
pub use vault::*;

use thiserror::Error;

/// Cryptographic errors
#[derive(Debug, Clone, Error)]
pub enum CryptoError {
    #[error("Key generation failed: {0}")]
    KeyGenerationFailed(String),

    #[error("Signing failed: {0}")]
    SigningFailed(String),

    #[error("Verification failed: {0}")]
    VerificationFailed(String),

    #[error("Invalid key format: {0}")]
    InvalidKeyFormat(String),

    #[error("Vault error: {0}")]
    VaultError(String),

    #[error("Key not found: {0}")]
    KeyNotFound(String),
}

pub type CryptoResult<T> = Result<T, CryptoError>;
