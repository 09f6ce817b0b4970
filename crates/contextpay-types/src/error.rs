//! Error types for ContextPay domain types

use thiserror::Error;

/// Result type for ContextPay type operations
pub type Result<T> = std::result::Result<T, ContextPayError>;

/// Errors raised while constructing or parsing domain types
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContextPayError {
    /// Composite beacon key could not be parsed
    #[error("Invalid beacon key {key}: {reason}")]
    InvalidBeaconKey { key: String, reason: String },
}
