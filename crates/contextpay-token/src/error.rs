//! Token error types
//!
//! Every verification failure is a definite deny. The variant is kept so the
//! reason reaches audit logs through [`VerificationError::code`].

use thiserror::Error;

/// Result type alias for token issuance
pub type IssueResult<T> = Result<T, IssueError>;

/// Token issuance failures; no token is produced
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IssueError {
    /// No session key could be established
    #[error("Session key unavailable: {0}")]
    KeyUnavailable(String),

    /// Payload cannot be canonically encoded
    #[error("Token serialization failed: {0}")]
    Serialization(String),

    #[error("Token signing failed: {0}")]
    Signing(String),
}

/// Token rejection reasons, in the order they are checked
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerificationError {
    #[error("Malformed token: {0}")]
    Malformed(String),

    /// The prompt captured no target beacon to verify against
    #[error("No target beacon context")]
    MissingTargetContext,

    #[error("No public key for merchant {0}")]
    UnknownMerchant(String),

    #[error("Invalid token signature")]
    InvalidSignature,

    #[error("Location mismatch: token={token} expected={expected}")]
    LocationMismatch { token: String, expected: String },

    #[error("Fence mismatch: token={token} fence={fence}")]
    FenceMismatch { token: String, fence: String },

    #[error("Nonce mismatch")]
    NonceMismatch,

    #[error("Token expired at {expiry} (now {now})")]
    Expired { expiry: i64, now: i64 },
}

impl VerificationError {
    /// Stable reason code for audit logs
    pub fn code(&self) -> &'static str {
        match self {
            VerificationError::Malformed(_) => "MALFORMED_TOKEN",
            VerificationError::MissingTargetContext => "MISSING_TARGET_CONTEXT",
            VerificationError::UnknownMerchant(_) => "UNKNOWN_MERCHANT",
            VerificationError::InvalidSignature => "INVALID_SIGNATURE",
            VerificationError::LocationMismatch { .. } => "LOCATION_MISMATCH",
            VerificationError::FenceMismatch { .. } => "FENCE_MISMATCH",
            VerificationError::NonceMismatch => "NONCE_MISMATCH",
            VerificationError::Expired { .. } => "EXPIRED",
        }
    }
}
