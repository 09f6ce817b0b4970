//! ContextPay Token - Context-bound payment tokens
//!
//! A token binds a payment session to the physical context the prompt was
//! opened in: merchant, location, fence and the beacon nonce. It is signed
//! with the session key and verified against the captured
//! [`VerificationContext`] before anything downstream trusts it.
//!
//! Wire format: `base64url(payload_json).base64url(signature)`, no padding.
//! The signature covers the canonical message, not the JSON.

pub mod config;
pub mod error;
pub mod issuer;
pub mod token;
pub mod verifier;

pub use config::*;
pub use error::*;
pub use issuer::*;
pub use token::*;
pub use verifier::*;
