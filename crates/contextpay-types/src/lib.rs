//! ContextPay Types - Canonical domain types for presence-gated payments
//!
//! This crate contains the foundational types for ContextPay with zero
//! dependencies on other contextpay crates. It defines:
//!
//! - Beacon identity and the `uuid|major|minor` composite key
//! - Raw signal state (beacon sightings, geofence, trusted Wi-Fi)
//! - Inbound signal events and trigger reasons
//! - Merchant registry entries
//! - An injectable clock
//!
//! # Invariants
//!
//! 1. A prompt decision is always justified by signal state present at the
//!    moment of evaluation
//! 2. Tokens are verified only against a context captured when the prompt
//!    opened, never against live signal state
//!
//! # Signal Flow
//!
//! ```text
//! Geofence / Beacon / Wi-Fi → SignalStore → TriggerArbiter → Prompt
//!                                                  │
//!                                PromptSession ← ──┘ → TokenIssuer / TokenVerifier
//! ```

pub mod identity;
pub mod signal;
pub mod merchant;
pub mod clock;
pub mod error;

pub use identity::*;
pub use signal::*;
pub use merchant::*;
pub use clock::*;
pub use error::*;

/// Version of the ContextPay types schema
pub const TYPES_VERSION: &str = "0.1.0";

/// Fence id used downstream when no geofence has been reported
pub const UNKNOWN_FENCE: &str = "unknown";
