//! ContextPay Prompt - the payment prompt surface
//!
//! A [`PromptSession`] is opened from a [`PresentSingleRequest`] emitted by the
//! trigger arbiter (or by the user). Opening applies the admission rule and
//! captures the [`VerificationContext`] once. Everything after that, token
//! issuance, scanned-code verification and app launch, works against the
//! captured context and never against live signal state.
//!
//! [`PresentSingleRequest`]: contextpay_trigger::PresentSingleRequest
//! [`VerificationContext`]: contextpay_token::VerificationContext

pub mod launch;
pub mod session;
pub mod trace;

pub use launch::{LaunchError, PaymentApp, PaymentAppLauncher, RecordingLauncher};
pub use session::{AdmissionError, PromptSession, TokenState, UNKNOWN_MERCHANT};
pub use trace::{SessionStage, SessionTrace, SessionTraceEvent};
