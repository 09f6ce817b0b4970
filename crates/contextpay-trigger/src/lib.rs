//! ContextPay Trigger - Contextual trigger policy engine
//!
//! Turns asynchronously arriving presence signals into at most one payment
//! prompt at a time:
//!
//! - [`SignalStore`]: thread-safe geofence, beacon, and Wi-Fi state
//! - [`TriggerArbiter`]: cooldown, classification, and routing of prompts
//! - [`PromptSink`]: where prompts go ([`RecordingSink`], [`ChannelSink`])
//! - [`PresentSelectionRequest::resolve`]: turns a merchant pick back into a
//!   single-target prompt
//!
//! # Example
//!
//! ```ignore
//! let (sink, mut prompts) = ChannelSink::new();
//! let arbiter = TriggerArbiter::new(store, registry, Arc::new(sink), Arc::new(SystemClock));
//!
//! arbiter.on_beacon(&BeaconEvent { uuid, major: 1, minor: 1, nonce: None, rssi: -58 });
//! while let Some(event) = prompts.recv().await {
//!     render(event);
//! }
//! ```

pub mod arbiter;
pub mod config;
pub mod request;
pub mod sink;
pub mod store;

pub use arbiter::*;
pub use config::*;
pub use request::*;
pub use sink::*;
pub use store::*;
