//! Prompt delivery
//!
//! Presentation is fire-and-forget: sinks never report failure back to the
//! arbiter.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::request::{PresentSelectionRequest, PresentSingleRequest};

/// Anything the arbiter asks the UI to do
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PromptEvent {
    PresentSingle(PresentSingleRequest),
    PresentSelection(PresentSelectionRequest),
    Cancel,
}

/// UI-side receiver of prompt requests
pub trait PromptSink: Send + Sync {
    fn present_single(&self, request: PresentSingleRequest);

    fn present_selection(&self, request: PresentSelectionRequest);

    /// Withdraw any outstanding notification; must tolerate repeats
    fn cancel(&self);
}

/// Sink that records every event, for tests
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: RwLock<Vec<PromptEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<PromptEvent> {
        self.events.read().clone()
    }

    /// Present requests only, cancellations skipped
    pub fn presentations(&self) -> Vec<PromptEvent> {
        self.events
            .read()
            .iter()
            .filter(|e| !matches!(e, PromptEvent::Cancel))
            .cloned()
            .collect()
    }

    pub fn cancel_count(&self) -> usize {
        self.events
            .read()
            .iter()
            .filter(|e| matches!(e, PromptEvent::Cancel))
            .count()
    }

    pub fn clear(&self) {
        self.events.write().clear();
    }
}

impl PromptSink for RecordingSink {
    fn present_single(&self, request: PresentSingleRequest) {
        self.events.write().push(PromptEvent::PresentSingle(request));
    }

    fn present_selection(&self, request: PresentSelectionRequest) {
        self.events.write().push(PromptEvent::PresentSelection(request));
    }

    fn cancel(&self) {
        self.events.write().push(PromptEvent::Cancel);
    }
}

/// Sink that forwards events over an unbounded channel
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: mpsc::UnboundedSender<PromptEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<PromptEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    fn forward(&self, event: PromptEvent) {
        if self.sender.send(event).is_err() {
            tracing::debug!("Prompt receiver dropped; event discarded");
        }
    }
}

impl PromptSink for ChannelSink {
    fn present_single(&self, request: PresentSingleRequest) {
        self.forward(PromptEvent::PresentSingle(request));
    }

    fn present_selection(&self, request: PresentSelectionRequest) {
        self.forward(PromptEvent::PresentSelection(request));
    }

    fn cancel(&self) {
        self.forward(PromptEvent::Cancel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contextpay_types::TriggerReason;

    #[tokio::test]
    async fn test_channel_sink_forwards_in_order() {
        let (sink, mut rx) = ChannelSink::new();
        sink.present_single(PresentSingleRequest::user_initiated());
        sink.cancel();

        match rx.recv().await {
            Some(PromptEvent::PresentSingle(r)) => assert_eq!(r.trigger_reason, TriggerReason::User),
            other => panic!("unexpected event: {:?}", other),
        }
        assert_eq!(rx.recv().await, Some(PromptEvent::Cancel));
    }

    #[test]
    fn test_channel_sink_survives_dropped_receiver() {
        let (sink, rx) = ChannelSink::new();
        drop(rx);
        sink.cancel();
    }

    #[test]
    fn test_recording_sink_counts() {
        let sink = RecordingSink::new();
        sink.cancel();
        sink.present_single(PresentSingleRequest::user_initiated());
        sink.cancel();

        assert_eq!(sink.cancel_count(), 2);
        assert_eq!(sink.presentations().len(), 1);
        sink.clear();
        assert!(sink.events().is_empty());
    }

    #[test]
    fn test_event_json_tag() {
        let json = serde_json::to_string(&PromptEvent::Cancel).unwrap();
        assert_eq!(json, r#"{"event":"cancel"}"#);
    }
}
