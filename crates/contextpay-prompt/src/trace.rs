//! Session trace artifacts for audit

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStage {
    Admission,
    Token,
    Verify,
    Launch,
    Close,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionTraceEvent {
    pub timestamp: DateTime<Utc>,
    pub stage: SessionStage,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionTrace {
    pub prompt_id: String,
    pub created_at: DateTime<Utc>,
    pub events: Vec<SessionTraceEvent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_entries: Option<usize>,
}

impl SessionTrace {
    pub fn new(prompt_id: impl Into<String>, max_entries: Option<usize>) -> Self {
        Self {
            prompt_id: prompt_id.into(),
            created_at: Utc::now(),
            events: Vec::new(),
            max_entries,
        }
    }

    pub fn record(&mut self, stage: SessionStage, message: impl Into<String>, data: Option<serde_json::Value>) {
        self.events.push(SessionTraceEvent {
            timestamp: Utc::now(),
            stage,
            message: message.into(),
            data,
        });
        if let Some(max) = self.max_entries {
            if self.events.len() > max {
                let overflow = self.events.len() - max;
                self.events.drain(0..overflow);
            }
        }
    }

    /// Stages in recording order
    pub fn stages(&self) -> Vec<SessionStage> {
        self.events.iter().map(|e| e.stage).collect()
    }

    pub fn last(&self) -> Option<&SessionTraceEvent> {
        self.events.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trace_is_bounded() {
        let mut trace = SessionTrace::new("p-1", Some(2));
        trace.record(SessionStage::Admission, "admitted", None);
        trace.record(SessionStage::Token, "issued", None);
        trace.record(SessionStage::Close, "closed", None);

        assert_eq!(trace.stages(), vec![SessionStage::Token, SessionStage::Close]);
        assert_eq!(trace.last().map(|e| e.message.as_str()), Some("closed"));
    }
}
