//! Payment app hand-off

use std::fmt;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Payment surfaces a prompt can hand off to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentApp {
    KakaoPay,
    NaverPay,
    Toss,
    /// Built-in code scanner
    InAppScanner,
}

impl PaymentApp {
    pub const ALL: [PaymentApp; 4] = [
        PaymentApp::KakaoPay,
        PaymentApp::NaverPay,
        PaymentApp::Toss,
        PaymentApp::InAppScanner,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            PaymentApp::KakaoPay => "KakaoPay",
            PaymentApp::NaverPay => "NaverPay",
            PaymentApp::Toss => "Toss",
            PaymentApp::InAppScanner => "In-app scanner",
        }
    }

    /// Whether the hand-off leaves this app
    pub fn is_external(&self) -> bool {
        !matches!(self, PaymentApp::InAppScanner)
    }
}

impl fmt::Display for PaymentApp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LaunchError {
    #[error("{0} is not installed")]
    NotInstalled(PaymentApp),

    #[error("Failed to launch {app}: {reason}")]
    Failed { app: PaymentApp, reason: String },

    /// The session was closed before the hand-off
    #[error("Prompt session is closed")]
    SessionClosed,
}

/// UI seam that opens a payment app
pub trait PaymentAppLauncher: Send + Sync {
    fn launch(&self, app: PaymentApp) -> Result<(), LaunchError>;
}

/// Launcher that records hand-offs instead of performing them
#[derive(Debug, Default)]
pub struct RecordingLauncher {
    launched: Mutex<Vec<PaymentApp>>,
    missing: Vec<PaymentApp>,
}

impl RecordingLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report `app` as not installed
    pub fn without(mut self, app: PaymentApp) -> Self {
        self.missing.push(app);
        self
    }

    pub fn launched(&self) -> Vec<PaymentApp> {
        self.launched.lock().clone()
    }
}

impl PaymentAppLauncher for RecordingLauncher {
    fn launch(&self, app: PaymentApp) -> Result<(), LaunchError> {
        if self.missing.contains(&app) {
            return Err(LaunchError::NotInstalled(app));
        }
        self.launched.lock().push(app);
        Ok(())
    }
}
