//! Session status label and severity.

use std::fmt;

use serde::Serialize;

/// Visual severity of the status label.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    #[default]
    Neutral,
    Info,
    Success,
    Danger,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Neutral => "neutral",
            Self::Info => "info",
            Self::Success => "success",
            Self::Danger => "danger",
        })
    }
}

/// Point-in-time copy of the tracker, as published to views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    pub label: String,
    pub severity: Severity,
    pub active: bool,
}

/// Holds the "is a job active" flag and the status label.
///
/// Only the session controller writes to it.
#[derive(Debug, Clone)]
pub struct StatusTracker {
    label: String,
    severity: Severity,
    active: bool,
    connected: bool,
}

impl Default for StatusTracker {
    fn default() -> Self {
        Self {
            label: "Ready".to_string(),
            severity: Severity::Neutral,
            active: false,
            connected: false,
        }
    }
}

impl StatusTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_status(&mut self, label: impl Into<String>, severity: Severity) {
        self.label = label.into();
        self.severity = severity;
    }

    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[must_use]
    pub fn severity(&self) -> Severity {
        self.severity
    }

    /// Push channel connectivity. Independent of the label.
    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    #[must_use]
    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            label: self.label.clone(),
            severity: self.severity,
            active: self.active,
        }
    }
}
