//! Research session state and control.
//!
//! One [`Session`] exists per console, owned by a [`SessionController`].
//! The controller is the only writer of the session, the status tracker,
//! the output surface and the history list.
//!
//! # Architecture
//!
//! - [`Session`]: phase (`Idle`, `Active`, `Terminal`) and current question
//! - [`SessionController`]: submission, push handling, load-time reconciliation
//! - [`runtime`]: cooperative event loop and a cloneable [`SessionHandle`]
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use research_console::history::MemoryStore;
//! use research_console::session::{SessionController, SessionOptions};
//! use research_console::transport::HttpApi;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let api = Arc::new(HttpApi::new("http://127.0.0.1:5001")?);
//! let mut controller =
//!     SessionController::new(api, Box::new(MemoryStore::new()), SessionOptions::default());
//! controller.boot().await;
//! controller.submit("What is X?", "o3-min").await?;
//! # Ok(())
//! # }
//! ```

mod controller;
pub mod runtime;

pub use controller::{HistorySelection, SessionController, SessionOptions, ViewUpdate};
pub use runtime::SessionHandle;

use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use crate::status::Severity;

/// How a job ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Error,
}

/// Lifecycle phase of the session's job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// No job has been started on this console.
    #[default]
    Idle,
    /// A job is in flight.
    Active,
    /// The last job finished. Accepts a new submission like `Idle`.
    Terminal(Outcome),
}

impl Phase {
    /// Status label and severity shown for this phase.
    #[must_use]
    pub fn status(self) -> (&'static str, Severity) {
        match self {
            Self::Idle => ("Ready", Severity::Neutral),
            Self::Active => ("Processing", Severity::Info),
            Self::Terminal(Outcome::Success) => ("Completed", Severity::Success),
            Self::Terminal(Outcome::Error) => ("Error", Severity::Danger),
        }
    }

    #[must_use]
    pub fn is_active(self) -> bool {
        self == Self::Active
    }
}

/// The console's single research session.
#[derive(Debug, Clone, Default)]
pub struct Session {
    phase: Phase,
    current_question: Option<String>,
    last_activity: Option<Instant>,
}

impl Session {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.phase.is_active()
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&str> {
        self.current_question.as_deref()
    }

    /// Last time the active job showed signs of life.
    #[must_use]
    pub fn last_activity(&self) -> Option<Instant> {
        self.last_activity
    }

    /// Start a new job. Overwrites whatever the previous job left behind.
    pub(crate) fn begin(&mut self, question: impl Into<String>, now: Instant) {
        self.phase = Phase::Active;
        self.current_question = Some(question.into());
        self.last_activity = Some(now);
    }

    /// Adopt a job the server reports as running.
    pub(crate) fn resume(&mut self, question: Option<String>, now: Instant) {
        self.phase = Phase::Active;
        self.current_question = question;
        self.last_activity = Some(now);
    }

    pub(crate) fn finish(&mut self, outcome: Outcome) {
        self.phase = Phase::Terminal(outcome);
    }

    pub(crate) fn touch(&mut self, now: Instant) {
        self.last_activity = Some(now);
    }

    /// Whether an active job has been silent for longer than `after`.
    #[must_use]
    pub fn is_stale(&self, now: Instant, after: Duration) -> bool {
        self.is_active()
            && self
                .last_activity
                .is_some_and(|last| now.saturating_duration_since(last) > after)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_labels_are_distinct() {
        let phases = [
            Phase::Idle,
            Phase::Active,
            Phase::Terminal(Outcome::Success),
            Phase::Terminal(Outcome::Error),
        ];
        let labels: std::collections::HashSet<_> = phases.iter().map(|p| p.status().0).collect();
        assert_eq!(labels.len(), phases.len());
        assert_eq!(Phase::Active.status(), ("Processing", Severity::Info));
        assert_eq!(
            Phase::Terminal(Outcome::Error).status(),
            ("Error", Severity::Danger)
        );
    }

    #[test]
    fn test_session_lifecycle() {
        let now = Instant::now();
        let mut session = Session::new();
        assert_eq!(session.phase(), Phase::Idle);

        session.begin("Q", now);
        assert!(session.is_active());
        assert_eq!(session.current_question(), Some("Q"));

        session.finish(Outcome::Success);
        assert!(!session.is_active());
        assert_eq!(session.phase(), Phase::Terminal(Outcome::Success));
        assert_eq!(session.current_question(), Some("Q"));
    }

    #[test]
    fn test_staleness_only_applies_to_active_jobs() {
        let start = Instant::now();
        let later = start + Duration::from_secs(61);
        let mut session = Session::new();
        assert!(!session.is_stale(later, Duration::from_secs(60)));

        session.begin("Q", start);
        assert!(session.is_stale(later, Duration::from_secs(60)));
        assert!(!session.is_stale(later, Duration::from_secs(120)));

        session.finish(Outcome::Error);
        assert!(!session.is_stale(later, Duration::from_secs(60)));
    }
}
