//! Session controller: submission, push events and reconciliation.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use super::{Outcome, Phase, Session};
use crate::error::SessionError;
use crate::event::{EventKind, ModelDescriptor, PushEvent, PushMessage, ResearchEvent, ResearchRequest};
use crate::history::{HistoryEntry, HistoryStore, KeyValueStore};
use crate::render::{OutputRenderer, OutputSurface, RenderedUnit};
use crate::status::{StatusSnapshot, StatusTracker};
use crate::transport::ResearchApi;

/// Capacity of the view update channel.
const VIEW_CHANNEL_CAPACITY: usize = 1024;

/// Model used when the caller does not pick one.
pub const DEFAULT_MODEL_ID: &str = "o3-min";

const EMPTY_QUESTION: &str = "Please enter a research question.";
const MODELS_UNAVAILABLE: &str = "Failed to load available models. Please refresh the page.";

/// Tunables for a [`SessionController`].
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Give up on an active job after this long without any event.
    /// `None` waits indefinitely.
    pub stale_after: Option<Duration>,
    /// Model id submitted when the caller passes an empty one.
    pub default_model: String,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            stale_after: None,
            default_model: DEFAULT_MODEL_ID.to_string(),
        }
    }
}

/// Change notification for whatever presents the session.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewUpdate {
    /// The output log was emptied.
    Cleared,
    /// A unit was appended at the end of the output log.
    Appended(RenderedUnit),
    Status(StatusSnapshot),
    StatusLine(String),
    Question(Option<String>),
    History(Vec<HistoryEntry>),
    Models(Vec<ModelDescriptor>),
    Connection(bool),
}

/// Input values restored from a history entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistorySelection {
    pub question: String,
    /// Stored model id, only when that model is still offered.
    pub model_id: Option<String>,
}

/// Orchestrates one research session.
///
/// All methods take `&mut self` and run to completion; the only suspension
/// points are the awaited transport calls. Drive it from a single task, see
/// [`super::runtime`].
#[derive(Debug)]
pub struct SessionController {
    api: Arc<dyn ResearchApi>,
    session: Session,
    status: StatusTracker,
    renderer: OutputRenderer,
    history: HistoryStore,
    models: Vec<ModelDescriptor>,
    options: SessionOptions,
    updates: broadcast::Sender<ViewUpdate>,
}

impl SessionController {
    pub fn new(
        api: Arc<dyn ResearchApi>,
        store: Box<dyn KeyValueStore>,
        options: SessionOptions,
    ) -> Self {
        let (updates, _) = broadcast::channel(VIEW_CHANNEL_CAPACITY);
        Self {
            api,
            session: Session::new(),
            status: StatusTracker::new(),
            renderer: OutputRenderer::new(),
            history: HistoryStore::load(store),
            models: Vec::new(),
            options,
            updates,
        }
    }

    /// Receive every view change made after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<ViewUpdate> {
        self.updates.subscribe()
    }

    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    #[must_use]
    pub fn status(&self) -> &StatusTracker {
        &self.status
    }

    #[must_use]
    pub fn surface(&self) -> &OutputSurface {
        self.renderer.surface()
    }

    #[must_use]
    pub fn history(&self) -> &[HistoryEntry] {
        self.history.list()
    }

    #[must_use]
    pub fn models(&self) -> &[ModelDescriptor] {
        &self.models
    }

    #[must_use]
    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// Load-time sequence: models, history, then reconciliation.
    ///
    /// Failures are already surfaced in the output log; booting never fails.
    pub async fn boot(&mut self) {
        // Both failures are rendered into the log by the calls themselves.
        let _ = self.load_models().await;
        self.publish(ViewUpdate::History(self.history.list().to_vec()));
        let _ = self.reconcile().await;
    }

    /// Fetch the model list offered by the server.
    #[instrument(skip(self))]
    pub async fn load_models(&mut self) -> Result<&[ModelDescriptor], SessionError> {
        match self.api.list_models().await {
            Ok(models) => {
                info!(name: "session.models.loaded", count = models.len(), "Models loaded");
                self.models = models;
                self.publish(ViewUpdate::Models(self.models.clone()));
                Ok(&self.models)
            }
            Err(e) => {
                warn!(name: "session.models.failed", error = %e, "Failed to load models");
                self.show_error(MODELS_UNAVAILABLE);
                Err(e.into())
            }
        }
    }

    /// Submit a research question.
    ///
    /// Rejected without contacting the server when the question is blank
    /// or a job is already active. Every rejection and failure is also
    /// rendered as an `error` event.
    #[instrument(skip(self, question))]
    pub async fn submit(&mut self, question: &str, model_id: &str) -> Result<(), SessionError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(self.reject(SessionError::Validation(EMPTY_QUESTION.to_string())));
        }
        if self.session.is_active() {
            return Err(self.reject(SessionError::Conflict));
        }
        let model_id = match model_id.trim() {
            "" => self.options.default_model.clone(),
            id => id.to_string(),
        };

        self.renderer.clear();
        self.publish(ViewUpdate::Cleared);
        self.session.begin(question, Instant::now());
        self.sync_status();
        self.publish(ViewUpdate::Question(Some(question.to_string())));

        let request = ResearchRequest {
            question: question.to_string(),
            model_id: model_id.clone(),
        };
        match self.api.submit(&request).await {
            Ok(ack) => {
                info!(
                    name: "session.submit.accepted",
                    model_id = %model_id,
                    server_status = ?ack.status,
                    "Research started"
                );
                self.history.record(question, model_id);
                self.publish(ViewUpdate::History(self.history.list().to_vec()));
                Ok(())
            }
            Err(e) => {
                let err = SessionError::from(e);
                warn!(name: "session.submit.failed", error = %err, "Failed to start research");
                self.show_error(&err.user_message());
                if self.session.is_active() {
                    self.session.finish(Outcome::Error);
                    self.sync_status();
                }
                Err(err)
            }
        }
    }

    /// Apply one message from the push channel.
    pub fn handle_push(&mut self, message: PushMessage) {
        match message {
            PushMessage::Connected => {
                info!(name: "session.push.connected", "Connected to server");
                self.status.set_connected(true);
                self.publish(ViewUpdate::Connection(true));
            }
            PushMessage::Disconnected => {
                warn!(name: "session.push.disconnected", "Disconnected from server");
                self.status.set_connected(false);
                self.publish(ViewUpdate::Connection(false));
            }
            PushMessage::Event(event) => {
                self.handle_event(event);
            }
        }
    }

    /// Apply one push event. Returns whether it was rendered.
    ///
    /// Events are dropped while no job has been started on this console.
    /// After a terminal event the job's trailing output (such as the final
    /// answer) is still rendered, but no longer changes the status.
    pub fn handle_event(&mut self, event: PushEvent) -> bool {
        if self.session.phase() == Phase::Idle {
            debug!(
                name: "session.event.dropped",
                event = event.event_name(),
                kind = %event.event().kind,
                "Dropping event outside of a job"
            );
            return false;
        }

        if self.session.is_active() {
            self.session.touch(Instant::now());
            if event.is_terminal() {
                let outcome = match event.event().kind {
                    EventKind::Success => Outcome::Success,
                    _ => Outcome::Error,
                };
                info!(name: "session.job.finished", outcome = ?outcome, "Research finished");
                self.session.finish(outcome);
                self.sync_status();
            }
        }

        match event {
            PushEvent::Progress(event) => {
                let unit = self.renderer.render_progress(&event).clone();
                self.publish(ViewUpdate::Appended(unit));
                self.publish(ViewUpdate::StatusLine(event.message));
            }
            PushEvent::Research(event) => {
                self.append(&event);
            }
        }
        true
    }

    /// Align with the server's view of the current job.
    ///
    /// When the server reports a running job the session becomes `Active`
    /// and the output log is cleared and rebuilt from the full backlog, in
    /// order. Running it again against the same server state yields the
    /// same result. Returns whether a job was adopted.
    #[instrument(skip(self))]
    pub async fn reconcile(&mut self) -> Result<bool, SessionError> {
        let status = match self.api.status().await {
            Ok(status) => status,
            Err(e) => {
                warn!(name: "session.reconcile.status_failed", error = %e, "Failed to check status");
                let err = SessionError::from(e);
                self.show_error(&format!("Failed to check research status: {}", err.user_message()));
                return Err(err);
            }
        };

        if !status.is_processing {
            debug!(name: "session.reconcile.idle", "Server reports no running job");
            return Ok(false);
        }

        self.session.resume(status.current_question.clone(), Instant::now());
        self.sync_status();
        self.publish(ViewUpdate::Question(status.current_question));

        let backlog = match self.api.backlog().await {
            Ok(backlog) => backlog,
            Err(e) => {
                warn!(name: "session.reconcile.backlog_failed", error = %e, "Failed to load output");
                let err = SessionError::from(e);
                self.show_error(&format!("Failed to load research output: {}", err.user_message()));
                return Err(err);
            }
        };

        self.renderer.clear();
        self.publish(ViewUpdate::Cleared);
        for event in &backlog {
            self.append(event);
        }
        info!(
            name: "session.reconcile.replayed",
            events = backlog.len(),
            "Replayed research backlog"
        );
        Ok(true)
    }

    /// Values to re-populate the input with from history entry `index`.
    #[must_use]
    pub fn select_history(&self, index: usize) -> Option<HistorySelection> {
        let entry = self.history.select_entry(index)?;
        let model_id = self
            .models
            .iter()
            .any(|m| m.id == entry.model_id)
            .then(|| entry.model_id.clone());
        Some(HistorySelection {
            question: entry.question.clone(),
            model_id,
        })
    }

    /// End an active job that has been silent longer than the configured
    /// limit. Returns whether the job was expired.
    pub fn expire_if_stale(&mut self, now: Instant) -> bool {
        let Some(after) = self.options.stale_after else {
            return false;
        };
        if !self.session.is_stale(now, after) {
            return false;
        }
        warn!(
            name: "session.job.stale",
            timeout_secs = after.as_secs(),
            "No progress received; giving up on job"
        );
        self.show_error(&format!(
            "No progress received for {} seconds. The research job may have stalled.",
            after.as_secs()
        ));
        self.session.finish(Outcome::Error);
        self.sync_status();
        true
    }

    fn append(&mut self, event: &ResearchEvent) {
        let unit = self.renderer.render(event).clone();
        self.publish(ViewUpdate::Appended(unit));
    }

    /// Render a client-side error and mirror it on the status line.
    fn show_error(&mut self, message: &str) {
        self.append(&ResearchEvent::error(message));
        self.renderer.set_status_line(message);
        self.publish(ViewUpdate::StatusLine(message.to_string()));
    }

    fn reject(&mut self, err: SessionError) -> SessionError {
        warn!(name: "session.submit.rejected", reason = %err, "Submission rejected");
        self.show_error(&err.user_message());
        err
    }

    /// Derive the tracker from the session phase.
    fn sync_status(&mut self) {
        let (label, severity) = self.session.phase().status();
        self.status.set_status(label, severity);
        self.status.set_active(self.session.is_active());
        self.publish(ViewUpdate::Status(self.status.snapshot()));
    }

    fn publish(&self, update: ViewUpdate) {
        // No subscribers is fine; the controller's own state is authoritative.
        let _ = self.updates.send(update);
    }
}
