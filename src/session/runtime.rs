//! Cooperative event loop driving a [`SessionController`].
//!
//! Commands from the user and messages from the push channel are handled
//! one at a time by a single task, so controller transitions never
//! interleave. Push messages are applied strictly in delivery order. A push
//! event that arrives while a submission is still awaiting its response is
//! queued and applied right after it.

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::controller::{HistorySelection, SessionController};
use crate::error::SessionError;
use crate::event::PushMessage;

const COMMAND_CAPACITY: usize = 32;

enum Command {
    Submit {
        question: String,
        model_id: String,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    Reconcile {
        reply: oneshot::Sender<Result<bool, SessionError>>,
    },
    SelectHistory {
        index: usize,
        reply: oneshot::Sender<Option<HistorySelection>>,
    },
}

/// Cloneable handle for sending commands to a running session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Submit { model_id, .. } => f.debug_struct("Submit").field("model_id", model_id).finish(),
            Self::Reconcile { .. } => f.write_str("Reconcile"),
            Self::SelectHistory { index, .. } => {
                f.debug_struct("SelectHistory").field("index", index).finish()
            }
        }
    }
}

impl SessionHandle {
    pub async fn submit(
        &self,
        question: impl Into<String>,
        model_id: impl Into<String>,
    ) -> Result<(), SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Submit {
            question: question.into(),
            model_id: model_id.into(),
            reply,
        })
        .await?;
        rx.await.map_err(|_closed| SessionError::Closed)?
    }

    pub async fn reconcile(&self) -> Result<bool, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Reconcile { reply }).await?;
        rx.await.map_err(|_closed| SessionError::Closed)?
    }

    pub async fn select_history(&self, index: usize) -> Result<Option<HistorySelection>, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::SelectHistory { index, reply }).await?;
        rx.await.map_err(|_closed| SessionError::Closed)
    }

    async fn send(&self, command: Command) -> Result<(), SessionError> {
        self.commands
            .send(command)
            .await
            .map_err(|_closed| SessionError::Closed)
    }
}

/// Spawn the session loop on the current runtime.
///
/// The loop stops when `shutdown` is cancelled or every handle is dropped,
/// and hands the controller back through the join handle.
pub fn spawn(
    controller: SessionController,
    push: mpsc::Receiver<PushMessage>,
    shutdown: CancellationToken,
) -> (SessionHandle, JoinHandle<SessionController>) {
    let (tx, rx) = mpsc::channel(COMMAND_CAPACITY);
    let task = tokio::spawn(run(controller, rx, push, shutdown));
    (SessionHandle { commands: tx }, task)
}

async fn run(
    mut controller: SessionController,
    mut commands: mpsc::Receiver<Command>,
    mut push: mpsc::Receiver<PushMessage>,
    shutdown: CancellationToken,
) -> SessionController {
    let mut stale_check = controller.options().stale_after.map(|after| {
        let mut interval = tokio::time::interval((after / 4).max(std::time::Duration::from_millis(100)));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval
    });

    loop {
        tokio::select! {
            biased;
            () = shutdown.cancelled() => break,
            Some(message) = push.recv() => controller.handle_push(message),
            command = commands.recv() => match command {
                Some(command) => execute(&mut controller, command).await,
                None => break,
            },
            () = tick(&mut stale_check) => {
                controller.expire_if_stale(Instant::now());
            }
        }
    }

    tracing::debug!(name: "session.runtime.stopped", "Session loop stopped");
    controller
}

async fn execute(controller: &mut SessionController, command: Command) {
    tracing::trace!(name: "session.runtime.command", command = ?command, "Executing command");
    // A dropped reply receiver just means the caller stopped waiting.
    match command {
        Command::Submit {
            question,
            model_id,
            reply,
        } => {
            let _ = reply.send(controller.submit(&question, &model_id).await);
        }
        Command::Reconcile { reply } => {
            let _ = reply.send(controller.reconcile().await);
        }
        Command::SelectHistory { index, reply } => {
            let _ = reply.send(controller.select_history(index));
        }
    }
}

async fn tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}
