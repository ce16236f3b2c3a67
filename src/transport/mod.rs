//! Transport adapters.
//!
//! The controller only sees two capabilities:
//!
//! - [`ResearchApi`]: request/response calls (models, submit, status, backlog)
//! - [`PushChannel`]: a subscription delivering [`PushMessage`]s in order
//!
//! [`HttpApi`] and [`SsePushChannel`] implement them over HTTP and
//! server-sent events.

mod http;
mod sse;

pub use http::HttpApi;
pub use sse::{SseDecoder, SseFrame, SsePushChannel};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::event::{JobStatus, ModelDescriptor, PushMessage, ResearchEvent, ResearchRequest, SubmitAck};

/// Request/response surface of the research server.
#[async_trait]
pub trait ResearchApi: Send + Sync + std::fmt::Debug {
    /// `GET /api/models`
    async fn list_models(&self) -> Result<Vec<ModelDescriptor>>;

    /// `POST /api/research`
    async fn submit(&self, request: &ResearchRequest) -> Result<SubmitAck>;

    /// `GET /api/status`
    async fn status(&self) -> Result<JobStatus>;

    /// `GET /api/output`
    async fn backlog(&self) -> Result<Vec<ResearchEvent>>;
}

/// Source of push events.
///
/// Each subscription yields messages strictly in delivery order, each at
/// most once. The subscription ends when `shutdown` is cancelled.
pub trait PushChannel: Send + Sync + std::fmt::Debug {
    fn subscribe(&self, shutdown: CancellationToken) -> mpsc::Receiver<PushMessage>;
}
