//! HTTP implementation of [`ResearchApi`].

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::instrument;
use url::Url;

use super::ResearchApi;
use crate::error::{Result, TransportError};
use crate::event::{
    ErrorBody, JobStatus, ModelDescriptor, ResearchEvent, ResearchRequest, SubmitAck,
};

/// Fallback shown when a rejected submission carries no `error` field.
const SUBMIT_FALLBACK: &str = "Failed to start research";

/// HTTP client for the research server API.
///
/// # Example
///
/// ```rust,no_run
/// use research_console::transport::{HttpApi, ResearchApi};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let api = HttpApi::new("http://127.0.0.1:5001")?;
/// for model in api.list_models().await? {
///     println!("{} ({})", model.name, model.id);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpApi {
    base_url: Url,
    http: reqwest::Client,
}

impl HttpApi {
    /// Create a new client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - The base URL of the server (e.g., "http://127.0.0.1:5001")
    pub fn new(base_url: impl AsRef<str>) -> Result<Self> {
        Self::with_client(base_url, reqwest::Client::new())
    }

    /// Create a new client with a custom reqwest client.
    pub fn with_client(base_url: impl AsRef<str>, http: reqwest::Client) -> Result<Self> {
        let base_url = Url::parse(base_url.as_ref())?;
        Ok(Self { base_url, http })
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.http.get(self.url(path)?).send().await?;
        Self::handle_response(response, None).await
    }

    async fn handle_response<T: DeserializeOwned>(
        response: reqwest::Response,
        fallback: Option<&str>,
    ) -> Result<T> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }
        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&text)
            .ok()
            .and_then(|body| body.error)
            .filter(|m| !m.trim().is_empty())
            .or_else(|| fallback.map(ToString::to_string))
            .or_else(|| (!text.trim().is_empty()).then_some(text))
            .unwrap_or_else(|| "Unknown error".into());
        Err(TransportError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl ResearchApi for HttpApi {
    #[instrument(skip(self), err)]
    async fn list_models(&self) -> Result<Vec<ModelDescriptor>> {
        self.get_json("/api/models").await
    }

    #[instrument(skip(self, request), fields(model_id = %request.model_id), err)]
    async fn submit(&self, request: &ResearchRequest) -> Result<SubmitAck> {
        let response = self
            .http
            .post(self.url("/api/research")?)
            .json(request)
            .send()
            .await?;
        Self::handle_response(response, Some(SUBMIT_FALLBACK)).await
    }

    #[instrument(skip(self), err)]
    async fn status(&self) -> Result<JobStatus> {
        self.get_json("/api/status").await
    }

    #[instrument(skip(self), err)]
    async fn backlog(&self) -> Result<Vec<ResearchEvent>> {
        self.get_json("/api/output").await
    }
}
