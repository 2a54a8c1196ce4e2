//! REST client for the remote generation service.
//!
//! Wraps the text-stream endpoint and the video job submission/status
//! endpoints using [`reqwest`].

use async_trait::async_trait;
use futures::StreamExt;

use crate::messages::{JobSubmission, SubmitAck, TaskStatusReport, TextStreamRequest};
use crate::sse::decode_sse_stream;
use crate::transport::{ChunkStream, JobTransport, TextStreamTransport};

/// Header carrying a per-call correlation id.
const REQUEST_ID_HEADER: &str = "x-request-id";

/// HTTP client for one generation service deployment.
#[derive(Clone)]
pub struct GenerationApi {
    client: reqwest::Client,
    api_url: String,
}

/// Errors from the remote API layer.
#[derive(Debug, thiserror::Error)]
pub enum RemoteApiError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The service returned a non-2xx status code.
    #[error("Generation API error ({status}): {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// A stream frame could not be decoded.
    #[error("Malformed stream frame: {0}")]
    Decode(#[from] serde_json::Error),

    /// The service reported an error inside an open stream.
    #[error("Stream error: {0}")]
    Stream(String),
}

impl GenerationApi {
    /// Create a new API client.
    ///
    /// * `api_url` - Base HTTP URL, e.g. `http://host:8000`.
    pub fn new(api_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), api_url)
    }

    /// Create an API client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, api_url: impl Into<String>) -> Self {
        let api_url = api_url.into().trim_end_matches('/').to_string();
        Self { client, api_url }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Open a text generation stream.
    ///
    /// Sends `POST /v1/text/stream` and returns the decoded increments.
    pub async fn stream_text(&self, request: &TextStreamRequest) -> Result<ChunkStream, RemoteApiError> {
        let request_id = uuid::Uuid::new_v4().to_string();
        let response = self
            .client
            .post(format!("{}/v1/text/stream", self.api_url))
            .header(REQUEST_ID_HEADER, &request_id)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .json(request)
            .send()
            .await?;
        let response = Self::ensure_success(response).await?;

        tracing::debug!(
            request_id = %request_id,
            model_id = %request.model_id,
            "Text stream opened",
        );

        Ok(decode_sse_stream(response.bytes_stream().boxed()))
    }

    /// Submit a video generation job.
    ///
    /// Sends `POST /v1/video/jobs`. Returns one remote task id per attempt.
    pub async fn submit_job(&self, submission: &JobSubmission) -> Result<SubmitAck, RemoteApiError> {
        let response = self
            .client
            .post(format!("{}/v1/video/jobs", self.api_url))
            .json(submission)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Retrieve the status of one remote task.
    ///
    /// Sends `GET /v1/video/jobs/{task_id}`.
    pub async fn job_status(&self, task_id: &str) -> Result<TaskStatusReport, RemoteApiError> {
        let response = self
            .client
            .get(format!("{}/v1/video/jobs/{}", self.api_url, task_id))
            .send()
            .await?;

        Self::parse_response(response).await
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code, or turn it into
    /// [`RemoteApiError::ApiError`] carrying the status and body text.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, RemoteApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(RemoteApiError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, RemoteApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl TextStreamTransport for GenerationApi {
    async fn open_stream(&self, request: TextStreamRequest) -> Result<ChunkStream, RemoteApiError> {
        self.stream_text(&request).await
    }
}

#[async_trait]
impl JobTransport for GenerationApi {
    async fn submit(&self, submission: &JobSubmission) -> Result<SubmitAck, RemoteApiError> {
        self.submit_job(submission).await
    }

    async fn status(&self, task_id: &str) -> Result<TaskStatusReport, RemoteApiError> {
        self.job_status(task_id).await
    }
}
