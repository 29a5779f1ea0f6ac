//! HTTP client for the song generation API.
//!
//! A job is created with [`JobClient::submit`] and checked with
//! [`JobClient::poll`]. [`JobClient::run_to_completion`] drives both until
//! the job reaches a terminal status, the attempt cap runs out, or the
//! caller cancels.

use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{ClientConfig, PollPolicy};
use crate::error::{PollError, SongError, SubmissionError};
use crate::protocol::{
    GenerateResponse, GenerationRequest, JobHandle, JobStatus, QueryResponse,
};

/// Client bound to one provider endpoint and API key.
///
/// Cloning is cheap; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct JobClient {
    base_url: Url,
    api_key: String,
    client: Client,
}

impl JobClient {
    /// Create a new client.
    pub fn new(config: ClientConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            base_url: config.base_url,
            api_key: config.api_key,
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    /// Base URL with `segments` appended, each percent-encoded as one segment.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // Only cannot-be-a-base URLs refuse segments; ClientConfig rejects those.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Create a generation job.
    pub async fn submit(&self, request: &GenerationRequest) -> Result<JobHandle, SubmissionError> {
        let url = self.endpoint(&["v1", "song", "generate"]);
        debug!(
            %url,
            prompt = request.prompt(),
            lyrics_chars = request.lyrics().chars().count(),
            "Submitting generation request"
        );

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&request.to_body())
            .send()
            .await
            .map_err(SubmissionError::Transport)?;

        let status = response.status();
        let body = response.text().await.map_err(SubmissionError::Transport)?;
        if !status.is_success() {
            return Err(SubmissionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateResponse = decode(&body)
            .map_err(|source| SubmissionError::Decode { body: body.clone(), source })?;

        let handle = parsed
            .id
            .and_then(JobHandle::new)
            .ok_or(SubmissionError::MissingId { raw: body })?;

        info!(task_id = handle.task_id(), "Generation job submitted");
        Ok(handle)
    }

    /// Query a job's status once.
    pub async fn poll(&self, handle: &JobHandle) -> Result<JobStatus, PollError> {
        let url = self.endpoint(&["v1", "song", "query", handle.task_id()]);

        let response = self
            .client
            .get(url)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(PollError::Transport)?;

        let status = response.status();
        let body = response.text().await.map_err(PollError::Transport)?;
        if !status.is_success() {
            return Err(PollError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: QueryResponse =
            decode(&body).map_err(|source| PollError::Decode { body, source })?;
        Ok(parsed.into())
    }

    /// Submit a job and wait for its first track URL.
    pub async fn run_to_completion(
        &self,
        request: &GenerationRequest,
        policy: &PollPolicy,
        cancel: &CancellationToken,
    ) -> Result<String, SongError> {
        let handle = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(SongError::Cancelled),
            handle = self.submit(request) => handle?,
        };
        self.wait(&handle, policy, cancel).await
    }

    /// Poll an existing job until it finishes.
    ///
    /// Stops at the first terminal status. Transport and HTTP errors are not
    /// retried.
    pub async fn wait(
        &self,
        handle: &JobHandle,
        policy: &PollPolicy,
        cancel: &CancellationToken,
    ) -> Result<String, SongError> {
        info!(
            task_id = handle.task_id(),
            interval_secs = policy.interval.as_secs_f64(),
            max_attempts = policy.max_attempts,
            "Waiting for job"
        );

        for attempt in 1..=policy.max_attempts {
            let status = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(SongError::Cancelled),
                status = self.poll(handle) => status?,
            };

            match status {
                JobStatus::Succeeded(choices) => {
                    info!(task_id = handle.task_id(), attempt, "Job succeeded");
                    return choices
                        .into_iter()
                        .next()
                        .map(|choice| choice.url)
                        .ok_or_else(|| SongError::MalformedSuccess("no choices".to_string()));
                }
                JobStatus::Failed(message) => {
                    warn!(task_id = handle.task_id(), attempt, ?message, "Job failed");
                    return Err(SongError::JobFailed { message });
                }
                JobStatus::MalformedSuccess(reason) => {
                    warn!(task_id = handle.task_id(), attempt, %reason, "Malformed success response");
                    return Err(SongError::MalformedSuccess(reason));
                }
                JobStatus::Pending(label) => {
                    info!(task_id = handle.task_id(), attempt, status = %label, "Job still processing");
                }
            }

            if attempt < policy.max_attempts {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(SongError::Cancelled),
                    _ = tokio::time::sleep(policy.interval) => {}
                }
            }
        }

        Err(SongError::AttemptsExhausted {
            attempts: policy.max_attempts,
        })
    }
}

fn decode<T: DeserializeOwned>(body: &str) -> Result<T, serde_json::Error> {
    serde_json::from_str(body)
}
