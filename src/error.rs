//! Error types for job submission and polling.

use thiserror::Error;

/// Failure while creating a job.
#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("failed to connect to song API: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("generation request failed with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to parse generation response: {body}")]
    Decode {
        body: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("generation response is missing 'id': {raw}")]
    MissingId { raw: String },
}

/// Failure while querying a job's status.
#[derive(Debug, Error)]
pub enum PollError {
    #[error("failed to connect to song API: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("status query failed with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to parse status response: {body}")]
    Decode {
        body: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Any way a generation run can end without a track.
#[derive(Debug, Error)]
pub enum SongError {
    #[error(transparent)]
    Submission(#[from] SubmissionError),

    #[error(transparent)]
    Poll(#[from] PollError),

    #[error("song generation failed: {}", .message.as_deref().unwrap_or("no message from provider"))]
    JobFailed { message: Option<String> },

    #[error("song generation succeeded with an unusable response: {0}")]
    MalformedSuccess(String),

    #[error("job still pending after {attempts} status checks")]
    AttemptsExhausted { attempts: u32 },

    #[error("cancelled while waiting for job")]
    Cancelled,
}
