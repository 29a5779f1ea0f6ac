//! Wire and domain types for the song generation API.
//!
//! Request/response bodies mirror the provider's JSON. The domain types
//! (`GenerationRequest`, `JobHandle`, `JobStatus`) are what the rest of the
//! crate works with.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Model identifier sent with every generation request.
pub const MODEL_AUTO: &str = "auto";

/// Style prompt used when the caller does not supply one.
pub const DEFAULT_PROMPT: &str = "kpop";

/// Status label the provider reports for a finished job.
pub const STATUS_SUCCEEDED: &str = "succeeded";

/// Status label the provider reports for a failed job.
///
/// The provider documents this one in upper case, unlike the success label.
/// Comparison is exact.
pub const STATUS_FAILED: &str = "FAILED";

/// A song generation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    lyrics: String,
    prompt: String,
}

impl GenerationRequest {
    /// Create a request with the default style prompt.
    pub fn new(lyrics: impl Into<String>) -> Self {
        Self {
            lyrics: lyrics.into(),
            prompt: DEFAULT_PROMPT.to_string(),
        }
    }

    /// Set the style prompt (genre, mood, length hints).
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    pub fn lyrics(&self) -> &str {
        &self.lyrics
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// Build the JSON body for the generate endpoint.
    pub(crate) fn to_body(&self) -> GenerateBody<'_> {
        GenerateBody {
            lyrics: &self.lyrics,
            model: MODEL_AUTO,
            prompt: &self.prompt,
        }
    }
}

/// Handle to a submitted job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle {
    task_id: String,
}

impl JobHandle {
    /// Wrap a task id. Returns `None` for an empty id.
    pub fn new(task_id: impl Into<String>) -> Option<Self> {
        let task_id = task_id.into();
        if task_id.is_empty() {
            None
        } else {
            Some(Self { task_id })
        }
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }
}

/// One generated track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Choice {
    pub url: String,
}

/// Latest known state of a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    /// Not finished yet. Carries the provider's label (empty when absent).
    Pending(String),
    /// Finished. Always holds at least one choice.
    Succeeded(Vec<Choice>),
    /// The provider reported a failure.
    Failed(Option<String>),
    /// The provider reported success but the body is unusable.
    MalformedSuccess(String),
}

/// Body of `POST /v1/song/generate`.
#[derive(Debug, Serialize)]
pub(crate) struct GenerateBody<'a> {
    pub lyrics: &'a str,
    pub model: &'a str,
    pub prompt: &'a str,
}

/// Response of `POST /v1/song/generate`.
#[derive(Debug, Deserialize)]
pub(crate) struct GenerateResponse {
    #[serde(default)]
    pub id: Option<String>,
}

/// Response of `GET /v1/song/query/{task_id}`.
///
/// Fields stay loosely typed so that a field the current status does not
/// use can never fail the poll.
#[derive(Debug, Deserialize)]
pub(crate) struct QueryResponse {
    #[serde(default)]
    pub status: Option<Value>,
    #[serde(default)]
    pub choices: Option<Value>,
    #[serde(default)]
    pub error_message: Option<Value>,
}

impl From<QueryResponse> for JobStatus {
    fn from(response: QueryResponse) -> Self {
        let label = response.status.map(into_text).unwrap_or_default();
        if label == STATUS_SUCCEEDED {
            succeeded(response.choices)
        } else if label == STATUS_FAILED {
            JobStatus::Failed(response.error_message.map(into_text).filter(|m| !m.is_empty()))
        } else {
            JobStatus::Pending(label)
        }
    }
}

/// Strings as-is, `null` as empty, anything else as compact JSON.
fn into_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Validate the choices of a succeeded job.
fn succeeded(choices: Option<Value>) -> JobStatus {
    let choices = match choices {
        Some(Value::Array(items)) if !items.is_empty() => items,
        None | Some(Value::Null) | Some(Value::Array(_)) => {
            return JobStatus::MalformedSuccess(
                "job succeeded but 'choices' is missing or empty".to_string(),
            );
        }
        Some(_) => {
            return JobStatus::MalformedSuccess(
                "job succeeded but 'choices' is not a list".to_string(),
            );
        }
    };

    // Only the first choice has to be usable; later entries are passed
    // through when they carry a url and skipped otherwise.
    if choice_url(&choices[0]).is_none() {
        return JobStatus::MalformedSuccess("'choices[0]' has no 'url'".to_string());
    }
    JobStatus::Succeeded(
        choices
            .iter()
            .filter_map(choice_url)
            .map(|url| Choice { url })
            .collect(),
    )
}

fn choice_url(choice: &Value) -> Option<String> {
    choice
        .get("url")
        .and_then(Value::as_str)
        .filter(|url| !url.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(json: &str) -> JobStatus {
        let response: QueryResponse = serde_json::from_str(json).unwrap();
        response.into()
    }

    #[test]
    fn test_generate_body_shape() {
        let request = GenerationRequest::new("la la la").with_prompt("sad ballad");
        let json = serde_json::to_value(request.to_body()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"lyrics": "la la la", "model": "auto", "prompt": "sad ballad"})
        );
    }

    #[test]
    fn test_default_prompt() {
        let request = GenerationRequest::new("verse");
        assert_eq!(request.prompt(), "kpop");
    }

    #[test]
    fn test_empty_task_id_rejected() {
        assert!(JobHandle::new("").is_none());
        assert_eq!(JobHandle::new("job-123").unwrap().task_id(), "job-123");
    }

    #[test]
    fn test_succeeded_keeps_choice_order() {
        let status = status_of(
            r#"{"status": "succeeded", "choices": [{"url": "https://x/a.mp3"}, {"url": "https://x/b.mp3"}]}"#,
        );
        match status {
            JobStatus::Succeeded(choices) => {
                assert_eq!(choices.len(), 2);
                assert_eq!(choices[0].url, "https://x/a.mp3");
            }
            other => panic!("unexpected status: {:?}", other),
        }
    }

    #[test]
    fn test_succeeded_with_empty_choices_is_malformed() {
        let status = status_of(r#"{"status": "succeeded", "choices": []}"#);
        assert!(matches!(status, JobStatus::MalformedSuccess(_)));

        let status = status_of(r#"{"status": "succeeded"}"#);
        assert!(matches!(status, JobStatus::MalformedSuccess(_)));
    }

    #[test]
    fn test_first_choice_without_url_is_malformed() {
        let status = status_of(
            r#"{"status": "succeeded", "choices": [{"duration": 60}, {"url": "https://x/b.mp3"}]}"#,
        );
        assert!(matches!(status, JobStatus::MalformedSuccess(_)));

        let status = status_of(r#"{"status": "succeeded", "choices": [{"url": ""}]}"#);
        assert!(matches!(status, JobStatus::MalformedSuccess(_)));
    }

    #[test]
    fn test_failed_carries_message() {
        let status = status_of(r#"{"status": "FAILED", "error_message": "quota exceeded"}"#);
        assert_eq!(status, JobStatus::Failed(Some("quota exceeded".to_string())));

        let status = status_of(r#"{"status": "FAILED"}"#);
        assert_eq!(status, JobStatus::Failed(None));
    }

    #[test]
    fn test_later_choices_are_not_validated() {
        let status = status_of(
            r#"{"status": "succeeded", "choices": [{"url": "https://x/a.mp3"}, null, "junk", {"id": 3}]}"#,
        );
        assert_eq!(
            status,
            JobStatus::Succeeded(vec![Choice {
                url: "https://x/a.mp3".to_string()
            }])
        );
    }

    #[test]
    fn test_non_list_choices_is_malformed() {
        let status = status_of(r#"{"status": "succeeded", "choices": {"url": "https://x/a.mp3"}}"#);
        assert_eq!(
            status,
            JobStatus::MalformedSuccess("job succeeded but 'choices' is not a list".to_string())
        );

        let status = status_of(r#"{"status": "succeeded", "choices": [null]}"#);
        assert!(matches!(status, JobStatus::MalformedSuccess(_)));
    }

    #[test]
    fn test_pending_ignores_choices_shape() {
        let status = status_of(r#"{"status": "running", "choices": "not-ready"}"#);
        assert_eq!(status, JobStatus::Pending("running".to_string()));
    }

    #[test]
    fn test_failed_with_structured_message() {
        let status = status_of(r#"{"status": "FAILED", "error_message": {"code": 42}}"#);
        assert_eq!(status, JobStatus::Failed(Some(r#"{"code":42}"#.to_string())));

        let status = status_of(r#"{"status": "FAILED", "error_message": null}"#);
        assert_eq!(status, JobStatus::Failed(None));
    }

    #[test]
    fn test_terminal_labels_are_case_sensitive() {
        assert_eq!(
            status_of(r#"{"status": "failed", "error_message": "x"}"#),
            JobStatus::Pending("failed".to_string())
        );
        assert_eq!(
            status_of(r#"{"status": "SUCCEEDED", "choices": [{"url": "https://x/a.mp3"}]}"#),
            JobStatus::Pending("SUCCEEDED".to_string())
        );
    }

    #[test]
    fn test_unknown_or_missing_status_is_pending() {
        let status = status_of(r#"{"status": "running"}"#);
        assert_eq!(status, JobStatus::Pending("running".to_string()));

        let status = status_of(r#"{"trace_id": "abc"}"#);
        assert_eq!(status, JobStatus::Pending(String::new()));
    }
}
