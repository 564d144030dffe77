use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One caption cue of a video transcript.
///
/// Only the first segment of a transcript carries the video title.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl TranscriptSegment {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            start: 0.0,
            end: 0.0,
            text: text.into(),
            title: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// Title attached to the first segment, if the source provided one.
pub fn transcript_title(segments: &[TranscriptSegment]) -> Option<&str> {
    segments.first().and_then(|s| s.title.as_deref())
}

/// A bounded slice of transcript text handed to the generation backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub index: usize,
    pub text: String,
    pub token_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileKind {
    Standard,
    Conservative,
}

impl ProfileKind {
    pub fn name(&self) -> &'static str {
        match self {
            ProfileKind::Standard => "standard",
            ProfileKind::Conservative => "conservative",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Cached,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Cached => "cached",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

/// Durable job record kept by the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: String,
    pub source_url: String,
    pub requester_id: String,
    pub title: String,
    pub status: JobStatus,
    #[serde(default)]
    pub result: Option<String>,
}

/// What the orchestrator hands to `JobLedger::persist` alongside the result text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobPayload {
    pub source_url: String,
    pub requester_id: String,
    pub title: String,
}

/// A previously generated summary found by source URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredResult {
    pub text: String,
    pub title: String,
}

/// Inbound `SubmitJob` request.
#[derive(Debug, Clone)]
pub struct SubmitJob {
    /// `None` when the caller has no valid identity.
    pub requester_id: Option<String>,
    pub source_url: String,
    pub job_id: String,
}

/// Inbound request to register a URL as a pending job before summarizing it.
#[derive(Debug, Clone)]
pub struct RegisterJob {
    pub requester_id: Option<String>,
    pub source_url: String,
    pub job_id: String,
}

/// Successful `SubmitJob` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobOutcome {
    pub job_id: String,
    pub status: JobStatus,
    pub result_text: String,
    pub title: String,
}

pub const DEFAULT_TITLE: &str = "No Title Found!";

/// Fresh opaque job id for callers that do not supply their own.
pub fn new_job_id() -> String {
    Uuid::new_v4().to_string()
}
