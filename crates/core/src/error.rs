use std::path::PathBuf;

use thiserror::Error;

/// Chunking misconfiguration. Never user-facing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChunkError {
    #[error("Invalid chunking input: transcript has no segments")]
    EmptyInput,

    #[error(
        "Invalid chunking input: max_chunk_size ({max_chunk_size}) must be greater than overlap ({overlap})"
    )]
    DegenerateBounds {
        max_chunk_size: usize,
        overlap: usize,
    },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TranscriptError {
    #[error("Not a supported video URL: {url}")]
    InvalidUrl { url: String },

    #[error("No transcript available for {url}: {reason}")]
    NoTranscript { url: String, reason: String },
}

/// Classified failure of a single generation call.
///
/// Adapters translate their backend's error shape into one of these once, so
/// callers can decide on fallback with a plain `match`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    #[error("Generation rejected by content-safety filtering: {reason}")]
    ContentSafetyRejected { reason: String },

    #[error("Generation call timed out")]
    Timeout,

    #[error("Generation backend error: {message}")]
    Backend { message: String },
}

impl GenerationError {
    pub fn is_safety_rejection(&self) -> bool {
        matches!(self, GenerationError::ContentSafetyRejected { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    ContentPolicy,
    BackendError,
    Timeout,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::ContentPolicy => "content-policy",
            FailureReason::BackendError => "backend-error",
            FailureReason::Timeout => "timeout",
        }
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Generation failed ({reason}): {detail}")]
pub struct ReduceError {
    pub reason: FailureReason,
    pub detail: String,
}

impl ReduceError {
    pub fn new(reason: FailureReason, detail: impl Into<String>) -> Self {
        Self {
            reason,
            detail: detail.into(),
        }
    }
}

impl From<GenerationError> for ReduceError {
    fn from(err: GenerationError) -> Self {
        let reason = match &err {
            GenerationError::ContentSafetyRejected { .. } => FailureReason::ContentPolicy,
            GenerationError::Timeout => FailureReason::Timeout,
            GenerationError::Backend { .. } => FailureReason::BackendError,
        };
        ReduceError::new(reason, err.to_string())
    }
}

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Insufficient funds for {requester_id}: balance {balance}, needed {amount}")]
    InsufficientFunds {
        requester_id: String,
        balance: i64,
        amount: i64,
    },

    #[error("Job {job_id} not found")]
    JobNotFound { job_id: String },

    #[error("Job {job_id} already exists")]
    JobExists { job_id: String },

    #[error("Ledger storage error: {message}")]
    Storage { message: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    Caller,
    JobTimeout,
}

/// Terminal outcome of a failed job. Every variant has a stable code.
#[derive(Error, Debug)]
pub enum JobError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Insufficient funds: balance {balance}, required {required}")]
    InsufficientFunds { balance: i64, required: i64 },

    #[error("Invalid video URL: {url}")]
    InvalidUrl { url: String },

    #[error("No transcript for {url}: {reason}")]
    NoTranscript { url: String, reason: String },

    #[error("Generation failed ({reason}): {detail}")]
    GenerationFailed {
        reason: FailureReason,
        detail: String,
    },

    #[error("Commit failed: {message}")]
    CommitError { message: String },

    #[error("{0}")]
    InvalidInput(#[from] ChunkError),

    #[error("Storage unavailable: {message}")]
    Storage { message: String },

    #[error("Job cancelled ({reason:?})")]
    Cancelled { reason: CancelReason },
}

impl JobError {
    pub fn code(&self) -> &'static str {
        match self {
            JobError::Unauthorized => "unauthorized",
            JobError::InsufficientFunds { .. } => "insufficient-funds",
            JobError::InvalidUrl { .. } => "invalid-url",
            JobError::NoTranscript { .. } => "no-transcript",
            JobError::GenerationFailed { reason, .. } => match reason {
                FailureReason::ContentPolicy => "content-policy",
                FailureReason::BackendError => "generation-error",
                FailureReason::Timeout => "timeout",
            },
            JobError::CommitError { .. } => "commit-error",
            JobError::InvalidInput(_) => "invalid-input",
            JobError::Storage { .. } => "storage-error",
            JobError::Cancelled { reason } => match reason {
                CancelReason::Caller => "cancelled",
                CancelReason::JobTimeout => "job-timeout",
            },
        }
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            JobError::Unauthorized => "Unauthorized. Please sign in and try again.",
            JobError::InsufficientFunds { .. } => {
                "You don't have sufficient coins for summary. Please add your coins."
            }
            JobError::InvalidUrl { .. } => "Please provide a valid YouTube video URL.",
            JobError::NoTranscript { .. } => {
                "No transcript available for this video. Please try another video."
            }
            JobError::GenerationFailed {
                reason: FailureReason::ContentPolicy,
                ..
            } => {
                "Unable to process content due to content restrictions. Retrying this video will not help."
            }
            JobError::GenerationFailed {
                reason: FailureReason::Timeout,
                ..
            }
            | JobError::Cancelled {
                reason: CancelReason::JobTimeout,
            } => "Summary generation took too long. Please try again later.",
            JobError::Cancelled {
                reason: CancelReason::Caller,
            } => "The request was cancelled before the summary was ready.",
            JobError::GenerationFailed { .. }
            | JobError::CommitError { .. }
            | JobError::InvalidInput(_)
            | JobError::Storage { .. } => "Something went wrong. Please try again!",
        }
    }

    /// HTTP-style status a transport layer can answer with.
    pub fn status(&self) -> u16 {
        match self {
            JobError::Unauthorized => 401,
            JobError::InsufficientFunds { .. } => 400,
            JobError::InvalidUrl { .. } => 422,
            JobError::NoTranscript { .. } => 404,
            JobError::GenerationFailed { reason, .. } => match reason {
                FailureReason::ContentPolicy => 422,
                FailureReason::BackendError => 502,
                FailureReason::Timeout => 504,
            },
            JobError::CommitError { .. } | JobError::InvalidInput(_) => 500,
            JobError::Storage { .. } => 503,
            JobError::Cancelled { reason } => match reason {
                CancelReason::Caller => 499,
                CancelReason::JobTimeout => 504,
            },
        }
    }

    /// Whether resubmitting the same request can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            JobError::GenerationFailed {
                reason: FailureReason::BackendError | FailureReason::Timeout,
                ..
            } | JobError::CommitError { .. }
                | JobError::Storage { .. }
                | JobError::Cancelled { .. }
        )
    }
}

impl From<TranscriptError> for JobError {
    fn from(err: TranscriptError) -> Self {
        match err {
            TranscriptError::InvalidUrl { url } => JobError::InvalidUrl { url },
            TranscriptError::NoTranscript { url, reason } => JobError::NoTranscript { url, reason },
        }
    }
}

impl From<ReduceError> for JobError {
    fn from(err: ReduceError) -> Self {
        JobError::GenerationFailed {
            reason: err.reason,
            detail: err.detail,
        }
    }
}

pub type Result<T> = std::result::Result<T, JobError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_failures_have_distinct_codes() {
        let policy = JobError::from(ReduceError::new(FailureReason::ContentPolicy, "x"));
        let backend = JobError::from(ReduceError::new(FailureReason::BackendError, "x"));
        let timeout = JobError::from(ReduceError::new(FailureReason::Timeout, "x"));

        assert_eq!(policy.code(), "content-policy");
        assert_eq!(backend.code(), "generation-error");
        assert_eq!(timeout.code(), "timeout");
        assert!(!policy.is_retryable());
        assert!(backend.is_retryable());
    }

    #[test]
    fn content_policy_message_is_not_generic() {
        let err = JobError::GenerationFailed {
            reason: FailureReason::ContentPolicy,
            detail: "blocked".into(),
        };
        assert!(err.user_message().contains("content restrictions"));
        assert_ne!(err.user_message(), "Something went wrong. Please try again!");
    }

    #[test]
    fn transcript_errors_map_to_terminal_codes() {
        let invalid: JobError = TranscriptError::InvalidUrl {
            url: "https://example.com".into(),
        }
        .into();
        let missing: JobError = TranscriptError::NoTranscript {
            url: "https://youtu.be/abc".into(),
            reason: "no captions".into(),
        }
        .into();

        assert_eq!(invalid.code(), "invalid-url");
        assert_eq!(missing.code(), "no-transcript");
        assert!(!invalid.is_retryable());
        assert!(!missing.is_retryable());
        assert_eq!(missing.status(), 404);
    }

    #[test]
    fn generation_error_maps_to_reduce_reason() {
        let err: ReduceError = GenerationError::Timeout.into();
        assert_eq!(err.reason, FailureReason::Timeout);

        let err: ReduceError = GenerationError::Backend {
            message: "quota".into(),
        }
        .into();
        assert_eq!(err.reason, FailureReason::BackendError);
    }

    #[test]
    fn commit_error_is_retryable_server_error() {
        let err = JobError::CommitError {
            message: "disk full".into(),
        };
        assert_eq!(err.status(), 500);
        assert!(err.is_retryable());
    }
}
