//! Summarist Core Library
//!
//! Paid YouTube summaries: caption extraction, token-bounded chunking,
//! map-reduce generation with a conservative safety fallback, and a coin
//! ledger that is only debited once a result is stored.

pub mod backend;
pub mod cache;
pub mod chunker;
pub mod config;
pub mod error;
pub mod format;
pub mod ledger;
pub mod orchestrator;
pub mod prompt;
pub mod provider;
pub mod reducer;
pub mod store;
pub mod testing;
pub mod transcript;
pub mod types;

pub use backend::{Backends, GenerationBackend, HttpGenerationBackend};
pub use cache::{get_cache_dir, get_ledger_path, get_root_cache_dir, get_transcript_path};
pub use chunker::split;
pub use config::Config;
pub use error::{
    ChunkError, ConfigError, FailureReason, GenerationError, JobError, LedgerError, ReduceError,
    Result, TranscriptError,
};
pub use format::{format_outcome_readable, format_record_readable, format_timestamp};
pub use ledger::{CoinAccount, JobLedger, SpendRecord};
pub use orchestrator::{JobOrchestrator, JobStage};
pub use prompt::{PromptTemplate, Prompts};
pub use provider::{Provider, ProviderConfig};
pub use reducer::{Summary, SummaryReducer};
pub use store::{FileStore, MemoryStore};
pub use transcript::{TranscriptSource, YtDlpTranscriptSource, validate_video_url};
pub use types::{
    Chunk, JobOutcome, JobRecord, JobStatus, ProfileKind, RegisterJob, SubmitJob,
    TranscriptSegment, new_job_id,
};
