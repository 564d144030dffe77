//! Test doubles for the collaborator traits.
//!
//! Used by the crate's own tests and available to downstream crates that want
//! to drive a [`JobOrchestrator`](crate::orchestrator::JobOrchestrator)
//! without network or disk.

use std::{
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;

use crate::{
    backend::GenerationBackend,
    error::{GenerationError, LedgerError, TranscriptError},
    ledger::{CoinAccount, JobLedger, SpendRecord},
    store::MemoryStore,
    transcript::TranscriptSource,
    types::{JobPayload, JobRecord, ProfileKind, StoredResult, TranscriptSegment},
};

type Responder = Box<dyn Fn(&str) -> Result<String, GenerationError> + Send + Sync>;
type DelayFn = Box<dyn Fn(&str) -> Duration + Send + Sync>;

/// Backend whose answers come from a closure over the rendered prompt.
pub struct ScriptedBackend {
    kind: ProfileKind,
    respond: Responder,
    delay: Option<DelayFn>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    pub fn new(
        kind: ProfileKind,
        respond: impl Fn(&str) -> Result<String, GenerationError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            respond: Box::new(respond),
            delay: None,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Answers every prompt with the prompt itself.
    pub fn echo(kind: ProfileKind) -> Self {
        Self::new(kind, |prompt| Ok(prompt.to_string()))
    }

    /// Rejects every prompt as unsafe.
    pub fn rejecting(kind: ProfileKind) -> Self {
        Self::failing(
            kind,
            GenerationError::ContentSafetyRejected {
                reason: "SAFETY".to_string(),
            },
        )
    }

    pub fn failing(kind: ProfileKind, err: GenerationError) -> Self {
        Self::new(kind, move |_| Err(err.clone()))
    }

    pub fn with_delay(self, delay: Duration) -> Self {
        self.with_delay_fn(move |_| delay)
    }

    pub fn with_delay_fn(mut self, delay: impl Fn(&str) -> Duration + Send + Sync + 'static) -> Self {
        self.delay = Some(Box::new(delay));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Prompts received so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl GenerationBackend for ScriptedBackend {
    fn profile(&self) -> ProfileKind {
        self.kind
    }

    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(prompt.to_string());

        if let Some(delay) = &self.delay {
            tokio::time::sleep(delay(prompt)).await;
        }
        (self.respond)(prompt)
    }
}

/// Transcript source returning a fixed answer for every URL.
pub struct StaticTranscriptSource {
    answer: Result<Vec<TranscriptSegment>, TranscriptError>,
    fetches: AtomicUsize,
}

impl StaticTranscriptSource {
    pub fn new(segments: Vec<TranscriptSegment>) -> Self {
        Self {
            answer: Ok(segments),
            fetches: AtomicUsize::new(0),
        }
    }

    /// Segments from plain strings, the first one titled `title`.
    pub fn from_texts(title: &str, texts: &[&str]) -> Self {
        let segments = texts
            .iter()
            .enumerate()
            .map(|(i, text)| {
                let segment = TranscriptSegment::new(*text);
                if i == 0 { segment.with_title(title) } else { segment }
            })
            .collect();
        Self::new(segments)
    }

    pub fn failing(err: TranscriptError) -> Self {
        Self {
            answer: Err(err),
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TranscriptSource for StaticTranscriptSource {
    async fn fetch(&self, _url: &str) -> Result<Vec<TranscriptSegment>, TranscriptError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.answer.clone()
    }
}

/// [`MemoryStore`] with switchable faults and call counters.
#[derive(Debug, Default)]
pub struct FailingLedger {
    inner: MemoryStore,
    fail_lookup: bool,
    fail_persist: bool,
    fail_debit: bool,
    fail_record_spend: bool,
    debits: AtomicUsize,
    persists: AtomicUsize,
    spends: AtomicUsize,
}

impl FailingLedger {
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            ..Self::default()
        }
    }

    pub fn with_balance(requester_id: &str, amount: i64) -> Self {
        Self::new(MemoryStore::with_balance(requester_id, amount))
    }

    /// Balance reads and URL lookups fail.
    pub fn fail_lookup(mut self) -> Self {
        self.fail_lookup = true;
        self
    }

    pub fn fail_persist(mut self) -> Self {
        self.fail_persist = true;
        self
    }

    pub fn fail_debit(mut self) -> Self {
        self.fail_debit = true;
        self
    }

    pub fn fail_record_spend(mut self) -> Self {
        self.fail_record_spend = true;
        self
    }

    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    /// Debit attempts, including failed ones.
    pub fn debits(&self) -> usize {
        self.debits.load(Ordering::SeqCst)
    }

    /// Persist attempts, including failed ones.
    pub fn persists(&self) -> usize {
        self.persists.load(Ordering::SeqCst)
    }

    pub fn spends(&self) -> usize {
        self.spends.load(Ordering::SeqCst)
    }
}

fn injected(what: &str) -> LedgerError {
    LedgerError::Storage {
        message: format!("injected {what} failure"),
    }
}

#[async_trait]
impl CoinAccount for FailingLedger {
    async fn balance(&self, requester_id: &str) -> Result<i64, LedgerError> {
        if self.fail_lookup {
            return Err(injected("balance"));
        }
        self.inner.balance(requester_id).await
    }

    async fn debit(&self, requester_id: &str, amount: i64) -> Result<i64, LedgerError> {
        self.debits.fetch_add(1, Ordering::SeqCst);
        if self.fail_debit {
            return Err(injected("debit"));
        }
        self.inner.debit(requester_id, amount).await
    }

    async fn credit(&self, requester_id: &str, amount: i64) -> Result<i64, LedgerError> {
        self.inner.credit(requester_id, amount).await
    }

    async fn record_spend(&self, spend: SpendRecord) -> Result<(), LedgerError> {
        self.spends.fetch_add(1, Ordering::SeqCst);
        if self.fail_record_spend {
            return Err(injected("record_spend"));
        }
        self.inner.record_spend(spend).await
    }
}

#[async_trait]
impl JobLedger for FailingLedger {
    async fn find_by_url(&self, url: &str) -> Result<Option<StoredResult>, LedgerError> {
        if self.fail_lookup {
            return Err(injected("find_by_url"));
        }
        self.inner.find_by_url(url).await
    }

    async fn create(&self, record: JobRecord) -> Result<(), LedgerError> {
        self.inner.create(record).await
    }

    async fn persist(
        &self,
        job_id: &str,
        payload: &JobPayload,
        result: &str,
    ) -> Result<(), LedgerError> {
        self.persists.fetch_add(1, Ordering::SeqCst);
        if self.fail_persist {
            return Err(injected("persist"));
        }
        self.inner.persist(job_id, payload, result).await
    }

    async fn get(&self, job_id: &str) -> Result<Option<JobRecord>, LedgerError> {
        self.inner.get(job_id).await
    }
}
