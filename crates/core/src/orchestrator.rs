//! Job pipeline: preconditions, cache lookup, extraction, reduction, commit.

use std::{future::Future, sync::Arc, time::Duration};

use tracing::{Instrument, debug, info, info_span, warn};

use crate::{
    chunker::{self, ChunkBounds},
    config::Config,
    error::{CancelReason, JobError, LedgerError, Result, TranscriptError},
    ledger::{CoinAccount, JobLedger, SpendRecord},
    reducer::SummaryReducer,
    transcript::{TranscriptSource, validate_video_url},
    types::{
        DEFAULT_TITLE, JobOutcome, JobPayload, JobRecord, JobStatus, RegisterJob, StoredResult,
        SubmitJob, transcript_title,
    },
};

/// Steps of a job, used to tag failures in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStage {
    Auth,
    BalanceCheck,
    CacheLookup,
    Extracting,
    Chunking,
    Reducing,
    Committing,
}

impl JobStage {
    pub fn name(&self) -> &'static str {
        match self {
            JobStage::Auth => "auth",
            JobStage::BalanceCheck => "balance-check",
            JobStage::CacheLookup => "cache-lookup",
            JobStage::Extracting => "extracting",
            JobStage::Chunking => "chunking",
            JobStage::Reducing => "reducing",
            JobStage::Committing => "committing",
        }
    }
}

fn failed(stage: JobStage, err: impl Into<JobError>) -> JobError {
    let err = err.into();
    warn!(
        stage = stage.name(),
        code = err.code(),
        error = %err,
        "job failed"
    );
    err
}

fn cancelled(reason: CancelReason) -> JobError {
    let err = JobError::Cancelled { reason };
    warn!(code = err.code(), "job abandoned before commit");
    err
}

fn storage(err: LedgerError) -> JobError {
    JobError::Storage {
        message: err.to_string(),
    }
}

/// What the pre-commit phase hands to commit.
enum Prepared {
    Cached(StoredResult),
    Generated { text: String, title: String },
}

pub struct JobOrchestrator {
    account: Arc<dyn CoinAccount>,
    ledger: Arc<dyn JobLedger>,
    transcripts: Arc<dyn TranscriptSource>,
    reducer: SummaryReducer,
    chunking: ChunkBounds,
    minimum_cost: i64,
    job_timeout: Duration,
}

impl JobOrchestrator {
    pub fn new(
        account: Arc<dyn CoinAccount>,
        ledger: Arc<dyn JobLedger>,
        transcripts: Arc<dyn TranscriptSource>,
        reducer: SummaryReducer,
        cfg: &Config,
    ) -> Self {
        Self {
            account,
            ledger,
            transcripts,
            reducer,
            chunking: cfg.chunking.bounds(),
            minimum_cost: cfg.billing.minimum_cost,
            job_timeout: cfg.job.job_timeout(),
        }
    }

    pub fn minimum_cost(&self) -> i64 {
        self.minimum_cost
    }

    /// Summarize `req.source_url` for the requester and charge for it.
    pub async fn submit(&self, req: SubmitJob) -> Result<JobOutcome> {
        self.submit_until(req, std::future::pending::<()>()).await
    }

    /// Like [`submit`](Self::submit), but gives up before commit when `cancel`
    /// resolves or the job timeout elapses. Nothing is debited or persisted in
    /// that case. Once commit starts it runs to completion.
    pub async fn submit_until<C>(&self, req: SubmitJob, cancel: C) -> Result<JobOutcome>
    where
        C: Future<Output = ()> + Send,
    {
        let span = info_span!(
            "job",
            job_id = %req.job_id,
            requester = req.requester_id.as_deref().unwrap_or("-"),
        );

        async move {
            info!(url = %req.source_url, "job started");

            let prepared = tokio::select! {
                biased;
                _ = cancel => return Err(cancelled(CancelReason::Caller)),
                res = tokio::time::timeout(self.job_timeout, self.prepare(&req)) => match res {
                    Ok(prepared) => prepared?,
                    Err(_) => return Err(cancelled(CancelReason::JobTimeout)),
                },
            };

            // prepare() only succeeds with an identity
            let requester = req.requester_id.as_deref().map(str::trim).unwrap_or_default();
            self.commit(&req.job_id, requester, &req.source_url, prepared)
                .await
        }
        .instrument(span)
        .await
    }

    fn authorize<'a>(&self, requester_id: Option<&'a str>) -> Result<&'a str> {
        match requester_id.map(str::trim) {
            Some(id) if !id.is_empty() => Ok(id),
            _ => Err(failed(JobStage::Auth, JobError::Unauthorized)),
        }
    }

    async fn check_balance(&self, requester: &str) -> Result<i64> {
        let balance = self
            .account
            .balance(requester)
            .await
            .map_err(|e| failed(JobStage::BalanceCheck, storage(e)))?;

        if balance < self.minimum_cost {
            return Err(failed(
                JobStage::BalanceCheck,
                JobError::InsufficientFunds {
                    balance,
                    required: self.minimum_cost,
                },
            ));
        }
        Ok(balance)
    }

    async fn prepare(&self, req: &SubmitJob) -> Result<Prepared> {
        let requester = self.authorize(req.requester_id.as_deref())?;
        let balance = self.check_balance(requester).await?;
        debug!(balance, "balance checked");

        let cached = self
            .ledger
            .find_by_url(&req.source_url)
            .await
            .map_err(|e| failed(JobStage::CacheLookup, storage(e)))?;
        if let Some(stored) = cached {
            info!("cache hit");
            return Ok(Prepared::Cached(stored));
        }

        let segments = self
            .transcripts
            .fetch(&req.source_url)
            .await
            .map_err(|e| failed(JobStage::Extracting, e))?;
        if segments.iter().all(|s| s.text.trim().is_empty()) {
            return Err(failed(
                JobStage::Extracting,
                TranscriptError::NoTranscript {
                    url: req.source_url.clone(),
                    reason: "transcript is empty".to_string(),
                },
            ));
        }
        let title = transcript_title(&segments)
            .unwrap_or(DEFAULT_TITLE)
            .to_string();

        let chunks = chunker::split(
            &segments,
            self.chunking.max_chunk_size,
            self.chunking.overlap,
        )
        .map_err(|e| failed(JobStage::Chunking, e))?;
        info!(segments = segments.len(), chunks = chunks.len(), "transcript chunked");

        let summary = self
            .reducer
            .summarize(&chunks)
            .await
            .map_err(|e| failed(JobStage::Reducing, e))?;
        info!(profile = summary.profile.name(), "summary generated");

        Ok(Prepared::Generated {
            text: summary.text,
            title,
        })
    }

    /// Persist (fresh results only), then debit, then record the spend.
    ///
    /// A persist failure aborts before any debit. A debit failure after the
    /// result exists does not fail the job; it is logged for reconciliation.
    async fn commit(
        &self,
        job_id: &str,
        requester: &str,
        url: &str,
        prepared: Prepared,
    ) -> Result<JobOutcome> {
        let (status, text, title) = match prepared {
            Prepared::Cached(stored) => (JobStatus::Cached, stored.text, stored.title),
            Prepared::Generated { text, title } => {
                let payload = JobPayload {
                    source_url: url.to_string(),
                    requester_id: requester.to_string(),
                    title: title.clone(),
                };
                self.ledger
                    .persist(job_id, &payload, &text)
                    .await
                    .map_err(|e| {
                        failed(
                            JobStage::Committing,
                            JobError::CommitError {
                                message: e.to_string(),
                            },
                        )
                    })?;
                (JobStatus::Completed, text, title)
            }
        };

        match self.account.debit(requester, self.minimum_cost).await {
            Ok(balance) => {
                info!(amount = self.minimum_cost, balance, "coins debited");
                let spend = SpendRecord {
                    requester_id: requester.to_string(),
                    job_id: job_id.to_string(),
                    amount: self.minimum_cost,
                };
                if let Err(e) = self.account.record_spend(spend).await {
                    warn!(error = %e, "failed to record spend");
                }
            }
            Err(e) => {
                warn!(
                    target: "reconciliation",
                    job_id,
                    requester,
                    amount = self.minimum_cost,
                    status = status.as_str(),
                    error = %e,
                    "debit failed after result was delivered"
                );
            }
        }

        info!(status = status.as_str(), "job finished");
        Ok(JobOutcome {
            job_id: job_id.to_string(),
            status,
            result_text: text,
            title,
        })
    }

    /// Record a URL as a pending job before it is summarized.
    ///
    /// Requires the same identity and balance as a submission and reads the
    /// video title from the transcript source. Nothing is charged.
    pub async fn register(&self, req: RegisterJob) -> Result<JobRecord> {
        let span = info_span!(
            "register",
            job_id = %req.job_id,
            requester = req.requester_id.as_deref().unwrap_or("-"),
        );

        async move {
            let requester = self.authorize(req.requester_id.as_deref())?;
            self.check_balance(requester).await?;
            validate_video_url(&req.source_url).map_err(|e| failed(JobStage::Extracting, e))?;

            let segments = self
                .transcripts
                .fetch(&req.source_url)
                .await
                .map_err(|e| failed(JobStage::Extracting, e))?;
            let title = transcript_title(&segments)
                .unwrap_or(DEFAULT_TITLE)
                .to_string();

            let record = JobRecord {
                id: req.job_id.clone(),
                source_url: req.source_url.clone(),
                requester_id: requester.to_string(),
                title,
                status: JobStatus::Pending,
                result: None,
            };
            self.ledger
                .create(record.clone())
                .await
                .map_err(|e| failed(JobStage::Committing, storage(e)))?;

            info!(title = %record.title, "job registered");
            Ok(record)
        }
        .instrument(span)
        .await
    }
}
