//! Account and job-ledger collaborator contracts.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    error::LedgerError,
    types::{JobPayload, JobRecord, StoredResult},
};

/// Audit entry written after a successful debit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpendRecord {
    pub requester_id: String,
    pub job_id: String,
    pub amount: i64,
}

/// Prepaid coin balances.
///
/// Implementations serialize debits per account so a balance never goes
/// negative through concurrent debits.
#[async_trait]
pub trait CoinAccount: Send + Sync {
    /// Current balance. Unknown requesters have a balance of zero.
    async fn balance(&self, requester_id: &str) -> Result<i64, LedgerError>;

    /// Atomically remove `amount` coins and return the new balance.
    async fn debit(&self, requester_id: &str, amount: i64) -> Result<i64, LedgerError>;

    /// Add `amount` coins and return the new balance.
    async fn credit(&self, requester_id: &str, amount: i64) -> Result<i64, LedgerError>;

    async fn record_spend(&self, spend: SpendRecord) -> Result<(), LedgerError>;
}

/// Durable job records keyed by job id and by source URL.
#[async_trait]
pub trait JobLedger: Send + Sync {
    /// Latest stored summary for `url`, if any job produced one.
    async fn find_by_url(&self, url: &str) -> Result<Option<StoredResult>, LedgerError>;

    /// Insert a new record. Fails with `JobExists` if the id is taken.
    async fn create(&self, record: JobRecord) -> Result<(), LedgerError>;

    /// Upsert the job as completed with `result` attached.
    async fn persist(
        &self,
        job_id: &str,
        payload: &JobPayload,
        result: &str,
    ) -> Result<(), LedgerError>;

    async fn get(&self, job_id: &str) -> Result<Option<JobRecord>, LedgerError>;
}
