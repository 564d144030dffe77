use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::{
    error::LedgerError,
    ledger::{CoinAccount, JobLedger, SpendRecord},
    store::LedgerState,
    types::{JobPayload, JobRecord, StoredResult},
};

/// In-process store for tests and single-run tools.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<LedgerState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_balance(requester_id: &str, amount: i64) -> Self {
        let mut state = LedgerState::default();
        state.credit(requester_id, amount);
        Self {
            state: Mutex::new(state),
        }
    }

    pub async fn snapshot(&self) -> LedgerState {
        self.state.lock().await.clone()
    }

    pub async fn spends(&self) -> Vec<SpendRecord> {
        self.state.lock().await.spends.clone()
    }
}

#[async_trait]
impl CoinAccount for MemoryStore {
    async fn balance(&self, requester_id: &str) -> Result<i64, LedgerError> {
        Ok(self.state.lock().await.balance(requester_id))
    }

    async fn debit(&self, requester_id: &str, amount: i64) -> Result<i64, LedgerError> {
        self.state.lock().await.debit(requester_id, amount)
    }

    async fn credit(&self, requester_id: &str, amount: i64) -> Result<i64, LedgerError> {
        Ok(self.state.lock().await.credit(requester_id, amount))
    }

    async fn record_spend(&self, spend: SpendRecord) -> Result<(), LedgerError> {
        self.state.lock().await.record_spend(spend);
        Ok(())
    }
}

#[async_trait]
impl JobLedger for MemoryStore {
    async fn find_by_url(&self, url: &str) -> Result<Option<StoredResult>, LedgerError> {
        Ok(self.state.lock().await.find_by_url(url))
    }

    async fn create(&self, record: JobRecord) -> Result<(), LedgerError> {
        self.state.lock().await.create(record)
    }

    async fn persist(
        &self,
        job_id: &str,
        payload: &JobPayload,
        result: &str,
    ) -> Result<(), LedgerError> {
        self.state.lock().await.persist(job_id, payload, result);
        Ok(())
    }

    async fn get(&self, job_id: &str) -> Result<Option<JobRecord>, LedgerError> {
        Ok(self.state.lock().await.get(job_id).cloned())
    }
}
