//! Ledger and account stores.
//!
//! Both stores apply the same operations to a [`LedgerState`]; they differ
//! only in where the state lives between calls.

pub mod file;
pub mod memory;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{
    error::LedgerError,
    ledger::SpendRecord,
    types::{JobPayload, JobRecord, JobStatus, StoredResult},
};

pub use file::FileStore;
pub use memory::MemoryStore;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerState {
    #[serde(default)]
    pub balances: HashMap<String, i64>,
    /// Insertion ordered.
    #[serde(default)]
    pub jobs: Vec<JobRecord>,
    #[serde(default)]
    pub spends: Vec<SpendRecord>,
}

impl LedgerState {
    pub fn balance(&self, requester_id: &str) -> i64 {
        self.balances.get(requester_id).copied().unwrap_or(0)
    }

    pub fn debit(&mut self, requester_id: &str, amount: i64) -> Result<i64, LedgerError> {
        let balance = self.balance(requester_id);
        if balance < amount {
            return Err(LedgerError::InsufficientFunds {
                requester_id: requester_id.to_string(),
                balance,
                amount,
            });
        }
        let next = balance - amount;
        self.balances.insert(requester_id.to_string(), next);
        Ok(next)
    }

    pub fn credit(&mut self, requester_id: &str, amount: i64) -> i64 {
        let next = self.balance(requester_id) + amount;
        self.balances.insert(requester_id.to_string(), next);
        next
    }

    pub fn record_spend(&mut self, spend: SpendRecord) {
        self.spends.push(spend);
    }

    pub fn find_by_url(&self, url: &str) -> Option<StoredResult> {
        self.jobs
            .iter()
            .rev()
            .filter(|job| job.source_url == url)
            .find_map(|job| {
                job.result.as_ref().map(|text| StoredResult {
                    text: text.clone(),
                    title: job.title.clone(),
                })
            })
    }

    pub fn create(&mut self, record: JobRecord) -> Result<(), LedgerError> {
        if self.get(&record.id).is_some() {
            return Err(LedgerError::JobExists { job_id: record.id });
        }
        self.jobs.push(record);
        Ok(())
    }

    pub fn persist(&mut self, job_id: &str, payload: &JobPayload, result: &str) {
        let completed = JobRecord {
            id: job_id.to_string(),
            source_url: payload.source_url.clone(),
            requester_id: payload.requester_id.clone(),
            title: payload.title.clone(),
            status: JobStatus::Completed,
            result: Some(result.to_string()),
        };
        match self.jobs.iter_mut().find(|job| job.id == job_id) {
            Some(existing) => *existing = completed,
            None => self.jobs.push(completed),
        }
    }

    pub fn get(&self, job_id: &str) -> Option<&JobRecord> {
        self.jobs.iter().find(|job| job.id == job_id)
    }
}
