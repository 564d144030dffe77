use std::{
    fs::{File, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use fs4::fs_std::FileExt;
use tempfile::NamedTempFile;
use tokio::sync::Mutex;
use tracing::debug;

use crate::{
    error::LedgerError,
    ledger::{CoinAccount, JobLedger, SpendRecord},
    store::LedgerState,
    types::{JobPayload, JobRecord, StoredResult},
};

/// Ledger and accounts kept in one JSON document.
///
/// Every operation reloads the document, applies the change and rewrites it
/// through a uniquely named temp file and rename. An advisory lock on a
/// sibling `.lock` file is held for the whole load-modify-save, so separate
/// processes sharing the document see each other's writes.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Held for the duration of one ledger operation; released on drop.
struct DocumentLock {
    _file: File,
}

impl DocumentLock {
    fn acquire(path: &Path, exclusive: bool) -> Result<Self, LedgerError> {
        std::fs::create_dir_all(parent_dir(path))?;
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path.with_extension("json.lock"))?;
        if exclusive {
            FileExt::lock_exclusive(&file)?;
        } else {
            FileExt::lock_shared(&file)?;
        }
        Ok(Self { _file: file })
    }
}

fn load(path: &Path) -> Result<LedgerState, LedgerError> {
    match std::fs::read_to_string(path) {
        Ok(raw) if raw.trim().is_empty() => Ok(LedgerState::default()),
        Ok(raw) => Ok(serde_json::from_str(&raw)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(LedgerState::default()),
        Err(e) => Err(e.into()),
    }
}

fn save(path: &Path, state: &LedgerState) -> Result<(), LedgerError> {
    let json = serde_json::to_string_pretty(state)?;
    let mut tmp = NamedTempFile::new_in(parent_dir(path))?;
    tmp.write_all(json.as_bytes())?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    debug!(path = %path.display(), "ledger saved");
    Ok(())
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T, LedgerError>
    where
        F: FnOnce(&Path) -> Result<T, LedgerError> + Send + 'static,
        T: Send + 'static,
    {
        let _guard = self.lock.lock().await;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || f(&path))
            .await
            .map_err(|e| LedgerError::Storage {
                message: format!("ledger task panicked: {e}"),
            })?
    }

    async fn read<T, F>(&self, f: F) -> Result<T, LedgerError>
    where
        F: FnOnce(&LedgerState) -> T + Send + 'static,
        T: Send + 'static,
    {
        self.blocking(move |path| {
            let _lock = DocumentLock::acquire(path, false)?;
            Ok(f(&load(path)?))
        })
        .await
    }

    async fn update<T, F>(&self, f: F) -> Result<T, LedgerError>
    where
        F: FnOnce(&mut LedgerState) -> Result<T, LedgerError> + Send + 'static,
        T: Send + 'static,
    {
        self.blocking(move |path| {
            let _lock = DocumentLock::acquire(path, true)?;
            let mut state = load(path)?;
            let out = f(&mut state)?;
            save(path, &state)?;
            Ok(out)
        })
        .await
    }
}

#[async_trait]
impl CoinAccount for FileStore {
    async fn balance(&self, requester_id: &str) -> Result<i64, LedgerError> {
        let requester_id = requester_id.to_string();
        self.read(move |state| state.balance(&requester_id)).await
    }

    async fn debit(&self, requester_id: &str, amount: i64) -> Result<i64, LedgerError> {
        let requester_id = requester_id.to_string();
        self.update(move |state| state.debit(&requester_id, amount))
            .await
    }

    async fn credit(&self, requester_id: &str, amount: i64) -> Result<i64, LedgerError> {
        let requester_id = requester_id.to_string();
        self.update(move |state| Ok(state.credit(&requester_id, amount)))
            .await
    }

    async fn record_spend(&self, spend: SpendRecord) -> Result<(), LedgerError> {
        self.update(move |state| {
            state.record_spend(spend);
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl JobLedger for FileStore {
    async fn find_by_url(&self, url: &str) -> Result<Option<StoredResult>, LedgerError> {
        let url = url.to_string();
        self.read(move |state| state.find_by_url(&url)).await
    }

    async fn create(&self, record: JobRecord) -> Result<(), LedgerError> {
        self.update(move |state| state.create(record)).await
    }

    async fn persist(
        &self,
        job_id: &str,
        payload: &JobPayload,
        result: &str,
    ) -> Result<(), LedgerError> {
        let (job_id, payload, result) = (job_id.to_string(), payload.clone(), result.to_string());
        self.update(move |state| {
            state.persist(&job_id, &payload, &result);
            Ok(())
        })
        .await
    }

    async fn get(&self, job_id: &str) -> Result<Option<JobRecord>, LedgerError> {
        let job_id = job_id.to_string();
        self.read(move |state| state.get(&job_id).cloned()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::JobStatus;

    #[tokio::test]
    async fn state_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("ledger.json");

        let store = FileStore::new(&path);
        store.credit("alice", 30).await.unwrap();
        store.debit("alice", 10).await.unwrap();
        store
            .persist(
                "job-1",
                &JobPayload {
                    source_url: "https://youtu.be/dQw4w9WgXcQ".into(),
                    requester_id: "alice".into(),
                    title: "Title".into(),
                },
                "summary",
            )
            .await
            .unwrap();

        let reopened = FileStore::new(&path);
        assert_eq!(reopened.balance("alice").await.unwrap(), 20);
        let job = reopened.get("job-1").await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.result.as_deref(), Some("summary"));
        let leftovers: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().into_string().unwrap())
            .filter(|name| name != "ledger.json" && name != "ledger.json.lock")
            .collect();
        assert!(leftovers.is_empty(), "stray files: {leftovers:?}");
    }

    #[tokio::test]
    async fn failed_debit_leaves_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("ledger.json"));
        store.credit("bob", 5).await.unwrap();

        let err = store.debit("bob", 10).await.unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientFunds { .. }));
        assert_eq!(store.balance("bob").await.unwrap(), 5);
    }

    #[tokio::test]
    async fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        std::fs::write(&path, "{not json").unwrap();

        let store = FileStore::new(&path);
        assert!(matches!(
            store.balance("alice").await,
            Err(LedgerError::JsonError(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn separate_stores_on_one_file_do_not_lose_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        let a = FileStore::new(&path);
        let b = FileStore::new(&path);
        a.credit("alice", 1_000).await.unwrap();

        let payload = |title: &str| JobPayload {
            source_url: format!("https://youtu.be/{title}"),
            requester_id: "alice".into(),
            title: title.into(),
        };

        for round in 0..20 {
            let (ida, idb) = (format!("a{round}"), format!("b{round}"));
            let (pa, pb) = (payload(&ida), payload(&idb));
            let (da, db, ja, jb) = tokio::join!(
                a.debit("alice", 10),
                b.debit("alice", 10),
                a.persist(&ida, &pa, "summary a"),
                b.persist(&idb, &pb, "summary b"),
            );
            da.unwrap();
            db.unwrap();
            ja.unwrap();
            jb.unwrap();
        }

        let reopened = FileStore::new(&path);
        assert_eq!(reopened.balance("alice").await.unwrap(), 1_000 - 20 * 20);
        for round in 0..20 {
            for job in [format!("a{round}"), format!("b{round}")] {
                let record = reopened.get(&job).await.unwrap();
                assert!(record.is_some(), "{job} was lost");
            }
        }
    }
}
