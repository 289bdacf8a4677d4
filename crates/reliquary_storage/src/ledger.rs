//! Request ledgers.

use reliquary_core::{LedgerRecord, RequestKey};
use reliquary_error::{LedgerError, LedgerErrorKind};
use reliquary_interface::Ledger;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, RwLock};

/// Ledger held in process memory.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    records: RwLock<HashMap<RequestKey, LedgerRecord>>,
    lookups: AtomicUsize,
    fail_writes: AtomicBool,
}

impl MemoryLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `record` call fail (or succeed again).
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of `lookup` calls served.
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    /// Number of recorded keys.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// True when nothing has been recorded.
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait::async_trait]
impl Ledger for MemoryLedger {
    async fn lookup(&self, key: &RequestKey) -> Result<Option<LedgerRecord>, LedgerError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.records.read().await.get(key).cloned())
    }

    async fn record(&self, record: LedgerRecord) -> Result<(), LedgerError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(LedgerError::new(LedgerErrorKind::Write(format!(
                "injected failure for {}",
                record.key
            ))));
        }
        self.records.write().await.insert(record.key.clone(), record);
        Ok(())
    }
}

/// Append-only JSON-lines ledger file.
///
/// Every record is one line; a later line for the same key supersedes an
/// earlier one. The whole file is indexed in memory on open. A trailing line
/// that fails to parse (a torn write) is skipped with a warning, and the next
/// append starts on a fresh line.
#[derive(Debug)]
pub struct JsonFileLedger {
    path: PathBuf,
    index: RwLock<HashMap<RequestKey, LedgerRecord>>,
    /// Held while appending; true when the file does not end in a newline.
    writer: Mutex<bool>,
}

impl JsonFileLedger {
    /// Open (or create) the ledger file at `path`.
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read.
    #[tracing::instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                LedgerError::new(LedgerErrorKind::Write(format!("{}: {}", parent.display(), e)))
            })?;
        }

        let mut index = HashMap::new();
        let mut torn_tail = false;
        match tokio::fs::read_to_string(&path).await {
            Ok(contents) => {
                torn_tail = !contents.is_empty() && !contents.ends_with('\n');
                for (line_no, line) in contents.lines().enumerate() {
                    if line.trim().is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<LedgerRecord>(line) {
                        Ok(record) => {
                            index.insert(record.key.clone(), record);
                        }
                        Err(e) => {
                            tracing::warn!(line = line_no + 1, error = %e, "Skipping unreadable ledger line");
                        }
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(LedgerError::new(LedgerErrorKind::Read(format!(
                    "{}: {}",
                    path.display(),
                    e
                ))));
            }
        }

        tracing::info!(records = index.len(), "Opened ledger");
        Ok(Self {
            path,
            index: RwLock::new(index),
            writer: Mutex::new(torn_tail),
        })
    }

    /// Location of the ledger file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait::async_trait]
impl Ledger for JsonFileLedger {
    async fn lookup(&self, key: &RequestKey) -> Result<Option<LedgerRecord>, LedgerError> {
        Ok(self.index.read().await.get(key).cloned())
    }

    #[tracing::instrument(skip(self, record), fields(key = %record.key, items = record.items.len()))]
    async fn record(&self, record: LedgerRecord) -> Result<(), LedgerError> {
        let encoded = serde_json::to_string(&record)
            .map_err(|e| LedgerError::new(LedgerErrorKind::Corrupt(e.to_string())))?;

        let write_error =
            |e: std::io::Error| LedgerError::new(LedgerErrorKind::Write(format!("{}: {}", self.path.display(), e)));

        // One appender at a time keeps lines whole.
        let mut torn_tail = self.writer.lock().await;
        let mut line = String::with_capacity(encoded.len() + 2);
        if *torn_tail {
            tracing::warn!("Ledger ends mid-line, starting a fresh line");
            line.push('\n');
        }
        line.push_str(&encoded);
        line.push('\n');

        // Until the append is synced the tail is in an unknown state.
        *torn_tail = true;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(write_error)?;
        file.write_all(line.as_bytes()).await.map_err(write_error)?;
        file.sync_data().await.map_err(write_error)?;
        *torn_tail = false;

        self.index.write().await.insert(record.key.clone(), record);
        tracing::debug!("Recorded ledger entry");
        Ok(())
    }
}
