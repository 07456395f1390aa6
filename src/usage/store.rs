//! [`UsageStore`] implementations.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::{Mutex, RwLock};
use tracing::warn;

use super::{UsageRecord, UsageStore};
use crate::{Result, SluiceError};

fn matches(record: &UsageRecord, user_id: Option<&str>, since: DateTime<Utc>) -> bool {
    record.timestamp >= since && user_id.is_none_or(|u| record.user_id == u)
}

/// Process-local store. Records are lost on restart.
#[derive(Default)]
pub struct MemoryUsageStore {
    records: RwLock<Vec<UsageRecord>>,
}

impl MemoryUsageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every stored record, oldest first.
    pub async fn records(&self) -> Vec<UsageRecord> {
        self.records.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl UsageStore for MemoryUsageStore {
    async fn append(&self, record: &UsageRecord) -> Result<()> {
        self.records.write().await.push(record.clone());
        Ok(())
    }

    async fn records_since(
        &self,
        user_id: Option<&str>,
        since: DateTime<Utc>,
    ) -> Result<Vec<UsageRecord>> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .filter(|r| matches(r, user_id, since))
            .cloned()
            .collect())
    }
}

/// Append-only JSON-lines file, one record per line.
///
/// Writes within one process are serialized; lines that fail to parse on
/// read (e.g. a torn final line after a crash) are skipped with a warning.
/// A torn final line is terminated before the next append so only it is lost.
pub struct JsonlUsageStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlUsageStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl UsageStore for JsonlUsageStore {
    async fn append(&self, record: &UsageRecord) -> Result<()> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| SluiceError::Store(format!("open {:?}: {e}", self.path)))?;
        if file.metadata().await?.len() > 0 {
            let mut last = [0u8; 1];
            file.seek(SeekFrom::End(-1)).await?;
            file.read_exact(&mut last).await?;
            if last[0] != b'\n' {
                line.insert(0, '\n');
            }
        }
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    async fn records_since(
        &self,
        user_id: Option<&str>,
        since: DateTime<Utc>,
    ) -> Result<Vec<UsageRecord>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        for (lineno, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<UsageRecord>(line) {
                Ok(record) if matches(&record, user_id, since) => records.push(record),
                Ok(_) => {}
                Err(e) => warn!(
                    path = ?self.path,
                    line = lineno + 1,
                    error = %e,
                    "skipping malformed usage record"
                ),
            }
        }
        Ok(records)
    }
}
