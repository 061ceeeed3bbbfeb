//! Durable optimization progress.
//!
//! The counter lives in the store, not in process memory, so any instance can
//! answer a status poll and any instance can serve the next chunk. It is
//! written as JSON:
//!
//! ```json
//! {"runId":"…","processed":42,"total":120,"running":true,"updatedAt":"…"}
//! ```
//!
//! The compact `"42/120"` text form is also accepted on read; such a record
//! has no run id and reads as not running unless `processed < total`.
//!
//! Writes go through one async mutex per [`ProgressStore`] and never lower
//! `processed` within a run. Writers in other processes are not excluded: two
//! concurrent runs can still overwrite each other's record.

use crate::storage::{StorageError, StorageHandle, content_type};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::warn;
use uuid::Uuid;

/// The persisted counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRecord {
    #[serde(default)]
    pub run_id: Option<Uuid>,
    pub processed: usize,
    pub total: usize,
    #[serde(default)]
    pub running: bool,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ProgressRecord {
    /// `0 <= processed <= total` and not running.
    pub fn is_complete(&self) -> bool {
        !self.running && self.processed >= self.total
    }
}

/// Parse either record form. `None` for anything else.
pub fn parse_progress(text: &str) -> Option<ProgressRecord> {
    let text = text.trim();
    if text.starts_with('{') {
        let mut record: ProgressRecord = serde_json::from_str(text).ok()?;
        record.processed = record.processed.min(record.total);
        return Some(record);
    }
    let (processed, total) = text.split_once('/')?;
    let processed: usize = processed.trim().parse().ok()?;
    let total: usize = total.trim().parse().ok()?;
    Some(ProgressRecord {
        run_id: None,
        processed: processed.min(total),
        total,
        running: processed < total,
        updated_at: None,
    })
}

/// Read/write access to the persisted counter.
pub struct ProgressStore {
    storage: StorageHandle,
    key: String,
    write_lock: Mutex<()>,
}

impl ProgressStore {
    pub fn new(storage: StorageHandle, key: impl Into<String>) -> Self {
        Self {
            storage,
            key: key.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// The current record. An unreadable record is logged and treated as
    /// absent.
    pub async fn load(&self) -> Result<Option<ProgressRecord>, StorageError> {
        let text = match self.storage.get_text(&self.key).await {
            Ok(Some(text)) => text,
            Ok(None) => return Ok(None),
            Err(StorageError::NotUtf8(_)) => {
                warn!(key = %self.key, "progress record is not text, ignoring it");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };
        let record = parse_progress(&text);
        if record.is_none() {
            warn!(key = %self.key, "progress record unreadable, ignoring it");
        }
        Ok(record)
    }

    /// Reset the counter for a fresh run.
    pub async fn start(&self, run_id: Uuid, total: usize) -> Result<ProgressRecord, StorageError> {
        let _guard = self.write_lock.lock().await;
        let record = ProgressRecord {
            run_id: Some(run_id),
            processed: 0,
            total,
            running: true,
            updated_at: Some(Utc::now()),
        };
        self.save(&record).await?;
        Ok(record)
    }

    /// Raise `processed` to at least `processed_so_far` for `run_id`.
    ///
    /// Never decreases the persisted value and clamps to `total`. Does
    /// nothing if another run owns the record.
    pub async fn advance(
        &self,
        run_id: Uuid,
        processed_so_far: usize,
        total: usize,
    ) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;
        let current = self.load().await?;
        let persisted = match &current {
            Some(record) if record.run_id == Some(run_id) => record.processed,
            Some(record) => {
                warn!(
                    key = %self.key,
                    ours = %run_id,
                    theirs = ?record.run_id,
                    "progress record owned by another run, not advancing"
                );
                return Ok(());
            }
            None => 0,
        };
        let record = ProgressRecord {
            run_id: Some(run_id),
            processed: persisted.max(processed_so_far).min(total),
            total,
            running: true,
            updated_at: Some(Utc::now()),
        };
        self.save(&record).await
    }

    /// Mark the run complete with `processed = total`.
    pub async fn finish(&self, run_id: Uuid, total: usize) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;
        let record = ProgressRecord {
            run_id: Some(run_id),
            processed: total,
            total,
            running: false,
            updated_at: Some(Utc::now()),
        };
        self.save(&record).await
    }

    async fn save(&self, record: &ProgressRecord) -> Result<(), StorageError> {
        let bytes = serde_json::to_vec(record)
            .map_err(|e| StorageError::Backend(format!("progress record: {e}")))?;
        self.storage
            .put(&self.key, &bytes, content_type::JSON)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStorage, Storage};
    use std::sync::Arc;

    fn store() -> (Arc<MemoryStorage>, ProgressStore) {
        let storage = Arc::new(MemoryStorage::new());
        let progress = ProgressStore::new(storage.clone(), "_cache/progress.json");
        (storage, progress)
    }

    #[test]
    fn parses_json_and_compact_forms() {
        let json = parse_progress(r#"{"processed":3,"total":10,"running":true}"#).unwrap();
        assert_eq!(json.processed, 3);
        assert!(json.running);
        assert_eq!(json.run_id, None);

        let compact = parse_progress(" 4/10\n").unwrap();
        assert_eq!((compact.processed, compact.total), (4, 10));
        assert!(compact.running);

        let done = parse_progress("10/10").unwrap();
        assert!(done.is_complete());
    }

    #[test]
    fn parse_clamps_and_rejects_garbage() {
        assert_eq!(parse_progress("12/10").unwrap().processed, 10);
        assert!(parse_progress("banana").is_none());
        assert!(parse_progress("1/x").is_none());
        assert!(parse_progress("{broken").is_none());
    }

    #[tokio::test]
    async fn missing_record_loads_as_none() {
        let (_storage, progress) = store();
        assert_eq!(progress.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn start_advance_finish_lifecycle() {
        let (_storage, progress) = store();
        let run = Uuid::new_v4();
        progress.start(run, 10).await.unwrap();
        progress.advance(run, 4, 10).await.unwrap();
        let record = progress.load().await.unwrap().unwrap();
        assert_eq!(record.processed, 4);
        assert!(record.running);
        assert!(!record.is_complete());

        progress.finish(run, 10).await.unwrap();
        let record = progress.load().await.unwrap().unwrap();
        assert_eq!(record.processed, 10);
        assert!(record.is_complete());
    }

    #[tokio::test]
    async fn advance_never_decreases_and_clamps() {
        let (_storage, progress) = store();
        let run = Uuid::new_v4();
        progress.start(run, 5).await.unwrap();
        progress.advance(run, 3, 5).await.unwrap();
        progress.advance(run, 2, 5).await.unwrap();
        assert_eq!(progress.load().await.unwrap().unwrap().processed, 3);
        progress.advance(run, 9, 5).await.unwrap();
        assert_eq!(progress.load().await.unwrap().unwrap().processed, 5);
    }

    #[tokio::test]
    async fn advance_leaves_foreign_run_alone() {
        let (_storage, progress) = store();
        let owner = Uuid::new_v4();
        progress.start(owner, 10).await.unwrap();
        progress.advance(Uuid::new_v4(), 7, 10).await.unwrap();
        let record = progress.load().await.unwrap().unwrap();
        assert_eq!(record.run_id, Some(owner));
        assert_eq!(record.processed, 0);
    }

    #[tokio::test]
    async fn unreadable_record_is_ignored() {
        let (storage, progress) = store();
        storage
            .put(progress.key(), b"not a counter", content_type::TEXT)
            .await
            .unwrap();
        assert_eq!(progress.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn concurrent_advances_end_at_the_maximum() {
        let (_storage, progress) = store();
        let progress = Arc::new(progress);
        let run = Uuid::new_v4();
        progress.start(run, 50).await.unwrap();

        let tasks: Vec<_> = (1..=50)
            .map(|n| {
                let progress = Arc::clone(&progress);
                tokio::spawn(async move { progress.advance(run, n, 50).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }
        assert_eq!(progress.load().await.unwrap().unwrap().processed, 50);
    }
}
