//! JSON-lines checkpoint store, one file per request.

use async_trait::async_trait;
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::warn;
use triage_types::RequestId;

use super::{CheckpointError, CheckpointRecord, CheckpointStore};

/// Writes `<dir>/<request_id>.jsonl`.
#[derive(Debug)]
pub struct FileCheckpointStore {
    dir: PathBuf,
    locks: DashMap<RequestId, Arc<Mutex<()>>>,
}

impl FileCheckpointStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            locks: DashMap::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, request_id: &RequestId) -> PathBuf {
        self.dir.join(format!("{request_id}.jsonl"))
    }

    fn lock_for(&self, request_id: &RequestId) -> Arc<Mutex<()>> {
        Arc::clone(self.locks.entry(*request_id).or_default().value())
    }

    fn io(path: &Path) -> impl FnOnce(std::io::Error) -> CheckpointError + '_ {
        move |source| CheckpointError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Parsed records plus whether a torn final line was dropped.
    async fn read_records(path: &Path) -> Result<(Vec<CheckpointRecord>, bool), CheckpointError> {
        let text = match tokio::fs::read_to_string(path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok((Vec::new(), false)),
            Err(e) => return Err(Self::io(path)(e)),
        };

        let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
        let mut records = Vec::with_capacity(lines.len());
        let mut torn = false;
        for (index, line) in lines.iter().enumerate() {
            match serde_json::from_str::<CheckpointRecord>(line) {
                Ok(record) => records.push(record),
                // A torn final line means the process died mid-write.
                Err(e) if index + 1 == lines.len() && !text.ends_with('\n') => {
                    warn!(path = %path.display(), error = %e, "ignoring torn checkpoint line");
                    torn = true;
                }
                Err(source) => {
                    return Err(CheckpointError::Corrupt {
                        path: path.to_path_buf(),
                        line: index + 1,
                        source,
                    })
                }
            }
        }
        Ok((records, torn))
    }

    fn encode(record: &CheckpointRecord) -> Result<String, CheckpointError> {
        let mut line = serde_json::to_string(record).map_err(CheckpointError::Encode)?;
        line.push('\n');
        Ok(line)
    }
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn append(&self, mut record: CheckpointRecord) -> Result<u64, CheckpointError> {
        let lock = self.lock_for(&record.request_id);
        let _guard = lock.lock().await;

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(Self::io(&self.dir))?;
        let path = self.path_for(&record.request_id);
        let (existing, torn) = Self::read_records(&path).await?;
        if torn {
            let mut text = String::new();
            for record in &existing {
                text.push_str(&Self::encode(record)?);
            }
            tokio::fs::write(&path, text).await.map_err(Self::io(&path))?;
        }
        let sequence = existing.len() as u64;
        record.sequence = sequence;
        let line = Self::encode(&record)?;

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(Self::io(&path))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(Self::io(&path))?;
        file.flush().await.map_err(Self::io(&path))?;
        Ok(sequence)
    }

    async fn load(&self, request_id: &RequestId) -> Result<Vec<CheckpointRecord>, CheckpointError> {
        let lock = self.lock_for(request_id);
        let _guard = lock.lock().await;
        let (records, _) = Self::read_records(&self.path_for(request_id)).await?;
        Ok(records)
    }

    async fn clear(&self, request_id: &RequestId) -> Result<(), CheckpointError> {
        let lock = self.lock_for(request_id);
        let _guard = lock.lock().await;
        let path = self.path_for(request_id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(Self::io(&path)(e)),
        }
        // Only the map and this call hold the lock when nobody is waiting.
        self.locks
            .remove_if(request_id, |_, held| Arc::strong_count(held) <= 2);
        Ok(())
    }
}
