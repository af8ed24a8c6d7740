//! In-memory checkpoint store.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use triage_types::RequestId;

use super::{CheckpointError, CheckpointRecord, CheckpointStore};

type Log = Arc<Mutex<Vec<CheckpointRecord>>>;

/// Keeps every log in process memory.
#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    logs: DashMap<RequestId, Log>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of requests with a log.
    pub fn request_count(&self) -> usize {
        self.logs.len()
    }

    fn log(&self, request_id: &RequestId) -> Log {
        // Clone the Arc out so the shard lock is released before awaiting.
        Arc::clone(self.logs.entry(*request_id).or_default().value())
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn append(&self, mut record: CheckpointRecord) -> Result<u64, CheckpointError> {
        let log = self.log(&record.request_id);
        let mut entries = log.lock().await;
        let sequence = entries.len() as u64;
        record.sequence = sequence;
        entries.push(record);
        Ok(sequence)
    }

    async fn load(&self, request_id: &RequestId) -> Result<Vec<CheckpointRecord>, CheckpointError> {
        let Some(log) = self.logs.get(request_id).map(|l| Arc::clone(l.value())) else {
            return Ok(Vec::new());
        };
        let entries = log.lock().await;
        Ok(entries.clone())
    }

    async fn clear(&self, request_id: &RequestId) -> Result<(), CheckpointError> {
        self.logs.remove(request_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::GraphNode;

    #[tokio::test]
    async fn test_append_load_clear() {
        let store = MemoryCheckpointStore::new();
        let id = RequestId::generate();
        let other = RequestId::generate();

        assert_eq!(store.append(CheckpointRecord::new(id, GraphNode::LoadConfig, None)).await.unwrap(), 0);
        assert_eq!(store.append(CheckpointRecord::new(id, GraphNode::ScoreWeights, None)).await.unwrap(), 1);
        store.append(CheckpointRecord::new(other, GraphNode::LoadConfig, None)).await.unwrap();

        let log = store.load(&id).await.unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[1].node, GraphNode::ScoreWeights);
        assert_eq!(store.request_count(), 2);

        store.clear(&id).await.unwrap();
        assert!(store.load(&id).await.unwrap().is_empty());
        assert_eq!(store.load(&other).await.unwrap().len(), 1);
        assert_eq!(store.request_count(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_appends_get_distinct_sequences() {
        let store = Arc::new(MemoryCheckpointStore::new());
        let id = RequestId::generate();
        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store
                    .append(CheckpointRecord::new(id, GraphNode::BuildQuery, None))
                    .await
                    .unwrap()
            }));
        }
        let mut sequences = Vec::new();
        for handle in handles {
            sequences.push(handle.await.unwrap());
        }
        sequences.sort_unstable();
        assert_eq!(sequences, (0..16).collect::<Vec<u64>>());
    }
}
