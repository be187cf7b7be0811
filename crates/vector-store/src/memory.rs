use crate::error::Result;
use crate::record::VectorRecord;
use crate::store::{Collections, VectorStoreWriter};
use async_trait::async_trait;
use tokio::sync::RwLock;

/// In-process store; nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryVectorStore {
    inner: RwLock<Collections>,
}

impl MemoryVectorStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn records(&self, collection: &str) -> Vec<VectorRecord> {
        self.inner.read().await.records(collection)
    }

    pub async fn get(&self, collection: &str, id: &str) -> Option<VectorRecord> {
        self.inner.read().await.get(collection, id).cloned()
    }

    pub async fn len(&self, collection: &str) -> usize {
        self.inner.read().await.len(collection)
    }
}

#[async_trait]
impl VectorStoreWriter for MemoryVectorStore {
    async fn upsert(&self, collection: &str, records: Vec<VectorRecord>) -> Result<()> {
        let count = self.inner.write().await.upsert(collection, records)?;
        log::debug!("Upserted {count} records into {collection}");
        Ok(())
    }

    async fn mark_deleted(&self, collection: &str, source_path: &str) -> Result<u64> {
        Ok(self
            .inner
            .write()
            .await
            .mark_deleted(collection, source_path))
    }
}
