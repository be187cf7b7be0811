use crate::error::{Result, VectorStoreError};
use crate::record::VectorRecord;
use crate::store::{Collections, VectorStoreWriter};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// File-backed store: the whole dataset lives in one JSON document that is
/// rewritten (tmp + rename) after every mutating call.
#[derive(Debug)]
pub struct JsonVectorStore {
    path: PathBuf,
    inner: Mutex<Collections>,
}

impl JsonVectorStore {
    /// Open `path`, loading existing records if the file is present.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let collections = if tokio::fs::try_exists(&path).await? {
            let bytes = tokio::fs::read(&path).await?;
            serde_json::from_slice(&bytes)?
        } else {
            Collections::default()
        };
        log::debug!("Opened vector store at {}", path.display());
        Ok(Self {
            path,
            inner: Mutex::new(collections),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn records(&self, collection: &str) -> Vec<VectorRecord> {
        self.inner.lock().await.records(collection)
    }

    pub async fn len(&self, collection: &str) -> usize {
        self.inner.lock().await.len(collection)
    }

    async fn persist(&self, collections: &Collections) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let bytes = serde_json::to_vec(collections)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl VectorStoreWriter for JsonVectorStore {
    async fn upsert(&self, collection: &str, records: Vec<VectorRecord>) -> Result<()> {
        let mut guard = self.inner.lock().await;
        // Stage on a copy so a failed write leaves memory and disk in agreement.
        let mut staged = guard.clone();
        let count = staged.upsert(collection, records)?;
        self.persist(&staged)
            .await
            .map_err(|e| VectorStoreError::InsertError(format!("persist failed: {e}")))?;
        *guard = staged;
        log::debug!("Upserted {count} records into {collection}");
        Ok(())
    }

    async fn mark_deleted(&self, collection: &str, source_path: &str) -> Result<u64> {
        let mut guard = self.inner.lock().await;
        let mut staged = guard.clone();
        let changed = staged.mark_deleted(collection, source_path);
        if changed == 0 {
            return Ok(0);
        }
        self.persist(&staged)
            .await
            .map_err(|e| VectorStoreError::DeleteError(format!("persist failed: {e}")))?;
        *guard = staged;
        Ok(changed)
    }
}
