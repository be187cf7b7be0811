use crate::error::{Result, VectorStoreError};
use crate::record::VectorRecord;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Write side of the downstream index.
///
/// `upsert` must apply a batch all-or-nothing: one file's records become
/// visible together or not at all.
#[async_trait]
pub trait VectorStoreWriter: Send + Sync {
    async fn upsert(&self, collection: &str, records: Vec<VectorRecord>) -> Result<()>;

    /// Soft-delete every record of `source_path`; returns how many changed.
    async fn mark_deleted(&self, collection: &str, source_path: &str) -> Result<u64>;
}

/// Collection name → record id → record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Collections {
    #[serde(default)]
    collections: BTreeMap<String, BTreeMap<String, VectorRecord>>,
}

impl Collections {
    /// Validate the whole batch, then apply it.
    pub fn upsert(&mut self, collection: &str, records: Vec<VectorRecord>) -> Result<usize> {
        let expected = self
            .collections
            .get(collection)
            .and_then(|records| records.values().next())
            .map(|record| record.vector.len())
            .or_else(|| records.first().map(|record| record.vector.len()));

        if let Some(expected) = expected {
            if let Some(bad) = records.iter().find(|r| r.vector.len() != expected) {
                return Err(VectorStoreError::DimensionMismatch {
                    expected,
                    actual: bad.vector.len(),
                });
            }
        }
        if let Some(record) = records.iter().find(|r| r.id.is_empty()) {
            return Err(VectorStoreError::InsertError(format!(
                "record without id (source {:?})",
                record.source_path()
            )));
        }

        let count = records.len();
        let target = self.collections.entry(collection.to_string()).or_default();
        for record in records {
            target.insert(record.id.clone(), record);
        }
        Ok(count)
    }

    pub fn mark_deleted(&mut self, collection: &str, source_path: &str) -> u64 {
        let Some(records) = self.collections.get_mut(collection) else {
            return 0;
        };
        let mut changed = 0;
        for record in records.values_mut() {
            if record.source_path() == Some(source_path) && record.mark_deleted() {
                changed += 1;
            }
        }
        changed
    }

    #[must_use]
    pub fn get(&self, collection: &str, id: &str) -> Option<&VectorRecord> {
        self.collections.get(collection)?.get(id)
    }

    #[must_use]
    pub fn records(&self, collection: &str) -> Vec<VectorRecord> {
        self.collections
            .get(collection)
            .map(|records| records.values().cloned().collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn len(&self, collection: &str) -> usize {
        self.collections.get(collection).map_or(0, BTreeMap::len)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.collections.values().all(BTreeMap::is_empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(id: &str, path: &str, dim: usize) -> VectorRecord {
        VectorRecord::new(
            id,
            vec![0.5; dim],
            json!({ "source_path": path, "is_deleted": false }),
        )
    }

    #[test]
    fn upsert_overwrites_by_id() {
        let mut collections = Collections::default();
        collections
            .upsert("docs", vec![record("a", "/r/a.md", 4)])
            .unwrap();
        collections
            .upsert("docs", vec![record("a", "/r/a.md", 4)])
            .unwrap();
        assert_eq!(collections.len("docs"), 1);
    }

    #[test]
    fn dimension_mismatch_rejects_whole_batch() {
        let mut collections = Collections::default();
        collections
            .upsert("docs", vec![record("a", "/r/a.md", 4)])
            .unwrap();

        let err = collections
            .upsert(
                "docs",
                vec![record("b", "/r/b.md", 4), record("c", "/r/b.md", 3)],
            )
            .unwrap_err();
        assert!(matches!(
            err,
            VectorStoreError::DimensionMismatch {
                expected: 4,
                actual: 3
            }
        ));
        assert!(collections.get("docs", "b").is_none());
    }

    #[test]
    fn mark_deleted_is_idempotent() {
        let mut collections = Collections::default();
        collections
            .upsert(
                "docs",
                vec![record("a0", "/r/a.md", 2), record("a1", "/r/a.md", 2)],
            )
            .unwrap();
        assert_eq!(collections.mark_deleted("docs", "/r/a.md"), 2);
        assert_eq!(collections.mark_deleted("docs", "/r/a.md"), 0);
        assert!(collections.get("docs", "a0").unwrap().is_deleted());
    }
}
