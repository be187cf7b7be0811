use crate::collaborators::Enricher;
use crate::error::EnrichError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheFile {
    #[serde(default)]
    entries: BTreeMap<String, String>,
}

/// Result of one cached enrichment call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enrichment {
    pub description: Option<String>,
    pub cached: bool,
}

/// Memoizes descriptions by `(enricher_id, chunk hash)`.
///
/// With a path the cache is loaded on open and rewritten by [`Self::save`];
/// a missing or unreadable cache file just means a cold cache.
pub struct CachedEnricher {
    inner: Arc<dyn Enricher>,
    path: Option<PathBuf>,
    entries: Mutex<BTreeMap<String, String>>,
    dirty: Mutex<bool>,
}

impl CachedEnricher {
    pub fn in_memory(inner: Arc<dyn Enricher>) -> Self {
        Self {
            inner,
            path: None,
            entries: Mutex::new(BTreeMap::new()),
            dirty: Mutex::new(false),
        }
    }

    pub async fn open(inner: Arc<dyn Enricher>, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match tokio::fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice::<CacheFile>(&bytes) {
                Ok(file) => file.entries,
                Err(e) => {
                    log::warn!(
                        "Ignoring corrupt enrichment cache {}: {e}",
                        path.display()
                    );
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                log::warn!("Cannot read enrichment cache {}: {e}", path.display());
                BTreeMap::new()
            }
        };
        log::debug!("Enrichment cache holds {} entries", entries.len());
        Self {
            inner,
            path: Some(path),
            entries: Mutex::new(entries),
            dirty: Mutex::new(false),
        }
    }

    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    /// Describe one chunk, consulting the cache first.
    pub async fn enrich_chunk(
        &self,
        content: &str,
        file_path: &str,
        content_hash: &str,
    ) -> Result<Enrichment, EnrichError> {
        let key = format!("{}:{content_hash}", self.inner.enricher_id());
        if let Some(hit) = self.entries.lock().await.get(&key) {
            return Ok(Enrichment {
                description: Some(hit.clone()),
                cached: true,
            });
        }

        let description = self.inner.enrich(content, file_path, content_hash).await?;
        if let Some(text) = &description {
            self.entries.lock().await.insert(key, text.clone());
            *self.dirty.lock().await = true;
        }
        Ok(Enrichment {
            description,
            cached: false,
        })
    }

    /// Persist new entries (tmp + rename). No-op without a path or changes.
    pub async fn save(&self) -> std::io::Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let mut dirty = self.dirty.lock().await;
        if !*dirty {
            return Ok(());
        }
        let file = CacheFile {
            entries: self.entries.lock().await.clone(),
        };
        let bytes = serde_json::to_vec_pretty(&file)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, path).await?;
        *dirty = false;
        Ok(())
    }
}

#[async_trait]
impl Enricher for CachedEnricher {
    fn enricher_id(&self) -> String {
        self.inner.enricher_id()
    }

    async fn enrich(
        &self,
        content: &str,
        file_path: &str,
        content_hash: &str,
    ) -> Result<Option<String>, EnrichError> {
        Ok(self
            .enrich_chunk(content, file_path, content_hash)
            .await?
            .description)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingEnricher {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Enricher for CountingEnricher {
        fn enricher_id(&self) -> String {
            "counting.v1".to_string()
        }

        async fn enrich(
            &self,
            content: &str,
            _file_path: &str,
            _content_hash: &str,
        ) -> Result<Option<String>, EnrichError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Some(format!("about: {content}")))
        }
    }

    #[tokio::test]
    async fn second_call_is_served_from_cache() {
        let inner = Arc::new(CountingEnricher::default());
        let cached = CachedEnricher::in_memory(inner.clone());

        let first = cached.enrich_chunk("text", "/r/a.md", "h1").await.unwrap();
        let second = cached.enrich_chunk("text", "/r/a.md", "h1").await.unwrap();
        assert!(!first.cached);
        assert!(second.cached);
        assert_eq!(second.description.as_deref(), Some("about: text"));
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cache_persists_across_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("enrichment.json");

        let cached = CachedEnricher::open(Arc::new(CountingEnricher::default()), &path).await;
        cached.enrich_chunk("text", "/r/a.md", "h1").await.unwrap();
        cached.save().await.unwrap();

        let inner = Arc::new(CountingEnricher::default());
        let reopened = CachedEnricher::open(inner.clone(), &path).await;
        assert_eq!(reopened.len().await, 1);
        let hit = reopened.enrich_chunk("text", "/r/a.md", "h1").await.unwrap();
        assert!(hit.cached);
        assert_eq!(inner.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn corrupt_cache_starts_cold() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("enrichment.json");
        std::fs::write(&path, "garbage").unwrap();

        let cached = CachedEnricher::open(Arc::new(CountingEnricher::default()), &path).await;
        assert_eq!(cached.len().await, 0);
        assert!(cached.is_empty().await);
    }
}
