use crate::error::StateError;
use crate::ingest_state::{
    ChunkingConfigEntry, FileEntry, FileStatus, IngestState, ParsingConfigEntry, StateReader,
    INGEST_STATE_SCHEMA_VERSION,
};
use chrono::{DateTime, Utc};
use context_code_chunker::normalize_ext;
use context_vector_store::EmbeddingConfig;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

const STATE_DIR_NAME: &str = ".context-ingest";
const STATE_FILE_NAME: &str = "ingest.json";

type StateResult<T> = std::result::Result<T, StateError>;

/// `<project>/.context-ingest/ingest.json`
#[must_use]
pub fn default_state_path(project_root: &Path) -> PathBuf {
    project_root.join(STATE_DIR_NAME).join(STATE_FILE_NAME)
}

/// Active/deleted counts for one root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RootStats {
    pub root: String,
    pub active: usize,
    pub deleted: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct StateStats {
    pub project_id: String,
    pub schema_version: u32,
    pub updated_at: DateTime<Utc>,
    pub embedding_id: String,
    pub roots: Vec<RootStats>,
}

impl StateStats {
    #[must_use]
    pub fn total_active(&self) -> usize {
        self.roots.iter().map(|r| r.active).sum()
    }
}

/// Owns the in-memory ingest state and its file.
///
/// Mutations only touch memory; nothing reaches disk until [`Self::save`],
/// which replaces the file atomically.
#[derive(Debug)]
pub struct IngestStateManager {
    path: PathBuf,
    state: IngestState,
}

impl IngestStateManager {
    /// Load the state at `path`. A missing file yields a fresh state with a new
    /// project id; a corrupt or too-new file is an error.
    pub async fn load(path: impl Into<PathBuf>) -> StateResult<Self> {
        let path = path.into();
        let exists = tokio::fs::try_exists(&path)
            .await
            .map_err(|source| io_error(&path, source))?;
        if !exists {
            let state = IngestState::new_project();
            log::info!(
                "No ingest state at {}, starting project {}",
                path.display(),
                state.project_id
            );
            return Ok(Self { path, state });
        }

        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|source| io_error(&path, source))?;
        let state = decode_state(&path, &bytes)?;
        log::debug!(
            "Loaded ingest state {} (project {})",
            path.display(),
            state.project_id
        );
        Ok(Self { path, state })
    }

    /// Wrap an existing state; nothing is read from disk.
    pub fn with_state(path: impl Into<PathBuf>, state: IngestState) -> Self {
        Self {
            path: path.into(),
            state,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub const fn state(&self) -> &IngestState {
        &self.state
    }

    /// Write temp file, fsync, rename over the previous file.
    pub async fn save(&mut self) -> StateResult<()> {
        self.state.updated_at = Utc::now();
        let bytes = serde_json::to_vec_pretty(&self.state).map_err(|source| StateError::Json {
            path: self.path.clone(),
            source,
        })?;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| io_error(parent, source))?;
        }

        let tmp = self.path.with_extension("json.tmp");
        let write = async {
            let mut file = tokio::fs::File::create(&tmp).await?;
            file.write_all(&bytes).await?;
            file.sync_all().await?;
            drop(file);
            tokio::fs::rename(&tmp, &self.path).await
        };
        if let Err(source) = write.await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(io_error(&self.path, source));
        }
        log::debug!("Saved ingest state to {}", self.path.display());
        Ok(())
    }

    /// Record a successful ingest (or a confirmed skip) of `path`.
    pub fn mark_active(&mut self, root: &str, path: &str, mut entry: FileEntry) {
        entry.status = FileStatus::Active;
        entry.updated_at = Some(Utc::now());
        self.state
            .roots
            .entry(root.to_string())
            .or_default()
            .insert(path.to_string(), entry);
    }

    /// Flip `path` to deleted. Returns `false` when there was nothing to flip.
    pub fn mark_deleted(&mut self, root: &str, path: &str) -> bool {
        let Some(entry) = self
            .state
            .roots
            .get_mut(root)
            .and_then(|files| files.get_mut(path))
        else {
            return false;
        };
        if entry.status == FileStatus::Deleted {
            return false;
        }
        entry.status = FileStatus::Deleted;
        entry.updated_at = Some(Utc::now());
        true
    }

    pub fn set_embedding_config(&mut self, config: EmbeddingConfig) {
        self.state.embedding = Some(config);
    }

    pub fn set_chunking_config(&mut self, ext: &str, config: ChunkingConfigEntry) {
        self.state.chunking_by_ext.insert(normalize_ext(ext), config);
    }

    pub fn set_default_chunking_config(&mut self, config: ChunkingConfigEntry) {
        self.state.default_chunking = config;
    }

    pub fn set_parsing_config(&mut self, ext: &str, config: ParsingConfigEntry) {
        self.state.parsing_by_ext.insert(normalize_ext(ext), config);
    }

    #[must_use]
    pub fn stats(&self) -> StateStats {
        let roots = self
            .state
            .roots
            .iter()
            .map(|(root, files)| {
                let active = files.values().filter(|e| e.is_active()).count();
                RootStats {
                    root: root.clone(),
                    active,
                    deleted: files.len() - active,
                }
            })
            .collect();
        StateStats {
            project_id: self.state.project_id.clone(),
            schema_version: self.state.schema_version,
            updated_at: self.state.updated_at,
            embedding_id: self.state.get_embedding_id(),
            roots,
        }
    }
}

impl StateReader for IngestStateManager {
    fn get_active_paths(&self, root: &str) -> std::collections::BTreeSet<String> {
        self.state.get_active_paths(root)
    }

    fn get_file_entry(&self, root: &str, path: &str) -> Option<&FileEntry> {
        self.state.get_file_entry(root, path)
    }

    fn get_parser_id(&self, ext: &str) -> String {
        self.state.get_parser_id(ext)
    }

    fn get_chunker_id(&self, ext: &str) -> String {
        self.state.get_chunker_id(ext)
    }

    fn get_embedding_id(&self) -> String {
        self.state.get_embedding_id()
    }
}

fn decode_state(path: &Path, bytes: &[u8]) -> StateResult<IngestState> {
    let json_error = |source| StateError::Json {
        path: path.to_path_buf(),
        source,
    };
    let value: serde_json::Value = serde_json::from_slice(bytes).map_err(json_error)?;

    // Files written before versioning carry no schema_version at all.
    let found = value
        .get("schema_version")
        .and_then(serde_json::Value::as_u64)
        .unwrap_or(0);
    let found = u32::try_from(found).unwrap_or(u32::MAX);
    if found > INGEST_STATE_SCHEMA_VERSION {
        return Err(StateError::UnsupportedSchema {
            path: path.to_path_buf(),
            found,
            supported: INGEST_STATE_SCHEMA_VERSION,
        });
    }

    let mut state: IngestState = serde_json::from_value(value).map_err(json_error)?;
    if found < INGEST_STATE_SCHEMA_VERSION {
        log::info!(
            "Migrating ingest state {} from schema {found} to {INGEST_STATE_SCHEMA_VERSION}",
            path.display()
        );
        migrate(&mut state);
    }
    Ok(state)
}

/// Unversioned files predate per-extension defaults.
fn migrate(state: &mut IngestState) {
    state.fill_default_configs();
    state.schema_version = INGEST_STATE_SCHEMA_VERSION;
}

fn io_error(path: &Path, source: std::io::Error) -> StateError {
    StateError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn entry(hash: &str) -> FileEntry {
        FileEntry {
            extension: ".md".to_string(),
            size_bytes: 1234,
            mtime_epoch: 1_234_567_890.0,
            content_hash: hash.to_string(),
            status: FileStatus::Deleted,
            parser_id: "md.v1".to_string(),
            chunker_id: "simple_1000_100".to_string(),
            embedding_id: "unknown:unknown".to_string(),
            enricher_id: None,
            updated_at: None,
        }
    }

    #[tokio::test]
    async fn missing_file_creates_fresh_state() {
        let dir = TempDir::new().unwrap();
        let manager = IngestStateManager::load(dir.path().join("ingest.json"))
            .await
            .unwrap();
        assert_eq!(manager.state().schema_version, INGEST_STATE_SCHEMA_VERSION);
        assert!(uuid::Uuid::parse_str(&manager.state().project_id).is_ok());
    }

    #[tokio::test]
    async fn loads_existing_state() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ingest.json");
        std::fs::write(
            &path,
            r#"{"schema_version": 1, "project_id": "existing-project",
                "updated_at": "2024-01-01T00:00:00Z", "roots": {},
                "chunking_by_ext": {}, "parsing_by_ext": {}}"#,
        )
        .unwrap();

        let manager = IngestStateManager::load(&path).await.unwrap();
        assert_eq!(manager.state().project_id, "existing-project");
    }

    #[tokio::test]
    async fn mark_active_then_deleted() {
        let dir = TempDir::new().unwrap();
        let mut manager = IngestStateManager::load(dir.path().join("ingest.json"))
            .await
            .unwrap();

        manager.mark_active("/root", "/root/test.md", entry("sha256:abc123"));
        let active = manager.get_file_entry("/root", "/root/test.md").unwrap();
        assert_eq!(active.status, FileStatus::Active);
        assert_eq!(active.content_hash, "sha256:abc123");
        assert!(active.updated_at.is_some());

        assert!(manager.mark_deleted("/root", "/root/test.md"));
        assert!(!manager.mark_deleted("/root", "/root/test.md"));
        assert!(!manager.mark_deleted("/root", "/root/never-seen.md"));
        assert_eq!(
            manager.get_file_entry("/root", "/root/test.md").unwrap().status,
            FileStatus::Deleted
        );
    }

    #[tokio::test]
    async fn save_and_reload_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("ingest.json");
        let mut manager = IngestStateManager::load(&path).await.unwrap();
        manager.mark_active("/root", "/root/a.md", entry("sha256:a"));
        manager.mark_active("/root", "/root/b.md", entry("sha256:b"));
        manager.mark_deleted("/root", "/root/b.md");
        manager.set_embedding_config(EmbeddingConfig::create("openai", "text-embedding-3-small"));
        manager.save().await.unwrap();
        assert!(!path.with_extension("json.tmp").exists());

        let reloaded = IngestStateManager::load(&path).await.unwrap();
        assert_eq!(reloaded.state().project_id, manager.state().project_id);
        assert_eq!(
            reloaded.get_active_paths("/root").into_iter().collect::<Vec<_>>(),
            vec!["/root/a.md".to_string()]
        );
        assert_eq!(reloaded.get_embedding_id(), "openai:text-embedding-3-small");
    }

    #[tokio::test]
    async fn corrupt_state_is_fatal() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ingest.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = IngestStateManager::load(&path).await.unwrap_err();
        assert!(matches!(err, StateError::Json { .. }));
    }

    #[tokio::test]
    async fn newer_schema_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ingest.json");
        std::fs::write(&path, r#"{"schema_version": 99, "project_id": "p"}"#).unwrap();

        let err = IngestStateManager::load(&path).await.unwrap_err();
        assert!(matches!(
            err,
            StateError::UnsupportedSchema { found: 99, .. }
        ));
    }

    #[tokio::test]
    async fn unversioned_state_is_migrated() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ingest.json");
        std::fs::write(
            &path,
            r#"{"project_id": "legacy", "roots": {"/root": {"/root/a.md": {
                "ext": ".md", "size_bytes": 3, "mtime_epoch": 1.0,
                "content_hash": "sha256:a", "status": "active"}}}}"#,
        )
        .unwrap();

        let manager = IngestStateManager::load(&path).await.unwrap();
        assert_eq!(manager.state().schema_version, INGEST_STATE_SCHEMA_VERSION);
        assert!(manager.state().parsing_by_ext.contains_key(".md"));
        assert_eq!(manager.get_active_paths("/root").len(), 1);
    }

    #[tokio::test]
    async fn stats_count_per_root() {
        let dir = TempDir::new().unwrap();
        let mut manager = IngestStateManager::load(dir.path().join("ingest.json"))
            .await
            .unwrap();
        manager.mark_active("/a", "/a/1.md", entry("sha256:1"));
        manager.mark_active("/a", "/a/2.md", entry("sha256:2"));
        manager.mark_active("/b", "/b/3.md", entry("sha256:3"));
        manager.mark_deleted("/a", "/a/2.md");

        let stats = manager.stats();
        assert_eq!(
            stats.roots,
            vec![
                RootStats {
                    root: "/a".to_string(),
                    active: 1,
                    deleted: 1
                },
                RootStats {
                    root: "/b".to_string(),
                    active: 1,
                    deleted: 0
                },
            ]
        );
        assert_eq!(stats.total_active(), 2);
    }
}
