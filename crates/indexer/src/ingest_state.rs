use chrono::{DateTime, Utc};
use context_code_chunker::{normalize_ext, ChunkerConfig};
use context_vector_store::EmbeddingConfig;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

pub const INGEST_STATE_SCHEMA_VERSION: u32 = 1;

/// Embedding id used when no embedding config has been recorded yet.
pub const UNKNOWN_EMBEDDING_ID: &str = "unknown:unknown";

/// Chunking entries are chunker configs; their id is `strategy_size_overlap`.
pub type ChunkingConfigEntry = ChunkerConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Active,
    Deleted,
}

/// Last successfully processed version of one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileEntry {
    #[serde(alias = "ext")]
    pub extension: String,
    pub size_bytes: u64,
    pub mtime_epoch: f64,
    pub content_hash: String,
    pub status: FileStatus,
    #[serde(default)]
    pub parser_id: String,
    #[serde(default)]
    pub chunker_id: String,
    #[serde(default)]
    pub embedding_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enricher_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl FileEntry {
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == FileStatus::Active
    }
}

/// Parser identity for one extension; id is `parser.vN`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsingConfigEntry {
    pub parser: String,
    #[serde(default = "default_parser_version")]
    pub version: u32,
}

const fn default_parser_version() -> u32 {
    1
}

impl ParsingConfigEntry {
    pub fn new(parser: impl Into<String>, version: u32) -> Self {
        Self {
            parser: parser.into(),
            version,
        }
    }

    /// Default parser entry for an extension: `.xyz` → `xyz.v1`.
    #[must_use]
    pub fn for_extension(ext: &str) -> Self {
        Self::new(normalize_ext(ext).trim_start_matches('.'), 1)
    }

    #[must_use]
    pub fn id(&self) -> String {
        format!("{}.v{}", self.parser, self.version)
    }
}

/// Persisted root object of the ingest state file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestState {
    #[serde(default)]
    pub schema_version: u32,
    pub project_id: String,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
    /// root → absolute path → entry
    #[serde(default)]
    pub roots: BTreeMap<String, BTreeMap<String, FileEntry>>,
    #[serde(default)]
    pub chunking_by_ext: BTreeMap<String, ChunkingConfigEntry>,
    /// Used for extensions without their own chunking entry.
    #[serde(default)]
    pub default_chunking: ChunkingConfigEntry,
    #[serde(default)]
    pub parsing_by_ext: BTreeMap<String, ParsingConfigEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<EmbeddingConfig>,
}

impl IngestState {
    /// Empty state with default parsing/chunking entries for the common
    /// document types.
    pub fn new(project_id: impl Into<String>) -> Self {
        let mut state = Self {
            schema_version: INGEST_STATE_SCHEMA_VERSION,
            project_id: project_id.into(),
            updated_at: Utc::now(),
            roots: BTreeMap::new(),
            chunking_by_ext: BTreeMap::new(),
            default_chunking: ChunkingConfigEntry::default(),
            parsing_by_ext: BTreeMap::new(),
            embedding: None,
        };
        state.fill_default_configs();
        state
    }

    /// Fresh state with a random project id.
    #[must_use]
    pub fn new_project() -> Self {
        Self::new(uuid::Uuid::new_v4().to_string())
    }

    pub(crate) fn fill_default_configs(&mut self) {
        let default_chunking = self.default_chunking.clone();
        for ext in DEFAULT_CONFIGURED_EXTENSIONS {
            self.parsing_by_ext
                .entry((*ext).to_string())
                .or_insert_with(|| ParsingConfigEntry::for_extension(ext));
            self.chunking_by_ext
                .entry((*ext).to_string())
                .or_insert_with(|| default_chunking.clone());
        }
    }

    #[must_use]
    pub fn root(&self, root: &str) -> Option<&BTreeMap<String, FileEntry>> {
        self.roots.get(root)
    }
}

const DEFAULT_CONFIGURED_EXTENSIONS: &[&str] = &[".md", ".txt", ".rst"];

/// Read-only view of the state used by the differ.
pub trait StateReader {
    /// Paths under `root` whose status is active.
    fn get_active_paths(&self, root: &str) -> BTreeSet<String>;

    /// Entry for `path`, active or deleted.
    fn get_file_entry(&self, root: &str, path: &str) -> Option<&FileEntry>;

    fn get_parser_id(&self, ext: &str) -> String;

    fn get_chunker_id(&self, ext: &str) -> String;

    fn get_embedding_id(&self) -> String;
}

impl StateReader for IngestState {
    fn get_active_paths(&self, root: &str) -> BTreeSet<String> {
        self.roots
            .get(root)
            .map(|files| {
                files
                    .iter()
                    .filter(|(_, entry)| entry.is_active())
                    .map(|(path, _)| path.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn get_file_entry(&self, root: &str, path: &str) -> Option<&FileEntry> {
        self.roots.get(root)?.get(path)
    }

    fn get_parser_id(&self, ext: &str) -> String {
        let ext = normalize_ext(ext);
        self.parsing_by_ext
            .get(&ext)
            .map_or_else(|| ParsingConfigEntry::for_extension(&ext).id(), ParsingConfigEntry::id)
    }

    fn get_chunker_id(&self, ext: &str) -> String {
        self.chunking_by_ext
            .get(&normalize_ext(ext))
            .unwrap_or(&self.default_chunking)
            .id()
    }

    fn get_embedding_id(&self) -> String {
        self.embedding
            .as_ref()
            .map_or_else(|| UNKNOWN_EMBEDDING_ID.to_string(), EmbeddingConfig::id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn entry(hash: &str, status: FileStatus) -> FileEntry {
        FileEntry {
            extension: ".md".to_string(),
            size_bytes: 100,
            mtime_epoch: 1_234_567_890.0,
            content_hash: hash.to_string(),
            status,
            parser_id: "md.v1".to_string(),
            chunker_id: "simple_1000_100".to_string(),
            embedding_id: "hash:fnv-8".to_string(),
            enricher_id: None,
            updated_at: None,
        }
    }

    #[test]
    fn default_state_has_markdown_configs() {
        let state = IngestState::new("test-123");
        assert_eq!(state.schema_version, INGEST_STATE_SCHEMA_VERSION);
        assert_eq!(state.project_id, "test-123");
        assert!(state.roots.is_empty());
        assert!(state.parsing_by_ext.contains_key(".md"));
        assert!(state.chunking_by_ext.contains_key(".md"));
    }

    #[test]
    fn parser_ids_fall_back_to_extension() {
        let state = IngestState::new("test");
        assert_eq!(state.get_parser_id(".md"), "md.v1");
        assert_eq!(state.get_parser_id(".txt"), "txt.v1");
        assert_eq!(state.get_parser_id(".xyz"), "xyz.v1");
        assert_eq!(state.get_parser_id("XYZ"), "xyz.v1");
    }

    #[test]
    fn chunker_ids_fall_back_to_default() {
        let mut state = IngestState::new("test");
        assert_eq!(state.get_chunker_id(".md"), "simple_1000_100");
        assert_eq!(state.get_chunker_id(".unknown"), "simple_1000_100");

        state
            .chunking_by_ext
            .insert(".md".to_string(), ChunkingConfigEntry::new("lines", 40, 5));
        assert_eq!(state.get_chunker_id(".MD"), "lines_40_5");
        assert_eq!(state.get_chunker_id(".unknown"), "simple_1000_100");
    }

    #[test]
    fn embedding_id_defaults_to_unknown() {
        let mut state = IngestState::new("test");
        assert_eq!(state.get_embedding_id(), UNKNOWN_EMBEDDING_ID);

        state.embedding = Some(EmbeddingConfig::create("openai", "text-embedding-3-small"));
        assert_eq!(state.get_embedding_id(), "openai:text-embedding-3-small");
    }

    #[test]
    fn active_paths_exclude_deleted_entries() {
        let mut state = IngestState::new("test");
        let files = state.roots.entry("/root".to_string()).or_default();
        files.insert("/root/a.md".to_string(), entry("sha256:a", FileStatus::Active));
        files.insert("/root/b.md".to_string(), entry("sha256:b", FileStatus::Deleted));

        let active: Vec<String> = state.get_active_paths("/root").into_iter().collect();
        assert_eq!(active, vec!["/root/a.md".to_string()]);
        assert!(state.get_active_paths("/other").is_empty());
        assert_eq!(
            state.get_file_entry("/root", "/root/b.md").map(|e| e.status),
            Some(FileStatus::Deleted)
        );
    }

    #[test]
    fn entry_accepts_short_extension_key() {
        let entry: FileEntry = serde_json::from_str(
            r#"{"ext": ".md", "size_bytes": 1, "mtime_epoch": 2.0,
                "content_hash": "sha256:abc", "status": "deleted"}"#,
        )
        .unwrap();
        assert_eq!(entry.extension, ".md");
        assert!(!entry.is_active());
        assert_eq!(entry.parser_id, "");
    }
}
