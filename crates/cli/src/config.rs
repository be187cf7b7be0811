use anyhow::{Context, Result};
use context_code_chunker::ChunkerConfig;
use context_indexer::{ScanConfig, DEFAULT_COLLECTION, DEFAULT_MAX_CONCURRENCY};
use context_vector_store::DEFAULT_HASH_DIMENSION;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const CONFIG_DIR_NAME: &str = ".context-ingest";
pub const CONFIG_FILE_NAME: &str = "config.toml";
const DEFAULT_STORE_FILE: &str = "vectors.json";

/// `<project>/.context-ingest/config.toml`. Every key is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProjectConfig {
    pub collection: String,
    /// Relative paths resolve against the project root.
    pub state_path: Option<PathBuf>,
    pub store_path: Option<PathBuf>,
    pub max_concurrency: usize,
    pub scan: ScanSection,
    pub chunking: ChunkingSection,
    pub embedding: EmbeddingSection,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            collection: DEFAULT_COLLECTION.to_string(),
            state_path: None,
            store_path: None,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            scan: ScanSection::default(),
            chunking: ChunkingSection::default(),
            embedding: EmbeddingSection::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScanSection {
    /// Empty means the built-in extension list.
    pub extensions: Vec<String>,
    pub include_hidden: bool,
    pub respect_gitignore: bool,
    pub follow_links: bool,
    pub exclude: Vec<String>,
}

impl Default for ScanSection {
    fn default() -> Self {
        let defaults = ScanConfig::default();
        Self {
            extensions: Vec::new(),
            include_hidden: defaults.include_hidden,
            respect_gitignore: defaults.respect_gitignore,
            follow_links: defaults.follow_links,
            exclude: defaults.exclude,
        }
    }
}

impl ScanSection {
    pub fn to_scan_config(&self) -> ScanConfig {
        let config = ScanConfig {
            include_hidden: self.include_hidden,
            respect_gitignore: self.respect_gitignore,
            follow_links: self.follow_links,
            exclude: self.exclude.clone(),
            ..ScanConfig::default()
        };
        if self.extensions.is_empty() {
            config
        } else {
            config.with_extensions(&self.extensions)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChunkingSection {
    pub default: ChunkerConfig,
    /// Extension (`.rs` or `rs`) → chunker config.
    pub by_ext: BTreeMap<String, ChunkerConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EmbeddingSection {
    pub dimension: usize,
}

impl Default for EmbeddingSection {
    fn default() -> Self {
        Self {
            dimension: DEFAULT_HASH_DIMENSION,
        }
    }
}

impl ProjectConfig {
    /// Read `explicit` if given, else the project's default config file if
    /// it exists, else defaults. Returns the path that was read.
    pub fn load(project_root: &Path, explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>)> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let default = default_config_path(project_root);
                if !default.exists() {
                    return Ok((Self::default(), None));
                }
                default
            }
        };
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Self = toml::from_str(&text)
            .with_context(|| format!("Invalid config {}", path.display()))?;
        Ok((config, Some(path)))
    }

    pub fn state_path(&self, project_root: &Path) -> PathBuf {
        match &self.state_path {
            Some(path) => resolve(project_root, path),
            None => context_indexer::default_state_path(project_root),
        }
    }

    pub fn store_path(&self, project_root: &Path) -> PathBuf {
        match &self.store_path {
            Some(path) => resolve(project_root, path),
            None => project_root.join(CONFIG_DIR_NAME).join(DEFAULT_STORE_FILE),
        }
    }
}

pub fn default_config_path(project_root: &Path) -> PathBuf {
    project_root.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME)
}

fn resolve(project_root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        project_root.join(path)
    }
}
