use crate::chunker::Chunker;
use crate::config::ChunkerConfig;
use crate::error::{ChunkerError, Result};
use crate::lines::{LineChunker, LINES_STRATEGY};
use crate::simple::{SimpleChunker, SIMPLE_STRATEGY};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Constructor for a named chunking strategy.
pub type ChunkerFactory = fn(ChunkerConfig) -> Result<Arc<dyn Chunker>>;

/// Explicit strategy-name → constructor map, assembled at startup.
#[derive(Clone)]
pub struct ChunkerRegistry {
    factories: BTreeMap<String, ChunkerFactory>,
}

impl ChunkerRegistry {
    /// Empty registry; use [`ChunkerRegistry::builtin`] for the shipped strategies.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.register(SIMPLE_STRATEGY, |config| {
            Ok(Arc::new(SimpleChunker::from_config(config)?))
        });
        registry.register(LINES_STRATEGY, |config| {
            Ok(Arc::new(LineChunker::from_config(config)?))
        });
        registry
    }

    /// Register (or replace) a strategy.
    pub fn register(&mut self, name: impl Into<String>, factory: ChunkerFactory) {
        self.factories.insert(name.into(), factory);
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    pub fn build(&self, config: &ChunkerConfig) -> Result<Arc<dyn Chunker>> {
        let factory = self
            .factories
            .get(&config.strategy)
            .ok_or_else(|| ChunkerError::unknown_strategy(&config.strategy))?;
        log::debug!("Building chunker {}", config.id());
        factory(config.clone())
    }
}

impl Default for ChunkerRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Routes files to a chunker by extension, falling back to a default.
#[derive(Clone)]
pub struct ChunkingRouter {
    default: Arc<dyn Chunker>,
    by_ext: HashMap<String, Arc<dyn Chunker>>,
}

impl ChunkingRouter {
    pub fn new(default: Arc<dyn Chunker>) -> Self {
        Self {
            default,
            by_ext: HashMap::new(),
        }
    }

    /// Build a router from configs, resolving every strategy through `registry`.
    pub fn from_configs(
        registry: &ChunkerRegistry,
        default: &ChunkerConfig,
        overrides: &BTreeMap<String, ChunkerConfig>,
    ) -> Result<Self> {
        let mut router = Self::new(registry.build(default)?);
        for (ext, config) in overrides {
            router = router.with_chunker(ext, registry.build(config)?);
        }
        Ok(router)
    }

    #[must_use]
    pub fn with_chunker(mut self, ext: &str, chunker: Arc<dyn Chunker>) -> Self {
        self.by_ext.insert(normalize_ext(ext), chunker);
        self
    }

    #[must_use]
    pub fn chunker_for(&self, ext: &str) -> Arc<dyn Chunker> {
        self.by_ext
            .get(&normalize_ext(ext))
            .cloned()
            .unwrap_or_else(|| Arc::clone(&self.default))
    }

    #[must_use]
    pub fn default_chunker(&self) -> Arc<dyn Chunker> {
        Arc::clone(&self.default)
    }

    /// Extensions with a dedicated chunker, sorted.
    #[must_use]
    pub fn extensions(&self) -> Vec<String> {
        let mut exts: Vec<String> = self.by_ext.keys().cloned().collect();
        exts.sort();
        exts
    }
}

impl Default for ChunkingRouter {
    fn default() -> Self {
        Self::new(Arc::new(SimpleChunker::default()))
    }
}

/// Lowercase with a leading dot: `"MD"` → `".md"`.
#[must_use]
pub fn normalize_ext(ext: &str) -> String {
    let ext = ext.trim().to_lowercase();
    if ext.is_empty() || ext.starts_with('.') {
        ext
    } else {
        format!(".{ext}")
    }
}
