use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Identifies how vectors were produced.
///
/// Persisted in the ingest state; its [`EmbeddingConfig::id`] is part of every
/// record id, so changing provider or model yields different downstream keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub provider: String,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimension: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normalize: Option<bool>,
}

impl EmbeddingConfig {
    pub fn create(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            dimension: None,
            normalize: None,
        }
    }

    #[must_use]
    pub const fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = Some(dimension);
        self
    }

    #[must_use]
    pub const fn with_normalize(mut self, normalize: bool) -> Self {
        self.normalize = Some(normalize);
        self
    }

    /// `provider:model`
    #[must_use]
    pub fn id(&self) -> String {
        format!("{}:{}", self.provider, self.model)
    }
}

/// Text → vector backend.
#[async_trait]
pub trait Embedder: Send + Sync {
    fn config(&self) -> EmbeddingConfig;

    fn embedding_id(&self) -> String {
        self.config().id()
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}
