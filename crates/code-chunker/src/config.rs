use crate::error::{ChunkerError, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_STRATEGY: &str = "simple";
pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_OVERLAP: usize = 100;

/// Named chunking strategy plus its window parameters.
///
/// The identifier (`strategy_size_overlap`) is what the ingest state records,
/// so two configs with the same id must produce the same chunks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkerConfig {
    #[serde(default = "default_strategy")]
    pub strategy: String,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_overlap")]
    pub overlap: usize,
}

fn default_strategy() -> String {
    DEFAULT_STRATEGY.to_string()
}

const fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

const fn default_overlap() -> usize {
    DEFAULT_OVERLAP
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            strategy: default_strategy(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_OVERLAP,
        }
    }
}

impl ChunkerConfig {
    pub fn new(strategy: impl Into<String>, chunk_size: usize, overlap: usize) -> Self {
        Self {
            strategy: strategy.into(),
            chunk_size,
            overlap,
        }
    }

    #[must_use]
    pub fn id(&self) -> String {
        format!("{}_{}_{}", self.strategy, self.chunk_size, self.overlap)
    }

    pub fn validate(&self) -> Result<()> {
        if self.strategy.trim().is_empty() {
            return Err(ChunkerError::invalid_config("strategy must not be empty"));
        }
        if self.chunk_size < 1 {
            return Err(ChunkerError::invalid_config(format!(
                "chunk_size must be >= 1, got {}",
                self.chunk_size
            )));
        }
        if self.overlap >= self.chunk_size {
            return Err(ChunkerError::invalid_config(format!(
                "overlap ({}) must be < chunk_size ({})",
                self.overlap, self.chunk_size
            )));
        }
        Ok(())
    }

    /// Distance between the starts of two consecutive windows.
    #[must_use]
    pub const fn step(&self) -> usize {
        let step = self.chunk_size.saturating_sub(self.overlap);
        if step == 0 {
            1
        } else {
            step
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_joins_strategy_and_window() {
        assert_eq!(ChunkerConfig::new("tokens", 800, 120).id(), "tokens_800_120");
        assert_eq!(ChunkerConfig::default().id(), "simple_1000_100");
    }

    #[test]
    fn validate_rejects_degenerate_windows() {
        assert!(ChunkerConfig::new("simple", 0, 0).validate().is_err());
        assert!(ChunkerConfig::new("simple", 10, 10).validate().is_err());
        assert!(ChunkerConfig::new(" ", 10, 1).validate().is_err());
        assert!(ChunkerConfig::new("simple", 10, 9).validate().is_ok());
    }

    #[test]
    fn step_is_size_minus_overlap() {
        assert_eq!(ChunkerConfig::new("simple", 10, 3).step(), 7);
    }
}
