use crate::chunk::{Chunk, ChunkMetadata};
use crate::config::ChunkerConfig;
use crate::error::Result;

/// A text splitting strategy.
///
/// Implementations must be deterministic: the same text and config always
/// yield the same chunks in the same order.
pub trait Chunker: Send + Sync {
    fn config(&self) -> &ChunkerConfig;

    /// Stable identifier of this chunker configuration.
    fn chunker_id(&self) -> String {
        self.config().id()
    }

    /// Split `text` into chunks, each carrying a copy of `base`.
    ///
    /// Blank input yields no chunks.
    fn chunk_text(&self, text: &str, base: &ChunkMetadata) -> Result<Vec<Chunk>>;
}
