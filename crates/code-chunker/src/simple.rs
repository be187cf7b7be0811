use crate::chunk::{Chunk, ChunkMetadata};
use crate::chunker::Chunker;
use crate::config::ChunkerConfig;
use crate::error::Result;

pub const SIMPLE_STRATEGY: &str = "simple";

/// Fixed-size character windows with overlap.
///
/// Windows are measured in `char`s, so multi-byte text is never split inside
/// a code point. Each window is trimmed; windows that are blank after
/// trimming are dropped without consuming a chunk index.
#[derive(Debug, Clone)]
pub struct SimpleChunker {
    config: ChunkerConfig,
}

impl SimpleChunker {
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        Self::from_config(ChunkerConfig::new(SIMPLE_STRATEGY, chunk_size, overlap))
    }

    pub fn from_config(config: ChunkerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }
}

impl Default for SimpleChunker {
    fn default() -> Self {
        Self {
            config: ChunkerConfig::default(),
        }
    }
}

impl Chunker for SimpleChunker {
    fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    fn chunk_text(&self, text: &str, base: &ChunkMetadata) -> Result<Vec<Chunk>> {
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }

        // Byte offset of every char boundary, plus the end of the string.
        let mut bounds: Vec<usize> = text.char_indices().map(|(idx, _)| idx).collect();
        bounds.push(text.len());
        let char_len = bounds.len() - 1;

        let size = self.config.chunk_size;
        let step = self.config.step();

        let mut chunks = Vec::new();
        let mut pos = 0;
        while pos < char_len {
            let end = (pos + size).min(char_len);
            let piece = text[bounds[pos]..bounds[end]].trim();
            if !piece.is_empty() {
                chunks.push(Chunk::new(chunks.len(), piece, base));
            }
            if end == char_len {
                break;
            }
            pos += step;
        }

        Ok(chunks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn meta() -> ChunkMetadata {
        ChunkMetadata::new("/docs/a.md", "a")
    }

    #[test]
    fn splits_into_overlapping_windows() {
        let chunker = SimpleChunker::new(4, 2).unwrap();
        let chunks = chunker.chunk_text("abcdefgh", &meta()).unwrap();
        let contents: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(contents, vec!["abcd", "cdef", "efgh"]);
        assert_eq!(chunks[2].id, "a:2");
        assert_eq!(chunks[2].chunk_index, 2);
    }

    #[test]
    fn blank_text_has_no_chunks() {
        let chunker = SimpleChunker::new(10, 0).unwrap();
        assert!(chunker.chunk_text("  \n\t ", &meta()).unwrap().is_empty());
    }

    #[test]
    fn multibyte_text_is_split_on_char_boundaries() {
        let chunker = SimpleChunker::new(2, 0).unwrap();
        let chunks = chunker.chunk_text("äöüß", &meta()).unwrap();
        let contents: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(contents, vec!["äö", "üß"]);
    }

    #[test]
    fn blank_windows_do_not_consume_indices() {
        let chunker = SimpleChunker::new(3, 0).unwrap();
        let chunks = chunker.chunk_text("abc   def", &meta()).unwrap();
        let indices: Vec<usize> = chunks.iter().map(|c| c.chunk_index).collect();
        assert_eq!(indices, vec![0, 1]);
    }
}
