use crate::chunk::{Chunk, ChunkMetadata};
use crate::chunker::Chunker;
use crate::config::ChunkerConfig;
use crate::error::Result;

pub const LINES_STRATEGY: &str = "lines";

/// Windows of whole lines with line overlap.
///
/// `chunk_size` and `overlap` count lines rather than characters, which keeps
/// code and structured text readable inside each chunk.
#[derive(Debug, Clone)]
pub struct LineChunker {
    config: ChunkerConfig,
}

impl LineChunker {
    pub fn new(lines_per_chunk: usize, overlap: usize) -> Result<Self> {
        Self::from_config(ChunkerConfig::new(
            LINES_STRATEGY,
            lines_per_chunk,
            overlap,
        ))
    }

    pub fn from_config(config: ChunkerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }
}

impl Chunker for LineChunker {
    fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    fn chunk_text(&self, text: &str, base: &ChunkMetadata) -> Result<Vec<Chunk>> {
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let lines: Vec<&str> = text.lines().collect();
        let size = self.config.chunk_size;
        let step = self.config.step();

        let mut chunks = Vec::new();
        let mut start = 0;
        while start < lines.len() {
            let end = (start + size).min(lines.len());
            let window = lines[start..end].join("\n");
            let piece = window.trim();
            if !piece.is_empty() {
                chunks.push(Chunk::new(chunks.len(), piece, base));
            }
            if end == lines.len() {
                break;
            }
            start += step;
        }

        Ok(chunks)
    }
}
