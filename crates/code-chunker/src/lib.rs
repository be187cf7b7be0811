//! # Context Code Chunker
//!
//! Deterministic text splitting for ingestion.
//!
//! Strategies are plain [`Chunker`] implementations registered by name in a
//! [`ChunkerRegistry`]; a [`ChunkingRouter`] picks one per file extension.
//!
//! ```
//! use context_code_chunker::{ChunkMetadata, ChunkerConfig, ChunkerRegistry};
//!
//! let chunker = ChunkerRegistry::builtin()
//!     .build(&ChunkerConfig::new("simple", 16, 4))
//!     .unwrap();
//! let chunks = chunker
//!     .chunk_text("some text worth splitting", &ChunkMetadata::new("a.md", "a"))
//!     .unwrap();
//! assert_eq!(chunks[0].id, "a:0");
//! ```

mod chunk;
mod chunker;
mod config;
mod error;
mod language;
mod lines;
mod registry;
mod simple;

pub use chunk::{Chunk, ChunkMetadata};
pub use chunker::Chunker;
pub use config::{ChunkerConfig, DEFAULT_CHUNK_SIZE, DEFAULT_OVERLAP, DEFAULT_STRATEGY};
pub use error::{ChunkerError, Result};
pub use language::Language;
pub use lines::{LineChunker, LINES_STRATEGY};
pub use registry::{normalize_ext, ChunkerFactory, ChunkerRegistry, ChunkingRouter};
pub use simple::{SimpleChunker, SIMPLE_STRATEGY};
