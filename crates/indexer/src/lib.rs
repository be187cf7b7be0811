//! # Context Indexer
//!
//! Incremental ingestion of a directory tree into a vector store.
//!
//! ## Pipeline
//!
//! ```text
//! Source directory / file
//!     │
//!     ├──> FileScanner (.gitignore aware, SHA-256 per file)
//!     │      └─> ScannedFile snapshot
//!     │
//!     ├──> Differ (snapshot vs. IngestState)
//!     │      └─> ingest / skip / mark-deleted
//!     │
//!     └──> IngestExecutor
//!            parse → chunk → enrich → embed → upsert → mark_active
//!            then one atomic save of the state
//! ```
//!
//! Only the content hash decides whether a file is re-processed. Records get
//! deterministic ids, so re-ingesting unchanged content overwrites instead
//! of duplicating.
//!
//! ## Example
//!
//! ```no_run
//! use context_code_chunker::ChunkingRouter;
//! use context_indexer::{
//!     default_state_path, IngestExecutor, IngestStateManager, PlainTextParser, RunOptions,
//! };
//! use context_vector_store::{HashEmbedder, MemoryVectorStore};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let project = Path::new("/path/to/docs");
//!     let state = IngestStateManager::load(default_state_path(project)).await?;
//!     let mut executor = IngestExecutor::new(
//!         state,
//!         Arc::new(PlainTextParser),
//!         ChunkingRouter::default(),
//!         Arc::new(HashEmbedder::default()),
//!         Arc::new(MemoryVectorStore::new()),
//!     );
//!
//!     let summary = executor.run(project, RunOptions::default()).await?;
//!     println!("{summary}");
//!     Ok(())
//! }
//! ```

mod collaborators;
mod differ;
mod enrichment;
mod error;
mod executor;
mod hashing;
mod ingest_state;
mod scanner;
mod state_io;
mod summary;

pub use collaborators::{Artifact, ArtifactSource, Enricher, Parser, PlainTextParser};
pub use differ::{DiffResult, Differ, FileCandidate};
pub use enrichment::{CachedEnricher, Enrichment};
pub use error::{EnrichError, IngestError, ParseError, ProcessError, Result, StateError};
pub use executor::{
    ExecutorConfig, IngestExecutor, IngestPlan, RunOptions, DEFAULT_COLLECTION,
    DEFAULT_MAX_CONCURRENCY,
};
pub use hashing::{compute_chunk_id, compute_content_hash, hash_text, HASH_PREFIX};
pub use ingest_state::{
    ChunkingConfigEntry, FileEntry, FileStatus, IngestState, ParsingConfigEntry, StateReader,
    INGEST_STATE_SCHEMA_VERSION, UNKNOWN_EMBEDDING_ID,
};
pub use scanner::{
    canonical_root, FileScanner, ScanConfig, ScanError, ScanResult, ScannedFile,
    DEFAULT_SUPPORTED_EXTENSIONS,
};
pub use state_io::{default_state_path, IngestStateManager, RootStats, StateStats};
pub use summary::{ErrorDetail, ErrorStage, IngestSummary};
