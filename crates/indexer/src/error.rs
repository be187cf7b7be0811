use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, IngestError>;

/// Run-level failures. Anything here aborts the run; per-file problems are
/// reported through [`ProcessError`] instead.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("State error: {0}")]
    State(#[from] StateError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid source path: {0}")]
    InvalidPath(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Background task failed: {0}")]
    TaskError(String),

    #[error("{0}")]
    Other(String),
}

/// Loading or saving the persisted ingest state failed.
#[derive(Error, Debug)]
pub enum StateError {
    #[error("failed to access state file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("state file {path} is corrupt: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("state file {path} has schema version {found}; newest supported is {supported}")]
    UnsupportedSchema {
        path: PathBuf,
        found: u32,
        supported: u32,
    },
}

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} is not valid UTF-8")]
    InvalidUtf8 { path: PathBuf },

    #[error("unsupported file {path}: {reason}")]
    Unsupported { path: PathBuf, reason: String },
}

#[derive(Error, Debug)]
#[error("enrichment failed: {0}")]
pub struct EnrichError(pub String);

/// Why one file could not be ingested. Never fatal for the run.
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("parse failed: {0}")]
    Parse(#[from] ParseError),

    #[error("chunking failed: {0}")]
    Chunk(#[from] context_code_chunker::ChunkerError),

    #[error(transparent)]
    Enrich(#[from] EnrichError),

    #[error("embedding failed: {0}")]
    Embed(#[source] context_vector_store::VectorStoreError),

    #[error("upsert failed: {0}")]
    Store(#[source] context_vector_store::VectorStoreError),

    #[error("worker task failed: {0}")]
    Task(String),
}
