//! # Context Vector Store
//!
//! Embedding backends and the write side of the downstream index.
//!
//! Records carry a deterministic id and a free-form JSON payload. Stores
//! understand exactly two payload keys: `source_path` (used to soft-delete a
//! file's records) and `is_deleted`.
//!
//! ## Example
//!
//! ```
//! use context_vector_store::{HashEmbedder, MemoryVectorStore, VectorRecord, VectorStoreWriter};
//! use serde_json::json;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> context_vector_store::Result<()> {
//! let embedder = HashEmbedder::new(16)?;
//! let store = MemoryVectorStore::new();
//!
//! let vector = embedder.embed_sync("hello world");
//! let record = VectorRecord::new("r1", vector, json!({ "source_path": "/docs/a.md" }));
//! store.upsert("docs", vec![record]).await?;
//!
//! assert_eq!(store.mark_deleted("docs", "/docs/a.md").await?, 1);
//! # Ok(())
//! # }
//! ```

mod embedder;
mod error;
mod hash_embedder;
mod json_store;
mod memory;
mod record;
mod store;

pub use embedder::{Embedder, EmbeddingConfig};
pub use error::{Result, VectorStoreError};
pub use hash_embedder::{HashEmbedder, DEFAULT_HASH_DIMENSION, HASH_PROVIDER};
pub use json_store::JsonVectorStore;
pub use memory::MemoryVectorStore;
pub use record::{VectorRecord, IS_DELETED_KEY, SOURCE_PATH_KEY};
pub use store::{Collections, VectorStoreWriter};
