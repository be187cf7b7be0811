use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Metadata shared by every chunk of one document.
///
/// The ingest pipeline fills the identifying fields before chunking so that
/// each chunk carries the provenance of the file it was cut from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub source_file: String,
    pub doc_id: String,
    #[serde(default)]
    pub content_hash: String,
    #[serde(default)]
    pub parser_id: String,
    #[serde(default)]
    pub chunker_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, String>,
}

impl ChunkMetadata {
    pub fn new(source_file: impl Into<String>, doc_id: impl Into<String>) -> Self {
        Self {
            source_file: source_file.into(),
            doc_id: doc_id.into(),
            ..Self::default()
        }
    }

    /// Document id used for chunk ids; falls back to the source file.
    #[must_use]
    pub fn effective_doc_id(&self) -> &str {
        if !self.doc_id.is_empty() {
            &self.doc_id
        } else if !self.source_file.is_empty() {
            &self.source_file
        } else {
            "unknown"
        }
    }
}

/// A contiguous piece of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// `<doc_id>:<chunk_index>`
    pub id: String,
    pub doc_id: String,
    pub chunk_index: usize,
    pub content: String,
    pub metadata: ChunkMetadata,
}

impl Chunk {
    pub fn new(
        chunk_index: usize,
        content: impl Into<String>,
        metadata: &ChunkMetadata,
    ) -> Self {
        let doc_id = metadata.effective_doc_id().to_string();
        Self {
            id: format!("{doc_id}:{chunk_index}"),
            doc_id,
            chunk_index,
            content: content.into(),
            metadata: metadata.clone(),
        }
    }
}
