//! Pluggable pieces of the ingest pipeline.
//!
//! The executor only sees these traits; concrete implementations are
//! injected at construction.

use crate::error::{EnrichError, ParseError};
use crate::ingest_state::ParsingConfigEntry;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::Path;

/// Extracts text from one file.
#[async_trait]
pub trait Parser: Send + Sync {
    async fn parse(&self, path: &Path) -> Result<String, ParseError>;

    /// Parser identity for `ext`; recorded in the state and in every record.
    fn parser_config(&self, ext: &str) -> ParsingConfigEntry {
        ParsingConfigEntry::for_extension(ext)
    }
}

/// Reads files as UTF-8 text. Content with NUL bytes is treated as binary
/// and rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextParser;

#[async_trait]
impl Parser for PlainTextParser {
    async fn parse(&self, path: &Path) -> Result<String, ParseError> {
        let bytes = tokio::fs::read(path).await.map_err(|source| ParseError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if bytes.contains(&0) {
            return Err(ParseError::Unsupported {
                path: path.to_path_buf(),
                reason: "binary content".to_string(),
            });
        }
        String::from_utf8(bytes).map_err(|_| ParseError::InvalidUtf8 {
            path: path.to_path_buf(),
        })
    }
}

/// Produces a description of a chunk that is embedded in place of the raw
/// text.
#[async_trait]
pub trait Enricher: Send + Sync {
    fn enricher_id(&self) -> String;

    /// `content_hash` identifies the chunk text, for caching. `None` means
    /// nothing to add; the raw chunk is embedded.
    async fn enrich(
        &self,
        content: &str,
        file_path: &str,
        content_hash: &str,
    ) -> Result<Option<String>, EnrichError>;
}

/// Project-level document generated alongside the per-file records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    /// Short kind name, e.g. `navigation_index`. Part of the record id.
    pub kind: String,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub metadata: Value,
}

impl Artifact {
    pub fn new(
        kind: impl Into<String>,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            kind: kind.into(),
            title: title.into(),
            content: content.into(),
            metadata: Value::Null,
        }
    }

    /// `artifact:<kind>:<collection>`
    #[must_use]
    pub fn record_id(&self, collection: &str) -> String {
        format!("artifact:{}:{collection}", self.kind)
    }

    #[must_use]
    pub fn to_payload(&self) -> Value {
        json!({
            "is_artifact": true,
            "artifact_type": self.kind,
            "title": self.title,
            "content": self.content,
            "metadata": self.metadata,
            "is_deleted": false,
        })
    }
}

#[async_trait]
pub trait ArtifactSource: Send + Sync {
    async fn generate(&self) -> Result<Vec<Artifact>, EnrichError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn plain_text_parser_reads_utf8() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.md");
        std::fs::write(&path, "héllo").unwrap();
        assert_eq!(PlainTextParser.parse(&path).await.unwrap(), "héllo");
    }

    #[tokio::test]
    async fn plain_text_parser_rejects_binary() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.md");
        std::fs::write(&path, [0xff, 0xfe, 0x41]).unwrap();
        assert!(matches!(
            PlainTextParser.parse(&path).await,
            Err(ParseError::InvalidUtf8 { .. })
        ));
    }

    #[tokio::test]
    async fn plain_text_parser_rejects_nul_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, b"text\0more").unwrap();
        assert!(matches!(
            PlainTextParser.parse(&path).await,
            Err(ParseError::Unsupported { .. })
        ));
    }

    #[test]
    fn default_parser_config_uses_extension() {
        assert_eq!(PlainTextParser.parser_config(".md").id(), "md.v1");
        assert_eq!(PlainTextParser.parser_config("RST").id(), "rst.v1");
    }

    #[test]
    fn artifact_id_and_payload() {
        let artifact = Artifact::new("navigation_index", "Index", "a.md: intro");
        assert_eq!(
            artifact.record_id("docs"),
            "artifact:navigation_index:docs"
        );
        let payload = artifact.to_payload();
        assert_eq!(payload["is_artifact"], true);
        assert_eq!(payload["artifact_type"], "navigation_index");
    }
}
