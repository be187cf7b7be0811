use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorStage {
    Scan,
    Ingest,
    Delete,
    Artifact,
}

impl fmt::Display for ErrorStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Scan => "Scan error",
            Self::Ingest => "Ingest error",
            Self::Delete => "Delete error",
            Self::Artifact => "Artifact error",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorDetail {
    pub stage: ErrorStage,
    pub path: Option<String>,
    pub message: String,
}

impl fmt::Display for ErrorDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            Some(path) => write!(f, "{}: {path}: {}", self.stage, self.message),
            None => write!(f, "{}: {}", self.stage, self.message),
        }
    }
}

/// Outcome counts of one run.
#[derive(Debug, Clone, Serialize)]
pub struct IngestSummary {
    pub scanned: usize,
    pub ingested: usize,
    pub skipped: usize,
    pub marked_deleted: usize,
    pub errors: usize,
    pub chunks_upserted: usize,
    pub enriched: usize,
    pub enrichment_cached: usize,
    pub artifacts_generated: usize,
    pub cancelled: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error_details: Vec<ErrorDetail>,
}

impl IngestSummary {
    #[must_use]
    pub fn start() -> Self {
        Self {
            scanned: 0,
            ingested: 0,
            skipped: 0,
            marked_deleted: 0,
            errors: 0,
            chunks_upserted: 0,
            enriched: 0,
            enrichment_cached: 0,
            artifacts_generated: 0,
            cancelled: false,
            started_at: Utc::now(),
            finished_at: None,
            error_details: Vec::new(),
        }
    }

    pub fn add_error(
        &mut self,
        stage: ErrorStage,
        path: Option<&str>,
        message: impl Into<String>,
    ) {
        self.errors += 1;
        self.error_details.push(ErrorDetail {
            stage,
            path: path.map(str::to_string),
            message: message.into(),
        });
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    #[must_use]
    pub fn duration(&self) -> Option<Duration> {
        self.finished_at
            .and_then(|end| (end - self.started_at).to_std().ok())
    }

    #[must_use]
    pub const fn has_errors(&self) -> bool {
        self.errors > 0
    }
}

impl fmt::Display for IngestSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "scanned {}, ingested {}, skipped {}, marked_deleted {}, errors {}",
            self.scanned, self.ingested, self.skipped, self.marked_deleted, self.errors
        )?;
        if self.enriched > 0 || self.enrichment_cached > 0 {
            write!(
                f,
                ", enriched {} (cached {})",
                self.enriched, self.enrichment_cached
            )?;
        }
        if self.artifacts_generated > 0 {
            write!(f, ", artifacts {}", self.artifacts_generated)?;
        }
        if self.cancelled {
            f.write_str(" (cancelled)")?;
        }
        Ok(())
    }
}
