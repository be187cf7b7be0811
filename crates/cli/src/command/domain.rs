use anyhow::Result;
use context_indexer::{IngestPlan, IngestSummary, StateStats};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use std::time::Instant;

#[derive(Debug, Deserialize)]
pub struct CommandRequest {
    pub action: CommandAction,
    #[serde(default = "empty_payload")]
    pub payload: Value,
    /// Explicit config file; otherwise `<project>/.context-ingest/config.toml`.
    #[serde(default)]
    pub config: Option<PathBuf>,
}

fn empty_payload() -> Value {
    Value::Object(Default::default())
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CommandAction {
    Ingest,
    Plan,
    Status,
}

#[derive(Debug, Deserialize)]
pub struct IngestPayload {
    pub source: PathBuf,
    #[serde(default)]
    pub force: bool,
    #[serde(default)]
    pub skip_artifacts: bool,
    #[serde(default)]
    pub state_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
pub struct PlanPayload {
    pub source: PathBuf,
    #[serde(default)]
    pub force: bool,
    #[serde(default)]
    pub state_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
pub struct StatusPayload {
    #[serde(default)]
    pub project: Option<PathBuf>,
    #[serde(default)]
    pub state_path: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
pub struct IngestOutput {
    pub summary: IngestSummary,
    pub total_active: usize,
}

#[derive(Debug, Serialize)]
pub struct PlanOutput {
    pub plan: IngestPlan,
    pub to_ingest: usize,
    pub to_skip: usize,
    pub to_mark_deleted: usize,
}

#[derive(Debug, Serialize)]
pub struct StatusOutput {
    pub state_exists: bool,
    pub stats: StateStats,
    pub total_active: usize,
}

#[derive(Debug, Serialize)]
pub struct CommandResponse {
    pub status: CommandStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hints: Vec<Hint>,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub meta: ResponseMeta,
}

impl CommandResponse {
    pub fn is_error(&self) -> bool {
        matches!(self.status, CommandStatus::Error)
    }

    pub fn error(message: String) -> Self {
        let hints = classify_error(&message);
        Self {
            status: CommandStatus::Error,
            message: Some(message),
            hints,
            data: Value::Null,
            meta: ResponseMeta::default(),
        }
    }
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CommandStatus {
    Ok,
    Error,
}

#[derive(Debug, Serialize, Clone)]
pub struct Hint {
    #[serde(rename = "type")]
    pub kind: HintKind,
    pub text: String,
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HintKind {
    Info,
    Action,
    Warn,
}

#[derive(Debug, Serialize, Default, Clone)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_updated: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

pub struct CommandOutcome {
    pub data: Value,
    pub hints: Vec<Hint>,
    pub meta: ResponseMeta,
    pub started: Instant,
}

impl CommandOutcome {
    pub fn from_value<T: Serialize>(value: T) -> Result<Self> {
        Ok(Self {
            data: serde_json::to_value(value)?,
            hints: Vec::new(),
            meta: ResponseMeta::default(),
            started: Instant::now(),
        })
    }
}

pub fn parse_payload<T: DeserializeOwned>(payload: Value) -> Result<T> {
    serde_json::from_value(payload).map_err(Into::into)
}

pub fn classify_error(message: &str) -> Vec<Hint> {
    let mut hints = Vec::new();

    if message.contains("is corrupt") {
        hints.push(Hint {
            kind: HintKind::Action,
            text: "Ingest state looks corrupted. Move .context-ingest/ingest.json aside and rerun with --force.".to_string(),
        });
    }

    if message.contains("newest supported is") {
        hints.push(Hint {
            kind: HintKind::Warn,
            text: "The state was written by a newer release. Upgrade context-ingest or point --state at a fresh file.".to_string(),
        });
    }

    if message.contains("Invalid config") {
        hints.push(Hint {
            kind: HintKind::Action,
            text: "Check .context-ingest/config.toml. Unknown keys are rejected.".to_string(),
        });
    }

    if message.contains("failed to access state file") {
        hints.push(Hint {
            kind: HintKind::Warn,
            text: "State file is not readable or writable. Check permissions on the state directory."
                .to_string(),
        });
    }

    hints
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn request_defaults_to_empty_payload() {
        let request: CommandRequest = serde_json::from_value(json!({"action": "status"})).unwrap();
        assert_eq!(request.action, CommandAction::Status);
        assert_eq!(request.payload, json!({}));
        assert!(request.config.is_none());
    }

    #[test]
    fn ingest_payload_flags_default_off() {
        let payload: IngestPayload = parse_payload(json!({"source": "docs"})).unwrap();
        assert!(!payload.force);
        assert!(!payload.skip_artifacts);
        assert!(payload.state_path.is_none());
    }

    #[test]
    fn error_response_carries_hints() {
        let response = CommandResponse::error(
            "State error: state file /tmp/x/ingest.json is corrupt: expected value".to_string(),
        );
        assert!(response.is_error());
        assert_eq!(response.hints.len(), 1);
        assert_eq!(response.hints[0].kind, HintKind::Action);
    }

    #[test]
    fn unrelated_errors_get_no_hints() {
        assert!(classify_error("connection reset").is_empty());
    }
}
