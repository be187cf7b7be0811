use crate::command::context::CommandContext;
use crate::command::domain::{
    parse_payload, CommandOutcome, Hint, HintKind, StatusOutput, StatusPayload,
};
use anyhow::Result;
use context_indexer::IngestStateManager;
use serde_json::Value;
use std::path::PathBuf;

#[derive(Default)]
pub struct StatusService;

impl StatusService {
    pub async fn read(&self, payload: Value, ctx: &CommandContext) -> Result<CommandOutcome> {
        let payload: StatusPayload = parse_payload(payload)?;
        let source = payload.project.unwrap_or_else(|| PathBuf::from("."));
        let project = ctx.resolve_project(&source, payload.state_path)?;

        let state_exists = tokio::fs::try_exists(&project.state_path).await?;
        let state = IngestStateManager::load(&project.state_path).await?;
        let stats = state.stats();

        let mut outcome = CommandOutcome::from_value(StatusOutput {
            state_exists,
            total_active: stats.total_active(),
            stats,
        })?;
        outcome.hints = project.hints;
        if !state_exists {
            outcome.hints.push(Hint {
                kind: HintKind::Action,
                text: format!(
                    "Nothing ingested yet. Run `context-ingest ingest {}`.",
                    project.root.display()
                ),
            });
        }
        outcome.meta.config_path = project.config_path;
        outcome.meta.state_path = Some(project.state_path.display().to_string());
        outcome.meta.state_updated = Some(false);
        Ok(outcome)
    }
}
