use crate::command::context::{CommandContext, ProjectContext};
use crate::command::domain::{
    parse_payload, CommandOutcome, Hint, HintKind, IngestOutput, IngestPayload, PlanOutput,
    PlanPayload,
};
use anyhow::{Context, Result};
use context_code_chunker::{ChunkerRegistry, ChunkingRouter};
use context_indexer::{
    ExecutorConfig, FileScanner, IngestExecutor, IngestStateManager, PlainTextParser, RunOptions,
};
use context_vector_store::{HashEmbedder, JsonVectorStore};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;

#[derive(Default)]
pub struct IngestService;

impl IngestService {
    pub async fn run(&self, payload: Value, ctx: &CommandContext) -> Result<CommandOutcome> {
        let payload: IngestPayload = parse_payload(payload)?;
        let project = ctx.resolve_project(&payload.source, payload.state_path)?;
        let mut executor = build_executor(&project).await?;

        let mut options = RunOptions {
            force: payload.force,
            skip_artifacts: payload.skip_artifacts,
            cancel: None,
        };
        if let Some(cancel) = ctx.cancel() {
            options = options.with_cancel(cancel);
        }

        let summary = executor.run(&payload.source, options).await?;
        log::info!("{summary}");

        let total_active = executor.state().stats().total_active();
        let mut hints = project.hints.clone();
        for detail in summary.error_details.iter().take(20) {
            hints.push(Hint {
                kind: HintKind::Warn,
                text: detail.to_string(),
            });
        }
        if summary.cancelled {
            hints.push(Hint {
                kind: HintKind::Action,
                text: "Run was cancelled. Rerun to pick up the remaining files.".to_string(),
            });
        }

        let mut outcome = CommandOutcome::from_value(IngestOutput {
            summary,
            total_active,
        })?;
        outcome.hints = hints;
        fill_meta(&mut outcome, &project);
        outcome.meta.state_updated = Some(true);
        Ok(outcome)
    }

    pub async fn plan(&self, payload: Value, ctx: &CommandContext) -> Result<CommandOutcome> {
        let payload: PlanPayload = parse_payload(payload)?;
        let project = ctx.resolve_project(&payload.source, payload.state_path)?;
        let executor = build_executor(&project).await?;

        let plan = executor.plan(&payload.source, payload.force).await?;
        let output = PlanOutput {
            to_ingest: plan.diff.to_ingest.len(),
            to_skip: plan.diff.to_skip.len(),
            to_mark_deleted: plan.diff.to_mark_deleted.len(),
            plan,
        };

        let mut outcome = CommandOutcome::from_value(output)?;
        outcome.hints = project.hints.clone();
        fill_meta(&mut outcome, &project);
        outcome.meta.state_updated = Some(false);
        Ok(outcome)
    }
}

async fn build_executor(project: &ProjectContext) -> Result<IngestExecutor> {
    let config = &project.config;
    let state = IngestStateManager::load(&project.state_path).await?;
    let router = ChunkingRouter::from_configs(
        &ChunkerRegistry::builtin(),
        &config.chunking.default,
        &config.chunking.by_ext,
    )
    .context("Invalid config: chunking")?;
    let mut scanner = FileScanner::new(config.scan.to_scan_config())
        .context("Invalid config: scan")?
        .with_excluded_file(&project.store_path);
    if let Some(config_path) = &project.config_path {
        scanner = scanner.with_excluded_file(Path::new(config_path));
    }
    let embedder = HashEmbedder::new(config.embedding.dimension)
        .context("Invalid config: embedding")?;
    let store = JsonVectorStore::open(&project.store_path)
        .await
        .with_context(|| {
            format!(
                "Failed to open vector store {}",
                project.store_path.display()
            )
        })?;

    Ok(IngestExecutor::new(
        state,
        Arc::new(PlainTextParser),
        router,
        Arc::new(embedder),
        Arc::new(store),
    )
    .with_config(
        ExecutorConfig::new(config.collection.clone())
            .with_max_concurrency(config.max_concurrency),
    )
    .with_scanner(scanner))
}

fn fill_meta(outcome: &mut CommandOutcome, project: &ProjectContext) {
    outcome.meta.config_path = project.config_path.clone();
    outcome.meta.state_path = Some(project.state_path.display().to_string());
    outcome.meta.store_path = Some(project.store_path.display().to_string());
}
