use crate::collaborators::{ArtifactSource, Enricher, Parser};
use crate::differ::{DiffResult, Differ, FileCandidate};
use crate::enrichment::CachedEnricher;
use crate::error::{IngestError, ProcessError, Result};
use crate::hashing::{compute_chunk_id, hash_text, HASH_PREFIX};
use crate::ingest_state::{FileEntry, FileStatus};
use crate::scanner::{canonical_root, FileScanner, ScanError, ScanResult};
use crate::state_io::IngestStateManager;
use crate::summary::{ErrorStage, IngestSummary};
use chrono::Utc;
use context_code_chunker::{ChunkMetadata, ChunkingRouter, Language};
use context_vector_store::{Embedder, VectorRecord, VectorStoreWriter};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinSet;

pub const DEFAULT_COLLECTION: &str = "default";
pub const DEFAULT_MAX_CONCURRENCY: usize = 4;

#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    pub collection: String,
    /// Files processed at once; `1` processes strictly in order.
    pub max_concurrency: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            collection: DEFAULT_COLLECTION.to_string(),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }
}

impl ExecutorConfig {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }
}

/// Per-run switches.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Ingest every scanned file regardless of state.
    pub force: bool,
    pub skip_artifacts: bool,
    /// Flipping this to `true` stops dispatching new files.
    pub cancel: Option<watch::Receiver<bool>>,
}

impl RunOptions {
    #[must_use]
    pub fn forced() -> Self {
        Self {
            force: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_cancel(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|rx| *rx.borrow())
    }
}

/// What a run would do, without doing it.
#[derive(Debug, Clone, Serialize)]
pub struct IngestPlan {
    pub root: Option<String>,
    pub scanned: usize,
    pub scan_errors: Vec<ScanError>,
    pub diff: DiffResult,
}

#[derive(Debug, Clone, Copy, Default)]
struct FileOutcome {
    chunks: usize,
    enriched: usize,
    enrichment_cached: usize,
}

/// Everything a worker needs to process one file. Cheap to share.
struct Pipeline {
    parser: Arc<dyn Parser>,
    router: ChunkingRouter,
    embedder: Arc<dyn Embedder>,
    writer: Arc<dyn VectorStoreWriter>,
    enricher: Option<Arc<CachedEnricher>>,
    collection: String,
}

/// Drives scan → diff → process → record for one ingest state.
///
/// The executor owns the state manager for the whole run; workers never
/// touch it and report back through typed outcomes instead.
pub struct IngestExecutor {
    state: IngestStateManager,
    scanner: FileScanner,
    pipeline: Arc<Pipeline>,
    artifacts: Option<Arc<dyn ArtifactSource>>,
    max_concurrency: usize,
}

impl IngestExecutor {
    pub fn new(
        state: IngestStateManager,
        parser: Arc<dyn Parser>,
        router: ChunkingRouter,
        embedder: Arc<dyn Embedder>,
        writer: Arc<dyn VectorStoreWriter>,
    ) -> Self {
        Self {
            state,
            scanner: FileScanner::default(),
            pipeline: Arc::new(Pipeline {
                parser,
                router,
                embedder,
                writer,
                enricher: None,
                collection: DEFAULT_COLLECTION.to_string(),
            }),
            artifacts: None,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: ExecutorConfig) -> Self {
        self.max_concurrency = config.max_concurrency.max(1);
        self.update_pipeline(|p| p.collection = config.collection);
        self
    }

    #[must_use]
    pub fn with_scanner(mut self, scanner: FileScanner) -> Self {
        self.scanner = scanner;
        self
    }

    #[must_use]
    pub fn with_enricher(mut self, enricher: CachedEnricher) -> Self {
        self.update_pipeline(|p| p.enricher = Some(Arc::new(enricher)));
        self
    }

    #[must_use]
    pub fn with_artifact_source(mut self, source: Arc<dyn ArtifactSource>) -> Self {
        self.artifacts = Some(source);
        self
    }

    #[must_use]
    pub const fn state(&self) -> &IngestStateManager {
        &self.state
    }

    #[must_use]
    pub fn into_state(self) -> IngestStateManager {
        self.state
    }

    #[must_use]
    pub fn collection(&self) -> &str {
        &self.pipeline.collection
    }

    // Builders run before any worker holds a clone of the pipeline.
    fn update_pipeline(&mut self, apply: impl FnOnce(&mut Pipeline)) {
        if let Some(pipeline) = Arc::get_mut(&mut self.pipeline) {
            apply(pipeline);
        }
    }

    /// Scan and diff only. Neither the state nor any collaborator is touched.
    pub async fn plan(&self, source: &Path, force: bool) -> Result<IngestPlan> {
        let scan = self.scan(source).await?;
        let root = canonical_root(source)
            .ok()
            .map(|root| root.to_string_lossy().into_owned());

        let mut preview =
            IngestStateManager::with_state(self.state.path(), self.state.state().clone());
        sync_configuration(&mut preview, &self.pipeline, &scan);
        let diff = Differ::new(&preview).compute_diff(&scan.files, force, root.as_deref());

        Ok(IngestPlan {
            root,
            scanned: scan.total_scanned,
            scan_errors: scan.errors,
            diff,
        })
    }

    /// Bring the downstream store and the state in line with `source`.
    ///
    /// Per-file failures are counted in the summary and leave that file's
    /// state untouched. Only failing to save the state aborts the run.
    pub async fn run(&mut self, source: &Path, options: RunOptions) -> Result<IngestSummary> {
        let mut summary = IngestSummary::start();

        log::info!("Scanning {}", source.display());
        let scan = self.scan(source).await?;
        summary.scanned = scan.total_scanned;
        for error in &scan.errors {
            summary.add_error(ErrorStage::Scan, Some(&error.path), error.message.clone());
        }

        if !options.skip_artifacts {
            if let Some(artifacts) = self.artifacts.clone() {
                self.ingest_artifacts(artifacts.as_ref(), &mut summary).await;
            }
        }

        sync_configuration(&mut self.state, &self.pipeline, &scan);
        // A removed source still resolves, so everything recorded under it is
        // marked deleted.
        let root = canonical_root(source)
            .ok()
            .map(|root| root.to_string_lossy().into_owned());
        let diff =
            Differ::new(&self.state).compute_diff(&scan.files, options.force, root.as_deref());
        summary.skipped = diff.to_skip.len();

        let enricher_id = self
            .pipeline
            .enricher
            .as_ref()
            .map(|enricher| enricher.enricher_id());

        self.ingest_candidates(diff.to_ingest, &options, enricher_id.as_deref(), &mut summary)
            .await;

        for candidate in &diff.to_skip {
            self.state.mark_active(
                &candidate.root,
                &candidate.path,
                file_entry(candidate, enricher_id.as_deref()),
            );
        }

        if let Some(root) = root.as_deref() {
            self.apply_deletions(root, &diff.to_mark_deleted, &mut summary)
                .await;
        }

        self.state.save().await?;
        if let Some(enricher) = &self.pipeline.enricher {
            if let Err(e) = enricher.save().await {
                log::warn!("Failed to save enrichment cache: {e}");
            }
        }

        summary.finish();
        log::info!("Ingestion complete: {summary}");
        Ok(summary)
    }

    async fn scan(&self, source: &Path) -> Result<ScanResult> {
        // Bookkeeping files may sit under the source; scanning them would
        // re-ingest them on every run.
        let mut scanner = self.scanner.clone().with_excluded_file(self.state.path());
        if let Some(cache) = self
            .pipeline
            .enricher
            .as_ref()
            .and_then(|enricher| enricher.path())
        {
            scanner = scanner.with_excluded_file(cache);
        }
        let source = source.to_path_buf();
        let scan = tokio::task::spawn_blocking(move || scanner.scan(&source))
            .await
            .map_err(|e| IngestError::TaskError(format!("scan task failed: {e}")))?;
        log::info!(
            "Scanned {} files ({} errors)",
            scan.total_scanned,
            scan.errors.len()
        );
        Ok(scan)
    }

    async fn ingest_candidates(
        &mut self,
        candidates: Vec<FileCandidate>,
        options: &RunOptions,
        enricher_id: Option<&str>,
        summary: &mut IngestSummary,
    ) {
        if candidates.is_empty() {
            return;
        }
        log::info!(
            "Ingesting {} files (enrichment: {})",
            candidates.len(),
            if enricher_id.is_some() { "enabled" } else { "disabled" }
        );

        let mut pending = candidates.into_iter();
        let mut workers: JoinSet<(FileCandidate, std::result::Result<FileOutcome, ProcessError>)> =
            JoinSet::new();

        loop {
            while workers.len() < self.max_concurrency && !summary.cancelled {
                if options.is_cancelled() {
                    log::warn!("Ingestion cancelled; waiting for in-flight files");
                    summary.cancelled = true;
                    break;
                }
                let Some(candidate) = pending.next() else {
                    break;
                };
                let pipeline = Arc::clone(&self.pipeline);
                workers.spawn(async move {
                    let outcome = ingest_file(&pipeline, &candidate).await;
                    (candidate, outcome)
                });
            }

            let Some(joined) = workers.join_next().await else {
                break;
            };
            match joined {
                Ok((candidate, Ok(outcome))) => {
                    summary.ingested += 1;
                    summary.chunks_upserted += outcome.chunks;
                    summary.enriched += outcome.enriched;
                    summary.enrichment_cached += outcome.enrichment_cached;
                    self.state.mark_active(
                        &candidate.root,
                        &candidate.path,
                        file_entry(&candidate, enricher_id),
                    );
                }
                Ok((candidate, Err(e))) => {
                    log::warn!("Failed to ingest {}: {e}", candidate.path);
                    summary.add_error(ErrorStage::Ingest, Some(&candidate.path), e.to_string());
                }
                Err(e) => {
                    let e = ProcessError::Task(e.to_string());
                    log::warn!("Ingest worker failed: {e}");
                    summary.add_error(ErrorStage::Ingest, None, e.to_string());
                }
            }
        }
    }

    async fn apply_deletions(&mut self, root: &str, paths: &[String], summary: &mut IngestSummary) {
        let collection = self.pipeline.collection.clone();
        for path in paths {
            match self.pipeline.writer.mark_deleted(&collection, path).await {
                Ok(records) => {
                    log::debug!("Soft-deleted {records} records of {path}");
                    if self.state.mark_deleted(root, path) {
                        summary.marked_deleted += 1;
                    }
                }
                Err(e) => {
                    log::warn!("Failed to mark {path} deleted downstream: {e}");
                    summary.add_error(ErrorStage::Delete, Some(path), e.to_string());
                }
            }
        }
    }

    async fn ingest_artifacts(&self, source: &dyn ArtifactSource, summary: &mut IngestSummary) {
        log::info!("Generating project artifacts");
        let artifacts = match source.generate().await {
            Ok(artifacts) => artifacts,
            Err(e) => {
                log::warn!("Artifact generation failed: {e}");
                summary.add_error(ErrorStage::Artifact, None, e.to_string());
                return;
            }
        };
        if artifacts.is_empty() {
            return;
        }

        let pipeline = &self.pipeline;
        let embedding_id = pipeline.embedder.embedding_id();
        let ingested_at = Utc::now().to_rfc3339();
        let mut records = Vec::with_capacity(artifacts.len());
        for artifact in &artifacts {
            let vector = match pipeline.embedder.embed(&artifact.content).await {
                Ok(vector) => vector,
                Err(e) => {
                    summary.add_error(
                        ErrorStage::Artifact,
                        None,
                        format!("embedding {} failed: {e}", artifact.kind),
                    );
                    return;
                }
            };
            let mut payload = artifact.to_payload();
            if let Some(map) = payload.as_object_mut() {
                map.insert("collection".into(), json!(pipeline.collection));
                map.insert("embedding_id".into(), json!(embedding_id));
                map.insert("ingested_at".into(), json!(ingested_at));
            }
            records.push(VectorRecord::new(
                artifact.record_id(&pipeline.collection),
                vector,
                payload,
            ));
        }

        match pipeline.writer.upsert(&pipeline.collection, records).await {
            Ok(()) => {
                summary.artifacts_generated = artifacts.len();
                log::info!("Ingested {} artifacts", artifacts.len());
            }
            Err(e) => {
                log::warn!("Artifact upsert failed: {e}");
                summary.add_error(ErrorStage::Artifact, None, e.to_string());
            }
        }
    }
}

/// Record the collaborators' identities in the state so the differ resolves
/// the ids this run will actually use.
fn sync_configuration(state: &mut IngestStateManager, pipeline: &Pipeline, scan: &ScanResult) {
    state.set_embedding_config(pipeline.embedder.config());
    state.set_default_chunking_config(pipeline.router.default_chunker().config().clone());

    let mut extensions: BTreeSet<String> = pipeline.router.extensions().into_iter().collect();
    extensions.extend(scan.files.iter().map(|f| f.extension.clone()));
    for ext in extensions.iter().filter(|ext| !ext.is_empty()) {
        state.set_chunking_config(ext, pipeline.router.chunker_for(ext).config().clone());
        state.set_parsing_config(ext, pipeline.parser.parser_config(ext));
    }
}

fn file_entry(candidate: &FileCandidate, enricher_id: Option<&str>) -> FileEntry {
    FileEntry {
        extension: candidate.extension.clone(),
        size_bytes: candidate.size_bytes,
        mtime_epoch: candidate.mtime_epoch,
        content_hash: candidate.content_hash.clone(),
        status: FileStatus::Active,
        parser_id: candidate.parser_id.clone(),
        chunker_id: candidate.chunker_id.clone(),
        embedding_id: candidate.embedding_id.clone(),
        enricher_id: enricher_id.map(str::to_string),
        updated_at: None,
    }
}

fn doc_id_for(path: &str) -> String {
    PathBuf::from(path)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}

/// parse → chunk → enrich → embed → upsert for one file. The records of a
/// file go out as a single batch.
async fn ingest_file(
    pipeline: &Pipeline,
    candidate: &FileCandidate,
) -> std::result::Result<FileOutcome, ProcessError> {
    log::debug!("Processing {}", candidate.path);
    let text = pipeline.parser.parse(Path::new(&candidate.path)).await?;
    if text.trim().is_empty() {
        log::warn!("Empty content from {}, nothing to upsert", candidate.path);
        return Ok(FileOutcome::default());
    }

    let language = Language::from_extension(&candidate.extension);
    let mut base = ChunkMetadata::new(&candidate.path, doc_id_for(&candidate.path));
    base.content_hash = candidate.content_hash.clone();
    base.parser_id = candidate.parser_id.clone();
    base.chunker_id = candidate.chunker_id.clone();
    if language != Language::Unknown {
        base.language = Some(language.as_str().to_string());
    }

    let chunks = pipeline
        .router
        .chunker_for(&candidate.extension)
        .chunk_text(&text, &base)?;
    if chunks.is_empty() {
        log::warn!("No chunks from {}, nothing to upsert", candidate.path);
        return Ok(FileOutcome::default());
    }

    let mut outcome = FileOutcome::default();
    let mut records = Vec::with_capacity(chunks.len());
    for chunk in &chunks {
        let chunk_hash = hash_text(&chunk.content);

        let mut description = None;
        if let Some(enricher) = &pipeline.enricher {
            let enrichment = enricher
                .enrich_chunk(&chunk.content, &candidate.path, &chunk_hash)
                .await?;
            if enrichment.description.is_some() {
                outcome.enriched += 1;
                if enrichment.cached {
                    outcome.enrichment_cached += 1;
                }
            }
            description = enrichment.description;
        }

        let vector = pipeline
            .embedder
            .embed(description.as_deref().unwrap_or(&chunk.content))
            .await
            .map_err(ProcessError::Embed)?;

        let mut payload = json!({
            "content": chunk.content,
            "doc_id": chunk.doc_id,
            "chunk_index": chunk.chunk_index,
            "content_hash": candidate.content_hash,
            "source_path": candidate.path,
            "ext": candidate.extension,
            "chunk_text_hash": format!("{HASH_PREFIX}{chunk_hash}"),
            "parser_id": candidate.parser_id,
            "chunker_id": candidate.chunker_id,
            "embedding_id": candidate.embedding_id,
            "is_deleted": false,
            "ingested_at": Utc::now().to_rfc3339(),
            "metadata": serde_json::to_value(&chunk.metadata).unwrap_or(Value::Null),
        });
        if let (Some(text), Some(enricher), Some(map)) =
            (description, &pipeline.enricher, payload.as_object_mut())
        {
            map.insert("description".into(), json!(text));
            map.insert(
                "enricher_id".into(),
                json!(enricher.enricher_id()),
            );
        }

        records.push(VectorRecord::new(
            compute_chunk_id(
                &candidate.content_hash,
                chunk.chunk_index,
                &candidate.parser_id,
                &candidate.chunker_id,
                &candidate.embedding_id,
            ),
            vector,
            payload,
        ));
    }

    outcome.chunks = records.len();
    pipeline
        .writer
        .upsert(&pipeline.collection, records)
        .await
        .map_err(ProcessError::Store)?;
    log::debug!("Upserted {} chunks from {}", outcome.chunks, candidate.path);
    Ok(outcome)
}
