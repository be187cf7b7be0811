use crate::ingest_state::StateReader;
use crate::scanner::ScannedFile;
use serde::Serialize;
use std::collections::HashSet;

/// A scanned file plus the configuration that would process it now.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileCandidate {
    pub path: String,
    pub root: String,
    pub extension: String,
    pub size_bytes: u64,
    pub mtime_epoch: f64,
    pub content_hash: String,
    pub parser_id: String,
    pub chunker_id: String,
    pub embedding_id: String,
}

impl FileCandidate {
    pub fn from_scanned(
        scanned: &ScannedFile,
        parser_id: impl Into<String>,
        chunker_id: impl Into<String>,
        embedding_id: impl Into<String>,
    ) -> Self {
        Self {
            path: scanned.path.clone(),
            root: scanned.root.clone(),
            extension: scanned.extension.clone(),
            size_bytes: scanned.size_bytes,
            mtime_epoch: scanned.mtime_epoch,
            content_hash: scanned.content_hash.clone(),
            parser_id: parser_id.into(),
            chunker_id: chunker_id.into(),
            embedding_id: embedding_id.into(),
        }
    }
}

/// Action plan for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DiffResult {
    pub to_ingest: Vec<FileCandidate>,
    pub to_skip: Vec<FileCandidate>,
    /// Absolute paths, sorted.
    pub to_mark_deleted: Vec<String>,
}

impl DiffResult {
    /// `ingest=N, skip=N, delete=N`
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "ingest={}, skip={}, delete={}",
            self.to_ingest.len(),
            self.to_skip.len(),
            self.to_mark_deleted.len()
        )
    }

    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.to_ingest.is_empty() && self.to_mark_deleted.is_empty()
    }
}

/// Compares a scan against the recorded state.
///
/// Only the content hash decides between ingest and skip. Configuration ids
/// are carried on the candidates but never compared; a configuration change
/// needs a forced run to take effect.
///
/// A deleted entry never counts as unchanged: its downstream records were
/// soft-deleted, so a restored file is re-ingested to bring them back.
pub struct Differ<'a, R: StateReader + ?Sized> {
    state: &'a R,
}

impl<'a, R: StateReader + ?Sized> Differ<'a, R> {
    pub const fn new(state: &'a R) -> Self {
        Self { state }
    }

    /// `root` scopes deletion detection; it defaults to the first scanned
    /// file's root. With neither, nothing is marked deleted.
    #[must_use]
    pub fn compute_diff(
        &self,
        scanned: &[ScannedFile],
        force: bool,
        root: Option<&str>,
    ) -> DiffResult {
        let embedding_id = self.state.get_embedding_id();
        let mut result = DiffResult::default();
        let mut seen: HashSet<&str> = HashSet::with_capacity(scanned.len());

        for file in scanned {
            seen.insert(file.path.as_str());
            let candidate = FileCandidate::from_scanned(
                file,
                self.state.get_parser_id(&file.extension),
                self.state.get_chunker_id(&file.extension),
                embedding_id.clone(),
            );

            if force {
                result.to_ingest.push(candidate);
                continue;
            }

            let unchanged = self
                .state
                .get_file_entry(&file.root, &file.path)
                .is_some_and(|entry| {
                    entry.is_active() && entry.content_hash == file.content_hash
                });
            if unchanged {
                result.to_skip.push(candidate);
            } else {
                result.to_ingest.push(candidate);
            }
        }

        let root = root.or_else(|| scanned.first().map(|f| f.root.as_str()));
        if let Some(root) = root {
            result.to_mark_deleted = self
                .state
                .get_active_paths(root)
                .into_iter()
                .filter(|path| !seen.contains(path.as_str()))
                .collect();
        }

        log::info!("Diff: {}", result.summary());
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest_state::{FileEntry, FileStatus};
    use pretty_assertions::assert_eq;
    use std::collections::{BTreeMap, BTreeSet};

    const ROOT: &str = "/root";

    #[derive(Default)]
    struct MockState {
        entries: BTreeMap<String, FileEntry>,
        chunker_id: Option<String>,
        embedding_id: Option<String>,
    }

    impl MockState {
        fn with(mut self, path: &str, hash: &str, status: FileStatus) -> Self {
            self.entries.insert(
                path.to_string(),
                FileEntry {
                    extension: ".md".to_string(),
                    size_bytes: 100,
                    mtime_epoch: 1.0,
                    content_hash: hash.to_string(),
                    status,
                    parser_id: "md.v1".to_string(),
                    chunker_id: "tokens_800_120".to_string(),
                    embedding_id: "openai:text-embedding-3-small".to_string(),
                    enricher_id: None,
                    updated_at: None,
                },
            );
            self
        }
    }

    impl StateReader for MockState {
        fn get_active_paths(&self, root: &str) -> BTreeSet<String> {
            if root != ROOT {
                return BTreeSet::new();
            }
            self.entries
                .iter()
                .filter(|(_, e)| e.is_active())
                .map(|(p, _)| p.clone())
                .collect()
        }

        fn get_file_entry(&self, root: &str, path: &str) -> Option<&FileEntry> {
            if root != ROOT {
                return None;
            }
            self.entries.get(path)
        }

        fn get_parser_id(&self, ext: &str) -> String {
            format!("{}.v1", ext.trim_start_matches('.'))
        }

        fn get_chunker_id(&self, _ext: &str) -> String {
            self.chunker_id
                .clone()
                .unwrap_or_else(|| "tokens_800_120".to_string())
        }

        fn get_embedding_id(&self) -> String {
            self.embedding_id
                .clone()
                .unwrap_or_else(|| "openai:text-embedding-3-small".to_string())
        }
    }

    fn scanned(name: &str, hash: &str) -> ScannedFile {
        ScannedFile {
            path: format!("{ROOT}/{name}"),
            root: ROOT.to_string(),
            extension: ".md".to_string(),
            size_bytes: 100,
            mtime_epoch: 1.0,
            content_hash: hash.to_string(),
        }
    }

    fn paths(candidates: &[FileCandidate]) -> Vec<&str> {
        candidates.iter().map(|c| c.path.as_str()).collect()
    }

    #[test]
    fn candidate_carries_resolved_ids() {
        let state = MockState::default();
        let diff = Differ::new(&state).compute_diff(&[scanned("a.md", "sha256:a")], false, None);
        let candidate = &diff.to_ingest[0];
        assert_eq!(candidate.parser_id, "md.v1");
        assert_eq!(candidate.chunker_id, "tokens_800_120");
        assert_eq!(candidate.embedding_id, "openai:text-embedding-3-small");
    }

    #[test]
    fn skip_ingest_and_delete_in_one_pass() {
        let state = MockState::default()
            .with("/root/a.md", "sha256:h1", FileStatus::Active)
            .with("/root/b.md", "sha256:h2", FileStatus::Active);
        let diff = Differ::new(&state).compute_diff(
            &[scanned("a.md", "sha256:h1"), scanned("c.md", "sha256:h3")],
            false,
            Some(ROOT),
        );

        assert_eq!(paths(&diff.to_skip), vec!["/root/a.md"]);
        assert_eq!(paths(&diff.to_ingest), vec!["/root/c.md"]);
        assert_eq!(diff.to_mark_deleted, vec!["/root/b.md".to_string()]);
        assert_eq!(diff.summary(), "ingest=1, skip=1, delete=1");
    }

    #[test]
    fn changed_hash_is_ingested() {
        let state = MockState::default().with("/root/a.md", "sha256:old", FileStatus::Active);
        let diff =
            Differ::new(&state).compute_diff(&[scanned("a.md", "sha256:new")], false, None);
        assert_eq!(paths(&diff.to_ingest), vec!["/root/a.md"]);
        assert!(diff.to_skip.is_empty());
    }

    #[test]
    fn force_ingests_everything() {
        let state = MockState::default()
            .with("/root/a.md", "sha256:a", FileStatus::Active)
            .with("/root/b.md", "sha256:b", FileStatus::Active);
        let diff = Differ::new(&state).compute_diff(
            &[scanned("a.md", "sha256:a"), scanned("b.md", "sha256:b")],
            true,
            None,
        );
        assert_eq!(diff.to_ingest.len(), 2);
        assert!(diff.to_skip.is_empty());
    }

    #[test]
    fn config_changes_alone_do_not_trigger_ingest() {
        let state = MockState {
            chunker_id: Some("lines_40_5".to_string()),
            embedding_id: Some("hash:fnv-64".to_string()),
            ..MockState::default()
        }
        .with("/root/a.md", "sha256:a", FileStatus::Active);

        let diff = Differ::new(&state).compute_diff(&[scanned("a.md", "sha256:a")], false, None);
        assert_eq!(paths(&diff.to_skip), vec!["/root/a.md"]);
        assert_eq!(diff.to_skip[0].chunker_id, "lines_40_5");
        assert!(diff.to_ingest.is_empty());
    }

    #[test]
    fn restored_file_with_same_hash_is_reingested() {
        let state = MockState::default().with("/root/a.md", "sha256:a", FileStatus::Deleted);
        let diff = Differ::new(&state).compute_diff(&[scanned("a.md", "sha256:a")], false, None);
        assert_eq!(paths(&diff.to_ingest), vec!["/root/a.md"]);
        assert!(diff.to_skip.is_empty());
        assert!(diff.to_mark_deleted.is_empty());
    }

    #[test]
    fn empty_scan_with_root_deletes_everything_sorted() {
        let state = MockState::default()
            .with("/root/z.md", "sha256:z", FileStatus::Active)
            .with("/root/a.md", "sha256:a", FileStatus::Active)
            .with("/root/gone.md", "sha256:g", FileStatus::Deleted);
        let diff = Differ::new(&state).compute_diff(&[], false, Some(ROOT));
        assert_eq!(
            diff.to_mark_deleted,
            vec!["/root/a.md".to_string(), "/root/z.md".to_string()]
        );
    }

    #[test]
    fn empty_scan_without_root_deletes_nothing() {
        let state = MockState::default().with("/root/a.md", "sha256:a", FileStatus::Active);
        let diff = Differ::new(&state).compute_diff(&[], false, None);
        assert!(diff.to_mark_deleted.is_empty());
        assert!(diff.is_noop());
    }
}
