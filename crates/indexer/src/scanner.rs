use crate::error::{IngestError, Result};
use crate::hashing::compute_content_hash;
use context_code_chunker::normalize_ext;
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

/// Extensions picked up when nothing else is configured.
pub const DEFAULT_SUPPORTED_EXTENSIONS: &[&str] = &[
    ".md", ".markdown", ".txt", ".rst", ".adoc", ".html", ".json", ".yaml", ".yml", ".toml",
    ".csv", ".rs", ".py", ".js", ".ts", ".go", ".java", ".c", ".h", ".cpp", ".hpp",
];

/// One eligible file as seen right now. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScannedFile {
    /// Absolute path.
    pub path: String,
    /// Canonical source the file was found under.
    pub root: String,
    /// Lowercase, with leading dot.
    pub extension: String,
    pub size_bytes: u64,
    pub mtime_epoch: f64,
    /// `sha256:<hex>` of the file bytes.
    pub content_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanError {
    pub path: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanResult {
    pub files: Vec<ScannedFile>,
    pub errors: Vec<ScanError>,
    pub total_scanned: usize,
}

impl ScanResult {
    fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        let error = ScanError {
            path: path.into(),
            message: message.into(),
        };
        log::warn!("Scan error: {}: {}", error.path, error.message);
        self.errors.push(error);
    }

    fn merge(&mut self, other: Self) {
        self.files.extend(other.files);
        self.errors.extend(other.errors);
        self.total_scanned = self.files.len();
    }
}

#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub supported_extensions: BTreeSet<String>,
    pub include_hidden: bool,
    pub respect_gitignore: bool,
    pub follow_links: bool,
    /// Globs matched against paths relative to the scanned root.
    pub exclude: Vec<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            supported_extensions: DEFAULT_SUPPORTED_EXTENSIONS
                .iter()
                .map(|ext| (*ext).to_string())
                .collect(),
            include_hidden: false,
            respect_gitignore: true,
            follow_links: false,
            exclude: Vec::new(),
        }
    }
}

impl ScanConfig {
    #[must_use]
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.supported_extensions = extensions
            .into_iter()
            .map(|ext| normalize_ext(ext.as_ref()))
            .collect();
        self
    }

    #[must_use]
    pub fn with_exclude(mut self, pattern: impl Into<String>) -> Self {
        self.exclude.push(pattern.into());
        self
    }
}

/// Walks a source and fingerprints every supported file.
///
/// Blocking: hashing reads whole files. Run it under `spawn_blocking` from
/// async code.
#[derive(Debug, Clone)]
pub struct FileScanner {
    config: ScanConfig,
    supported: BTreeSet<String>,
    exclude: GlobSet,
    /// Files never reported, whatever the config says (state, store, caches).
    excluded_files: BTreeSet<PathBuf>,
}

impl Default for FileScanner {
    fn default() -> Self {
        Self {
            config: ScanConfig::default(),
            supported: ScanConfig::default().supported_extensions,
            exclude: GlobSet::empty(),
            excluded_files: BTreeSet::new(),
        }
    }
}

impl FileScanner {
    pub fn new(config: ScanConfig) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &config.exclude {
            let glob = Glob::new(pattern).map_err(|e| {
                IngestError::InvalidConfig(format!("bad exclude pattern {pattern:?}: {e}"))
            })?;
            builder.add(glob);
        }
        let exclude = builder
            .build()
            .map_err(|e| IngestError::InvalidConfig(format!("bad exclude patterns: {e}")))?;
        let supported = config
            .supported_extensions
            .iter()
            .map(|ext| normalize_ext(ext))
            .collect();
        Ok(Self {
            config,
            supported,
            exclude,
            excluded_files: BTreeSet::new(),
        })
    }

    /// Never report `path`, even when it matches the supported extensions.
    /// The path need not exist yet.
    #[must_use]
    pub fn with_excluded_file(mut self, path: &Path) -> Self {
        let resolved = canonical_root(path).unwrap_or_else(|_| path.to_path_buf());
        self.excluded_files.insert(resolved);
        self
    }

    #[must_use]
    pub const fn config(&self) -> &ScanConfig {
        &self.config
    }

    #[must_use]
    pub fn is_supported(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.supported.contains(&normalize_ext(ext)))
    }

    /// Scan a directory recursively, or a single file.
    ///
    /// Never fails: a missing source or an unreadable entry is reported in
    /// [`ScanResult::errors`] and left out of the file list.
    #[must_use]
    pub fn scan(&self, source: &Path) -> ScanResult {
        let mut result = ScanResult::default();

        let root = match source.canonicalize() {
            Ok(root) => root,
            Err(e) => {
                result.error(source.display().to_string(), e.to_string());
                return result;
            }
        };
        let root_str = root.to_string_lossy().into_owned();

        let mut found: BTreeMap<String, ScannedFile> = BTreeMap::new();
        if root.is_file() {
            if self.is_supported(&root) && !self.excluded_files.contains(&root) {
                self.fingerprint(&root, &root_str, &mut found, &mut result);
            }
        } else {
            for entry in self.walker(&root).build() {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        result.error(error_path(&e, &root_str), e.to_string());
                        continue;
                    }
                };
                if !entry.file_type().is_some_and(|ft| ft.is_file()) {
                    continue;
                }
                let path = entry.path();
                if !self.is_supported(path) || self.excluded_files.contains(path) {
                    continue;
                }
                self.fingerprint(path, &root_str, &mut found, &mut result);
            }
        }

        result.files = found.into_values().collect();
        result.total_scanned = result.files.len();
        log::debug!(
            "Scanned {}: {} files, {} errors",
            root_str,
            result.total_scanned,
            result.errors.len()
        );
        result
    }

    /// Scan several sources into one result.
    #[must_use]
    pub fn scan_all<P: AsRef<Path>>(&self, sources: &[P]) -> ScanResult {
        let mut result = ScanResult::default();
        for source in sources {
            result.merge(self.scan(source.as_ref()));
        }
        result
    }

    fn walker(&self, root: &Path) -> WalkBuilder {
        let respect = self.config.respect_gitignore;
        let mut builder = WalkBuilder::new(root);
        builder
            .hidden(!self.config.include_hidden)
            .follow_links(self.config.follow_links)
            .git_ignore(respect)
            .git_global(respect)
            .git_exclude(respect)
            .ignore(respect)
            .parents(respect)
            .require_git(false)
            .sort_by_file_name(|a, b| a.cmp(b));

        if !self.exclude.is_empty() {
            let exclude = self.exclude.clone();
            let base = root.to_path_buf();
            builder.filter_entry(move |entry| {
                let relative = entry.path().strip_prefix(&base).unwrap_or(entry.path());
                relative.as_os_str().is_empty() || !exclude.is_match(relative)
            });
        }
        builder
    }

    fn fingerprint(
        &self,
        path: &Path,
        root: &str,
        found: &mut BTreeMap<String, ScannedFile>,
        result: &mut ScanResult,
    ) {
        let path_str = path.to_string_lossy().into_owned();
        if found.contains_key(&path_str) {
            return;
        }
        match fingerprint_file(path, root) {
            Ok(file) => {
                found.insert(path_str, file);
            }
            Err(e) => result.error(path_str, e.to_string()),
        }
    }
}

fn fingerprint_file(path: &Path, root: &str) -> std::io::Result<ScannedFile> {
    let metadata = std::fs::metadata(path)?;
    let mtime_epoch = metadata
        .modified()
        .ok()
        .and_then(|modified| modified.duration_since(UNIX_EPOCH).ok())
        .map_or(0.0, |d| d.as_secs_f64());
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(normalize_ext)
        .unwrap_or_default();

    Ok(ScannedFile {
        path: path.to_string_lossy().into_owned(),
        root: root.to_string(),
        extension,
        size_bytes: metadata.len(),
        mtime_epoch,
        content_hash: compute_content_hash(path)?,
    })
}

fn error_path(error: &ignore::Error, fallback: &str) -> String {
    match error {
        ignore::Error::WithPath { path, .. } => path.display().to_string(),
        ignore::Error::WithDepth { err, .. } | ignore::Error::WithLineNumber { err, .. } => {
            error_path(err, fallback)
        }
        ignore::Error::Loop { child, .. } => child.display().to_string(),
        _ => fallback.to_string(),
    }
}

/// Canonical form of a source path, as used for scan roots and state keys.
///
/// A source that no longer exists still resolves: its nearest existing
/// ancestor is canonicalized and the missing tail appended, so a removed
/// root maps to the same key it was recorded under.
pub fn canonical_root(source: &Path) -> Result<PathBuf> {
    if let Ok(root) = source.canonicalize() {
        return Ok(root);
    }
    let absolute = std::path::absolute(source)
        .map_err(|e| IngestError::InvalidPath(format!("{}: {e}", source.display())))?;

    let mut base = absolute.as_path();
    let mut tail = Vec::new();
    while let Some(parent) = base.parent() {
        if let Some(name) = base.file_name() {
            tail.push(name.to_os_string());
        }
        base = parent;
        if let Ok(mut resolved) = base.canonicalize() {
            for name in tail.iter().rev() {
                resolved.push(name);
            }
            return Ok(resolved);
        }
    }
    Ok(absolute)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    fn names(result: &ScanResult) -> Vec<String> {
        result
            .files
            .iter()
            .map(|f| {
                Path::new(&f.path)
                    .strip_prefix(&f.root)
                    .unwrap()
                    .to_string_lossy()
                    .replace('\\', "/")
            })
            .collect()
    }

    #[test]
    fn scans_supported_files_recursively() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("docs/nested")).unwrap();
        fs::write(dir.path().join("a.md"), "# a").unwrap();
        fs::write(dir.path().join("docs/b.TXT"), "b").unwrap();
        fs::write(dir.path().join("docs/nested/c.md"), "c").unwrap();
        fs::write(dir.path().join("image.png"), [0u8, 1, 2]).unwrap();

        let result = FileScanner::default().scan(dir.path());
        assert_eq!(names(&result), vec!["a.md", "docs/b.TXT", "docs/nested/c.md"]);
        assert_eq!(result.total_scanned, 3);
        assert!(result.errors.is_empty());

        let b = &result.files[1];
        assert_eq!(b.extension, ".txt");
        assert_eq!(b.size_bytes, 1);
        assert!(b.content_hash.starts_with("sha256:"));
        assert!(b.mtime_epoch > 0.0);
    }

    #[test]
    fn single_file_is_its_own_root() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("only.md");
        fs::write(&file, "content").unwrap();

        let result = FileScanner::default().scan(&file);
        assert_eq!(result.files.len(), 1);
        let canonical = file.canonicalize().unwrap().to_string_lossy().into_owned();
        assert_eq!(result.files[0].path, canonical);
        assert_eq!(result.files[0].root, canonical);
    }

    #[test]
    fn missing_source_is_a_scan_error() {
        let dir = TempDir::new().unwrap();
        let result = FileScanner::default().scan(&dir.path().join("nope"));
        assert!(result.files.is_empty());
        assert_eq!(result.errors.len(), 1);
    }

    #[test]
    fn hidden_entries_skipped_unless_enabled() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join(".cache")).unwrap();
        fs::write(dir.path().join(".cache/x.md"), "x").unwrap();
        fs::write(dir.path().join("y.md"), "y").unwrap();

        assert_eq!(names(&FileScanner::default().scan(dir.path())), vec!["y.md"]);

        let scanner = FileScanner::new(ScanConfig {
            include_hidden: true,
            ..ScanConfig::default()
        })
        .unwrap();
        assert_eq!(names(&scanner.scan(dir.path())), vec![".cache/x.md", "y.md"]);
    }

    #[test]
    fn gitignore_and_exclude_globs_apply() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("build")).unwrap();
        fs::create_dir_all(dir.path().join("drafts")).unwrap();
        fs::write(dir.path().join(".gitignore"), "build/\n").unwrap();
        fs::write(dir.path().join("build/out.md"), "o").unwrap();
        fs::write(dir.path().join("drafts/d.md"), "d").unwrap();
        fs::write(dir.path().join("keep.md"), "k").unwrap();

        let scanner = FileScanner::new(ScanConfig::default().with_exclude("drafts")).unwrap();
        assert_eq!(names(&scanner.scan(dir.path())), vec!["keep.md"]);
    }

    #[test]
    fn custom_extension_set_is_case_insensitive() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.MD"), "a").unwrap();
        fs::write(dir.path().join("b.txt"), "b").unwrap();

        let scanner = FileScanner::new(ScanConfig::default().with_extensions(["md"])).unwrap();
        assert_eq!(names(&scanner.scan(dir.path())), vec!["a.MD"]);
    }

    #[test]
    fn invalid_exclude_pattern_is_rejected() {
        let err = FileScanner::new(ScanConfig::default().with_exclude("a[")).unwrap_err();
        assert!(matches!(err, IngestError::InvalidConfig(_)));
    }

    #[test]
    fn excluded_files_are_skipped_even_when_hidden_entries_are_scanned() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join(".context-ingest")).unwrap();
        fs::write(dir.path().join(".context-ingest/ingest.json"), "{}").unwrap();
        fs::write(dir.path().join(".context-ingest/notes.md"), "n").unwrap();
        fs::write(dir.path().join("a.md"), "a").unwrap();

        let config = ScanConfig {
            include_hidden: true,
            ..ScanConfig::default()
        };
        let scanner = FileScanner::new(config)
            .unwrap()
            .with_excluded_file(&dir.path().join(".context-ingest/ingest.json"))
            .with_excluded_file(&dir.path().join(".context-ingest/not-yet.json"));
        assert_eq!(
            names(&scanner.scan(dir.path())),
            vec![".context-ingest/notes.md", "a.md"]
        );
    }

    #[test]
    fn missing_source_resolves_under_its_existing_parent() {
        let dir = TempDir::new().unwrap();
        let gone = dir.path().join("docs").join("old");
        let root = canonical_root(&gone).unwrap();
        assert_eq!(root, dir.path().canonicalize().unwrap().join("docs").join("old"));
    }

    #[test]
    fn scan_all_merges_roots() {
        let a = TempDir::new().unwrap();
        let b = TempDir::new().unwrap();
        fs::write(a.path().join("a.md"), "a").unwrap();
        fs::write(b.path().join("b.md"), "b").unwrap();

        let result = FileScanner::default().scan_all(&[a.path(), b.path()]);
        assert_eq!(result.total_scanned, 2);
        assert_ne!(result.files[0].root, result.files[1].root);
    }
}
