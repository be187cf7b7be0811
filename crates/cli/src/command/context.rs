use crate::command::domain::{Hint, HintKind};
use crate::config::ProjectConfig;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::sync::watch;

/// Per-invocation settings shared by every service.
pub struct CommandContext {
    config_override: Option<PathBuf>,
    cancel: Option<watch::Receiver<bool>>,
}

/// Everything resolved for one project: where its config, state and store live.
pub struct ProjectContext {
    pub root: PathBuf,
    pub config: ProjectConfig,
    pub config_path: Option<String>,
    pub state_path: PathBuf,
    pub store_path: PathBuf,
    pub hints: Vec<Hint>,
}

impl CommandContext {
    pub fn new(config_override: Option<PathBuf>, cancel: Option<watch::Receiver<bool>>) -> Self {
        Self {
            config_override,
            cancel,
        }
    }

    pub fn cancel(&self) -> Option<watch::Receiver<bool>> {
        self.cancel.clone()
    }

    /// A directory source is its own project; a file source belongs to its
    /// parent directory.
    pub fn resolve_project(
        &self,
        source: &Path,
        state_override: Option<PathBuf>,
    ) -> Result<ProjectContext> {
        let root = project_root(source)?;
        let (config, config_path) =
            ProjectConfig::load(&root, self.config_override.as_deref())?;

        let mut hints = Vec::new();
        if config_path.is_none() {
            hints.push(Hint {
                kind: HintKind::Info,
                text: format!(
                    "No config at {}, using defaults",
                    crate::config::default_config_path(&root).display()
                ),
            });
        }

        let state_path = state_override.unwrap_or_else(|| config.state_path(&root));
        let store_path = config.store_path(&root);
        Ok(ProjectContext {
            root,
            config,
            config_path: config_path.map(|p| p.display().to_string()),
            state_path,
            store_path,
            hints,
        })
    }
}

fn project_root(source: &Path) -> Result<PathBuf> {
    let source = if source.as_os_str().is_empty() {
        Path::new(".")
    } else {
        source
    };
    if source.is_file() {
        let parent = source
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        return parent
            .canonicalize()
            .with_context(|| format!("Failed to resolve {}", parent.display()));
    }
    if source.is_dir() {
        return source
            .canonicalize()
            .with_context(|| format!("Failed to resolve {}", source.display()));
    }
    // Missing sources still get a project so a run can record their removal.
    Ok(source.to_path_buf())
}
