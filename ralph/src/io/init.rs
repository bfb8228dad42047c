//! Default file scaffolding for `ralph --init`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;

pub const RALPH_DIR: &str = ".ralph";
pub const DEFAULT_CONFIG_PATH: &str = ".ralph/config.json";

const DEFAULT_CONFIG: &str = include_str!("../../templates/config.json");
const DEFAULT_PRD: &str = include_str!("../../templates/prd.json");
const DEFAULT_PROMPT: &str = include_str!("../../templates/prompt.md");

/// Canonical paths within `.ralph/` for a project root.
#[derive(Debug, Clone)]
pub struct RalphPaths {
    pub ralph_dir: PathBuf,
    pub config_path: PathBuf,
    pub prd_path: PathBuf,
    pub prompt_path: PathBuf,
    pub progress_path: PathBuf,
}

impl RalphPaths {
    pub fn new(root: impl AsRef<Path>) -> Self {
        let ralph_dir = root.as_ref().join(RALPH_DIR);
        Self {
            config_path: ralph_dir.join("config.json"),
            prd_path: ralph_dir.join("prd.json"),
            prompt_path: ralph_dir.join("prompt.md"),
            progress_path: ralph_dir.join("progress.txt"),
            ralph_dir,
        }
    }
}

/// Files written and left alone by [`init_files`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InitReport {
    pub created: Vec<PathBuf>,
    pub skipped: Vec<PathBuf>,
}

/// Write the default config, requirements document and prompt template under `root/.ralph/`.
///
/// Existing files are never overwritten. The progress log is left for the tool to create.
pub fn init_files(root: &Path) -> Result<InitReport> {
    let paths = RalphPaths::new(root);
    fs::create_dir_all(&paths.ralph_dir)
        .with_context(|| format!("create directory {}", paths.ralph_dir.display()))?;

    let mut report = InitReport::default();
    for (path, contents) in [
        (&paths.config_path, DEFAULT_CONFIG),
        (&paths.prd_path, DEFAULT_PRD),
        (&paths.prompt_path, DEFAULT_PROMPT),
    ] {
        if path.exists() {
            info!(path = %path.display(), "keeping existing file");
            report.skipped.push(path.clone());
            continue;
        }
        fs::write(path, contents).with_context(|| format!("write file {}", path.display()))?;
        info!(path = %path.display(), "created file");
        report.created.push(path.clone());
    }

    Ok(report)
}
