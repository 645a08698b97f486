use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::model::config::ProjectConfig;

/// Directory holding a project's files, below the project root
pub const PROJECT_DIR: &str = "wbs";
pub const CONFIG_FILE: &str = "project.toml";
pub const NODES_FILE: &str = "nodes.json";
pub const JOURNAL_FILE: &str = "events.jsonl";

/// Error type for project I/O operations
#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    #[error("not a wbs project: no wbs/ directory found")]
    NotAProject,
    #[error("could not read {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not write {path}: {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not parse project.toml: {0}")]
    ConfigParseError(#[from] toml::de::Error),
    #[error("could not edit project.toml: {0}")]
    ConfigEditError(#[from] toml_edit::TomlError),
    #[error("could not serialize project.toml: {0}")]
    ConfigSerializeError(#[from] toml::ser::Error),
    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),
}

/// A loaded project: where it lives and its configuration
#[derive(Debug, Clone)]
pub struct Project {
    pub root: PathBuf,
    pub wbs_dir: PathBuf,
    pub config: ProjectConfig,
}

impl Project {
    pub fn nodes_path(&self) -> PathBuf {
        self.wbs_dir.join(NODES_FILE)
    }

    pub fn journal_path(&self) -> PathBuf {
        self.wbs_dir.join(JOURNAL_FILE)
    }
}

/// Discover the project by walking up from the given directory,
/// looking for a `wbs/` subdirectory with a `project.toml`.
pub fn discover_project(start: &Path) -> Result<PathBuf, ProjectError> {
    let mut current = start.to_path_buf();
    loop {
        let wbs_dir = current.join(PROJECT_DIR);
        if wbs_dir.is_dir() && wbs_dir.join(CONFIG_FILE).exists() {
            return Ok(current);
        }
        if !current.pop() {
            return Err(ProjectError::NotAProject);
        }
    }
}

/// Load the project rooted at `root`.
pub fn load_project(root: &Path) -> Result<Project, ProjectError> {
    let wbs_dir = root.join(PROJECT_DIR);
    if !wbs_dir.is_dir() {
        return Err(ProjectError::NotAProject);
    }

    let config_path = wbs_dir.join(CONFIG_FILE);
    let config_text = fs::read_to_string(&config_path).map_err(|e| ProjectError::ReadError {
        path: config_path.clone(),
        source: e,
    })?;
    let config: ProjectConfig = toml::from_str(&config_text)?;

    Ok(Project {
        root: root.to_path_buf(),
        wbs_dir,
        config,
    })
}

/// Replace `path` with `content` via a temp file in the same directory, so
/// readers see either the old or the new file and never a partial one.
pub fn atomic_write(path: &Path, content: &[u8]) -> io::Result<()> {
    let dir = path.parent().unwrap_or(Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
