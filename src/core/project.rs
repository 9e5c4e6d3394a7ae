//! Project discovery and structure

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the project marker directory
pub const PROJECT_DIR: &str = ".treg";

/// Default database file inside the project directory
const DATABASE_FILE: &str = "registry.db";

/// Represents a registry project
#[derive(Debug)]
pub struct Project {
    /// Root directory of the project (parent of .treg/)
    root: PathBuf,
}

impl Project {
    /// Find project root by walking up from the current directory
    pub fn discover() -> Result<Self, ProjectError> {
        let current = std::env::current_dir().map_err(|e| ProjectError::IoError(e.to_string()))?;
        Self::discover_from(&current)
    }

    /// Find project root by walking up from the given directory
    pub fn discover_from(start: &Path) -> Result<Self, ProjectError> {
        let mut current = start
            .canonicalize()
            .map_err(|e| ProjectError::IoError(e.to_string()))?;

        loop {
            if current.join(PROJECT_DIR).is_dir() {
                return Ok(Self { root: current });
            }

            if !current.pop() {
                return Err(ProjectError::NotFound {
                    searched_from: start.to_path_buf(),
                });
            }
        }
    }

    /// Create a new project at the given path
    pub fn init(path: &Path) -> Result<Self, ProjectError> {
        let root = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());

        let dir = root.join(PROJECT_DIR);
        if dir.exists() {
            return Err(ProjectError::AlreadyExists(root));
        }

        std::fs::create_dir_all(&dir).map_err(|e| ProjectError::IoError(e.to_string()))?;
        std::fs::write(dir.join("config.yaml"), Self::default_config())
            .map_err(|e| ProjectError::IoError(e.to_string()))?;

        Ok(Self { root })
    }

    fn default_config() -> &'static str {
        r#"# Transport registry configuration

# Database file, relative to the project root
# database: .treg/registry.db

# How long a write waits for another writer's lock (milliseconds)
# busy_timeout_ms: 5000

# Retries for transient lock failures
# retry:
#   max_attempts: 4
#   base_delay_ms: 100
#   max_delay_ms: 2000
"#
    }

    /// Get the project root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the .treg configuration directory
    pub fn treg_dir(&self) -> PathBuf {
        self.root.join(PROJECT_DIR)
    }

    /// Project configuration file
    pub fn config_path(&self) -> PathBuf {
        self.treg_dir().join("config.yaml")
    }

    /// Database path when the configuration names none
    pub fn default_database_path(&self) -> PathBuf {
        self.treg_dir().join(DATABASE_FILE)
    }
}

/// Errors that can occur during project operations
#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("not a registry project (searched from {searched_from:?}). Run 'treg init' to create one.")]
    NotFound { searched_from: PathBuf },

    #[error("registry project already exists at {0:?}")]
    AlreadyExists(PathBuf),

    #[error("IO error: {0}")]
    IoError(String),
}
