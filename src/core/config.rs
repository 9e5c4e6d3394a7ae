//! Configuration management with layered hierarchy

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::core::project::Project;
use crate::core::retry::RetryConfig;

/// Default lock wait for writers
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5000;

/// Retry settings as written in config files
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: Option<u32>,
    pub base_delay_ms: Option<u64>,
    pub max_delay_ms: Option<u64>,
}

/// Registry configuration with layered hierarchy
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Database file; relative paths resolve against the project root
    pub database: Option<PathBuf>,

    /// Lock wait for writers, in milliseconds
    pub busy_timeout_ms: Option<u64>,

    /// Backoff for transient write failures
    pub retry: RetrySettings,
}

impl Config {
    /// Load configuration from all sources, merging in priority order
    pub fn load(project: Option<&Project>) -> Self {
        let mut config = Config::default();

        // 1. Built-in defaults (already in Default impl)

        // 2. Global user config (~/.config/treg/config.yaml)
        if let Some(global) = Self::global_config_path().and_then(|p| Self::read(&p)) {
            config.merge(global);
        }

        // 3. Project config (.treg/config.yaml)
        if let Some(local) = project.and_then(|p| Self::read(&p.config_path())) {
            config.merge(local);
        }

        // 4. Environment variables
        config.apply_env(|key| std::env::var(key).ok());

        config
    }

    fn read(path: &std::path::Path) -> Option<Config> {
        if !path.exists() {
            return None;
        }
        let contents = std::fs::read_to_string(path).ok()?;
        // A freshly initialized config is all comments
        let blank = contents.lines().all(|l| {
            let l = l.trim();
            l.is_empty() || l.starts_with('#')
        });
        if blank {
            return None;
        }
        match serde_yml::from_str::<Config>(&contents) {
            Ok(config) => Some(config),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable config");
                None
            }
        }
    }

    /// Get the path to the global config file
    fn global_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "treg")
            .map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    /// Merge another config into this one (other takes precedence)
    fn merge(&mut self, other: Config) {
        if other.database.is_some() {
            self.database = other.database;
        }
        if other.busy_timeout_ms.is_some() {
            self.busy_timeout_ms = other.busy_timeout_ms;
        }
        if other.retry.max_attempts.is_some() {
            self.retry.max_attempts = other.retry.max_attempts;
        }
        if other.retry.base_delay_ms.is_some() {
            self.retry.base_delay_ms = other.retry.base_delay_ms;
        }
        if other.retry.max_delay_ms.is_some() {
            self.retry.max_delay_ms = other.retry.max_delay_ms;
        }
    }

    /// Apply `TREG_*` overrides; unparsable numbers are ignored
    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(db) = var("TREG_DATABASE").filter(|s| !s.is_empty()) {
            self.database = Some(PathBuf::from(db));
        }
        if let Some(ms) = var("TREG_BUSY_TIMEOUT_MS").and_then(|s| s.parse().ok()) {
            self.busy_timeout_ms = Some(ms);
        }
        if let Some(n) = var("TREG_RETRY_ATTEMPTS").and_then(|s| s.parse().ok()) {
            self.retry.max_attempts = Some(n);
        }
    }

    /// Database file for a project
    pub fn database_path(&self, project: &Project) -> PathBuf {
        match &self.database {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => project.root().join(path),
            None => project.default_database_path(),
        }
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms.unwrap_or(DEFAULT_BUSY_TIMEOUT_MS))
    }

    pub fn retry_config(&self) -> RetryConfig {
        let defaults = RetryConfig::default();
        RetryConfig {
            max_attempts: self.retry.max_attempts.unwrap_or(defaults.max_attempts),
            base_delay: self
                .retry
                .base_delay_ms
                .map_or(defaults.base_delay, Duration::from_millis),
            max_delay: self
                .retry
                .max_delay_ms
                .map_or(defaults.max_delay, Duration::from_millis),
        }
    }
}
