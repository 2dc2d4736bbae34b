//! Engine configuration
//!
//! Read from `mend.config.json`. Every field has a default, so a partial file
//! (or none at all) is valid.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::recovery::ResourceLimits;

pub const CONFIG_FILE_NAME: &str = "mend.config.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Root of the backup tree. Relative paths resolve against `project_root`.
    pub backup_dir: PathBuf,
    /// Used when writing to `backup_dir` fails and recovery picks the
    /// alternate location.
    pub alternate_backup_dir: PathBuf,
    pub max_backups: usize,
    pub exclude_patterns: Vec<String>,
    pub include_patterns: Vec<String>,
    pub rule_store_path: PathBuf,
    /// Base for relative backup paths. Defaults to the current directory.
    pub project_root: Option<PathBuf>,
    pub recovery: RecoveryConfig,
    pub learning: LearningConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            backup_dir: PathBuf::from(".mend/backups"),
            alternate_backup_dir: std::env::temp_dir().join("mend-backups"),
            max_backups: 10,
            exclude_patterns: [
                "**/node_modules/**",
                "**/.git/**",
                "**/.next/**",
                "**/dist/**",
                "**/build/**",
                "**/out/**",
                "**/coverage/**",
                "**/.mend/**",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            include_patterns: [
                "**/*.js",
                "**/*.jsx",
                "**/*.ts",
                "**/*.tsx",
                "**/*.mjs",
                "**/*.cjs",
                "**/*.json",
                "**/*.css",
                "**/*.scss",
                "**/*.html",
                "**/*.svg",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            rule_store_path: PathBuf::from(".mend/learned-rules.json"),
            project_root: None,
            recovery: RecoveryConfig::default(),
            learning: LearningConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: EngineConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Load `mend.config.json` from `dir` when present, defaults otherwise.
    pub fn discover(dir: &Path) -> anyhow::Result<Self> {
        let candidate = dir.join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            let mut config = Self::load(&candidate)?;
            if config.project_root.is_none() {
                config.project_root = Some(dir.to_path_buf());
            }
            Ok(config)
        } else {
            Ok(Self {
                project_root: Some(dir.to_path_buf()),
                ..Self::default()
            })
        }
    }

    pub fn project_root(&self) -> PathBuf {
        self.project_root
            .clone()
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Resolve a configured path against the project root.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_root().join(path)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecoveryConfig {
    pub failure_threshold: usize,
    pub recovery_timeout_ms: u64,
    pub monitoring_window_ms: u64,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub resource_limits: ResourceLimits,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout_ms: 60_000,
            monitoring_window_ms: 300_000,
            base_delay_ms: 100,
            max_delay_ms: 5_000,
            resource_limits: ResourceLimits::default(),
        }
    }
}

impl RecoveryConfig {
    pub fn recovery_timeout(&self) -> Duration {
        Duration::from_millis(self.recovery_timeout_ms)
    }

    pub fn monitoring_window(&self) -> Duration {
        Duration::from_millis(self.monitoring_window_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LearningConfig {
    pub enabled: bool,
    pub confidence_threshold: f64,
    pub confidence_delta: f64,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            confidence_threshold: 0.7,
            confidence_delta: 0.1,
        }
    }
}
