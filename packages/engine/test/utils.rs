//! Shared fixtures for the engine integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use mend_engine::config::RecoveryConfig;
use mend_engine::EngineConfig;
use tempfile::TempDir;

/// A throwaway project directory with an engine config rooted in it.
pub struct Project {
    pub dir: TempDir,
}

impl Project {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn config(&self) -> EngineConfig {
        EngineConfig {
            project_root: Some(self.root().to_path_buf()),
            alternate_backup_dir: self.root().join("alternate-backups"),
            recovery: RecoveryConfig {
                base_delay_ms: 1,
                max_delay_ms: 4,
                ..RecoveryConfig::default()
            },
            ..EngineConfig::default()
        }
    }

    pub fn write(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.root().join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        path
    }

    pub fn read(&self, relative: &str) -> String {
        fs::read_to_string(self.root().join(relative)).unwrap()
    }
}
