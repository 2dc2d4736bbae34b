//! Backup Manager
//!
//! Snapshots live under `<root>/<relative dir of source>/<basename>.<epoch
//! millis>.<hash>`, one JSON [`BackupRecord`] per file. The hash is xxh3-64
//! over the content, rendered as 16 hex digits; a record whose content no
//! longer hashes to its stored value is never restored.

mod atomic;
mod filter;

#[cfg(test)]
mod test;

use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use xxhash_rust::xxh3::xxh3_64;

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::recovery::epoch_millis;

pub use atomic::StagedWrite;
pub use filter::FileFilter;

pub fn content_hash(content: &[u8]) -> String {
    format!("{:016x}", xxh3_64(content))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupRecord {
    pub original_path: PathBuf,
    pub timestamp: u64,
    pub hash: String,
    pub operation: String,
    pub content: String,
}

impl BackupRecord {
    pub fn is_intact(&self) -> bool {
        content_hash(self.content.as_bytes()) == self.hash
    }
}

/// Result of a successful `create_backup`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupInfo {
    pub backup_path: PathBuf,
    pub timestamp: u64,
    pub hash: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetentionPolicy {
    /// Records kept per source file. Zero disables pruning.
    pub max_backups: usize,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self { max_backups: 10 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupLocation {
    Primary,
    Alternate,
}

/// Outcome of `safe_write_file`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteReceipt {
    pub path: PathBuf,
    pub bytes: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup: Option<BackupInfo>,
}

#[derive(Debug)]
pub struct BackupManager {
    root: PathBuf,
    alternate_root: PathBuf,
    project_root: PathBuf,
    policy: RetentionPolicy,
    last_timestamp: Mutex<u64>,
}

impl BackupManager {
    pub fn new(root: impl Into<PathBuf>, project_root: impl Into<PathBuf>, policy: RetentionPolicy) -> Self {
        let root = root.into();
        Self {
            alternate_root: root.join(".alternate"),
            root,
            project_root: project_root.into(),
            policy,
            last_timestamp: Mutex::new(0),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            config.resolve(&config.backup_dir),
            config.project_root(),
            RetentionPolicy {
                max_backups: config.max_backups,
            },
        )
        .with_alternate_root(config.resolve(&config.alternate_backup_dir))
    }

    pub fn with_alternate_root(mut self, alternate_root: impl Into<PathBuf>) -> Self {
        self.alternate_root = alternate_root.into();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn policy(&self) -> RetentionPolicy {
        self.policy
    }

    /// Snapshot `path` into the primary backup tree, then prune.
    pub fn create_backup(&self, path: &Path, operation: &str) -> Result<BackupInfo> {
        self.create_backup_in(BackupLocation::Primary, path, operation)
    }

    pub fn create_backup_in(
        &self,
        location: BackupLocation,
        path: &Path,
        operation: &str,
    ) -> Result<BackupInfo> {
        let content = fs::read_to_string(path).map_err(|e| EngineError::io(path, e))?;
        let hash = content_hash(content.as_bytes());
        let timestamp = self.next_timestamp();

        let dir = self.mirror_dir(location, path);
        let basename = file_name(path)?;
        let backup_path = dir.join(format!("{}.{}.{}", basename, timestamp, hash));

        let record = BackupRecord {
            original_path: self.absolute(path),
            timestamp,
            hash: hash.clone(),
            operation: operation.to_string(),
            content,
        };
        let json = serde_json::to_vec_pretty(&record)?;
        let staged = StagedWrite::stage(&backup_path, &json)?;
        staged.verify(&json)?;
        staged.commit()?;
        debug!(backup = %backup_path.display(), %operation, "created backup");

        self.prune(&dir, &basename)?;
        Ok(BackupInfo {
            backup_path,
            timestamp,
            hash,
        })
    }

    /// Backups of `path` across both roots, newest first.
    pub fn list_backups(&self, path: &Path) -> Result<Vec<BackupInfo>> {
        let basename = file_name(path)?;
        let mut entries = Vec::new();
        for location in [BackupLocation::Primary, BackupLocation::Alternate] {
            entries.extend(scan(&self.mirror_dir(location, path), &basename)?);
        }
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(entries)
    }

    /// Read a record and check its hash.
    pub fn read_record(&self, backup_path: &Path) -> Result<BackupRecord> {
        let raw = fs::read_to_string(backup_path).map_err(|e| EngineError::io(backup_path, e))?;
        let record: BackupRecord = serde_json::from_str(&raw)?;
        if !record.is_intact() {
            return Err(EngineError::Integrity {
                path: backup_path.display().to_string(),
                expected: record.hash.clone(),
                actual: content_hash(record.content.as_bytes()),
            });
        }
        Ok(record)
    }

    /// Verify the record and stage its content next to the target without
    /// touching the target. The caller decides whether to commit.
    pub fn stage_restore(&self, backup_path: &Path, target: Option<&Path>) -> Result<StagedWrite> {
        let record = self.read_record(backup_path)?;
        let target = target
            .map(Path::to_path_buf)
            .unwrap_or_else(|| record.original_path.clone());

        let staged = StagedWrite::stage(&target, record.content.as_bytes())?;
        let staged_hash = content_hash(&staged.read_back()?);
        if staged_hash != record.hash {
            return Err(EngineError::Integrity {
                path: target.display().to_string(),
                expected: record.hash,
                actual: staged_hash,
            });
        }
        Ok(staged)
    }

    pub fn restore_from_backup(&self, backup_path: &Path, target: Option<&Path>) -> Result<PathBuf> {
        let staged = self.stage_restore(backup_path, target)?;
        let target = staged.target().to_path_buf();
        staged.commit()?;
        info!(backup = %backup_path.display(), target = %target.display(), "restored backup");
        Ok(target)
    }

    /// Back up the existing file, stage the new content, confirm it reads back
    /// identically, then rename over the target.
    pub fn safe_write_file(&self, path: &Path, content: &str, operation: &str) -> Result<WriteReceipt> {
        self.safe_write_file_in(BackupLocation::Primary, path, content, operation)
    }

    pub fn safe_write_file_in(
        &self,
        location: BackupLocation,
        path: &Path,
        content: &str,
        operation: &str,
    ) -> Result<WriteReceipt> {
        let backup = if path.exists() {
            Some(self.create_backup_in(location, path, operation)?)
        } else {
            None
        };

        let staged = StagedWrite::stage(path, content.as_bytes())?;
        if let Err(e) = staged.verify(content.as_bytes()) {
            warn!(path = %path.display(), "read-back mismatch, target left untouched");
            return Err(e);
        }
        staged.commit()?;
        info!(path = %path.display(), %operation, "wrote file");

        Ok(WriteReceipt {
            path: path.to_path_buf(),
            bytes: content.len(),
            backup,
        })
    }

    fn prune(&self, dir: &Path, basename: &str) -> Result<()> {
        if self.policy.max_backups == 0 {
            return Ok(());
        }
        let mut entries = scan(dir, basename)?;
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        for stale in entries.into_iter().skip(self.policy.max_backups) {
            debug!(backup = %stale.backup_path.display(), "pruning backup");
            fs::remove_file(&stale.backup_path).map_err(|e| EngineError::io(&stale.backup_path, e))?;
        }
        Ok(())
    }

    fn next_timestamp(&self) -> u64 {
        let mut last = self.last_timestamp.lock().unwrap_or_else(PoisonError::into_inner);
        let now = epoch_millis().max(*last + 1);
        *last = now;
        now
    }

    fn absolute(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_root.join(path)
        }
    }

    fn mirror_dir(&self, location: BackupLocation, path: &Path) -> PathBuf {
        let root = match location {
            BackupLocation::Primary => &self.root,
            BackupLocation::Alternate => &self.alternate_root,
        };
        let absolute = self.absolute(path);
        let relative = absolute.strip_prefix(&self.project_root).unwrap_or(&absolute);
        let mut dir = root.clone();
        if let Some(parent) = relative.parent() {
            for component in parent.components() {
                if let Component::Normal(part) = component {
                    dir.push(part);
                }
            }
        }
        dir
    }
}

fn file_name(path: &Path) -> Result<String> {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| EngineError::Backup(format!("{} has no file name", path.display())))
}

/// Parse `<basename>.<timestamp>.<hash>` entries of one source file.
fn scan(dir: &Path, basename: &str) -> Result<Vec<BackupInfo>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(EngineError::io(dir, e)),
    };

    let mut found = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| EngineError::io(dir, e))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let mut parts = name.rsplitn(3, '.');
        let (Some(hash), Some(timestamp), Some(base)) = (parts.next(), parts.next(), parts.next())
        else {
            continue;
        };
        if base != basename || hash.len() != 16 || !hash.bytes().all(|b| b.is_ascii_hexdigit()) {
            continue;
        }
        let Ok(timestamp) = timestamp.parse::<u64>() else {
            continue;
        };
        found.push(BackupInfo {
            backup_path: entry.path(),
            timestamp,
            hash: hash.to_string(),
        });
    }
    Ok(found)
}
