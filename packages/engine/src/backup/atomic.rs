//! Temp-file-then-rename writes.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use uuid::Uuid;

use super::content_hash;
use crate::error::{EngineError, Result};

/// Content written to a sibling temp file, not yet visible at the target.
///
/// Dropping an uncommitted stage removes the temp file and leaves the target
/// exactly as it was.
#[derive(Debug)]
pub struct StagedWrite {
    target: PathBuf,
    temp: PathBuf,
    committed: bool,
}

impl StagedWrite {
    pub fn stage(target: &Path, content: &[u8]) -> Result<Self> {
        let parent = match target.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent).map_err(|e| EngineError::io(&parent, e))?;

        let name = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "file".to_string());
        let temp = parent.join(format!(".{}.{}.tmp", name, Uuid::new_v4().simple()));

        // Registered before the first write so a failure below still cleans up.
        let staged = Self {
            target: target.to_path_buf(),
            temp,
            committed: false,
        };

        let mut file = File::create(&staged.temp).map_err(|e| EngineError::io(&staged.temp, e))?;
        file.write_all(content)
            .and_then(|_| file.sync_all())
            .map_err(|e| EngineError::io(&staged.temp, e))?;

        if let Ok(metadata) = fs::metadata(target) {
            let _ = fs::set_permissions(&staged.temp, metadata.permissions());
        }
        Ok(staged)
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    pub fn temp_path(&self) -> &Path {
        &self.temp
    }

    pub fn read_back(&self) -> Result<Vec<u8>> {
        fs::read(&self.temp).map_err(|e| EngineError::io(&self.temp, e))
    }

    /// Byte-for-byte comparison of the staged file with `expected`.
    pub fn verify(&self, expected: &[u8]) -> Result<()> {
        let actual = self.read_back()?;
        if actual != expected {
            return Err(EngineError::Integrity {
                path: self.target.display().to_string(),
                expected: content_hash(expected),
                actual: content_hash(&actual),
            });
        }
        Ok(())
    }

    /// Atomically replace the target with the staged content.
    pub fn commit(mut self) -> Result<()> {
        fs::rename(&self.temp, &self.target).map_err(|e| EngineError::io(&self.target, e))?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for StagedWrite {
    fn drop(&mut self) {
        if !self.committed {
            let _ = fs::remove_file(&self.temp);
        }
    }
}
