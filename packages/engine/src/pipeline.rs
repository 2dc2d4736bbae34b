//! Layer chaining and per-layer writes.
//!
//! Each layer receives the previous layer's code. A layer that changed
//! something is written to disk on its own, backup first, so the backup
//! tree holds one snapshot per mutating step. When writing, the first failed
//! layer stops the run and the file goes back to what the request found.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::api::{LayerResult, TransformResponse};
use crate::backup::{BackupLocation, BackupManager, WriteReceipt};
use crate::error::{EngineError, ErrorInfo, Result};
use crate::layers::{run_layer, Layer};
use crate::recovery::{ErrorCategory, ErrorContext, ErrorHandler, ErrorRecord, Execution};
use crate::transform::SourceFile;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunOptions {
    /// Write each changed layer through the backup manager.
    pub write: bool,
    /// When false, report changes but return the original code.
    pub apply_fixes: bool,
    pub verbose: bool,
}

/// How to put a file back the way the request found it.
#[derive(Debug)]
enum Rollback {
    /// The backup taken before the first write.
    Restore(PathBuf),
    /// The file did not exist before the first write.
    Remove,
}

pub struct Pipeline<'e> {
    backups: &'e BackupManager,
    errors: &'e ErrorHandler,
}

impl<'e> Pipeline<'e> {
    pub fn new(backups: &'e BackupManager, errors: &'e ErrorHandler) -> Self {
        Self { backups, errors }
    }

    pub fn run(
        &self,
        layers: &[&dyn Layer],
        file: &SourceFile,
        code: &str,
        options: RunOptions,
    ) -> TransformResponse {
        let mut response = TransformResponse {
            success: true,
            file_path: file.path().to_path_buf(),
            code: code.to_string(),
            change_count: 0,
            changes: Vec::new(),
            warnings: Vec::new(),
            layers: Vec::with_capacity(layers.len()),
            error: None,
        };
        let mut current = code.to_string();
        let mut rollback = None;

        for layer in layers {
            let mut result = run_layer(*layer, &current, file);
            log_layer(&result, file.path(), options.verbose);

            if !result.success {
                if response.error.is_none() {
                    response.success = false;
                    response.error = result.error.clone();
                }
                if options.write {
                    absorb(&mut response, result);
                    self.roll_back(file.path(), rollback.take(), &mut response);
                    current = code.to_string();
                    break;
                }
            }

            if result.changed() && options.write {
                match self.write(file.path(), &result) {
                    Ok(receipt) => {
                        result.backup_path = receipt.backup.map(|b| b.backup_path);
                        if rollback.is_none() {
                            rollback = Some(match &result.backup_path {
                                Some(backup) => Rollback::Restore(backup.clone()),
                                None => Rollback::Remove,
                            });
                        }
                    }
                    Err(error) => {
                        warn!(
                            layer = %result.layer,
                            path = %file.path().display(),
                            "write failed, stopping pipeline: {}",
                            error
                        );
                        let info = ErrorInfo::from(&error);
                        result.code = result.original_code.clone();
                        result.success = false;
                        result.error = Some(info.clone());
                        response.success = false;
                        response.error = Some(info);
                        absorb(&mut response, result);
                        self.roll_back(file.path(), rollback.take(), &mut response);
                        current = code.to_string();
                        break;
                    }
                }
            }

            current = result.code.clone();
            absorb(&mut response, result);
        }

        response.code = if options.apply_fixes {
            current
        } else {
            code.to_string()
        };
        response
    }

    /// Undo the writes of earlier layers after a later one failed.
    fn roll_back(&self, path: &Path, rollback: Option<Rollback>, response: &mut TransformResponse) {
        let outcome = match rollback {
            None => return,
            Some(Rollback::Restore(backup)) => self
                .backups
                .restore_from_backup(&backup, Some(path))
                .map(|_| ()),
            Some(Rollback::Remove) => fs::remove_file(path).map_err(|e| EngineError::io(path, e)),
        };
        match outcome {
            Ok(()) => info!(path = %path.display(), "rolled back earlier layer writes"),
            Err(error) => {
                warn!(path = %path.display(), "rollback failed: {}", error);
                response
                    .warnings
                    .push(format!("could not roll back earlier writes: {}", error));
            }
        }
    }

    /// Safe write under the I/O recovery plan; the fallback writes the backup
    /// to the alternate location.
    fn write(&self, path: &Path, result: &LayerResult) -> Result<WriteReceipt> {
        let operation = format!("layer {}", result.layer);
        let context = ErrorContext::new(format!("write {}", operation)).with_path(path);
        let execution = self.errors.execute(
            ErrorCategory::Io,
            context,
            |_attempt| self.backups.safe_write_file(path, &result.code, &operation),
            Some(|record: &ErrorRecord| {
                debug!(error_id = %record.error_id, "writing with the alternate backup location");
                self.backups
                    .safe_write_file_in(BackupLocation::Alternate, path, &result.code, &operation)
            }),
        );
        if let Execution::Retried { attempts, .. } = &execution {
            if *attempts > 1 {
                info!(path = %path.display(), attempts, "write succeeded after retrying");
            }
        }
        execution.into_result()
    }
}

fn absorb(response: &mut TransformResponse, result: LayerResult) {
    response.change_count += result.change_count;
    response.changes.extend(result.changes.iter().cloned());
    response.warnings.extend(result.warnings.iter().cloned());
    response.layers.push(result);
}

fn log_layer(result: &LayerResult, path: &Path, verbose: bool) {
    if verbose {
        info!(
            layer = %result.layer,
            strategy = %result.strategy,
            changes = result.change_count,
            path = %path.display(),
            "layer finished"
        );
    } else {
        debug!(
            layer = %result.layer,
            strategy = %result.strategy,
            changes = result.change_count,
            path = %path.display(),
            "layer finished"
        );
    }
}
