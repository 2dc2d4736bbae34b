//! Engine
//!
//! Owns one backup manager, one error handler, one file filter and one rule
//! store, all built from an [`EngineConfig`]. The rule store is read when the
//! engine opens and written once when it closes; candidates mined in between
//! are held aside so concurrent transforms see the same rule snapshot.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::api::{LayerSelection, LayerStrategy, TransformRequest, TransformResponse};
use crate::backup::{BackupManager, FileFilter};
use crate::config::EngineConfig;
use crate::error::{EngineError, ErrorInfo, Result};
use crate::layers::{auto_select, builtin, AdaptiveLayer, Layer, LayerId, LayerSet};
use crate::learning::{extract_patterns, LearnedRule, RuleStore};
use crate::pipeline::{Pipeline, RunOptions};
use crate::recovery::{ErrorCategory, ErrorContext, ErrorHandler, ResourceProbe, SystemProbe};
use crate::transform::SourceFile;

/// Summary of [`Engine::close`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseReport {
    pub candidates: usize,
    pub rules: usize,
    pub saved: bool,
    pub rule_store_path: PathBuf,
}

pub struct Engine {
    config: EngineConfig,
    backups: BackupManager,
    errors: ErrorHandler,
    filter: FileFilter,
    rules: RuleStore,
    /// Mined candidates per source file.
    pending: Mutex<Vec<(PathBuf, Vec<LearnedRule>)>>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("rules", &self.rules.len())
            .finish_non_exhaustive()
    }
}

impl Engine {
    pub fn open(config: EngineConfig) -> Result<Self> {
        Self::open_with_probe(config, Arc::new(SystemProbe))
    }

    /// Open with an explicit resource probe for the error handler.
    pub fn open_with_probe(config: EngineConfig, probe: Arc<dyn ResourceProbe>) -> Result<Self> {
        let filter = FileFilter::new(
            config.project_root(),
            &config.include_patterns,
            &config.exclude_patterns,
        )?;
        let rules = RuleStore::load(
            config.resolve(&config.rule_store_path),
            config.learning.clone(),
        )?;
        let backups = BackupManager::from_config(&config);
        let errors = ErrorHandler::with_probe(config.recovery.clone(), probe);
        info!(
            root = %config.project_root().display(),
            rules = rules.len(),
            "engine opened"
        );
        Ok(Self {
            config,
            backups,
            errors,
            filter,
            rules,
            pending: Mutex::new(Vec::new()),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn backups(&self) -> &BackupManager {
        &self.backups
    }

    pub fn errors(&self) -> &ErrorHandler {
        &self.errors
    }

    pub fn filter(&self) -> &FileFilter {
        &self.filter
    }

    pub fn rules(&self) -> &RuleStore {
        &self.rules
    }

    /// Layers a request will run on `file`, in pipeline order.
    pub fn select_layers(&self, selection: &LayerSelection, file: &SourceFile, code: &str) -> LayerSet {
        match selection {
            LayerSelection::Auto => auto_select(file, code),
            LayerSelection::Explicit(ids) => ids.iter().copied().collect(),
        }
    }

    pub fn transform(&self, request: &TransformRequest) -> TransformResponse {
        let path = request.file_path.as_path();
        if !self.filter.allows(path) {
            let error = EngineError::Excluded {
                path: path.display().to_string(),
            };
            return TransformResponse::failure(
                path.to_path_buf(),
                request.source_text.clone().unwrap_or_default(),
                ErrorInfo::from(&error),
            );
        }

        let code = match &request.source_text {
            Some(text) => text.clone(),
            None => match self.read_source(path) {
                Ok(text) => text,
                Err(error) => {
                    return TransformResponse::failure(
                        path.to_path_buf(),
                        String::new(),
                        ErrorInfo::from(&error),
                    );
                }
            },
        };

        let file = SourceFile::new(path);
        let selected = self.select_layers(&request.layer_selection, &file, &code);
        debug!(path = %path.display(), layers = ?selected.ids(), "selected layers");

        let adaptive = AdaptiveLayer::new(&self.rules);
        let builtins: Vec<Box<dyn Layer>> = selected.ids().into_iter().filter_map(builtin).collect();
        let mut layers: Vec<&dyn Layer> = builtins.iter().map(|l| l.as_ref()).collect();
        if selected.contains(LayerSet::ADAPTIVE) {
            layers.push(&adaptive);
        }

        let options = RunOptions {
            write: !request.dry_run && request.apply_fixes && path.is_file(),
            apply_fixes: request.apply_fixes,
            verbose: request.verbose,
        };
        let response = Pipeline::new(&self.backups, &self.errors).run(&layers, &file, &code, options);

        if selected.contains(LayerSet::ADAPTIVE) && !request.dry_run && request.apply_fixes {
            self.mine(path, &response);
        }
        info!(
            path = %path.display(),
            changes = response.change_count,
            success = response.success,
            "transformed"
        );
        response
    }

    /// Merge every pending candidate into the store and save it once.
    pub fn close(self) -> Result<CloseReport> {
        let mut pending = self
            .pending
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);
        let mut rules = self.rules;
        let rule_store_path = rules.path().to_path_buf();

        // Transforms may finish in any order; merge in path order.
        pending.sort_by(|a, b| a.0.cmp(&b.0));
        let candidates: usize = pending.iter().map(|(_, c)| c.len()).sum();
        for candidate in pending.into_iter().flat_map(|(_, c)| c) {
            rules.add_rule(candidate);
        }

        let saved = candidates > 0;
        if saved {
            rules.save()?;
        }
        info!(candidates, rules = rules.len(), "engine closed");
        Ok(CloseReport {
            candidates,
            rules: rules.len(),
            saved,
            rule_store_path,
        })
    }

    fn read_source(&self, path: &Path) -> Result<String> {
        self.errors
            .run(
                ErrorCategory::Io,
                ErrorContext::new("read source").with_path(path),
                |_attempt| fs::read_to_string(path).map_err(|e| EngineError::io(path, e)),
            )
            .into_result()
    }

    fn mine(&self, path: &Path, response: &TransformResponse) {
        if !self.config.learning.enabled {
            return;
        }
        let candidates: Vec<LearnedRule> = response
            .layers
            .iter()
            .filter(|r| r.layer != LayerId::Adaptive && r.success && r.changed())
            .filter(|r| matches!(r.strategy, LayerStrategy::Tree | LayerStrategy::Fallback))
            .flat_map(|r| extract_patterns(&r.original_code, &r.code, r.layer))
            .collect();
        if candidates.is_empty() {
            return;
        }
        debug!(path = %path.display(), candidates = candidates.len(), "mined candidate rules");
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((path.to_path_buf(), candidates));
    }
}
