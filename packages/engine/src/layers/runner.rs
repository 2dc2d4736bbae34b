//! Per-layer stage logic: tree pass, validation, fallback, validation.
//!
//! Whatever happens here, a layer never hands invalid text to the next one:
//! when neither stage produces validated output the input passes through
//! unchanged and the result carries the error.

use tracing::{debug, warn};

use crate::api::{LayerResult, LayerStrategy};
use crate::error::{EngineError, ErrorInfo, Result};
use crate::transform::{validate, Rewrite, SourceFile};

use super::Layer;

pub fn run_layer(layer: &dyn Layer, code: &str, file: &SourceFile) -> LayerResult {
    let id = layer.id();
    if !layer.applies_to(file) {
        debug!(layer = %id, path = %file.path().display(), "layer does not apply");
        return LayerResult::passthrough(id, code, LayerStrategy::Skipped);
    }

    let tree_error = match tree_stage(layer, code, file) {
        Ok(rewrite) => {
            let strategy = if rewrite.changes.is_empty() && rewrite.code == code {
                LayerStrategy::Unchanged
            } else {
                LayerStrategy::Tree
            };
            return finish(layer, code, rewrite, strategy, Vec::new());
        }
        Err(e) => e,
    };

    warn!(
        layer = %id,
        path = %file.path().display(),
        "tree pass discarded, trying pattern fallback: {}",
        tree_error
    );
    let mut warnings = vec![format!("tree transform failed: {}", tree_error)];

    let fallback = layer.fallback(code, file);
    if fallback.code != code {
        match validate(&fallback.code, file) {
            Ok(()) => {
                debug!(layer = %id, changes = fallback.changes.len(), "fallback output validated");
                return finish(layer, code, fallback, LayerStrategy::Fallback, warnings);
            }
            Err(e) => {
                warn!(layer = %id, path = %file.path().display(), "fallback output discarded: {}", e);
                warnings.push(format!("pattern fallback produced invalid output: {}", e));
                return failed(layer, code, &e, warnings);
            }
        }
    }

    // Nothing to fall back to. Unparsable input is a failure; otherwise the
    // layer simply had nothing it could safely do.
    match validate(code, file) {
        Ok(()) => {
            let mut result = LayerResult::passthrough(id, code, LayerStrategy::Unchanged);
            result.warnings = warnings;
            result
        }
        Err(_) => failed(layer, code, &tree_error, warnings),
    }
}

fn tree_stage(layer: &dyn Layer, code: &str, file: &SourceFile) -> Result<Rewrite> {
    let rewrite = layer.transform(code, file)?;
    validate(&rewrite.code, file)
        .map_err(|e| EngineError::validation("tree transform", e.to_string()))?;
    Ok(rewrite)
}

fn finish(
    layer: &dyn Layer,
    code: &str,
    rewrite: Rewrite,
    strategy: LayerStrategy,
    mut warnings: Vec<String>,
) -> LayerResult {
    warnings.extend(rewrite.warnings);
    let id = layer.id();
    LayerResult {
        layer: id,
        name: id.name().to_string(),
        success: true,
        code: rewrite.code,
        original_code: code.to_string(),
        change_count: rewrite.changes.len(),
        changes: rewrite.changes,
        warnings,
        strategy,
        error: None,
        backup_path: None,
    }
}

fn failed(layer: &dyn Layer, code: &str, error: &EngineError, warnings: Vec<String>) -> LayerResult {
    let mut result = LayerResult::passthrough(layer.id(), code, LayerStrategy::Failed);
    result.success = false;
    result.warnings = warnings;
    result.error = Some(ErrorInfo::from(error));
    result
}
