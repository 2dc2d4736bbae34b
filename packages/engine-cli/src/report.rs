use std::fmt::Write;

use mend_engine::{CloseReport, LayerStrategy, TransformResponse};
use serde::Serialize;

/// Everything `mend fix` did, in target order.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FixReport {
    pub files: usize,
    pub changed: usize,
    pub failed: usize,
    pub change_count: usize,
    pub dry_run: bool,
    pub results: Vec<TransformResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub learning: Option<CloseReport>,
}

impl FixReport {
    pub fn new(results: Vec<TransformResponse>, dry_run: bool) -> Self {
        Self {
            files: results.len(),
            changed: results.iter().filter(|r| r.change_count > 0).count(),
            failed: results.iter().filter(|r| !r.success).count(),
            change_count: results.iter().map(|r| r.change_count).sum(),
            dry_run,
            results,
            learning: None,
        }
    }

    pub fn exit_code(&self) -> i32 {
        if self.failed > 0 {
            1
        } else {
            0
        }
    }

    pub fn render_text(&self) -> String {
        let mut out = String::new();
        for result in &self.results {
            let status = match (&result.error, result.change_count) {
                (Some(_), _) => "FAIL",
                (None, 0) => "ok",
                (None, _) => "fixed",
            };
            let _ = writeln!(
                out,
                "{:<5} {} ({} changes)",
                status,
                result.file_path.display(),
                result.change_count
            );
            for layer in &result.layers {
                if layer.strategy == LayerStrategy::Skipped {
                    continue;
                }
                let _ = writeln!(
                    out,
                    "      layer {}: {} change(s) via {}",
                    layer.layer, layer.change_count, layer.strategy
                );
                for change in &layer.changes {
                    let _ = writeln!(out, "        - {}", change.description);
                }
            }
            for warning in &result.warnings {
                let _ = writeln!(out, "      warning: {}", warning);
            }
            if let Some(error) = &result.error {
                let _ = writeln!(out, "      error [{}]: {}", error.kind, error.message);
            }
        }

        let verb = if self.dry_run { "would change" } else { "changed" };
        let _ = writeln!(
            out,
            "{} file(s), {} {} ({} changes), {} failed",
            self.files, verb, self.changed, self.change_count, self.failed
        );
        if let Some(learning) = &self.learning {
            if learning.saved {
                let _ = writeln!(
                    out,
                    "learned {} candidate(s); {} rule(s) in {}",
                    learning.candidates,
                    learning.rules,
                    learning.rule_store_path.display()
                );
            }
        }
        out
    }
}
